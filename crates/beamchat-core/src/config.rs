//! Protocol configuration
//!
//! Settings shared by every session opened by this device. The values are
//! plain data so the CLI can load them from TOML.

use serde::{Deserialize, Serialize};

use crate::errors::{BeamchatError, BeamchatResult};

/// Default chunk size: a 185-byte ATT MTU minus the 3-byte ATT header
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 182;

/// Default ceiling for a single reassembled message
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

// ----------------------------------------------------------------------------
// Protocol Configuration
// ----------------------------------------------------------------------------

/// Configuration for the transfer protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Chunk size used by links that cannot report a negotiated size
    pub default_max_chunk_size: usize,
    /// Largest message accepted for sending or reassembly
    pub max_message_bytes: usize,
    /// Buffer size of each session task's input channel
    pub inbox_capacity: usize,
    /// Display name offered during the name exchange
    pub local_name: String,
    /// Number of messages kept in the in-memory chat log
    pub chat_log_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            inbox_capacity: 128,
            local_name: "BeamChat".to_string(),
            chat_log_capacity: 200,
        }
    }
}

impl ProtocolConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with small buffers and chunks, for tests
    pub fn testing() -> Self {
        Self {
            default_max_chunk_size: 20,
            max_message_bytes: 4096,
            inbox_capacity: 32,
            local_name: "tester".to_string(),
            chat_log_capacity: 16,
        }
    }

    /// Set the fallback chunk size
    pub fn with_default_max_chunk_size(mut self, size: usize) -> Self {
        self.default_max_chunk_size = size;
        self
    }

    /// Set the message size ceiling
    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    /// Set the session inbox capacity
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Set the local display name
    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    /// Reject settings that would stall or break a session
    pub fn validate(&self) -> BeamchatResult<()> {
        if self.default_max_chunk_size == 0 {
            return Err(BeamchatError::config("default_max_chunk_size must be at least 1"));
        }
        if self.max_message_bytes == 0 {
            return Err(BeamchatError::config("max_message_bytes must be at least 1"));
        }
        if self.inbox_capacity == 0 {
            return Err(BeamchatError::config("inbox_capacity must be at least 1"));
        }
        Ok(())
    }
}
