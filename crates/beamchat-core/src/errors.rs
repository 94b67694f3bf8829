//! Error types for the BeamChat protocol
//!
//! Transfer, link and session failures each get their own enum so callers can
//! match on the layer that failed; [`BeamchatError`] unifies them.

use crate::types::ChannelId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Rejections raised when starting a transfer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("a transfer is already in progress on the {channel} channel")]
    SendInProgress { channel: ChannelId },
    #[error("the {channel} channel is not established")]
    ChannelNotEstablished { channel: ChannelId },
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Failures reported by the link facade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("notify failed: {reason}")]
    NotifyFailed { reason: String },
    #[error("link disconnected")]
    Disconnected,
    #[error("link unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Session lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session for peer {peer_id} is closed")]
    SessionClosed { peer_id: String },
    #[error("session not found for peer {peer_id}")]
    SessionNotFound { peer_id: String },
    #[error("session for peer {peer_id} is not established")]
    NotEstablished { peer_id: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the BeamChat protocol
#[derive(Debug, thiserror::Error)]
pub enum BeamchatError {
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl BeamchatError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether the error only affects the current message and the session can keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transfer(_) | Self::Link(_))
    }
}

/// Result type for BeamChat operations
pub type BeamchatResult<T> = core::result::Result<T, BeamchatError>;
