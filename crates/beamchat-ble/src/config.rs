//! BLE link configuration

use std::time::Duration;

use beamchat_core::DEFAULT_MAX_CHUNK_SIZE;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE link
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleLinkConfig {
    /// Largest value written in one ATT write (negotiated MTU minus header)
    pub max_write_len: usize,
    /// Only peripherals whose advertised name starts with this are listed;
    /// an empty prefix accepts every peripheral offering the service
    pub advertised_name_prefix: String,
    /// How long a scan listens for advertisements
    pub scan_timeout: Duration,
    /// Maximum time to wait for connection and service discovery
    pub connection_timeout: Duration,
}

impl Default for BleLinkConfig {
    fn default() -> Self {
        Self {
            max_write_len: DEFAULT_MAX_CHUNK_SIZE,
            advertised_name_prefix: String::new(),
            scan_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl BleLinkConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the per-write length limit
    pub fn with_max_write_len(mut self, len: usize) -> Self {
        self.max_write_len = len;
        self
    }

    /// Set advertised name prefix
    pub fn with_advertised_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.advertised_name_prefix = prefix.into();
        self
    }

    /// Whether an advertised name passes the prefix filter
    pub fn accepts_name(&self, name: Option<&str>) -> bool {
        if self.advertised_name_prefix.is_empty() {
            return true;
        }
        name.is_some_and(|name| name.starts_with(&self.advertised_name_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_write_len_matches_protocol_chunk() {
        assert_eq!(BleLinkConfig::default().max_write_len, 182);
    }

    #[test]
    fn test_name_filter() {
        let open = BleLinkConfig::new();
        assert!(open.accepts_name(None));
        assert!(open.accepts_name(Some("anything")));

        let filtered = BleLinkConfig::new().with_advertised_name_prefix("Beam");
        assert!(filtered.accepts_name(Some("BeamChat-1")));
        assert!(!filtered.accepts_name(Some("Other")));
        assert!(!filtered.accepts_name(None));
    }
}
