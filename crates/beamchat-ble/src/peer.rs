//! BLE peer management and state

use std::time::Instant;

use beamchat_core::PeerId;
use btleplug::platform::Peripheral as PlatformPeripheral;

// ----------------------------------------------------------------------------
// Peer State Management
// ----------------------------------------------------------------------------

/// Connection state for a BLE peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What a peripheral's latest advertisement told us
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Fold a newer advertisement in; fields it lacks keep their old value
    pub fn merge(&mut self, newer: Advertisement) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.rssi.is_some() {
            self.rssi = newer.rssi;
        }
    }
}

/// A peripheral offering the BeamChat service
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    pub peer_id: PeerId,
    pub peripheral: PlatformPeripheral,
    pub advertisement: Advertisement,
    pub last_seen: Instant,
    pub connection_state: ConnectionState,
}

impl DiscoveredPeer {
    pub fn new(peer_id: PeerId, peripheral: PlatformPeripheral, advertisement: Advertisement) -> Self {
        Self {
            peer_id,
            peripheral,
            advertisement,
            last_seen: Instant::now(),
            connection_state: ConnectionState::Disconnected,
        }
    }

    /// Record another sighting of the same peripheral
    pub fn observe(&mut self, advertisement: Advertisement) {
        self.advertisement.merge(advertisement);
        self.last_seen = Instant::now();
    }

    /// Advertised name, or a placeholder for unnamed peripherals
    pub fn display_name(&self) -> &str {
        self.advertisement.name.as_deref().unwrap_or("Unknown")
    }

    pub fn rssi(&self) -> Option<i16> {
        self.advertisement.rssi
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn mark_connecting(&mut self) {
        self.connection_state = ConnectionState::Connecting;
    }

    pub fn mark_connected(&mut self) {
        self.connection_state = ConnectionState::Connected;
    }

    pub fn mark_failed(&mut self) {
        self.connection_state = ConnectionState::Failed;
    }

    pub fn mark_disconnected(&mut self) {
        self.connection_state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_advertisement_wins() {
        let mut ad = Advertisement {
            name: Some("Phone".into()),
            rssi: Some(-70),
        };
        ad.merge(Advertisement {
            name: Some("Renamed".into()),
            rssi: Some(-55),
        });
        assert_eq!(ad.name.as_deref(), Some("Renamed"));
        assert_eq!(ad.rssi, Some(-55));
    }

    #[test]
    fn test_missing_fields_keep_previous_values() {
        let mut ad = Advertisement {
            name: Some("Phone".into()),
            rssi: Some(-70),
        };
        ad.merge(Advertisement {
            name: None,
            rssi: Some(-60),
        });
        assert_eq!(ad.name.as_deref(), Some("Phone"));
        assert_eq!(ad.rssi, Some(-60));

        ad.merge(Advertisement::default());
        assert_eq!(ad.rssi, Some(-60));
    }
}
