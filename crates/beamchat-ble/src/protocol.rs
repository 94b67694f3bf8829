//! BLE protocol constants and utilities for BeamChat

use beamchat_core::{ChannelId, PeerId};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// BeamChat BLE service UUID
pub const BEAMCHAT_SERVICE_UUID: Uuid = Uuid::from_u128(0x12340987_1111_3333_5555_875612543926);

/// Chat transfer characteristic (notify from the responder, write with response from the initiator)
pub const BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x08590F7E_DB05_467E_8757_72F6FAEB13D4);

/// Display-name characteristic (notify, read, write without response)
pub const BEAMCHAT_NAME_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x08590F7E_DB05_467E_8757_72F6FAEB13D5);

// ----------------------------------------------------------------------------
// Protocol Utilities
// ----------------------------------------------------------------------------

/// Logical channel carried by a characteristic, if it is one of ours
pub fn channel_for(characteristic: Uuid) -> Option<ChannelId> {
    match characteristic {
        BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID => Some(ChannelId::Chat),
        BEAMCHAT_NAME_CHARACTERISTIC_UUID => Some(ChannelId::Name),
        _ => None,
    }
}

/// Characteristic backing a logical channel
pub fn characteristic_for(channel: ChannelId) -> Uuid {
    match channel {
        ChannelId::Chat => BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID,
        ChannelId::Name => BEAMCHAT_NAME_CHARACTERISTIC_UUID,
    }
}

/// Stable peer id derived from a platform peripheral identifier
///
/// Platform ids have no common shape (MAC address, UUID, object path), so
/// the first eight bytes of their SHA-256 digest are used.
pub fn peer_id_for(platform_id: &str) -> PeerId {
    let digest = Sha256::digest(platform_id.as_bytes());
    PeerId::from_bytes(&digest[..8])
}

/// Whether `query` names this peer: a full hex id, or a case-insensitive
/// prefix of its advertised name
pub fn matches_peer(query: &str, peer_id: &PeerId, name: Option<&str>) -> bool {
    if query.eq_ignore_ascii_case(&peer_id.to_string()) {
        return true;
    }
    name.is_some_and(|name| name.to_lowercase().starts_with(&query.to_lowercase()))
}
