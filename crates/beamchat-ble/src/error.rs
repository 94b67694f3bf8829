//! Error types for the BLE link

use beamchat_core::{BeamchatError, LinkError};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE link
#[derive(Error, Debug)]
pub enum BleLinkError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("BLE adapter error: {0}")]
    Adapter(String),

    #[error("Failed to connect to peer: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Peer not found: {query}")]
    PeerNotFound { query: String },

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to get notifications stream: {0}")]
    NotificationStreamFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] BeamchatError),
}

impl From<btleplug::Error> for BleLinkError {
    fn from(err: btleplug::Error) -> Self {
        BleLinkError::Adapter(err.to_string())
    }
}

impl From<BleLinkError> for BeamchatError {
    fn from(err: BleLinkError) -> Self {
        match err {
            BleLinkError::Protocol(inner) => inner,
            BleLinkError::ConnectionTimeout => BeamchatError::Link(LinkError::Disconnected),
            other => BeamchatError::Link(LinkError::Unavailable {
                reason: other.to_string(),
            }),
        }
    }
}
