//! Core types for the BeamChat protocol
//!
//! This module defines the small value types shared by every layer of the
//! protocol: peer identifiers, logical channels, link roles and the transmit
//! discipline each role implies.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::BeamchatError;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Identifier for a remote peer (8 bytes, derived from the platform device id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId([u8; 8]);

impl PeerId {
    /// Create a new PeerId from 8 bytes
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create PeerId from the first 8 bytes of a longer identifier
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut id = [0u8; 8];
        let len = core::cmp::min(bytes.len(), 8);
        id[..len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = BeamchatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean_str = s.strip_prefix("0x").unwrap_or(s);

        let bytes = hex::decode(clean_str)
            .map_err(|_| BeamchatError::config("invalid hex in peer id"))?;

        if bytes.len() != 8 {
            return Err(BeamchatError::config(format!(
                "peer id must be 8 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self::from_bytes(&bytes))
    }
}

// ----------------------------------------------------------------------------
// Logical Channels
// ----------------------------------------------------------------------------

/// Logical channel carried by one characteristic of the link
///
/// Each channel owns an independent transfer engine and reassembly buffer, so
/// name frames can never be mistaken for chat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    /// Free-form chat text, chunked and terminated by the end marker
    Chat,
    /// Display-name exchange, one chunk per name
    Name,
}

impl ChannelId {
    /// All channels, in the order they are serviced on a ready signal
    pub const ALL: [ChannelId; 2] = [ChannelId::Name, ChannelId::Chat];
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Chat => f.write_str("chat"),
            ChannelId::Name => f.write_str("name"),
        }
    }
}

// ----------------------------------------------------------------------------
// Roles and Transmit Disciplines
// ----------------------------------------------------------------------------

/// Which side of the link this device plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Advertiser / peripheral: serves the characteristics and notifies subscribers
    Responder,
    /// Scanner / central: connects, subscribes and writes
    Initiator,
}

impl Role {
    /// Transmit discipline used when this role is the data source
    pub fn discipline(self) -> Discipline {
        match self {
            Role::Responder => Discipline::Push,
            Role::Initiator => Discipline::AcknowledgedWrite,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Responder => f.write_str("responder"),
            Role::Initiator => f.write_str("initiator"),
        }
    }
}

/// How chunk emission reports success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discipline {
    /// Synchronous accept/busy; a busy link later fires a ready signal
    Push,
    /// Asynchronous write; each chunk is confirmed by an acknowledgement
    AcknowledgedWrite,
}

impl FromStr for Discipline {
    type Err = BeamchatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" | "notify" => Ok(Discipline::Push),
            "ack" | "write" | "acknowledged-write" => Ok(Discipline::AcknowledgedWrite),
            other => Err(BeamchatError::config(format!("unknown discipline: {other}"))),
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Push => f.write_str("push"),
            Discipline::AcknowledgedWrite => f.write_str("acknowledged write"),
        }
    }
}

/// Direction of a chat message relative to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}
