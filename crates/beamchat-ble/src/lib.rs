//! Bluetooth Low Energy link for BeamChat
//!
//! This crate connects `beamchat-core` sessions to real radios through
//! `btleplug`. It covers the central (initiator) role: it scans for
//! peripherals offering the BeamChat service, connects, subscribes to the chat
//! and name characteristics and drives the acknowledged-write discipline.
//!
//! ## Architecture
//!
//! - [`config`] - Link configuration and settings
//! - [`error`] - Error types specific to the BLE link
//! - [`protocol`] - Service and characteristic UUIDs, peer id derivation
//! - [`peer`] - Discovered peer state
//! - [`discovery`] - Device scanning with deduplication
//! - [`connection`] - Connection setup, notification pump, disconnect watcher
//! - [`link`] - The [`beamchat_core::ChunkLink`] implementation
//! - [`central`] - Scan and connect in one place
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beamchat_ble::{BleCentral, BleLinkConfig};
//! use beamchat_core::{ProtocolConfig, SessionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut registry, mut events) = SessionRegistry::new(ProtocolConfig::default())?;
//! let mut central = BleCentral::new(BleLinkConfig::default()).await?;
//!
//! let session = central.connect(&mut registry, "Phone").await?;
//! session.send_message("hello").await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The peripheral (responder) role needs a GATT server, which `btleplug` does
//! not provide.

pub mod central;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod link;
pub mod peer;
pub mod protocol;

// Public API exports
pub use central::BleCentral;
pub use config::BleLinkConfig;
pub use connection::{BleConnector, GattProfile};
pub use discovery::BleDiscovery;
pub use error::BleLinkError;
pub use link::CentralLink;
pub use peer::{Advertisement, ConnectionState, DiscoveredPeer};
pub use protocol::{
    BEAMCHAT_NAME_CHARACTERISTIC_UUID, BEAMCHAT_SERVICE_UUID,
    BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID,
};
