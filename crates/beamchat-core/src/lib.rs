//! BeamChat Core Protocol Implementation
//!
//! This crate moves chat messages between two devices over a link that only
//! carries small packets. Messages are sliced into MTU-sized chunks and closed
//! with a separate `EOM` marker chunk. Flow control follows one of two transmit
//! disciplines: push-until-busy or one acknowledged write at a time. Chunks are
//! reassembled on arrival, and the two sides exchange display names before
//! chatting.
//!
//! The protocol state ([`LinkSession`]) is synchronous and transport-agnostic.
//! [`SessionTask`] runs it as a single-writer tokio task, and the
//! [`SessionRegistry`] keeps one task per peer. Radios plug in through the
//! [`ChunkLink`] trait.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod framing;
pub mod handshake;
pub mod link;
pub mod message;
pub mod reassembly;
pub mod registry;
pub mod session;
pub mod session_task;
pub mod transfer;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ProtocolConfig, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_BYTES};
pub use errors::{BeamchatError, BeamchatResult, LinkError, SessionError, TransferError};
pub use framing::{FrameMode, END_OF_MESSAGE};
pub use handshake::NameHandshake;
pub use link::{ChunkLink, Emission, MemoryLink, MemoryLinkControl, MemoryLinkSettings};
pub use message::{ChatLog, Message};
pub use reassembly::{MalformedReason, ReassemblyBuffer, Reassembled};
pub use registry::SessionRegistry;
pub use session::{LinkSession, SessionEvent, SessionEvents};
pub use session_task::{
    session_channel, PeerEvent, PeerEventReceiver, PeerEventSender, SessionHandle, SessionInbox,
    SessionInput, SessionTask,
};
pub use transfer::{TransferEngine, TransferOutcome, TransferState};
pub use types::{ChannelId, Direction, Discipline, PeerId, Role, Timestamp};
