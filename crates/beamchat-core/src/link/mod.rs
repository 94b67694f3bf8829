//! Link capability facade
//!
//! The transfer engine never touches a radio directly. It talks to a
//! [`ChunkLink`], which answers three questions (is the channel up, how big
//! may a chunk be, did the chunk go out) for one session. Readiness and
//! acknowledgement callbacks travel the other way as session inputs.
//!
//! - [`memory`] - in-process link pair used by tests and the simulator

pub mod memory;

use crate::errors::LinkError;
use crate::types::{ChannelId, Discipline};

pub use memory::{MemoryLink, MemoryLinkControl, MemoryLinkSettings};

// ----------------------------------------------------------------------------
// Emission Results
// ----------------------------------------------------------------------------

/// Result of handing one chunk to the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Push discipline: the chunk was queued for transmission
    Accepted,
    /// Push discipline: the transmit buffer is full, wait for a ready signal
    Busy,
    /// Acknowledged-write discipline: the write was issued, wait for its ack
    AwaitingAck,
}

// ----------------------------------------------------------------------------
// Link Trait
// ----------------------------------------------------------------------------

/// Transport primitives one session needs from the platform
///
/// A link is owned exclusively by its session; nothing else may emit on it
/// while a transfer is in progress.
pub trait ChunkLink: Send {
    /// Transmit discipline of this link
    fn discipline(&self) -> Discipline;

    /// Whether the characteristic backing `channel` has been set up
    fn is_established(&self, channel: ChannelId) -> bool;

    /// Current maximum chunk size; queried before every chunk since it can change
    fn max_chunk_size(&self, channel: ChannelId) -> usize;

    /// Hand one chunk to the transport
    fn emit(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<Emission, LinkError>;
}

impl<L: ChunkLink + ?Sized> ChunkLink for Box<L> {
    fn discipline(&self) -> Discipline {
        (**self).discipline()
    }

    fn is_established(&self, channel: ChannelId) -> bool {
        (**self).is_established(channel)
    }

    fn max_chunk_size(&self, channel: ChannelId) -> usize {
        (**self).max_chunk_size(channel)
    }

    fn emit(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<Emission, LinkError> {
        (**self).emit(channel, chunk)
    }
}
