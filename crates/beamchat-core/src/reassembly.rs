//! Inbound reassembly buffer
//!
//! Chunks are appended to an accumulator until the end marker arrives; the
//! accumulated bytes are then decoded once and emitted as a message. Bytes are
//! kept raw until the marker so that a character split across two chunks is
//! still decoded correctly.

use tracing::{debug, trace, warn};

use crate::framing::{is_end_marker, FrameMode};
use crate::types::ChannelId;

// ----------------------------------------------------------------------------
// Results
// ----------------------------------------------------------------------------

/// Why a completed frame could not be turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// The accumulated bytes are not valid UTF-8
    InvalidUtf8 { len: usize },
    /// The message outgrew the configured limit and was discarded
    Oversized { limit: usize },
}

/// A completed inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembled {
    Message(String),
    Malformed(MalformedReason),
}

// ----------------------------------------------------------------------------
// Reassembly Buffer
// ----------------------------------------------------------------------------

/// Accumulator for one inbound channel
///
/// Its content is always a prefix of the message currently being received and
/// never spans two messages.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    channel: ChannelId,
    mode: FrameMode,
    accumulator: Vec<u8>,
    max_message_bytes: usize,
    overflowed: bool,
}

impl ReassemblyBuffer {
    pub fn new(channel: ChannelId, max_message_bytes: usize) -> Self {
        Self {
            channel,
            mode: channel.frame_mode(),
            accumulator: Vec::new(),
            max_message_bytes,
            overflowed: false,
        }
    }

    /// Feed one inbound chunk; returns a frame when a message completes
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Option<Reassembled> {
        if self.mode == FrameMode::SingleChunk {
            return Some(decode(chunk.to_vec()));
        }

        if is_end_marker(chunk) {
            let bytes = std::mem::take(&mut self.accumulator);
            if std::mem::replace(&mut self.overflowed, false) {
                return Some(Reassembled::Malformed(MalformedReason::Oversized {
                    limit: self.max_message_bytes,
                }));
            }
            debug!("End marker on {} after {} bytes", self.channel, bytes.len());
            return Some(decode(bytes));
        }

        if self.overflowed {
            trace!("Dropping {} bytes of oversized {} message", chunk.len(), self.channel);
            return None;
        }

        if self.accumulator.len() + chunk.len() > self.max_message_bytes {
            warn!(
                "Inbound {} message exceeds {} bytes, discarding until end marker",
                self.channel, self.max_message_bytes
            );
            self.accumulator.clear();
            self.overflowed = true;
            return None;
        }

        self.accumulator.extend_from_slice(chunk);
        None
    }

    /// Number of bytes accumulated for the message in progress
    pub fn pending_len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulator.is_empty() && !self.overflowed
    }

    /// Discard any partial message
    pub fn reset(&mut self) {
        if !self.is_empty() {
            debug!(
                "Discarding {} pending bytes on the {} channel",
                self.accumulator.len(),
                self.channel
            );
        }
        self.accumulator.clear();
        self.overflowed = false;
    }
}

fn decode(bytes: Vec<u8>) -> Reassembled {
    match String::from_utf8(bytes) {
        Ok(text) => Reassembled::Message(text),
        Err(err) => {
            let len = err.as_bytes().len();
            warn!("Discarding {} byte frame that is not valid UTF-8", len);
            Reassembled::Malformed(MalformedReason::InvalidUtf8 { len })
        }
    }
}
