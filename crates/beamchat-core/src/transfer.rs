//! Outbound transfer engine
//!
//! One engine drives one channel of one session. It slices the payload into
//! link-sized chunks, streams them, sends the end marker and reports the
//! outcome exactly once. The same state machine serves both transmit
//! disciplines:
//!
//! - **push**: chunks are pushed back-to-back until the link reports busy;
//!   the next [`TransferEngine::on_ready`] resumes from the saved cursor.
//! - **acknowledged write**: every chunk waits for
//!   [`TransferEngine::on_ack`]; the ack of the last data chunk triggers the
//!   marker and the ack of the marker completes the transfer.
//!
//! There is no timer. A link that never signals ready or ack stalls the
//! transfer until the session is torn down.

use tracing::{debug, trace, warn};

use crate::errors::{LinkError, TransferError};
use crate::framing::{next_chunk_len, truncate_to_boundary, FrameMode, END_OF_MESSAGE};
use crate::link::{ChunkLink, Emission};
use crate::types::ChannelId;

// ----------------------------------------------------------------------------
// Transfer State
// ----------------------------------------------------------------------------

/// Mutable send state of one channel
///
/// Invariants: `cursor <= payload.len()` while a payload is present;
/// `end_marker_pending` implies `sending`; no payload implies the idle state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferState {
    sending: bool,
    end_marker_pending: bool,
    payload: Option<Vec<u8>>,
    cursor: usize,
}

impl TransferState {
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn is_end_marker_pending(&self) -> bool {
        self.end_marker_pending
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Offset of the first byte not yet handed to (or confirmed by) the link
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }

    /// Check the state invariants
    pub fn is_consistent(&self) -> bool {
        match &self.payload {
            Some(payload) => {
                self.cursor <= payload.len() && (!self.end_marker_pending || self.sending)
            }
            None => !self.sending && !self.end_marker_pending && self.cursor == 0,
        }
    }

    fn start(&mut self, payload: Vec<u8>) {
        self.payload = Some(payload);
        self.cursor = 0;
        self.sending = true;
        self.end_marker_pending = false;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ----------------------------------------------------------------------------
// Outcomes
// ----------------------------------------------------------------------------

/// Terminal result of a transfer, reported once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every chunk and the marker were confirmed; carries the original payload
    Sent(Vec<u8>),
    /// The link failed; the message is lost and the engine is idle again
    Failed(LinkError),
}

/// What the engine is waiting on under the acknowledged-write discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    /// A data chunk of this many bytes
    Chunk(usize),
    /// The final transmission (marker, or the only chunk of a single-chunk frame)
    Final,
}

// ----------------------------------------------------------------------------
// Transfer Engine
// ----------------------------------------------------------------------------

/// Single-flight outbound state machine for one channel
#[derive(Debug)]
pub struct TransferEngine {
    channel: ChannelId,
    mode: FrameMode,
    state: TransferState,
    awaiting: Option<Awaiting>,
}

impl TransferEngine {
    /// Create an idle engine for `channel`
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            mode: channel.frame_mode(),
            state: TransferState::default(),
            awaiting: None,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state.sending
    }

    /// Whether an acknowledgement is outstanding
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Start sending `payload`
    ///
    /// Rejected without touching the in-flight transfer if one is running, and
    /// without any effect if the channel is not established. On success the
    /// first chunks go out immediately; a link that accepts everything
    /// synchronously can complete the transfer within this call.
    pub fn begin_send<L: ChunkLink + ?Sized>(
        &mut self,
        link: &mut L,
        mut payload: Vec<u8>,
    ) -> Result<Option<TransferOutcome>, TransferError> {
        if self.state.sending {
            return Err(TransferError::SendInProgress {
                channel: self.channel,
            });
        }
        if !link.is_established(self.channel) {
            return Err(TransferError::ChannelNotEstablished {
                channel: self.channel,
            });
        }

        if self.mode == FrameMode::SingleChunk {
            let max = link.max_chunk_size(self.channel).max(1);
            let len = truncate_to_boundary(&payload, max);
            if len < payload.len() {
                debug!(
                    "Truncating {} frame from {} to {} bytes",
                    self.channel,
                    payload.len(),
                    len
                );
                payload.truncate(len);
            }
        }

        debug!("Starting {} transfer of {} bytes", self.channel, payload.len());
        self.awaiting = None;
        self.state.start(payload);
        Ok(self.pump(link))
    }

    /// The link can accept data again (push discipline)
    pub fn on_ready<L: ChunkLink + ?Sized>(&mut self, link: &mut L) -> Option<TransferOutcome> {
        if !self.state.sending || self.awaiting.is_some() {
            return None;
        }
        trace!("Ready signal resumes {} transfer at {}", self.channel, self.state.cursor);
        self.pump(link)
    }

    /// The outstanding write was acknowledged (acknowledged-write discipline)
    pub fn on_ack<L: ChunkLink + ?Sized>(
        &mut self,
        link: &mut L,
        result: Result<(), LinkError>,
    ) -> Option<TransferOutcome> {
        let Some(awaiting) = self.awaiting.take() else {
            debug!("Ignoring stale ack on the {} channel", self.channel);
            return None;
        };

        if let Err(error) = result {
            return self.fail(error);
        }

        match awaiting {
            Awaiting::Chunk(len) => {
                self.advance(len);
                self.pump(link)
            }
            Awaiting::Final => self.complete(),
        }
    }

    /// Drop any in-flight transfer without reporting an outcome
    pub fn reset(&mut self) {
        if self.state.sending {
            debug!(
                "Abandoning {} transfer at {} bytes",
                self.channel, self.state.cursor
            );
        }
        self.state.reset();
        self.awaiting = None;
    }

    /// Chunk-emission loop; runs until the link suspends the transfer or it ends
    fn pump<L: ChunkLink + ?Sized>(&mut self, link: &mut L) -> Option<TransferOutcome> {
        loop {
            let ready = self.state.sending
                && self.state.payload.is_some()
                && link.is_established(self.channel);
            if !ready {
                self.reset();
                return None;
            }

            if self.mode == FrameMode::SingleChunk {
                let frame = self.state.payload.clone().unwrap_or_default();
                self.state.end_marker_pending = true;
                return self.emit_final(link, &frame);
            }

            if self.state.end_marker_pending {
                return self.emit_final(link, END_OF_MESSAGE);
            }

            let (amount, chunk) = {
                let payload = self.state.payload.as_deref().unwrap_or_default();
                let max = link.max_chunk_size(self.channel);
                let amount = next_chunk_len(payload, self.state.cursor, max);
                (amount, payload[self.state.cursor..self.state.cursor + amount].to_vec())
            };

            if amount == 0 {
                self.state.end_marker_pending = true;
                continue;
            }

            match link.emit(self.channel, &chunk) {
                Ok(Emission::Accepted) => {
                    trace!("Pushed {} byte {} chunk", amount, self.channel);
                    self.advance(amount);
                }
                Ok(Emission::AwaitingAck) => {
                    trace!("Wrote {} byte {} chunk, awaiting ack", amount, self.channel);
                    self.awaiting = Some(Awaiting::Chunk(amount));
                    return None;
                }
                Ok(Emission::Busy) => {
                    trace!("Link busy at {} on the {} channel", self.state.cursor, self.channel);
                    return None;
                }
                Err(error) => return self.fail(error),
            }
        }
    }

    fn emit_final<L: ChunkLink + ?Sized>(
        &mut self,
        link: &mut L,
        frame: &[u8],
    ) -> Option<TransferOutcome> {
        match link.emit(self.channel, frame) {
            Ok(Emission::Accepted) => self.complete(),
            Ok(Emission::AwaitingAck) => {
                self.awaiting = Some(Awaiting::Final);
                None
            }
            Ok(Emission::Busy) => {
                trace!("Link busy before final {} frame", self.channel);
                None
            }
            Err(error) => self.fail(error),
        }
    }

    fn advance(&mut self, amount: usize) {
        let len = self.state.payload.as_ref().map_or(0, Vec::len);
        self.state.cursor = (self.state.cursor + amount).min(len);
        if self.state.cursor == len {
            self.state.end_marker_pending = true;
        }
    }

    fn complete(&mut self) -> Option<TransferOutcome> {
        let payload = self.state.payload.take().unwrap_or_default();
        debug!("Completed {} transfer of {} bytes", self.channel, payload.len());
        self.state.reset();
        self.awaiting = None;
        Some(TransferOutcome::Sent(payload))
    }

    fn fail(&mut self, error: LinkError) -> Option<TransferOutcome> {
        warn!("{} transfer failed: {}", self.channel, error);
        self.state.reset();
        self.awaiting = None;
        Some(TransferOutcome::Failed(error))
    }
}
