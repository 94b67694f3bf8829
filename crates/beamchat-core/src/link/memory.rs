//! In-memory link pair
//!
//! Connects two session tasks inside one process. Each direction has an "air"
//! task that carries chunks to the remote session in order. Push links hold at
//! most `capacity` undelivered chunks and fire a ready signal once one drains;
//! acknowledged links ack every chunk after it is delivered. The maximum chunk
//! size can be changed at any time to mimic MTU renegotiation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{ChunkLink, Emission};
use crate::errors::LinkError;
use crate::session_task::SessionHandle;
use crate::types::{ChannelId, Discipline, PeerId};

// ----------------------------------------------------------------------------
// Settings and Control
// ----------------------------------------------------------------------------

/// Behaviour of one side of an in-memory link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLinkSettings {
    pub discipline: Discipline,
    pub max_chunk_size: usize,
    /// Undelivered chunks a push link holds before reporting busy
    pub capacity: usize,
}

impl MemoryLinkSettings {
    pub fn push(max_chunk_size: usize, capacity: usize) -> Self {
        Self {
            discipline: Discipline::Push,
            max_chunk_size,
            capacity: capacity.max(1),
        }
    }

    pub fn acknowledged(max_chunk_size: usize) -> Self {
        Self {
            discipline: Discipline::AcknowledgedWrite,
            max_chunk_size,
            capacity: 1,
        }
    }
}

/// Shared knobs and counters of a running link
#[derive(Debug, Clone)]
pub struct MemoryLinkControl {
    max_chunk_size: Arc<AtomicUsize>,
    established: Arc<AtomicBool>,
    chunks_emitted: Arc<AtomicUsize>,
    busy_signals: Arc<AtomicUsize>,
}

impl MemoryLinkControl {
    fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: Arc::new(AtomicUsize::new(max_chunk_size)),
            established: Arc::new(AtomicBool::new(true)),
            chunks_emitted: Arc::new(AtomicUsize::new(0)),
            busy_signals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Renegotiate the maximum chunk size
    pub fn set_max_chunk_size(&self, size: usize) {
        self.max_chunk_size.store(size, Ordering::SeqCst);
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size.load(Ordering::SeqCst)
    }

    /// Drop the connection; later emissions fail
    pub fn sever(&self) {
        self.established.store(false, Ordering::SeqCst);
    }

    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::SeqCst)
    }

    /// Chunks handed to the air so far
    pub fn chunks_emitted(&self) -> usize {
        self.chunks_emitted.load(Ordering::SeqCst)
    }

    /// Times the link answered busy
    pub fn busy_signals(&self) -> usize {
        self.busy_signals.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Memory Link
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct AirFrame {
    channel: ChannelId,
    bytes: Vec<u8>,
}

/// One direction of an in-process connection
pub struct MemoryLink {
    settings: MemoryLinkSettings,
    control: MemoryLinkControl,
    in_flight: Arc<AtomicUsize>,
    wants_ready: Arc<AtomicBool>,
    air: mpsc::UnboundedSender<AirFrame>,
    remote_peer: PeerId,
}

impl MemoryLink {
    /// Create a link that carries chunks from `local` to `remote`
    ///
    /// Spawns the air task, so it must be called inside a tokio runtime.
    pub fn new(settings: MemoryLinkSettings, local: SessionHandle, remote: SessionHandle) -> Self {
        let control = MemoryLinkControl::new(settings.max_chunk_size);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let wants_ready = Arc::new(AtomicBool::new(false));
        let (air, frames) = mpsc::unbounded_channel();
        let remote_peer = remote.peer_id();

        tokio::spawn(run_air(
            frames,
            settings.discipline,
            local,
            remote,
            in_flight.clone(),
            wants_ready.clone(),
        ));

        Self {
            settings,
            control,
            in_flight,
            wants_ready,
            air,
            remote_peer,
        }
    }

    /// Create both directions between two sessions
    pub fn pair(
        a: MemoryLinkSettings,
        b: MemoryLinkSettings,
        a_handle: SessionHandle,
        b_handle: SessionHandle,
    ) -> (Self, Self) {
        let a_link = Self::new(a, a_handle.clone(), b_handle.clone());
        let b_link = Self::new(b, b_handle, a_handle);
        (a_link, b_link)
    }

    pub fn control(&self) -> MemoryLinkControl {
        self.control.clone()
    }

    /// Queue a chunk for the air task; fails once the remote side is gone
    fn send_to_air(&self, channel: ChannelId, chunk: &[u8]) -> Result<(), LinkError> {
        let frame = AirFrame {
            channel,
            bytes: chunk.to_vec(),
        };
        if self.air.send(frame).is_err() {
            let reason = format!("peer {} no longer receives", self.remote_peer);
            return Err(match self.settings.discipline {
                Discipline::Push => LinkError::NotifyFailed { reason },
                Discipline::AcknowledgedWrite => LinkError::WriteFailed { reason },
            });
        }
        self.control.chunks_emitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ChunkLink for MemoryLink {
    fn discipline(&self) -> Discipline {
        self.settings.discipline
    }

    fn is_established(&self, _channel: ChannelId) -> bool {
        self.control.is_established()
    }

    fn max_chunk_size(&self, _channel: ChannelId) -> usize {
        self.control.max_chunk_size()
    }

    fn emit(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<Emission, LinkError> {
        if !self.control.is_established() {
            return Err(LinkError::Disconnected);
        }

        match self.settings.discipline {
            Discipline::Push => {
                // Flag first so a concurrent drain cannot miss the waiter
                self.wants_ready.store(true, Ordering::SeqCst);
                if self.in_flight.load(Ordering::SeqCst) >= self.settings.capacity {
                    self.control.busy_signals.fetch_add(1, Ordering::SeqCst);
                    return Ok(Emission::Busy);
                }
                self.wants_ready.store(false, Ordering::SeqCst);
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                if let Err(err) = self.send_to_air(channel, chunk) {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(err);
                }
                Ok(Emission::Accepted)
            }
            Discipline::AcknowledgedWrite => {
                self.send_to_air(channel, chunk)?;
                Ok(Emission::AwaitingAck)
            }
        }
    }
}

async fn run_air(
    mut frames: mpsc::UnboundedReceiver<AirFrame>,
    discipline: Discipline,
    local: SessionHandle,
    remote: SessionHandle,
    in_flight: Arc<AtomicUsize>,
    wants_ready: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.recv().await {
        tokio::task::yield_now().await;
        let len = frame.bytes.len();
        let delivered = remote.deliver(frame.channel, frame.bytes).await;
        trace!("Air delivered {} bytes on {} to {}", len, frame.channel, remote.peer_id());

        let posted = match discipline {
            Discipline::Push => {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if wants_ready.swap(false, Ordering::SeqCst) {
                    local.ready().await
                } else {
                    Ok(())
                }
            }
            Discipline::AcknowledgedWrite => {
                let result = delivered
                    .as_ref()
                    .map(|_| ())
                    .map_err(|_| LinkError::Disconnected);
                local.ack(frame.channel, result).await
            }
        };

        if posted.is_err() || delivered.is_err() {
            break;
        }
    }
    debug!("Air task from {} to {} ended", local.peer_id(), remote.peer_id());
}
