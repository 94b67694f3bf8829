//! Link session
//!
//! A [`LinkSession`] is one established connection. It owns the link facade,
//! a transfer engine and a reassembly buffer per channel, and the name
//! handshake. Every input (send request, ready signal, ack, inbound chunk,
//! loss) is a plain method call that returns the events it produced, so the
//! session itself is synchronous and deterministic; [`crate::session_task`]
//! runs it on a single-writer task.

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::errors::{BeamchatResult, LinkError, SessionError, TransferError};
use crate::handshake::NameHandshake;
use crate::link::ChunkLink;
use crate::message::Message;
use crate::reassembly::{MalformedReason, ReassemblyBuffer, Reassembled};
use crate::transfer::{TransferEngine, TransferOutcome, TransferState};
use crate::types::{ChannelId, PeerId, Role};

// ----------------------------------------------------------------------------
// Session Events
// ----------------------------------------------------------------------------

/// Events surfaced to the application layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is up and the handshake has started
    Established,
    /// An outgoing chat message was fully confirmed by the link
    MessageSent(Message),
    /// A chat message was reassembled from the peer
    MessageReceived(Message),
    /// A transfer failed; the message is lost
    SendFailed { channel: ChannelId, error: LinkError },
    /// The peer's display name arrived
    PeerNamed(String),
    /// An inbound frame could not be decoded
    MalformedMessage { channel: ChannelId, reason: MalformedReason },
    /// The session was torn down; in-flight state was discarded
    Closed,
}

/// Events produced by one input; usually zero or one
pub type SessionEvents = SmallVec<[SessionEvent; 2]>;

// ----------------------------------------------------------------------------
// Channel Pipeline
// ----------------------------------------------------------------------------

/// Outbound engine and inbound buffer for one logical channel
#[derive(Debug)]
struct ChannelPipeline {
    engine: TransferEngine,
    buffer: ReassemblyBuffer,
}

impl ChannelPipeline {
    fn new(channel: ChannelId, max_message_bytes: usize) -> Self {
        Self {
            engine: TransferEngine::new(channel),
            buffer: ReassemblyBuffer::new(channel, max_message_bytes),
        }
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.buffer.reset();
    }
}

// ----------------------------------------------------------------------------
// Link Session
// ----------------------------------------------------------------------------

/// Protocol state for one connection
pub struct LinkSession<L: ChunkLink> {
    peer_id: PeerId,
    role: Role,
    link: L,
    max_message_bytes: usize,
    chat: ChannelPipeline,
    name: ChannelPipeline,
    handshake: NameHandshake,
    established: bool,
}

impl<L: ChunkLink> LinkSession<L> {
    /// Create a session in the idle, not yet established state
    pub fn new(peer_id: PeerId, role: Role, link: L, config: &ProtocolConfig) -> Self {
        Self {
            peer_id,
            role,
            link,
            max_message_bytes: config.max_message_bytes,
            chat: ChannelPipeline::new(ChannelId::Chat, config.max_message_bytes),
            name: ChannelPipeline::new(ChannelId::Name, config.max_message_bytes),
            handshake: NameHandshake::new(role, config.local_name.clone()),
            established: false,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Peer display name, once the handshake delivered it
    pub fn peer_name(&self) -> Option<&str> {
        self.handshake.peer_name()
    }

    pub fn transfer_state(&self, channel: ChannelId) -> &TransferState {
        self.pipeline(channel).engine.state()
    }

    /// Bytes accumulated for the inbound message in progress
    pub fn pending_inbound(&self, channel: ChannelId) -> usize {
        self.pipeline(channel).buffer.pending_len()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// The connection is up (subscription made or characteristics discovered)
    pub fn establish(&mut self) -> SessionEvents {
        let mut events = SessionEvents::new();
        if self.established {
            return events;
        }
        info!("Session with {} established as {}", self.peer_id, self.role);
        self.established = true;
        events.push(SessionEvent::Established);

        if let Some(name) = self.handshake.on_established() {
            self.send_name(name, &mut events);
        }
        events
    }

    /// Start sending a chat message
    ///
    /// Fails if the session is down, the message is too large, or another chat
    /// message is still in flight. Completion is reported later through
    /// [`SessionEvent::MessageSent`] or [`SessionEvent::SendFailed`].
    pub fn send_message(&mut self, text: &str) -> BeamchatResult<SessionEvents> {
        if !self.established {
            return Err(SessionError::NotEstablished {
                peer_id: self.peer_id.to_string(),
            }
            .into());
        }
        if text.len() > self.max_message_bytes {
            return Err(TransferError::MessageTooLarge {
                size: text.len(),
                max: self.max_message_bytes,
            }
            .into());
        }

        let outcome = self
            .chat
            .engine
            .begin_send(&mut self.link, text.as_bytes().to_vec())?;

        let mut events = SessionEvents::new();
        self.record_outcome(ChannelId::Chat, outcome, &mut events);
        Ok(events)
    }

    /// The link can accept data again
    pub fn on_ready(&mut self) -> SessionEvents {
        let mut events = SessionEvents::new();
        if !self.established {
            return events;
        }
        for channel in ChannelId::ALL {
            let outcome = match channel {
                ChannelId::Chat => self.chat.engine.on_ready(&mut self.link),
                ChannelId::Name => self.name.engine.on_ready(&mut self.link),
            };
            self.record_outcome(channel, outcome, &mut events);
        }
        events
    }

    /// The outstanding write on `channel` completed
    pub fn on_ack(&mut self, channel: ChannelId, result: Result<(), LinkError>) -> SessionEvents {
        let mut events = SessionEvents::new();
        if !self.established {
            return events;
        }
        let outcome = match channel {
            ChannelId::Chat => self.chat.engine.on_ack(&mut self.link, result),
            ChannelId::Name => self.name.engine.on_ack(&mut self.link, result),
        };
        self.record_outcome(channel, outcome, &mut events);
        events
    }

    /// Raw bytes arrived on `channel`
    pub fn on_chunk(&mut self, channel: ChannelId, bytes: &[u8]) -> SessionEvents {
        let mut events = SessionEvents::new();
        if !self.established {
            debug!("Dropping {} bytes from {} before establishment", bytes.len(), self.peer_id);
            return events;
        }

        let Some(frame) = self.pipeline_mut(channel).buffer.on_chunk(bytes) else {
            return events;
        };

        match (channel, frame) {
            (ChannelId::Chat, Reassembled::Message(text)) => {
                let sender = self.handshake.peer_name().map(str::to_string);
                events.push(SessionEvent::MessageReceived(Message::incoming(text, sender)));
            }
            (ChannelId::Name, Reassembled::Message(name)) => {
                events.push(SessionEvent::PeerNamed(name.clone()));
                if let Some(reply) = self.handshake.on_peer_name(name) {
                    self.send_name(reply, &mut events);
                }
            }
            (channel, Reassembled::Malformed(reason)) => {
                events.push(SessionEvent::MalformedMessage { channel, reason });
            }
        }
        events
    }

    /// The connection was lost or the peer unsubscribed
    ///
    /// Discards both directions without reporting outcomes for in-flight
    /// transfers. Calling it again is harmless and reports nothing.
    pub fn on_lost(&mut self) -> Option<SessionEvent> {
        self.chat.reset();
        self.name.reset();
        self.handshake.reset();
        if !self.established {
            return None;
        }
        info!("Session with {} lost", self.peer_id);
        self.established = false;
        Some(SessionEvent::Closed)
    }

    fn send_name(&mut self, name: String, events: &mut SessionEvents) {
        match self.name.engine.begin_send(&mut self.link, name.into_bytes()) {
            Ok(outcome) => self.record_outcome(ChannelId::Name, outcome, events),
            Err(err) => warn!("Could not send display name to {}: {}", self.peer_id, err),
        }
    }

    fn record_outcome(
        &self,
        channel: ChannelId,
        outcome: Option<TransferOutcome>,
        events: &mut SessionEvents,
    ) {
        match (channel, outcome) {
            (_, None) => {}
            (ChannelId::Chat, Some(TransferOutcome::Sent(payload))) => {
                let text = String::from_utf8(payload)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
                events.push(SessionEvent::MessageSent(Message::outgoing(text)));
            }
            (ChannelId::Name, Some(TransferOutcome::Sent(_))) => {
                debug!("Display name delivered to {}", self.peer_id);
            }
            (channel, Some(TransferOutcome::Failed(error))) => {
                events.push(SessionEvent::SendFailed { channel, error });
            }
        }
    }

    fn pipeline(&self, channel: ChannelId) -> &ChannelPipeline {
        match channel {
            ChannelId::Chat => &self.chat,
            ChannelId::Name => &self.name,
        }
    }

    fn pipeline_mut(&mut self, channel: ChannelId) -> &mut ChannelPipeline {
        match channel {
            ChannelId::Chat => &mut self.chat,
            ChannelId::Name => &mut self.name,
        }
    }
}
