//! Session task
//!
//! Runs one [`LinkSession`] on its own tokio task so all mutation of a
//! session's transfer and reassembly state happens on a single serialized
//! context. Platform callbacks (ready signals, write acknowledgements,
//! notifications, disconnects) are posted to the task's inbox through a
//! cloneable [`SessionHandle`]; events leave through an unbounded channel.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BeamchatError, BeamchatResult, LinkError, SessionError};
use crate::link::ChunkLink;
use crate::session::{LinkSession, SessionEvent};
use crate::types::{ChannelId, PeerId};

// ----------------------------------------------------------------------------
// Channel Types
// ----------------------------------------------------------------------------

/// Inputs accepted by a session task
#[derive(Debug)]
pub enum SessionInput {
    /// Connection is up
    Establish,
    /// Start sending a chat message; the reply reports acceptance, not delivery
    Send {
        text: String,
        reply: oneshot::Sender<BeamchatResult<()>>,
    },
    /// Push link can accept data again
    Ready,
    /// Write on `channel` finished
    Ack {
        channel: ChannelId,
        result: Result<(), LinkError>,
    },
    /// Bytes arrived on `channel`
    Chunk { channel: ChannelId, bytes: Vec<u8> },
    /// Connection lost or unsubscribed; ends the task
    Lost,
}

/// An event tagged with the peer whose session produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEvent {
    pub peer_id: PeerId,
    pub event: SessionEvent,
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;
pub type PeerEventReceiver = mpsc::UnboundedReceiver<PeerEvent>;

/// Receiving end of a session inbox
pub struct SessionInbox {
    receiver: mpsc::Receiver<SessionInput>,
}

impl SessionInbox {
    /// Next input, or `None` once every handle is dropped
    pub async fn recv(&mut self) -> Option<SessionInput> {
        self.receiver.recv().await
    }
}

/// Create a session inbox and the handle that feeds it
pub fn session_channel(peer_id: PeerId, capacity: usize) -> (SessionHandle, SessionInbox) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (SessionHandle { peer_id, sender }, SessionInbox { receiver })
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// Cloneable address of a running session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    peer_id: PeerId,
    sender: mpsc::Sender<SessionInput>,
}

impl SessionHandle {
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Whether the task has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the task has stopped
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    /// Ask the session to send a chat message
    pub async fn send_message(&self, text: impl Into<String>) -> BeamchatResult<()> {
        let (reply, response) = oneshot::channel();
        self.post(SessionInput::Send {
            text: text.into(),
            reply,
        })
        .await?;
        response.await.map_err(|_| self.closed_error())?
    }

    pub async fn establish(&self) -> BeamchatResult<()> {
        self.post(SessionInput::Establish).await
    }

    pub async fn ready(&self) -> BeamchatResult<()> {
        self.post(SessionInput::Ready).await
    }

    pub async fn ack(&self, channel: ChannelId, result: Result<(), LinkError>) -> BeamchatResult<()> {
        self.post(SessionInput::Ack { channel, result }).await
    }

    pub async fn deliver(&self, channel: ChannelId, bytes: Vec<u8>) -> BeamchatResult<()> {
        self.post(SessionInput::Chunk { channel, bytes }).await
    }

    pub async fn lose(&self) -> BeamchatResult<()> {
        self.post(SessionInput::Lost).await
    }

    /// Post without waiting, for callbacks that cannot await
    pub fn try_post(&self, input: SessionInput) -> BeamchatResult<()> {
        self.sender.try_send(input).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => BeamchatError::Link(LinkError::Unavailable {
                reason: format!("inbox of session {} is full", self.peer_id),
            }),
            mpsc::error::TrySendError::Closed(_) => self.closed_error(),
        })
    }

    async fn post(&self, input: SessionInput) -> BeamchatResult<()> {
        self.sender.send(input).await.map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> BeamchatError {
        SessionError::SessionClosed {
            peer_id: self.peer_id.to_string(),
        }
        .into()
    }
}

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// Single-writer event loop around one session
pub struct SessionTask<L: ChunkLink> {
    session: LinkSession<L>,
    inbox: SessionInbox,
    events: PeerEventSender,
}

impl<L: ChunkLink + 'static> SessionTask<L> {
    pub fn new(session: LinkSession<L>, inbox: SessionInbox, events: PeerEventSender) -> Self {
        Self {
            session,
            inbox,
            events,
        }
    }

    /// Run the task on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process inputs until the session is lost or every handle is dropped
    pub async fn run(mut self) {
        let peer_id = self.session.peer_id();
        debug!("Session task for {} starting", peer_id);

        while let Some(input) = self.inbox.recv().await {
            if !self.handle_input(input) {
                break;
            }
        }

        if let Some(event) = self.session.on_lost() {
            self.publish(event);
        }
        info!("Session task for {} stopped", peer_id);
    }

    /// Apply one input; returns false once the session is finished
    fn handle_input(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Establish => {
                let events = self.session.establish();
                self.publish_all(events);
            }
            SessionInput::Send { text, reply } => {
                let result = self.session.send_message(&text).map(|events| self.publish_all(events));
                if let Err(err) = &result {
                    warn!("Rejected send to {}: {}", self.session.peer_id(), err);
                }
                let _ = reply.send(result);
            }
            SessionInput::Ready => {
                let events = self.session.on_ready();
                self.publish_all(events);
            }
            SessionInput::Ack { channel, result } => {
                let events = self.session.on_ack(channel, result);
                self.publish_all(events);
            }
            SessionInput::Chunk { channel, bytes } => {
                let events = self.session.on_chunk(channel, &bytes);
                self.publish_all(events);
            }
            SessionInput::Lost => return false,
        }
        true
    }

    fn publish_all(&self, events: impl IntoIterator<Item = SessionEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    fn publish(&self, event: SessionEvent) {
        let peer_id = self.session.peer_id();
        if self.events.send(PeerEvent { peer_id, event }).is_err() {
            debug!("No listener for events from {}", peer_id);
        }
    }
}
