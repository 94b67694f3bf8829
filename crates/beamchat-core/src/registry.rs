//! Session registry
//!
//! Keeps at most one running session per peer. Opening a session for a peer
//! that already has one tears the old one down first, so reconnects and
//! repeated discovery of the same device never pile up duplicate sessions.

use std::collections::HashMap;

use smallvec::SmallVec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ProtocolConfig;
use crate::errors::{BeamchatResult, SessionError};
use crate::link::ChunkLink;
use crate::session::LinkSession;
use crate::session_task::{
    session_channel, PeerEventReceiver, PeerEventSender, SessionHandle, SessionTask,
};
use crate::types::{PeerId, Role};

struct RegisteredSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Owns the running session tasks of this device
pub struct SessionRegistry {
    config: ProtocolConfig,
    sessions: HashMap<PeerId, RegisteredSession>,
    events: PeerEventSender,
}

impl SessionRegistry {
    /// Create a registry and the receiver for all session events
    pub fn new(config: ProtocolConfig) -> BeamchatResult<(Self, PeerEventReceiver)> {
        config.validate()?;
        let (events, receiver) = mpsc::unbounded_channel();
        Ok((
            Self {
                config,
                sessions: HashMap::new(),
                events,
            },
            receiver,
        ))
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Start a session task for `peer_id` and establish it
    ///
    /// `make_link` receives the new session's handle so the link can post
    /// ready signals, acks and inbound chunks back to it.
    pub async fn open<L, F>(
        &mut self,
        peer_id: PeerId,
        role: Role,
        make_link: F,
    ) -> BeamchatResult<SessionHandle>
    where
        L: ChunkLink + 'static,
        F: FnOnce(SessionHandle) -> L,
    {
        if self.close(peer_id).await {
            debug!("Replaced existing session for {}", peer_id);
        }

        let (handle, inbox) = session_channel(peer_id, self.config.inbox_capacity);
        let link = make_link(handle.clone());
        let session = LinkSession::new(peer_id, role, link, &self.config);
        let task = SessionTask::new(session, inbox, self.events.clone()).spawn();
        handle.establish().await?;

        info!("Opened {} session with {}", role, peer_id);
        self.sessions.insert(
            peer_id,
            RegisteredSession {
                handle: handle.clone(),
                task,
            },
        );
        Ok(handle)
    }

    /// Handle of the running session for `peer_id`
    pub fn get(&self, peer_id: &PeerId) -> Option<&SessionHandle> {
        self.sessions
            .get(peer_id)
            .map(|registered| &registered.handle)
            .filter(|handle| !handle.is_closed())
    }

    /// Like [`Self::get`], but an error when there is no live session
    pub fn require(&self, peer_id: &PeerId) -> BeamchatResult<&SessionHandle> {
        self.get(peer_id).ok_or_else(|| {
            SessionError::SessionNotFound {
                peer_id: peer_id.to_string(),
            }
            .into()
        })
    }

    /// Tear down the session for `peer_id`; returns whether one existed
    pub async fn close(&mut self, peer_id: PeerId) -> bool {
        let Some(registered) = self.sessions.remove(&peer_id) else {
            return false;
        };
        // A task that already stopped has closed its inbox; that is fine
        let _ = registered.handle.lose().await;
        let _ = registered.task.await;
        debug!("Closed session with {}", peer_id);
        true
    }

    /// Tear down every session
    pub async fn close_all(&mut self) {
        let peers: Vec<PeerId> = self.sessions.keys().copied().collect();
        for peer_id in peers {
            self.close(peer_id).await;
        }
    }

    /// Forget sessions whose tasks have already stopped
    pub fn prune(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, registered| !registered.handle.is_closed());
        before - self.sessions.len()
    }

    pub fn peers(&self) -> SmallVec<[PeerId; 8]> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
