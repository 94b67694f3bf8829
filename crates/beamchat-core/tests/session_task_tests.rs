//! Session tasks, the registry and in-memory link pairs running on tokio

use std::time::Duration;

use beamchat_core::{
    session_channel, BeamchatError, ChannelId, LinkSession, MemoryLink, MemoryLinkSettings,
    PeerEvent, PeerEventReceiver, PeerId, ProtocolConfig, Role, SessionError, SessionEvent,
    SessionInput, SessionRegistry, SessionTask, TransferError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

mod test_utils;
use test_utils::test_peer;

const WAIT: Duration = Duration::from_secs(5);

/// Buffers session events so waits can match them in any arrival order
struct EventLog {
    events: PeerEventReceiver,
    seen: Vec<PeerEvent>,
}

impl EventLog {
    fn new(events: PeerEventReceiver) -> Self {
        Self {
            events,
            seen: Vec::new(),
        }
    }

    /// Wait for the first unclaimed event from `peer_id` that satisfies `matches`
    async fn wait_for(
        &mut self,
        peer_id: PeerId,
        matches: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        let found = |e: &PeerEvent| e.peer_id == peer_id && matches(&e.event);
        if let Some(pos) = self.seen.iter().position(|e| found(e)) {
            return self.seen.remove(pos).event;
        }
        timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.expect("event channel closed");
                if found(&event) {
                    return event.event;
                }
                self.seen.push(event);
            }
        })
        .await
        .expect("timed out waiting for event")
    }
}

struct Pair {
    peri_id: PeerId,
    cent_id: PeerId,
    peri: beamchat_core::SessionHandle,
    cent: beamchat_core::SessionHandle,
    peri_task: JoinHandle<()>,
    cent_task: JoinHandle<()>,
    peri_control: beamchat_core::MemoryLinkControl,
    events: EventLog,
}

/// Responder on a push link and initiator on an acknowledged link
///
/// Each session is keyed by its own id so events can be told apart.
fn spawn_pair(max_chunk: usize, capacity: usize) -> Pair {
    let peri_id = test_peer(1);
    let cent_id = test_peer(2);
    let (peri, peri_inbox) = session_channel(peri_id, 32);
    let (cent, cent_inbox) = session_channel(cent_id, 32);
    let (peri_link, cent_link) = MemoryLink::pair(
        MemoryLinkSettings::push(max_chunk, capacity),
        MemoryLinkSettings::acknowledged(max_chunk),
        peri.clone(),
        cent.clone(),
    );
    let peri_control = peri_link.control();

    let (sender, events) = mpsc::unbounded_channel();
    let peri_config = ProtocolConfig::testing().with_local_name("Peri");
    let cent_config = ProtocolConfig::testing().with_local_name("Cent");
    let peri_task = SessionTask::new(
        LinkSession::new(peri_id, Role::Responder, peri_link, &peri_config),
        peri_inbox,
        sender.clone(),
    )
    .spawn();
    let cent_task = SessionTask::new(
        LinkSession::new(cent_id, Role::Initiator, cent_link, &cent_config),
        cent_inbox,
        sender,
    )
    .spawn();

    Pair {
        peri_id,
        cent_id,
        peri,
        cent,
        peri_task,
        cent_task,
        peri_control,
        events: EventLog::new(events),
    }
}

#[tokio::test]
async fn test_names_exchange_then_chat_both_ways() {
    let mut pair = spawn_pair(5, 2);
    pair.cent.establish().await.unwrap();
    pair.peri.establish().await.unwrap();

    let named = pair.events.wait_for(pair.cent_id, |e| {
        matches!(e, SessionEvent::PeerNamed(_))
    })
    .await;
    assert_eq!(named, SessionEvent::PeerNamed("Peri".to_string()));
    let named = pair.events.wait_for(pair.peri_id, |e| {
        matches!(e, SessionEvent::PeerNamed(_))
    })
    .await;
    assert_eq!(named, SessionEvent::PeerNamed("Cent".to_string()));

    pair.cent.send_message("HELLO WORLD").await.unwrap();
    let received = pair.events.wait_for(pair.peri_id, |e| {
        matches!(e, SessionEvent::MessageReceived(_))
    })
    .await;
    match received {
        SessionEvent::MessageReceived(message) => {
            assert_eq!(message.text(), "HELLO WORLD");
            assert_eq!(message.sender_name(), Some("Cent"));
        }
        other => panic!("unexpected {:?}", other),
    }
    pair.events.wait_for(pair.cent_id, |e| {
        matches!(e, SessionEvent::MessageSent(m) if m.text() == "HELLO WORLD")
    })
    .await;

    let reply = "a reply long enough to fill the push buffer several times over";
    pair.peri.send_message(reply).await.unwrap();
    let received = pair.events.wait_for(pair.cent_id, |e| {
        matches!(e, SessionEvent::MessageReceived(_))
    })
    .await;
    assert!(matches!(received, SessionEvent::MessageReceived(m) if m.text() == reply));
    assert!(pair.peri_control.busy_signals() > 0);
}

#[tokio::test]
async fn test_chunk_size_change_mid_stream() {
    let mut pair = spawn_pair(8, 1);
    pair.cent.establish().await.unwrap();
    pair.peri.establish().await.unwrap();

    let text = "the quick brown fox jumps over the lazy dog";
    pair.peri.send_message(text).await.unwrap();
    pair.peri_control.set_max_chunk_size(3);

    let received = pair.events.wait_for(pair.cent_id, |e| {
        matches!(e, SessionEvent::MessageReceived(_))
    })
    .await;
    assert!(matches!(received, SessionEvent::MessageReceived(m) if m.text() == text));
}

#[tokio::test]
async fn test_send_on_severed_link_is_rejected() {
    let mut pair = spawn_pair(5, 2);
    pair.peri.establish().await.unwrap();
    pair.events.wait_for(pair.peri_id, |e| *e == SessionEvent::Established).await;

    pair.peri_control.sever();
    let result = pair.peri.send_message("lost").await;

    assert!(matches!(
        result,
        Err(BeamchatError::Transfer(TransferError::ChannelNotEstablished { .. }))
    ));
}

#[tokio::test]
async fn test_lose_stops_task_and_reports_closed() {
    let mut pair = spawn_pair(5, 2);
    pair.peri.establish().await.unwrap();

    pair.peri.lose().await.unwrap();
    pair.events.wait_for(pair.peri_id, |e| *e == SessionEvent::Closed).await;
    timeout(WAIT, pair.peri_task).await.unwrap().unwrap();

    assert!(pair.peri.is_closed());
    assert!(matches!(
        pair.peri.send_message("after close").await,
        Err(BeamchatError::Session(SessionError::SessionClosed { .. }))
    ));

    // The other side is unaffected until its own loss
    assert!(!pair.cent.is_closed());
    drop(pair.cent);
    pair.cent_task.abort();
}

#[tokio::test]
async fn test_registry_keeps_one_session_per_peer() {
    let (mut registry, events) = SessionRegistry::new(ProtocolConfig::testing()).unwrap();
    let mut events = EventLog::new(events);
    let peer = test_peer(7);
    let (remote, mut remote_inbox) = session_channel(test_peer(8), 32);

    let first = registry
        .open(peer, Role::Responder, |handle| {
            MemoryLink::new(MemoryLinkSettings::push(20, 4), handle, remote.clone())
        })
        .await
        .unwrap();
    events.wait_for(peer, |e| *e == SessionEvent::Established).await;

    match timeout(WAIT, remote_inbox.recv()).await.unwrap() {
        Some(SessionInput::Chunk { channel, bytes }) => {
            assert_eq!(channel, ChannelId::Name);
            assert_eq!(bytes, b"tester".to_vec());
        }
        other => panic!("expected the display name, got {:?}", other),
    }

    registry
        .open(peer, Role::Responder, |handle| {
            MemoryLink::new(MemoryLinkSettings::push(20, 4), handle, remote.clone())
        })
        .await
        .unwrap();
    events.wait_for(peer, |e| *e == SessionEvent::Closed).await;
    events.wait_for(peer, |e| *e == SessionEvent::Established).await;

    assert!(first.is_closed());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.peers().as_slice(), &[peer]);
    assert!(registry.require(&peer).is_ok());

    assert!(registry.close(peer).await);
    assert!(!registry.close(peer).await);
    assert!(registry.is_empty());
    assert!(matches!(
        registry.require(&peer),
        Err(BeamchatError::Session(SessionError::SessionNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_registry_prunes_stopped_sessions() {
    let (mut registry, _events) = SessionRegistry::new(ProtocolConfig::testing()).unwrap();
    let (remote, _remote_inbox) = session_channel(test_peer(9), 32);

    let handle = registry
        .open(test_peer(3), Role::Initiator, |handle| {
            MemoryLink::new(MemoryLinkSettings::acknowledged(20), handle, remote.clone())
        })
        .await
        .unwrap();
    handle.lose().await.unwrap();
    timeout(WAIT, async {
        while !handle.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(registry.get(&test_peer(3)).is_none());
    assert_eq!(registry.prune(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_rejects_invalid_config() {
    let config = ProtocolConfig::testing().with_inbox_capacity(0);
    assert!(SessionRegistry::new(config).is_err());
}

#[tokio::test]
async fn test_handle_of_stopped_session_reports_closed() {
    let (handle, inbox) = session_channel(test_peer(7), 4);
    drop(inbox);

    assert!(handle.is_closed());
    timeout(WAIT, handle.closed()).await.unwrap();

    let expected = |result: Result<(), BeamchatError>| {
        matches!(
            result,
            Err(BeamchatError::Session(SessionError::SessionClosed { peer_id }))
                if peer_id == test_peer(7).to_string()
        )
    };
    assert!(expected(handle.try_post(SessionInput::Ready)));
    assert!(expected(handle.establish().await));
    assert!(expected(handle.send_message("nobody listens").await));
}
