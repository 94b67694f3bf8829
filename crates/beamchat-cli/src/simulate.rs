//! In-memory chat simulation
//!
//! Wires a responder and an initiator session together with a
//! [`MemoryLink`] pair, lets them exchange names, then sends each message from
//! the side whose discipline was chosen and measures what crossed the link.

use std::time::Duration;

use beamchat_core::framing::split_chunks;
use beamchat_core::{
    session_channel, Discipline, LinkSession, MemoryLink, MemoryLinkSettings, PeerEvent,
    PeerEventReceiver, PeerId, ProtocolConfig, Role, SessionEvent, SessionTask, END_OF_MESSAGE,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{CliError, Result};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session ids as seen from each side: a session is keyed by its remote peer
const RESPONDER_SESSION: PeerId = PeerId::new([0xC0; 8]);
const INITIATOR_SESSION: PeerId = PeerId::new([0x9E; 8]);

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub discipline: Discipline,
    pub chunk_size: usize,
    pub capacity: usize,
}

/// What happened to one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub message: String,
    /// Chunks accepted by the link, end marker included
    pub chunks: usize,
    /// Busy answers from a push link while sending
    pub busy_signals: usize,
    pub delivered: String,
}

/// Expected wire layout of `message` at a fixed chunk size
pub fn chunk_preview(message: &str, chunk_size: usize) -> Vec<String> {
    split_chunks(message.as_bytes(), chunk_size)
        .into_iter()
        .chain(std::iter::once(END_OF_MESSAGE))
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Buffers events so they can be claimed in any order
struct EventLog {
    events: PeerEventReceiver,
    seen: Vec<PeerEvent>,
}

impl EventLog {
    async fn wait_for(
        &mut self,
        session: PeerId,
        what: &str,
        matches: impl Fn(&SessionEvent) -> bool,
    ) -> Result<SessionEvent> {
        let found = |e: &PeerEvent| e.peer_id == session && matches(&e.event);
        if let Some(pos) = self.seen.iter().position(|e| found(e)) {
            return Ok(self.seen.remove(pos).event);
        }
        let waited = timeout(EVENT_TIMEOUT, async {
            while let Some(event) = self.events.recv().await {
                if found(&event) {
                    return Some(event.event);
                }
                debug!("Buffering {:?} from {}", event.event, event.peer_id);
                self.seen.push(event);
            }
            None
        })
        .await;

        match waited {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(CliError::Simulation("sessions stopped".to_string())),
            Err(_) => Err(CliError::Simulation(format!("timed out waiting for {}", what))),
        }
    }
}

/// Run the simulation and report on every message
pub async fn run_simulation(
    protocol: &ProtocolConfig,
    settings: &SimulationSettings,
    messages: &[String],
) -> Result<Vec<SimulationReport>> {
    let (responder, responder_inbox) = session_channel(RESPONDER_SESSION, protocol.inbox_capacity);
    let (initiator, initiator_inbox) = session_channel(INITIATOR_SESSION, protocol.inbox_capacity);
    let (responder_link, initiator_link) = MemoryLink::pair(
        MemoryLinkSettings::push(settings.chunk_size, settings.capacity),
        MemoryLinkSettings::acknowledged(settings.chunk_size),
        responder.clone(),
        initiator.clone(),
    );
    let responder_control = responder_link.control();
    let initiator_control = initiator_link.control();

    let (sender, events) = mpsc::unbounded_channel();
    let responder_config = protocol.clone().with_local_name("Responder");
    let initiator_config = protocol.clone().with_local_name("Initiator");
    let responder_task = SessionTask::new(
        LinkSession::new(RESPONDER_SESSION, Role::Responder, responder_link, &responder_config),
        responder_inbox,
        sender.clone(),
    )
    .spawn();
    let initiator_task = SessionTask::new(
        LinkSession::new(INITIATOR_SESSION, Role::Initiator, initiator_link, &initiator_config),
        initiator_inbox,
        sender,
    )
    .spawn();
    let mut log = EventLog {
        events,
        seen: Vec::new(),
    };

    initiator.establish().await?;
    responder.establish().await?;
    for session in [INITIATOR_SESSION, RESPONDER_SESSION] {
        let named = log
            .wait_for(session, "the name exchange", |e| {
                matches!(e, SessionEvent::PeerNamed(_))
            })
            .await?;
        info!("Session {} learned {:?}", session, named);
    }

    let (source, control, source_session, sink_session) = match settings.discipline {
        Discipline::Push => (&responder, &responder_control, RESPONDER_SESSION, INITIATOR_SESSION),
        Discipline::AcknowledgedWrite => {
            (&initiator, &initiator_control, INITIATOR_SESSION, RESPONDER_SESSION)
        }
    };

    let mut reports = Vec::with_capacity(messages.len());
    for message in messages {
        let chunks_before = control.chunks_emitted();
        let busy_before = control.busy_signals();

        source.send_message(message.as_str()).await?;
        let received = log
            .wait_for(sink_session, "delivery", |e| {
                matches!(e, SessionEvent::MessageReceived(_))
            })
            .await?;
        log.wait_for(source_session, "send confirmation", |e| {
            matches!(e, SessionEvent::MessageSent(_))
        })
        .await?;

        let delivered = match received {
            SessionEvent::MessageReceived(m) => m.text().to_string(),
            _ => String::new(),
        };
        reports.push(SimulationReport {
            message: message.clone(),
            chunks: control.chunks_emitted() - chunks_before,
            busy_signals: control.busy_signals() - busy_before,
            delivered,
        });
    }

    // Sessions stop on loss; their air tasks end once the inboxes close
    responder.lose().await?;
    initiator.lose().await?;
    let _ = responder_task.await;
    let _ = initiator_task.await;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(discipline: Discipline, chunk_size: usize) -> SimulationSettings {
        SimulationSettings {
            discipline,
            chunk_size,
            capacity: 1,
        }
    }

    #[test]
    fn test_chunk_preview() {
        assert_eq!(
            chunk_preview("HELLO WORLD", 5),
            vec!["HELLO", " WORL", "D", "EOM"]
        );
        assert_eq!(chunk_preview("EOM", 5), vec!["EO", "M", "EOM"]);
    }

    #[tokio::test]
    async fn test_push_simulation_delivers() {
        let messages = vec!["HELLO WORLD".to_string(), "EOM".to_string()];
        let reports = run_simulation(
            &ProtocolConfig::testing(),
            &settings(Discipline::Push, 5),
            &messages,
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].delivered, "HELLO WORLD");
        assert_eq!(reports[0].chunks, 4);
        assert!(reports[0].busy_signals > 0);
        assert_eq!(reports[1].delivered, "EOM");
    }

    #[tokio::test]
    async fn test_acknowledged_simulation_delivers() {
        let messages = vec!["héllo wörld".to_string()];
        let reports = run_simulation(
            &ProtocolConfig::testing(),
            &settings(Discipline::AcknowledgedWrite, 4),
            &messages,
        )
        .await
        .unwrap();

        assert_eq!(reports[0].delivered, "héllo wörld");
        assert_eq!(reports[0].busy_signals, 0);
        assert_eq!(reports[0].chunks, chunk_preview("héllo wörld", 4).len());
    }
}
