//! Transfer engine behaviour under both transmit disciplines

use beamchat_core::link::Emission;
use beamchat_core::reassembly::Reassembled;
use beamchat_core::{ChannelId, LinkError, TransferEngine, TransferError, TransferOutcome};

mod test_utils;
use test_utils::{data_chunks, reassemble, ScriptedLink};

fn hello_world() -> Vec<u8> {
    b"HELLO WORLD".to_vec()
}

#[test]
fn test_hello_world_chunk_sequence() {
    let mut link = ScriptedLink::push(5);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    let outcome = engine.begin_send(&mut link, hello_world()).unwrap();

    assert_eq!(outcome, Some(TransferOutcome::Sent(hello_world())));
    assert_eq!(
        link.chunk_text(ChannelId::Chat),
        vec!["HELLO", " WORL", "D", "EOM"]
    );
    assert_eq!(
        reassemble(&link.chunks(ChannelId::Chat)),
        vec![Reassembled::Message("HELLO WORLD".to_string())]
    );
}

#[test]
fn test_busy_link_resumes_from_cursor() {
    let mut link = ScriptedLink::push(5).with_capacity(1);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    assert_eq!(engine.begin_send(&mut link, hello_world()).unwrap(), None);
    assert_eq!(engine.state().cursor(), 5);
    assert_eq!(link.busy_count, 1);
    assert_eq!(link.chunk_text(ChannelId::Chat), vec!["HELLO"]);

    let mut outcome = None;
    while outcome.is_none() {
        link.drain();
        outcome = engine.on_ready(&mut link);
    }

    assert_eq!(outcome, Some(TransferOutcome::Sent(hello_world())));
    assert_eq!(
        link.chunk_text(ChannelId::Chat),
        vec!["HELLO", " WORL", "D", "EOM"]
    );
}

#[test]
fn test_ready_without_busy_does_not_duplicate() {
    let mut link = ScriptedLink::push(4);
    link.script.extend([Ok(Emission::Accepted), Ok(Emission::Busy)]);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, b"abcdefgh".to_vec()).unwrap();
    let outcome = engine.on_ready(&mut link);
    // A second ready after completion has nothing left to do
    assert_eq!(engine.on_ready(&mut link), None);

    assert_eq!(outcome, Some(TransferOutcome::Sent(b"abcdefgh".to_vec())));
    assert_eq!(link.chunk_text(ChannelId::Chat), vec!["abcd", "efgh", "EOM"]);
}

#[test]
fn test_acknowledged_cursor_moves_only_on_ack() {
    let mut link = ScriptedLink::acknowledged(5);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, hello_world()).unwrap();
    assert_eq!(engine.state().cursor(), 0);
    assert_eq!(link.emitted.len(), 1);

    // Nothing moves without an ack
    assert_eq!(engine.on_ready(&mut link), None);
    assert_eq!(link.emitted.len(), 1);

    engine.on_ack(&mut link, Ok(()));
    assert_eq!(engine.state().cursor(), 5);
    assert_eq!(link.emitted.len(), 2);
}

#[test]
fn test_chunk_size_change_between_acks() {
    let mut link = ScriptedLink::acknowledged(5);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, hello_world()).unwrap();
    link.max_chunk = 3;
    let mut outcome = None;
    while outcome.is_none() {
        outcome = engine.on_ack(&mut link, Ok(()));
    }

    assert_eq!(outcome, Some(TransferOutcome::Sent(hello_world())));
    assert_eq!(
        link.chunk_text(ChannelId::Chat),
        vec!["HELLO", " WO", "RLD", "EOM"]
    );
}

#[test]
fn test_single_flight_per_channel() {
    let mut link = ScriptedLink::acknowledged(4);
    let mut chat = TransferEngine::new(ChannelId::Chat);
    let mut name = TransferEngine::new(ChannelId::Name);

    chat.begin_send(&mut link, b"first".to_vec()).unwrap();
    let before = chat.state().clone();

    assert_eq!(
        chat.begin_send(&mut link, b"second".to_vec()),
        Err(TransferError::SendInProgress {
            channel: ChannelId::Chat
        })
    );
    assert_eq!(chat.state(), &before);

    // The other channel is independent
    assert!(name.begin_send(&mut link, b"Ann".to_vec()).is_ok());
}

#[test]
fn test_unestablished_channel_is_rejected() {
    let mut link = ScriptedLink::push(5);
    link.established = false;
    let mut engine = TransferEngine::new(ChannelId::Chat);

    assert_eq!(
        engine.begin_send(&mut link, hello_world()),
        Err(TransferError::ChannelNotEstablished {
            channel: ChannelId::Chat
        })
    );
    assert!(engine.state().is_idle());
    assert!(link.emitted.is_empty());
}

#[test]
fn test_marker_body_survives_round_trip() {
    for max_chunk in [3, 4, 5, 64] {
        let mut link = ScriptedLink::push(max_chunk);
        let mut engine = TransferEngine::new(ChannelId::Chat);

        engine.begin_send(&mut link, b"EOM".to_vec()).unwrap();

        let chunks = link.chunks(ChannelId::Chat);
        let data = data_chunks(&chunks);
        assert_eq!(data.concat(), b"EOM".to_vec());
        assert_eq!(chunks.last().map(Vec::as_slice), Some(&b"EOM"[..]));
        assert_eq!(
            reassemble(&chunks),
            vec![Reassembled::Message("EOM".to_string())]
        );
    }
}

#[test]
fn test_repeated_marker_text_survives_round_trip() {
    let mut link = ScriptedLink::push(3);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, b"EOMEOM".to_vec()).unwrap();

    assert_eq!(
        reassemble(&link.chunks(ChannelId::Chat)),
        vec![Reassembled::Message("EOMEOM".to_string())]
    );
}

#[test]
fn test_emit_error_fails_transfer() {
    let mut link = ScriptedLink::push(5);
    link.script.extend([
        Ok(Emission::Accepted),
        Err(LinkError::NotifyFailed {
            reason: "queue closed".into(),
        }),
    ]);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    let outcome = engine.begin_send(&mut link, hello_world()).unwrap();

    assert!(matches!(
        outcome,
        Some(TransferOutcome::Failed(LinkError::NotifyFailed { .. }))
    ));
    assert!(engine.state().is_idle());
    assert!(engine.begin_send(&mut link, b"again".to_vec()).is_ok());
}

#[test]
fn test_reset_is_idempotent() {
    let mut link = ScriptedLink::acknowledged(5);
    let mut engine = TransferEngine::new(ChannelId::Chat);
    engine.begin_send(&mut link, hello_world()).unwrap();

    engine.reset();
    let once = engine.state().clone();
    engine.reset();

    assert!(once.is_idle());
    assert_eq!(engine.state(), &once);
    assert!(!engine.is_awaiting_ack());
    // A late ack for the abandoned chunk is ignored
    assert_eq!(engine.on_ack(&mut link, Ok(())), None);
}

#[test]
fn test_multibyte_text_is_split_on_character_boundaries() {
    let text = "héllo wörld ✓";
    let mut link = ScriptedLink::push(4);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, text.as_bytes().to_vec()).unwrap();

    let chunks = link.chunks(ChannelId::Chat);
    for chunk in data_chunks(&chunks) {
        assert!(chunk.len() <= 4);
        assert!(std::str::from_utf8(&chunk).is_ok());
    }
    assert_eq!(reassemble(&chunks), vec![Reassembled::Message(text.to_string())]);
}

#[test]
fn test_state_stays_consistent_through_transfer() {
    let mut link = ScriptedLink::acknowledged(2);
    let mut engine = TransferEngine::new(ChannelId::Chat);

    engine.begin_send(&mut link, b"consistency".to_vec()).unwrap();
    loop {
        assert!(engine.state().is_consistent());
        if engine.on_ack(&mut link, Ok(())).is_some() {
            break;
        }
    }
    assert!(engine.state().is_consistent());
    assert!(engine.state().is_idle());
}
