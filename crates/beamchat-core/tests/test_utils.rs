//! Test utilities for deterministic testing of the BeamChat protocol
//!
//! Provides a scriptable link that records every chunk handed to it, plus
//! helpers for replaying recorded chunks into a receiver.

#![allow(dead_code)]

use beamchat_core::framing::is_end_marker;
use beamchat_core::link::{ChunkLink, Emission};
use beamchat_core::reassembly::{ReassemblyBuffer, Reassembled};
use beamchat_core::{ChannelId, Discipline, LinkError, PeerId};
use std::collections::VecDeque;

// ----------------------------------------------------------------------------
// Scripted Link
// ----------------------------------------------------------------------------

/// Link whose answers are controlled by the test
///
/// Push links accept up to `capacity` chunks and then report busy until
/// [`ScriptedLink::drain`] is called. Acknowledged links always answer
/// `AwaitingAck`. Entries in `script` override the default answer.
#[derive(Debug)]
pub struct ScriptedLink {
    pub discipline: Discipline,
    pub max_chunk: usize,
    pub established: bool,
    pub capacity: Option<usize>,
    pub in_flight: usize,
    pub script: VecDeque<Result<Emission, LinkError>>,
    pub emitted: Vec<(ChannelId, Vec<u8>)>,
    pub busy_count: usize,
}

impl ScriptedLink {
    pub fn push(max_chunk: usize) -> Self {
        Self {
            discipline: Discipline::Push,
            max_chunk,
            established: true,
            capacity: None,
            in_flight: 0,
            script: VecDeque::new(),
            emitted: Vec::new(),
            busy_count: 0,
        }
    }

    pub fn acknowledged(max_chunk: usize) -> Self {
        Self {
            discipline: Discipline::AcknowledgedWrite,
            ..Self::push(max_chunk)
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Empty the transmit buffer, as a ready signal would report
    pub fn drain(&mut self) {
        self.in_flight = 0;
    }

    pub fn chunks(&self, channel: ChannelId) -> Vec<Vec<u8>> {
        self.emitted
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn chunk_text(&self, channel: ChannelId) -> Vec<String> {
        self.chunks(channel)
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.emitted.clear();
    }
}

impl ChunkLink for ScriptedLink {
    fn discipline(&self) -> Discipline {
        self.discipline
    }

    fn is_established(&self, _channel: ChannelId) -> bool {
        self.established
    }

    fn max_chunk_size(&self, _channel: ChannelId) -> usize {
        self.max_chunk
    }

    fn emit(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<Emission, LinkError> {
        let answer = match self.script.pop_front() {
            Some(answer) => answer,
            None => match self.discipline {
                Discipline::AcknowledgedWrite => Ok(Emission::AwaitingAck),
                Discipline::Push => match self.capacity {
                    Some(capacity) if self.in_flight >= capacity => Ok(Emission::Busy),
                    _ => Ok(Emission::Accepted),
                },
            },
        };

        match &answer {
            Ok(Emission::Busy) => self.busy_count += 1,
            Ok(_) => {
                self.in_flight += 1;
                self.emitted.push((channel, chunk.to_vec()));
            }
            Err(_) => {}
        }
        answer
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Deterministic peer identifier
pub fn test_peer(n: u8) -> PeerId {
    PeerId::new([n; 8])
}

/// Feed `chunks` into a fresh chat buffer and collect every completed frame
pub fn reassemble(chunks: &[Vec<u8>]) -> Vec<Reassembled> {
    let mut buffer = ReassemblyBuffer::new(ChannelId::Chat, 1 << 20);
    chunks
        .iter()
        .filter_map(|chunk| buffer.on_chunk(chunk))
        .collect()
}

/// Data chunks only, with end markers removed
pub fn data_chunks(chunks: &[Vec<u8>]) -> Vec<Vec<u8>> {
    chunks
        .iter()
        .filter(|c| !is_end_marker(c))
        .cloned()
        .collect()
}
