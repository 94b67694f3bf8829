//! Chunk framing rules
//!
//! Chat payload is sent as raw slices of the message followed by a standalone
//! `EOM` chunk. There is no length prefix and no escaping, so the chunker has
//! to make sure a data chunk never equals the marker on its own.

use crate::types::ChannelId;

/// End-of-message marker, always sent as its own complete chunk
pub const END_OF_MESSAGE: &[u8] = b"EOM";

/// How a channel delimits messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Any number of data chunks, then the end marker
    Delimited,
    /// Exactly one chunk per message and no marker
    SingleChunk,
}

impl ChannelId {
    /// Frame mode used on this channel
    pub fn frame_mode(self) -> FrameMode {
        match self {
            ChannelId::Chat => FrameMode::Delimited,
            ChannelId::Name => FrameMode::SingleChunk,
        }
    }
}

/// Exact match against the end marker (a chunk that merely starts with it is data)
pub fn is_end_marker(chunk: &[u8]) -> bool {
    chunk == END_OF_MESSAGE
}

fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

/// Length of the next data chunk starting at `cursor`
///
/// The result is at most `max_chunk` (a zero size is treated as one byte). It
/// is shortened to end on a UTF-8 character boundary when at least one whole
/// character fits, and by one more byte if the slice would read as the end
/// marker. Returns 0 only when the payload is exhausted.
pub fn next_chunk_len(payload: &[u8], cursor: usize, max_chunk: usize) -> usize {
    let remaining = payload.len().saturating_sub(cursor);
    let mut amount = remaining.min(max_chunk.max(1));
    if amount == 0 {
        return 0;
    }

    let end = cursor + amount;
    if end < payload.len() {
        let mut aligned = amount;
        while aligned > 0 && is_utf8_continuation(payload[cursor + aligned]) {
            aligned -= 1;
        }
        if aligned > 0 {
            amount = aligned;
        }
    }

    if is_end_marker(&payload[cursor..cursor + amount]) {
        amount -= 1;
    }

    amount
}

/// Largest prefix of `bytes` no longer than `max` that ends on a character boundary
pub fn truncate_to_boundary(bytes: &[u8], max: usize) -> usize {
    if bytes.len() <= max {
        return bytes.len();
    }
    let mut len = max;
    while len > 0 && is_utf8_continuation(bytes[len]) {
        len -= 1;
    }
    len
}

/// Split a whole payload the way the transfer engine would at a fixed chunk size
pub fn split_chunks(payload: &[u8], max_chunk: usize) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut cursor = 0;
    loop {
        let amount = next_chunk_len(payload, cursor, max_chunk);
        if amount == 0 {
            break;
        }
        chunks.push(&payload[cursor..cursor + amount]);
        cursor += amount;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world_splits_into_three_chunks() {
        let chunks = split_chunks(b"HELLO WORLD", 5);
        assert_eq!(chunks, vec![&b"HELLO"[..], b" WORL", b"D"]);
    }

    #[test]
    fn test_marker_must_match_exactly() {
        assert!(is_end_marker(b"EOM"));
        assert!(!is_end_marker(b"EOMX"));
        assert!(!is_end_marker(b"EO"));
        assert!(!is_end_marker(b""));
    }

    #[test]
    fn test_data_chunk_never_equals_marker() {
        // The whole body is the marker text
        assert_eq!(split_chunks(b"EOM", 20), vec![&b"EO"[..], b"M"]);
        // Marker text landing on a chunk boundary mid-message
        for chunk in split_chunks(b"abcEOMdefEOM", 3) {
            assert!(!is_end_marker(chunk));
        }
    }

    #[test]
    fn test_chunks_end_on_character_boundaries() {
        let text = "héllo wörld ✓";
        for size in 1..8 {
            let chunks = split_chunks(text.as_bytes(), size);
            assert_eq!(chunks.concat(), text.as_bytes());
            if size >= 3 {
                for chunk in chunks {
                    assert!(std::str::from_utf8(chunk).is_ok(), "size {size}: {chunk:?}");
                }
            }
        }
    }

    #[test]
    fn test_zero_chunk_size_still_makes_progress() {
        assert_eq!(next_chunk_len(b"abc", 0, 0), 1);
        assert_eq!(next_chunk_len(b"abc", 3, 10), 0);
        assert_eq!(next_chunk_len(b"", 0, 10), 0);
    }

    #[test]
    fn test_truncation_respects_boundaries() {
        let name = "Zoë";
        assert_eq!(truncate_to_boundary(name.as_bytes(), 10), 4);
        assert_eq!(truncate_to_boundary(name.as_bytes(), 3), 2);
        assert_eq!(truncate_to_boundary(name.as_bytes(), 0), 0);
    }
}
