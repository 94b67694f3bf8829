//! Chat messages and the in-memory chat log

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Direction, Timestamp};

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// A completed chat message
///
/// Created the moment a transfer completes (send confirmed or end marker
/// received) and never mutated afterwards. The id exists for list diffing in
/// user interfaces and is not part of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    direction: Direction,
    sender_name: Option<String>,
    text: String,
    timestamp: Timestamp,
}

impl Message {
    /// A message this device finished sending
    pub fn outgoing(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction: Direction::Outgoing,
            sender_name: None,
            text: text.into(),
            timestamp: Timestamp::now(),
        }
    }

    /// A message reassembled from the peer
    pub fn incoming(text: impl Into<String>, sender_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction: Direction::Incoming,
            sender_name,
            text: text.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Peer display name, only known for incoming messages after the name exchange
    pub fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == Direction::Outgoing
    }
}

// ----------------------------------------------------------------------------
// Chat Log
// ----------------------------------------------------------------------------

/// Bounded, non-persistent history of completed messages
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    /// Append a message, evicting the oldest one when full
    pub fn push(&mut self, message: Message) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Forget everything, e.g. when the session is lost
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
