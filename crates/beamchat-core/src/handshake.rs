//! Display-name exchange
//!
//! Before chatting, each side learns the other's display name over the name
//! channel. The responder speaks first as soon as the session is established;
//! the initiator answers with its own name once it has heard the responder's.
//! Each side sends its name at most once per session.

use tracing::debug;

use crate::types::Role;

#[derive(Debug, Clone)]
pub struct NameHandshake {
    role: Role,
    local_name: String,
    peer_name: Option<String>,
    local_sent: bool,
}

impl NameHandshake {
    pub fn new(role: Role, local_name: impl Into<String>) -> Self {
        Self {
            role,
            local_name: local_name.into(),
            peer_name: None,
            local_sent: false,
        }
    }

    /// The session came up; returns the name to send if this side speaks first
    pub fn on_established(&mut self) -> Option<String> {
        match self.role {
            Role::Responder => self.take_turn(),
            Role::Initiator => None,
        }
    }

    /// The peer's name arrived; returns our reply if one is still owed
    pub fn on_peer_name(&mut self, name: String) -> Option<String> {
        debug!("Peer introduced itself as {:?}", name);
        self.peer_name = Some(name);
        self.take_turn()
    }

    fn take_turn(&mut self) -> Option<String> {
        if self.local_sent {
            return None;
        }
        self.local_sent = true;
        Some(self.local_name.clone())
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    /// Both names have been exchanged
    pub fn is_complete(&self) -> bool {
        self.local_sent && self.peer_name.is_some()
    }

    pub fn reset(&mut self) {
        self.peer_name = None;
        self.local_sent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responder_speaks_first() {
        let mut responder = NameHandshake::new(Role::Responder, "Peri");
        assert_eq!(responder.on_established(), Some("Peri".to_string()));
        assert_eq!(responder.on_peer_name("Cent".into()), None);
        assert!(responder.is_complete());
        assert_eq!(responder.peer_name(), Some("Cent"));
    }

    #[test]
    fn test_initiator_replies_once() {
        let mut initiator = NameHandshake::new(Role::Initiator, "Cent");
        assert_eq!(initiator.on_established(), None);
        assert_eq!(initiator.on_peer_name("Peri".into()), Some("Cent".to_string()));
        assert_eq!(initiator.on_peer_name("Peri2".into()), None);
        assert_eq!(initiator.peer_name(), Some("Peri2"));
    }

    #[test]
    fn test_reset_allows_a_fresh_exchange() {
        let mut initiator = NameHandshake::new(Role::Initiator, "Cent");
        initiator.on_peer_name("Peri".into());
        initiator.reset();
        assert!(!initiator.is_complete());
        assert_eq!(initiator.on_peer_name("Peri".into()), Some("Cent".to_string()));
    }
}
