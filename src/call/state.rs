//! In-flight call sessions. There is no durable call record: a call exists
//! only between init and hang-up, keyed by the directed (caller, receiver)
//! pair. Making the state explicit lets illegal transitions (accept with no
//! prior init, double reject) be rejected instead of silently forwarded.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Incoming-call event delivered, awaiting accept/reject.
    Ringing,
    /// Accepted; media negotiation is the peers' business from here.
    Active,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    pub conversation_id: String,
    pub kind: CallKind,
    pub phase: CallPhase,
}

#[derive(Default)]
pub struct CallRegistry {
    sessions: DashMap<(String, String), CallSession>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ringing. A stale session for the same pair is replaced — callers
    /// can redial after an unanswered attempt.
    pub fn ring(&self, caller: &str, receiver: &str, conversation_id: &str, kind: CallKind) {
        self.sessions.insert(
            (caller.to_string(), receiver.to_string()),
            CallSession {
                conversation_id: conversation_id.to_string(),
                kind,
                phase: CallPhase::Ringing,
            },
        );
    }

    /// Ringing → Active.
    pub fn accept(&self, caller: &str, receiver: &str) -> Result<CallSession, GatewayError> {
        let key = (caller.to_string(), receiver.to_string());
        let mut entry = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| GatewayError::Protocol("no incoming call to accept".to_string()))?;
        if entry.phase != CallPhase::Ringing {
            return Err(GatewayError::Protocol("call already accepted".to_string()));
        }
        entry.phase = CallPhase::Active;
        Ok(entry.clone())
    }

    /// Ringing → gone.
    pub fn reject(&self, caller: &str, receiver: &str) -> Result<CallSession, GatewayError> {
        let key = (caller.to_string(), receiver.to_string());
        self.sessions
            .remove_if(&key, |_, session| session.phase == CallPhase::Ringing)
            .map(|(_, session)| session)
            .ok_or_else(|| GatewayError::Protocol("no incoming call to reject".to_string()))
    }

    /// Any phase → gone. Either side may hang up.
    pub fn hang_up(&self, caller: &str, receiver: &str) -> Result<CallSession, GatewayError> {
        self.sessions
            .remove(&(caller.to_string(), receiver.to_string()))
            .map(|(_, session)| session)
            .ok_or_else(|| GatewayError::Protocol("no such call".to_string()))
    }

    /// Drop every session the user is party to. Disconnect cleanup.
    pub fn drop_for_user(&self, user_id: &str) {
        self.sessions
            .retain(|(caller, receiver), _| caller != user_id && receiver != user_id);
    }

    pub fn get(&self, caller: &str, receiver: &str) -> Option<CallSession> {
        self.sessions
            .get(&(caller.to_string(), receiver.to_string()))
            .map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_accept_hangup_cycle() {
        let calls = CallRegistry::new();
        calls.ring("alice", "bob", "c1", CallKind::Video);
        assert_eq!(calls.get("alice", "bob").unwrap().phase, CallPhase::Ringing);

        let session = calls.accept("alice", "bob").unwrap();
        assert_eq!(session.phase, CallPhase::Active);

        calls.hang_up("alice", "bob").unwrap();
        assert!(calls.get("alice", "bob").is_none());
    }

    #[test]
    fn accept_without_init_rejected() {
        let calls = CallRegistry::new();
        assert!(matches!(
            calls.accept("alice", "bob"),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn double_accept_rejected() {
        let calls = CallRegistry::new();
        calls.ring("alice", "bob", "c1", CallKind::Audio);
        calls.accept("alice", "bob").unwrap();
        assert!(calls.accept("alice", "bob").is_err());
    }

    #[test]
    fn reject_only_while_ringing() {
        let calls = CallRegistry::new();
        calls.ring("alice", "bob", "c1", CallKind::Audio);
        calls.accept("alice", "bob").unwrap();
        assert!(calls.reject("alice", "bob").is_err());

        calls.ring("alice", "carol", "c2", CallKind::Audio);
        calls.reject("alice", "carol").unwrap();
        assert!(calls.get("alice", "carol").is_none());
    }

    #[test]
    fn disconnect_drops_user_sessions() {
        let calls = CallRegistry::new();
        calls.ring("alice", "bob", "c1", CallKind::Video);
        calls.ring("carol", "dave", "c2", CallKind::Video);

        calls.drop_for_user("bob");
        assert!(calls.get("alice", "bob").is_none());
        assert!(calls.get("carol", "dave").is_some());
    }
}
