use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Session state shared between the read loop and the heartbeat task.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Identity and replay cursor of the gateway session. Survives reconnects.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub sequence: Option<u64>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub resume_url: Option<String>,
    pub resumable: bool,
    pub heartbeat_interval: Option<Duration>,
    heartbeat_acked: bool,
    /// Set once the current connection has sent at least one op 11.
    peer_acks: bool,
}

/// What to send after HELLO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Identify,
    Resume {
        session_id: String,
        sequence: Option<u64>,
    },
}

impl SessionState {
    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Never moves the cursor backwards.
    pub fn record_sequence(&mut self, sequence: u64) {
        self.sequence = Some(match self.sequence {
            Some(current) => current.max(sequence),
            None => sequence,
        });
    }

    pub fn apply_hello(&mut self, interval: Duration) {
        self.heartbeat_interval = Some(interval);
        self.heartbeat_acked = true;
        self.peer_acks = false;
    }

    /// Starts a new session. The cursor restarts when the session id changes.
    pub fn apply_ready(
        &mut self,
        session_id: String,
        user_id: String,
        resume_url: Option<String>,
        sequence: Option<u64>,
    ) {
        if self.session_id.as_deref() != Some(session_id.as_str()) {
            self.sequence = None;
        }
        if let Some(sequence) = sequence {
            self.record_sequence(sequence);
        }
        self.session_id = Some(session_id);
        self.user_id = Some(user_id);
        self.resume_url = resume_url;
        self.resumable = true;
    }

    pub fn apply_resumed(&mut self) {
        self.resumable = true;
    }

    pub fn apply_reconnect(&mut self) {
        self.resumable = true;
    }

    pub fn apply_invalid_session(&mut self, resumable: bool) {
        self.resumable = resumable;
        if !resumable {
            self.session_id = None;
            self.sequence = None;
            self.resume_url = None;
        }
    }

    pub fn acknowledge_heartbeat(&mut self) {
        self.heartbeat_acked = true;
        self.peer_acks = true;
    }

    /// Arms the ack flag for the next beat. Returns `false` only when the
    /// peer has acknowledged beats on this connection before and left the
    /// previous one unanswered; a peer that never acks is never a zombie.
    pub fn take_heartbeat_ack(&mut self) -> bool {
        let acked = std::mem::replace(&mut self.heartbeat_acked, false);
        acked || !self.peer_acks
    }

    pub fn handshake(&self) -> Handshake {
        match (&self.session_id, self.resumable) {
            (Some(session_id), true) => Handshake::Resume {
                session_id: session_id.clone(),
                sequence: self.sequence,
            },
            (None, true) => {
                tracing::debug!("resumable but no session id yet, identifying instead");
                Handshake::Identify
            }
            _ => Handshake::Identify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(state: &mut SessionState) {
        state.apply_ready("abc".into(), "42".into(), None, Some(1));
    }

    #[test]
    fn test_new_session_identifies() {
        let state = SessionState::default();
        assert!(!state.resumable);
        assert!(state.heartbeat_interval.is_none());
        assert_eq!(state.handshake(), Handshake::Identify);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let mut state = SessionState::default();
        for seq in [3, 1, 7, 7, 2, 9, 4] {
            state.record_sequence(seq);
        }
        assert_eq!(state.sequence, Some(9));
    }

    #[test]
    fn test_ready_makes_session_resumable() {
        let mut state = SessionState::default();
        ready(&mut state);
        assert!(state.resumable);
        assert_eq!(state.user_id.as_deref(), Some("42"));
        assert_eq!(
            state.handshake(),
            Handshake::Resume {
                session_id: "abc".into(),
                sequence: Some(1)
            }
        );
    }

    #[test]
    fn test_ready_with_new_session_id_restarts_cursor() {
        let mut state = SessionState::default();
        ready(&mut state);
        state.record_sequence(50);
        state.apply_ready("def".into(), "42".into(), None, Some(1));
        assert_eq!(state.sequence, Some(1));
    }

    #[test]
    fn test_reconnect_keeps_resumable() {
        let mut state = SessionState::default();
        ready(&mut state);
        state.apply_reconnect();
        assert!(state.resumable);
        assert!(matches!(state.handshake(), Handshake::Resume { .. }));
    }

    #[test]
    fn test_invalid_session_not_resumable_forgets_session() {
        let mut state = SessionState::default();
        ready(&mut state);
        state.record_sequence(12);
        state.apply_invalid_session(false);
        assert!(!state.resumable);
        assert!(state.session_id.is_none());
        assert!(state.sequence.is_none());
        assert_eq!(state.handshake(), Handshake::Identify);
    }

    #[test]
    fn test_invalid_session_resumable_keeps_session() {
        let mut state = SessionState::default();
        ready(&mut state);
        state.apply_invalid_session(true);
        assert!(matches!(state.handshake(), Handshake::Resume { .. }));
    }

    #[test]
    fn test_resumable_without_session_id_falls_back_to_identify() {
        let mut state = SessionState::default();
        state.apply_reconnect();
        assert_eq!(state.handshake(), Handshake::Identify);
    }

    #[test]
    fn test_heartbeat_ack_cycle() {
        let mut state = SessionState::default();
        state.apply_hello(Duration::from_millis(41_250));
        assert_eq!(state.heartbeat_interval, Some(Duration::from_millis(41_250)));
        assert!(state.take_heartbeat_ack());
        state.acknowledge_heartbeat();
        assert!(state.take_heartbeat_ack());
        assert!(!state.take_heartbeat_ack());
    }

    #[test]
    fn test_peer_without_acks_is_never_a_zombie() {
        let mut state = SessionState::default();
        state.apply_hello(Duration::from_secs(1));
        for _ in 0..5 {
            assert!(state.take_heartbeat_ack());
        }
    }

    #[test]
    fn test_hello_forgets_acks_from_previous_connection() {
        let mut state = SessionState::default();
        state.apply_hello(Duration::from_secs(1));
        state.acknowledge_heartbeat();
        assert!(state.take_heartbeat_ack());

        state.apply_hello(Duration::from_secs(1));
        assert!(state.take_heartbeat_ack());
        assert!(state.take_heartbeat_ack());
    }
}
