//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state (TCP established, nothing read)
    Initial,

    /// Waiting for the server's HandshakeV10 packet
    AwaitingHandshake,

    /// TLS negotiation in progress (SSLRequest sent)
    NegotiatingTls,

    /// Handshake response sent, auth exchange in progress
    Authenticating,

    /// Idle (ready for a command)
    Idle,

    /// Command sent
    QueryInProgress,

    /// Reading command results
    ReadingResults,

    /// Closed
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Initial, AwaitingHandshake)
                | (AwaitingHandshake, NegotiatingTls)
                | (AwaitingHandshake, Authenticating)
                | (NegotiatingTls, Authenticating)
                | (Authenticating, Idle)
                | (Idle, QueryInProgress)
                | (QueryInProgress, ReadingResults)
                | (ReadingResults, Idle)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::AwaitingHandshake => write!(f, "awaiting_handshake"),
            Self::NegotiatingTls => write!(f, "negotiating_tls"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Idle => write!(f, "idle"),
            Self::QueryInProgress => write!(f, "query_in_progress"),
            Self::ReadingResults => write!(f, "reading_results"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Initial;
        assert!(state.transition(ConnectionState::AwaitingHandshake).is_ok());
        assert!(state.transition(ConnectionState::Authenticating).is_ok());
        assert!(state.transition(ConnectionState::Idle).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::Initial;
        assert!(state.transition(ConnectionState::Idle).is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        let mut state = ConnectionState::QueryInProgress;
        assert!(state.transition(ConnectionState::Closed).is_ok());
    }

    #[test]
    fn test_tls_negotiation_transitions() {
        let mut state = ConnectionState::AwaitingHandshake;
        assert!(state.transition(ConnectionState::NegotiatingTls).is_ok());
        assert!(state.transition(ConnectionState::Authenticating).is_ok());
    }

    #[test]
    fn test_handshake_can_skip_tls_negotiation() {
        // With ssl-mode=disabled the response goes out over plain TCP
        let mut state = ConnectionState::AwaitingHandshake;
        assert!(state.transition(ConnectionState::Authenticating).is_ok());
    }

    #[test]
    fn test_invalid_tls_transition() {
        let mut state = ConnectionState::Idle;
        assert!(state.transition(ConnectionState::NegotiatingTls).is_err());
    }

    #[test]
    fn test_query_cycle_returns_to_idle() {
        let mut state = ConnectionState::Idle;
        assert!(state.transition(ConnectionState::QueryInProgress).is_ok());
        assert!(state.transition(ConnectionState::ReadingResults).is_ok());
        assert!(state.transition(ConnectionState::Idle).is_ok());
    }
}
