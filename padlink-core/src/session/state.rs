use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session stopped being usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// A participant ended the session for everyone
    Ended,
    /// The local participant left the session
    Left,
    /// The session layer failed underneath us
    Failed(String),
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Ended => write!(f, "session ended"),
            InvalidationReason::Left => write!(f, "left session"),
            InvalidationReason::Failed(cause) => write!(f, "{}", cause),
        }
    }
}

/// Session state as reported by the external session layer
///
/// Only the external layer moves a session between states; the coordinator
/// mirrors them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Waiting,
    Joined,
    Invalidated(InvalidationReason),
}

impl SessionState {
    pub fn is_joined(&self) -> bool {
        matches!(self, SessionState::Joined)
    }

    pub fn is_invalidated(&self) -> bool {
        matches!(self, SessionState::Invalidated(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Waiting => write!(f, "waiting"),
            SessionState::Joined => write!(f, "joined"),
            SessionState::Invalidated(reason) => write!(f, "invalidated: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_descriptions() {
        assert_eq!(SessionState::Waiting.to_string(), "waiting");
        assert_eq!(SessionState::Joined.to_string(), "joined");
        assert_eq!(
            SessionState::Invalidated(InvalidationReason::Ended).to_string(),
            "invalidated: session ended"
        );
        assert_eq!(
            SessionState::Invalidated(InvalidationReason::Failed("call dropped".into())).to_string(),
            "invalidated: call dropped"
        );
    }

    #[test]
    fn test_default_state_is_waiting() {
        let state = SessionState::default();
        assert!(!state.is_joined());
        assert!(!state.is_invalidated());
    }
}
