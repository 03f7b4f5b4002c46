//! Error types for the session coordinator

use crate::envelope::{CodecError, Envelope};
use crate::session::InvalidationReason;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Everything the coordinator reports to its delegate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    /// An operation needed a session and none is owned
    #[error("No group session.")]
    NoSession,

    /// Join was attempted while no session was stored (internal logic fault)
    #[error("Attempted to join a nonexistent session.")]
    AttemptToJoinAbsentSession,

    /// Send attempted before a transport exists
    #[error("Attempted to send a message using a nonexistent transport.")]
    NoActiveTransport,

    /// The transport failed to deliver a message; the session stays alive
    #[error("Activity message send failure: {0}")]
    SendFailed(#[source] TransportError),

    /// Inbound envelope not newer than the latest accepted one
    #[error("Message past its sell-by date: {0}")]
    StaleMessage(Box<Envelope>),

    /// The external layer tore the session down
    #[error("Session invalidated: {0}")]
    Invalidated(InvalidationReason),

    #[error("Activation failed: {0}")]
    ActivationFailed(#[source] TransportError),

    /// Inbound frame could not be decoded
    #[error("Inbound message rejected: {0}")]
    Decode(#[source] CodecError),

    /// `begin_waiting_for_sessions` was called a second time
    #[error("Already waiting for sessions")]
    AlreadyWaiting,
}

impl CoordinatorError {
    /// Whether this error came from the session ending underneath us
    pub fn is_invalidation(&self) -> bool {
        matches!(self, CoordinatorError::Invalidated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ParticipantId, Payload};

    #[test]
    fn test_error_display() {
        assert_eq!(CoordinatorError::NoSession.to_string(), "No group session.");
        assert_eq!(
            CoordinatorError::NoActiveTransport.to_string(),
            "Attempted to send a message using a nonexistent transport."
        );

        let err = CoordinatorError::SendFailed(TransportError::Rejected("queue full".into()));
        assert_eq!(
            err.to_string(),
            "Activity message send failure: Transport rejected the request: queue full"
        );

        let err = CoordinatorError::Invalidated(InvalidationReason::Ended);
        assert_eq!(err.to_string(), "Session invalidated: session ended");
        assert!(err.is_invalidation());
    }

    #[test]
    fn test_stale_message_describes_envelope() {
        let envelope = Envelope::new(ParticipantId::new(), Payload::version(1, 2, 3));
        let err = CoordinatorError::StaleMessage(Box::new(envelope.clone()));

        assert!(err.to_string().starts_with("Message past its sell-by date: "));
        assert!(err.to_string().contains(&envelope.id().to_string()));
    }

    #[test]
    fn test_send_failure_exposes_source() {
        use std::error::Error as _;

        let err = CoordinatorError::SendFailed(TransportError::Closed);
        assert_eq!(err.source().unwrap().to_string(), "Transport channel closed");
    }
}
