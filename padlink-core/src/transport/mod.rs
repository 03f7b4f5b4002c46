//! Session transport
//!
//! Defines the interface for exchanging frames with the other participants of
//! a group session. The external session layer supplies a [`Messenger`] per
//! session; the coordinator wraps it in a typed [`TransportHandle`].

use crate::envelope::ParticipantId;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod handle;

pub use handle::{EnvelopeStream, TransportHandle};

/// Errors raised by the external transport layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport channel closed")]
    Closed,

    #[error("Local participant has not joined the session")]
    NotJoined,

    #[error("Transport rejected the request: {0}")]
    Rejected(String),

    #[error("Transport request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Delivery guarantee requested from the messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Reliable,
    Unreliable,
}

/// One raw message on the session channel
///
/// The `message_type` tag lets several message kinds share a channel; a
/// receiver only decodes frames of the type it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub message_type: String,
    pub sender: ParticipantId,
    pub bytes: Vec<u8>,
}

impl WireFrame {
    pub fn new(message_type: impl Into<String>, sender: ParticipantId, bytes: Vec<u8>) -> Self {
        Self {
            message_type: message_type.into(),
            sender,
            bytes,
        }
    }
}

/// Raw point-to-point/broadcast channel of one session
///
/// In production this wraps the call framework's messenger.
/// In tests, [`crate::loopback`] provides an in-memory implementation.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver a frame to the other participants
    async fn send(&self, frame: WireFrame) -> Result<(), TransportError>;

    /// Subscribe to frames sent by the other participants
    ///
    /// Each call returns an independent stream that only ends when the
    /// underlying channel goes away.
    fn frames(&self) -> BoxStream<'static, WireFrame>;
}
