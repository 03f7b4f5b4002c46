use super::{Messenger, TransportError, WireFrame};
use crate::envelope::{self, CodecError, Envelope};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::trace;

/// Inbound envelopes; decode failures are yielded rather than dropped
pub type EnvelopeStream = BoxStream<'static, Result<Envelope, CodecError>>;

/// The coordinator's typed send/receive view over a session messenger
///
/// A handle belongs to exactly one configured session and is discarded on
/// teardown.
#[derive(Clone)]
pub struct TransportHandle {
    messenger: Arc<dyn Messenger>,
}

impl TransportHandle {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Encode and send an envelope
    pub async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let bytes = envelope::encode(envelope)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        let frame = WireFrame::new(Envelope::WIRE_TYPE, envelope.participant_id(), bytes);

        self.messenger.send(frame).await
    }

    /// Stream of inbound envelopes
    ///
    /// Frames tagged with another message type are skipped here and never
    /// reach the caller.
    pub fn receive(&self) -> EnvelopeStream {
        self.messenger
            .frames()
            .filter_map(|frame| async move {
                if frame.message_type != Envelope::WIRE_TYPE {
                    trace!(message_type = %frame.message_type, "Ignoring frame of foreign type");
                    return None;
                }
                Some(envelope::decode(&frame.bytes))
            })
            .boxed()
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle").finish_non_exhaustive()
    }
}
