use super::session::SessionCore;
use super::{lock, CallInner};
use crate::envelope::ParticipantId;
use crate::session::{ActivityDescriptor, GroupSession, SessionProvider, SessionStream};
use crate::transport::TransportError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

/// One participant's device in a [`LoopbackCall`](super::LoopbackCall)
pub struct LoopbackDevice {
    call: Arc<CallInner>,
    participant: ParticipantId,
    offers: Mutex<Option<mpsc::UnboundedReceiver<Arc<SessionCore>>>>,
}

impl LoopbackDevice {
    pub(crate) fn new(
        call: Arc<CallInner>,
        participant: ParticipantId,
        offers: mpsc::UnboundedReceiver<Arc<SessionCore>>,
    ) -> Self {
        Self {
            call,
            participant,
            offers: Mutex::new(Some(offers)),
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }
}

#[async_trait]
impl SessionProvider for LoopbackDevice {
    async fn activate(&self, activity: &ActivityDescriptor) -> Result<bool, TransportError> {
        self.call.activate(activity).await
    }

    /// Offered sessions for `activity`
    ///
    /// The offer queue can be consumed once; later calls get a stream that
    /// never yields.
    fn sessions(&self, activity: &ActivityDescriptor) -> SessionStream {
        let Some(offers) = lock(&self.offers).take() else {
            warn!(participant = %self.participant, "Session offers already taken for this device");
            return stream::pending().boxed();
        };

        let identifier = activity.identifier.clone();
        let participant = self.participant;

        UnboundedReceiverStream::new(offers)
            .filter(move |core| futures::future::ready(core.activity() == identifier))
            .map(move |core| Arc::new(core.view(participant)) as Arc<dyn GroupSession>)
            .boxed()
    }

    fn eligibility(&self) -> watch::Receiver<bool> {
        self.call.eligibility()
    }
}

impl std::fmt::Debug for LoopbackDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackDevice")
            .field("participant", &self.participant)
            .finish_non_exhaustive()
    }
}
