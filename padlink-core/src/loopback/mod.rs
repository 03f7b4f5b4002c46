//! In-memory group sessions
//!
//! A [`LoopbackCall`] stands in for a call shared by several devices in one
//! process. Each [`LoopbackDevice`] is a [`SessionProvider`] for one
//! participant; activating the activity on any device offers the same
//! session to every device in the call, including devices added later.
//!
//! Faults can be injected to exercise the coordinator's error paths.
//!
//! [`SessionProvider`]: crate::session::SessionProvider

use crate::envelope::ParticipantId;
use crate::session::{ActivityDescriptor, InvalidationReason};
use crate::transport::{TransportError, WireFrame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

mod device;
mod session;

pub use device::LoopbackDevice;
pub use session::{LoopbackMessenger, LoopbackSession};

use session::SessionCore;

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Injected failures, shared by every session of a call
#[derive(Debug, Default)]
pub(crate) struct Faults {
    send_failure: Mutex<Option<TransportError>>,
    activation_failure: Mutex<Option<TransportError>>,
    activation_delay: Mutex<Option<Duration>>,
}

impl Faults {
    pub(crate) fn send_failure(&self) -> Option<TransportError> {
        lock(&self.send_failure).clone()
    }

    fn activation_delay(&self) -> Option<Duration> {
        *lock(&self.activation_delay)
    }
}

pub(crate) struct CallInner {
    devices: Mutex<Vec<mpsc::UnboundedSender<Arc<SessionCore>>>>,
    live: Mutex<Option<Arc<SessionCore>>>,
    faults: Arc<Faults>,
    eligible: watch::Sender<bool>,
}

impl CallInner {
    fn live_session(&self) -> Option<Arc<SessionCore>> {
        lock(&self.live).clone().filter(|core| !core.is_ended())
    }

    pub(crate) async fn activate(&self, activity: &ActivityDescriptor) -> Result<bool, TransportError> {
        if let Some(delay) = self.faults.activation_delay() {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.faults.activation_failure).clone();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let mut live = lock(&self.live);
        if let Some(core) = live.as_ref().filter(|core| !core.is_ended()) {
            debug!(session = %core.id(), "Activity already running in this call");
            return Ok(true);
        }

        let core = SessionCore::new(&activity.identifier, self.faults.clone());
        info!(session = %core.id(), activity = %activity.identifier, "Started loopback session");
        *live = Some(core.clone());
        drop(live);

        lock(&self.devices).retain(|device| device.send(core.clone()).is_ok());
        Ok(true)
    }

    pub(crate) fn eligibility(&self) -> watch::Receiver<bool> {
        self.eligible.subscribe()
    }
}

/// A simulated call shared by several in-process devices
#[derive(Clone)]
pub struct LoopbackCall {
    inner: Arc<CallInner>,
}

impl LoopbackCall {
    pub fn new() -> Self {
        let (eligible, _) = watch::channel(true);

        Self {
            inner: Arc::new(CallInner {
                devices: Mutex::new(Vec::new()),
                live: Mutex::new(None),
                faults: Arc::new(Faults::default()),
                eligible,
            }),
        }
    }

    /// Add a device with a fresh participant id
    ///
    /// A session that is already running is offered to the new device
    /// straight away.
    pub fn add_device(&self) -> Arc<LoopbackDevice> {
        let participant = ParticipantId::new();
        let (offers_tx, offers_rx) = mpsc::unbounded_channel();

        if let Some(core) = self.inner.live_session() {
            let _ = offers_tx.send(core);
        }

        let mut devices = lock(&self.inner.devices);
        devices.retain(|device| !device.is_closed());
        devices.push(offers_tx);
        drop(devices);

        debug!(%participant, "Added loopback device");
        Arc::new(LoopbackDevice::new(self.inner.clone(), participant, offers_rx))
    }

    /// Whether a session that has not been ended is running
    pub fn has_live_session(&self) -> bool {
        self.inner.live_session().is_some()
    }

    /// Participants currently joined to the running session
    pub fn participant_count(&self) -> usize {
        self.inner
            .live_session()
            .map_or(0, |core| core.participant_count())
    }

    /// Invalidate the running session for one participant
    pub fn invalidate(&self, participant: ParticipantId, reason: InvalidationReason) {
        if let Some(core) = self.inner.live_session() {
            core.invalidate(participant, reason);
        }
    }

    /// Invalidate the running session for every participant
    pub fn invalidate_all(&self, reason: InvalidationReason) {
        if let Some(core) = self.inner.live_session() {
            core.invalidate_all(reason);
        }
    }

    /// Deliver a raw frame to every messenger of the running session
    ///
    /// Returns false when no session is running.
    pub fn inject_frame(&self, frame: WireFrame) -> bool {
        match self.inner.live_session() {
            Some(core) => {
                core.broadcast(frame);
                true
            }
            None => false,
        }
    }

    /// Make every subsequent send fail with `failure`, or clear it
    pub fn set_send_failure(&self, failure: Option<TransportError>) {
        *lock(&self.inner.faults.send_failure) = failure;
    }

    /// Make every subsequent activation fail with `failure`, or clear it
    pub fn set_activation_failure(&self, failure: Option<TransportError>) {
        *lock(&self.inner.faults.activation_failure) = failure;
    }

    /// Delay activations, e.g. to trip an activation timeout
    pub fn set_activation_delay(&self, delay: Option<Duration>) {
        *lock(&self.inner.faults.activation_delay) = delay;
    }

    pub fn set_eligible(&self, eligible: bool) {
        self.inner.eligible.send_if_modified(|current| {
            let changed = *current != eligible;
            *current = eligible;
            changed
        });
    }
}

impl Default for LoopbackCall {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoopbackCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackCall")
            .field("live_session", &self.has_live_session())
            .finish_non_exhaustive()
    }
}
