//! Session coordinator
//!
//! Owns at most one external group session at a time and everything scoped
//! to it: the state and participant subscriptions, the transport handle and
//! the inbound listener task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   offered sessions   ┌─────────────────────┐
//! │  SessionProvider         │ ───────────────────► │  session-offers     │
//! │  (call framework)        │                      │  task (lifetime)    │
//! └──────────────────────────┘                      └──────────┬──────────┘
//!                                                              │ configure
//!                                                              ▼
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │  SessionSlot (behind a mutex)                                          │
//! │  • session            • subscriptions: state, participants             │
//! │  • transport handle   • listeners: inbound envelopes                   │
//! │  • last timestamp seen per sender                                      │
//! └───────────────────────────────┬────────────────────────────────────────┘
//!                                 │ DelegateEvent
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  dispatcher task         │──► SessionDelegate
//!                    └──────────────────────────┘
//! ```
//!
//! Leaving, ending and an observed invalidation all converge on the same
//! idempotent teardown, after which the coordinator accepts a new session.

use crate::app_version::AppVersion;
use crate::config::SessionSettings;
use crate::envelope::{Envelope, ParticipantId, Payload};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::session::{
    ActivityDescriptor, GroupSession, SessionProvider, SessionState, SessionStateStream,
};
use crate::transport::{EnvelopeStream, TransportError, TransportHandle};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

mod delegate;
mod error;
mod tasks;

pub use delegate::{DelegateEvent, DelegateNotifier, SessionDelegate};
pub use error::{CoordinatorError, CoordinatorResult};
pub use tasks::{CancelToken, TaskHandle, TaskSet};

/// Session-scoped state; replaced on configure, cleared on teardown
#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<dyn GroupSession>>,
    transport: Option<TransportHandle>,
    listeners: TaskSet,
    subscriptions: TaskSet,
    /// Timestamps are only ordered per sender, never across senders
    last_seen: HashMap<ParticipantId, DateTime<Utc>>,
}

impl SessionSlot {
    /// Release everything session-scoped. Returns whether anything was held.
    fn teardown(&mut self) -> bool {
        let held = self.session.is_some()
            || self.transport.is_some()
            || !self.listeners.is_empty()
            || !self.subscriptions.is_empty();

        self.last_seen.clear();
        self.session = None;
        self.transport = None;
        self.listeners.cancel_all();
        self.subscriptions.cancel_all();

        held
    }

    fn join(&self) -> CoordinatorResult<()> {
        let session = self
            .session
            .as_ref()
            .ok_or(CoordinatorError::AttemptToJoinAbsentSession)?;
        session.join();
        Ok(())
    }
}

/// State shared between the coordinator and its background tasks.
/// Tasks hold it weakly so dropping the coordinator releases everything.
struct Shared {
    slot: Mutex<SessionSlot>,
    notifier: DelegateNotifier,
    settings: SessionSettings,
    metrics: SessionMetrics,
}

impl Shared {
    fn teardown_locked(&self, slot: &mut SessionSlot) {
        if slot.teardown() {
            self.metrics.teardown();
            info!("Tore down group session");
        }
    }

    async fn configure(self: &Arc<Self>, session: Arc<dyn GroupSession>) {
        let session_id = session.id();
        let mut slot = self.slot.lock().await;

        if slot.session.is_some() {
            warn!(session = %session_id, "New session offered before teardown; tearing down the old one");
            self.teardown_locked(&mut slot);
        }
        slot.session = Some(session.clone());

        let weak = Arc::downgrade(self);
        let states = session.state_changes();
        slot.subscriptions.insert(TaskHandle::spawn("session-state", move |cancel| {
            watch_state(weak, states, cancel)
        }));

        let weak = Arc::downgrade(self);
        let participants = session.active_participants();
        slot.subscriptions.insert(TaskHandle::spawn("participants", move |cancel| {
            watch_participants(weak, participants, cancel)
        }));

        // The inbound stream must exist before joining so replies to our
        // join are not missed.
        let transport = TransportHandle::new(session.messenger(self.settings.delivery_mode));
        let inbound = transport.receive();

        if let Err(e) = slot.join() {
            warn!(session = %session_id, error = %e, "Join failed");
            self.notifier.error(e);
            return;
        }

        let weak = Arc::downgrade(self);
        slot.listeners.insert(TaskHandle::spawn("listener", move |cancel| {
            listen(weak, inbound, cancel)
        }));
        slot.transport = Some(transport);

        self.metrics.session_configured();
        info!(session = %session_id, "Configured group session");
    }

    async fn handle_state(&self, state: &SessionState, cancel: &CancelToken) {
        match state {
            SessionState::Waiting => {}
            SessionState::Joined => {
                info!("Joined group session");
                self.notifier.connected();
                if self.settings.announce_version {
                    self.send_payload(AppVersion::current().as_payload()).await;
                }
            }
            SessionState::Invalidated(reason) => {
                let mut slot = self.slot.lock().await;
                if cancel.is_cancelled() {
                    // A local leave/end already tore this session down.
                    return;
                }
                warn!(%reason, "Group session invalidated");
                slot.session = None;
                self.teardown_locked(&mut slot);
                drop(slot);

                self.notifier.disconnected();
                self.notifier.error(CoordinatorError::Invalidated(reason.clone()));
            }
        }

        self.notifier.status(state.to_string());
    }

    async fn accept(&self, envelope: Envelope, cancel: &CancelToken) {
        let mut slot = self.slot.lock().await;
        if cancel.is_cancelled() {
            debug!(message = %envelope.id(), "Listener cancelled; dropping envelope");
            return;
        }

        let sender = envelope.participant_id();
        if self.settings.reject_stale_messages {
            if let Some(&latest) = slot.last_seen.get(&sender) {
                if envelope.timestamp() <= latest {
                    debug!(message = %envelope.id(), %sender, %latest, "Rejecting stale envelope");
                    self.metrics.stale_rejected();
                    self.notifier.error(CoordinatorError::StaleMessage(Box::new(envelope)));
                    return;
                }
            }
        }

        slot.last_seen.insert(sender, envelope.timestamp());
        self.metrics.envelope_received();
        self.notifier.message(envelope);
    }

    async fn send_payload(&self, payload: Payload) {
        // Sender id and transport must come from the same session.
        let (envelope, transport) = {
            let slot = self.slot.lock().await;
            let participant = slot
                .session
                .as_ref()
                .and_then(|session| session.local_participant())
                .unwrap_or_else(ParticipantId::process_default);
            (Envelope::new(participant, payload), slot.transport.clone())
        };

        self.deliver(envelope, transport).await;
    }

    async fn send_envelope(&self, envelope: Envelope) {
        let transport = self.slot.lock().await.transport.clone();
        self.deliver(envelope, transport).await;
    }

    async fn deliver(&self, envelope: Envelope, transport: Option<TransportHandle>) {
        let Some(transport) = transport else {
            warn!("Attempt to send a message without an active transport");
            self.notifier.error(CoordinatorError::NoActiveTransport);
            return;
        };

        match transport.send(&envelope).await {
            Ok(()) => {
                self.metrics.envelope_sent();
                debug!(message = %envelope.id(), payload = %envelope.payload(), "Sent envelope");
            }
            Err(e) => {
                warn!(message = %envelope.id(), error = %e, "Envelope send failed");
                self.metrics.send_failed();
                self.notifier.error(CoordinatorError::SendFailed(e));
            }
        }
    }
}

async fn watch_state(shared: Weak<Shared>, mut states: SessionStateStream, mut cancel: CancelToken) {
    let mut last: Option<SessionState> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = states.next() => next,
        };
        let Some(state) = next else { return };
        if last.as_ref() == Some(&state) {
            continue;
        }

        let Some(shared) = shared.upgrade() else { return };
        shared.handle_state(&state, &cancel).await;
        last = Some(state);
    }
}

async fn watch_participants(
    shared: Weak<Shared>,
    mut participants: watch::Receiver<BTreeSet<ParticipantId>>,
    mut cancel: CancelToken,
) {
    loop {
        let count = participants.borrow_and_update().len();
        match shared.upgrade() {
            Some(shared) => shared.notifier.participants_changed(count),
            None => return,
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = participants.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

async fn listen(shared: Weak<Shared>, mut inbound: EnvelopeStream, mut cancel: CancelToken) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = inbound.next() => next,
        };
        let Some(next) = next else {
            debug!("Inbound stream ended");
            break;
        };
        let Some(shared) = shared.upgrade() else { break };

        match next {
            Ok(envelope) => shared.accept(envelope, &cancel).await,
            Err(e) => {
                warn!(error = %e, "Dropping malformed inbound frame");
                shared.metrics.decode_failed();
                shared.notifier.error(CoordinatorError::Decode(e));
            }
        }
    }
    debug!("Listener stopped");
}

/// Coordinates one activity's group sessions on behalf of a delegate
///
/// Must be created inside a Tokio runtime. Errors from every operation are
/// reported to the delegate rather than returned.
pub struct SessionCoordinator {
    activity: ActivityDescriptor,
    provider: Arc<dyn SessionProvider>,
    shared: Arc<Shared>,
    session_offers: OnceLock<TaskHandle>,
}

impl SessionCoordinator {
    pub fn new(
        activity: ActivityDescriptor,
        provider: Arc<dyn SessionProvider>,
        delegate: Arc<dyn SessionDelegate>,
        settings: SessionSettings,
    ) -> Self {
        let (notifier, _dispatcher) = DelegateNotifier::spawn(delegate);

        Self {
            activity,
            provider,
            shared: Arc::new(Shared {
                slot: Mutex::new(SessionSlot::default()),
                notifier,
                settings,
                metrics: SessionMetrics::new(),
            }),
            session_offers: OnceLock::new(),
        }
    }

    pub fn activity(&self) -> &ActivityDescriptor {
        &self.activity
    }

    /// Ask the external layer to start this activity
    ///
    /// Does nothing while a session is owned. Failures are reported to the
    /// delegate and leave the coordinator untouched.
    pub async fn activate(&self) {
        if self.shared.slot.lock().await.session.is_some() {
            debug!(activity = %self.activity.identifier, "Session already active; skipping activation");
            return;
        }

        let timeout = self.shared.settings.activation_timeout;
        let result = tokio::time::timeout(timeout, self.provider.activate(&self.activity))
            .await
            .unwrap_or(Err(TransportError::Timeout(timeout)));

        match result {
            Ok(true) => info!(activity = %self.activity.identifier, "Activity activated"),
            Ok(false) => info!(activity = %self.activity.identifier, "Activation declined"),
            Err(e) => {
                warn!(activity = %self.activity.identifier, error = %e, "Activation failed");
                self.shared.notifier.error(CoordinatorError::ActivationFailed(e));
            }
        }
    }

    /// Start consuming sessions offered for this activity
    ///
    /// Valid once per coordinator; later calls return
    /// [`CoordinatorError::AlreadyWaiting`] and spawn nothing.
    pub fn begin_waiting_for_sessions(&self) -> CoordinatorResult<()> {
        if self.session_offers.get().is_some() {
            warn!(activity = %self.activity.identifier, "Already waiting for sessions");
            return Err(CoordinatorError::AlreadyWaiting);
        }

        let mut offers = self.provider.sessions(&self.activity);
        let shared = Arc::downgrade(&self.shared);
        let identifier = self.activity.identifier.clone();

        let task = TaskHandle::spawn("session-offers", move |mut cancel| async move {
            info!(activity = %identifier, "Waiting for sessions");
            loop {
                let offered = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    offered = offers.next() => offered,
                };
                let Some(session) = offered else {
                    warn!(activity = %identifier, "Session offers ended");
                    break;
                };
                let Some(shared) = shared.upgrade() else { break };
                shared.configure(session).await;
            }
            debug!(activity = %identifier, "Stopped waiting for sessions");
        });

        self.session_offers
            .set(task)
            .map_err(|_| CoordinatorError::AlreadyWaiting)
    }

    /// Send a payload to the other participants
    ///
    /// The envelope carries the session's local participant id when known,
    /// otherwise the process-wide fallback id.
    pub async fn send(&self, payload: Payload) {
        self.shared.send_payload(payload).await;
    }

    /// Send a pre-built envelope unchanged
    pub async fn send_envelope(&self, envelope: Envelope) {
        self.shared.send_envelope(envelope).await;
    }

    /// Leave the current session, ending it when we are its last member
    pub async fn leave_session(&self) {
        let mut slot = self.shared.slot.lock().await;
        let session = slot.session.take();
        self.shared.teardown_locked(&mut slot);
        drop(slot);

        match session {
            Some(session) => {
                let remaining = session.active_participants().borrow().len();
                if remaining == 1 {
                    info!(session = %session.id(), "Last participant leaving; ending session");
                    session.end();
                } else {
                    info!(session = %session.id(), remaining, "Leaving session");
                    session.leave();
                }
                self.shared.notifier.disconnected();
            }
            None => self.shared.notifier.error(CoordinatorError::NoSession),
        }
    }

    /// End the current session for every participant
    pub async fn end_session(&self) {
        let mut slot = self.shared.slot.lock().await;
        let session = slot.session.take();
        self.shared.teardown_locked(&mut slot);
        drop(slot);

        match session {
            Some(session) => {
                info!(session = %session.id(), "Ending session");
                session.end();
                self.shared.notifier.disconnected();
            }
            None => self.shared.notifier.error(CoordinatorError::NoSession),
        }
    }

    pub async fn has_session(&self) -> bool {
        self.shared.slot.lock().await.session.is_some()
    }

    pub async fn is_connected(&self) -> bool {
        let slot = self.shared.slot.lock().await;
        slot.session
            .as_ref()
            .map_or(false, |session| session.state().is_joined())
    }

    pub async fn participant_count(&self) -> usize {
        let slot = self.shared.slot.lock().await;
        slot.session
            .as_ref()
            .map_or(0, |session| session.active_participants().borrow().len())
    }

    /// Number of inbound listener tasks currently running
    pub async fn listener_count(&self) -> usize {
        self.shared.slot.lock().await.listeners.running()
    }

    /// Newest timestamp among the last envelopes accepted from each sender
    pub async fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.shared.slot.lock().await.last_seen.values().max().copied()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        debug!(activity = %self.activity.identifier, "Dropping session coordinator");
    }
}
