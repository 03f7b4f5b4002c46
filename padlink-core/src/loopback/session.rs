use super::{lock, Faults};
use crate::envelope::ParticipantId;
use crate::session::{GroupSession, InvalidationReason, SessionState, SessionStateStream, StateSignal};
use crate::transport::{DeliveryMode, Messenger, TransportError, WireFrame};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace, warn};
use uuid::Uuid;

const FRAME_BUFFER: usize = 256;

/// Session state shared by every device's view
pub(crate) struct SessionCore {
    id: Uuid,
    activity: String,
    participants: watch::Sender<BTreeSet<ParticipantId>>,
    members: Mutex<HashMap<ParticipantId, Arc<StateSignal>>>,
    frames: broadcast::Sender<WireFrame>,
    faults: Arc<Faults>,
    ended: AtomicBool,
}

impl SessionCore {
    pub(crate) fn new(activity: &str, faults: Arc<Faults>) -> Arc<Self> {
        let (participants, _) = watch::channel(BTreeSet::new());
        let (frames, _) = broadcast::channel(FRAME_BUFFER);

        Arc::new(Self {
            id: Uuid::new_v4(),
            activity: activity.to_string(),
            participants,
            members: Mutex::new(HashMap::new()),
            frames,
            faults,
            ended: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn activity(&self) -> &str {
        &self.activity
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub(crate) fn participant_count(&self) -> usize {
        self.participants.borrow().len()
    }

    /// The session as seen by `local`
    pub(crate) fn view(self: &Arc<Self>, local: ParticipantId) -> LoopbackSession {
        let state = lock(&self.members)
            .entry(local)
            .or_insert_with(|| {
                let initial = if self.is_ended() {
                    SessionState::Invalidated(InvalidationReason::Ended)
                } else {
                    SessionState::Waiting
                };
                Arc::new(StateSignal::new(initial))
            })
            .clone();

        LoopbackSession {
            core: self.clone(),
            local,
            state,
        }
    }

    pub(crate) fn broadcast(&self, frame: WireFrame) {
        // No subscribers just means nobody is listening yet.
        let receivers = self.frames.send(frame).unwrap_or(0);
        trace!(session = %self.id, receivers, "Broadcast frame");
    }

    fn remove_participant(&self, participant: ParticipantId) {
        self.participants
            .send_if_modified(|participants| participants.remove(&participant));
    }

    pub(crate) fn invalidate(&self, participant: ParticipantId, reason: InvalidationReason) {
        self.remove_participant(participant);
        let state = lock(&self.members).get(&participant).cloned();
        if let Some(state) = state {
            invalidate_state(&state, reason);
        }
    }

    pub(crate) fn invalidate_all(&self, reason: InvalidationReason) {
        self.participants.send_if_modified(|participants| {
            let had_any = !participants.is_empty();
            participants.clear();
            had_any
        });

        let members: Vec<_> = lock(&self.members).values().cloned().collect();
        for state in members {
            invalidate_state(&state, reason.clone());
        }
    }
}

/// Invalidation is terminal; a second one keeps the first reason
fn invalidate_state(state: &StateSignal, reason: InvalidationReason) {
    state.update(|current| {
        if current.is_invalidated() {
            return false;
        }
        *current = SessionState::Invalidated(reason);
        true
    });
}

/// One participant's handle on a loopback session
pub struct LoopbackSession {
    core: Arc<SessionCore>,
    local: ParticipantId,
    state: Arc<StateSignal>,
}

impl GroupSession for LoopbackSession {
    fn id(&self) -> Uuid {
        self.core.id
    }

    fn state(&self) -> SessionState {
        self.state.current()
    }

    fn state_changes(&self) -> SessionStateStream {
        self.state.subscribe()
    }

    fn active_participants(&self) -> watch::Receiver<BTreeSet<ParticipantId>> {
        self.core.participants.subscribe()
    }

    fn local_participant(&self) -> Option<ParticipantId> {
        Some(self.local)
    }

    fn join(&self) {
        let joined = self.state.update(|state| {
            if *state != SessionState::Waiting {
                return false;
            }
            *state = SessionState::Joined;
            true
        });
        if !joined {
            warn!(session = %self.core.id, participant = %self.local, "Join ignored; session not waiting");
            return;
        }

        let local = self.local;
        self.core
            .participants
            .send_if_modified(|participants| participants.insert(local));
        debug!(session = %self.core.id, participant = %self.local, "Participant joined");
    }

    fn leave(&self) {
        self.core.invalidate(self.local, InvalidationReason::Left);
        debug!(session = %self.core.id, participant = %self.local, "Participant left");
    }

    fn end(&self) {
        self.core.ended.store(true, Ordering::SeqCst);
        self.core.invalidate_all(InvalidationReason::Ended);
        debug!(session = %self.core.id, participant = %self.local, "Session ended");
    }

    fn messenger(&self, mode: DeliveryMode) -> Arc<dyn Messenger> {
        Arc::new(LoopbackMessenger {
            core: self.core.clone(),
            local: self.local,
            mode,
        })
    }
}

impl std::fmt::Debug for LoopbackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackSession")
            .field("id", &self.core.id)
            .field("local", &self.local)
            .field("state", &self.state.current())
            .finish()
    }
}

/// Messenger that fans frames out to the other participants' messengers
pub struct LoopbackMessenger {
    core: Arc<SessionCore>,
    local: ParticipantId,
    mode: DeliveryMode,
}

#[async_trait]
impl Messenger for LoopbackMessenger {
    async fn send(&self, mut frame: WireFrame) -> Result<(), TransportError> {
        let failure = self.core.faults.send_failure();
        if let Some(failure) = failure {
            return Err(failure);
        }
        if self.core.is_ended() {
            return Err(TransportError::Closed);
        }
        let joined = self.core.participants.borrow().contains(&self.local);
        if !joined {
            return Err(TransportError::NotJoined);
        }

        // The transport, not the payload, decides who the sender is.
        frame.sender = self.local;
        trace!(mode = ?self.mode, bytes = frame.bytes.len(), "Loopback send");
        self.core.broadcast(frame);
        Ok(())
    }

    fn frames(&self) -> BoxStream<'static, WireFrame> {
        let local = self.local;

        BroadcastStream::new(self.core.frames.subscribe())
            .filter_map(move |item| async move {
                match item {
                    Ok(frame) if frame.sender != local => Some(frame),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Loopback receiver lagged; frames dropped");
                        None
                    }
                }
            })
            .boxed()
    }
}
