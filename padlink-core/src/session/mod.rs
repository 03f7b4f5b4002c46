//! External session layer interface
//!
//! The call framework that hosts group sessions is an external collaborator.
//! These traits describe exactly what the coordinator needs from it:
//! activating an activity, a stream of offered sessions, and per session a
//! lossless state stream, a participant signal, join/leave/end requests and a
//! messenger.

use crate::envelope::ParticipantId;
use crate::transport::{DeliveryMode, Messenger, TransportError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

mod signal;
mod state;

pub use signal::{SessionStateStream, StateSignal};
pub use state::{InvalidationReason, SessionState};

/// Stream of sessions offered by the external layer; never terminates while
/// the provider is alive.
pub type SessionStream = BoxStream<'static, Arc<dyn GroupSession>>;

/// Describes the shared activity participants take part in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    /// Reverse-DNS activity type identifier
    pub identifier: String,
    pub title: String,
    pub subtitle: Option<String>,
}

impl ActivityDescriptor {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            subtitle: None,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// One externally managed multi-party session, as seen by this device
pub trait GroupSession: Send + Sync {
    /// Identifier shared by every participant's view of the session
    fn id(&self) -> Uuid;

    /// Current session state
    fn state(&self) -> SessionState;

    /// Every state this view passes through, starting with the current one
    ///
    /// Transitions must not be coalesced: a `Joined` immediately followed by
    /// `Invalidated` yields both. [`StateSignal`] provides this.
    fn state_changes(&self) -> SessionStateStream;

    /// Reactive set of active participants
    fn active_participants(&self) -> watch::Receiver<BTreeSet<ParticipantId>>;

    /// Identity the session assigned to this device, if known
    fn local_participant(&self) -> Option<ParticipantId>;

    fn join(&self);

    fn leave(&self);

    /// Terminate the session for every participant
    fn end(&self);

    /// Open a messenger on this session's channel
    fn messenger(&self, mode: DeliveryMode) -> Arc<dyn Messenger>;
}

/// Entry point into the external session layer
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Ask the external layer to start the activity with the current call.
    ///
    /// Returns `Ok(false)` when activation was declined without an error.
    async fn activate(&self, activity: &ActivityDescriptor) -> Result<bool, TransportError>;

    /// Sessions offered for the given activity
    fn sessions(&self, activity: &ActivityDescriptor) -> SessionStream;

    /// Whether a session can currently be started
    fn eligibility(&self) -> watch::Receiver<bool>;
}
