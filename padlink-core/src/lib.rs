//! PadLink core
//!
//! Coordinates the lifecycle of a shared "game controller" activity inside an
//! external group session: joining offered sessions, exchanging typed
//! controller envelopes, tracking participants and tearing everything down
//! when the session goes away.

pub mod app_version;
pub mod config;
pub mod coordinator;
pub mod eligibility;
pub mod envelope;
pub mod logging;
pub mod loopback;
pub mod metrics;
pub mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;

pub use app_version::AppVersion;
pub use config::Config;
pub use coordinator::{CoordinatorError, DelegateEvent, SessionCoordinator, SessionDelegate};
pub use eligibility::{EligibilityDelegate, EligibilityMonitor};
pub use envelope::{ControllerEvent, Envelope, MessageId, ParticipantId, Payload};
pub use logging::{init_logging, LogLevel};
pub use session::{ActivityDescriptor, GroupSession, SessionProvider, SessionState};
pub use transport::{DeliveryMode, Messenger, TransportError};
