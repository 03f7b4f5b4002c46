//! Envelope model
//!
//! An [`Envelope`] is one unit of data exchanged inside a group session:
//! sender identity, unique id, creation timestamp and a [`Payload`].
//! Envelopes are immutable once built; fields are only reachable through
//! accessors.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

pub mod codec;
mod payload;

pub use codec::{decode, encode, CodecError};
pub use payload::{ControllerEvent, Payload};

/// Stable identifier of a session participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Generate a new random participant identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identifier issued once per process and reused for every envelope
    /// sent without a session-assigned identity.
    pub fn process_default() -> Self {
        static PROCESS_PARTICIPANT: OnceLock<ParticipantId> = OnceLock::new();
        *PROCESS_PARTICIPANT.get_or_init(ParticipantId::new)
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique envelope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message sent between session participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    participant_id: ParticipantId,
    id: MessageId,
    timestamp: DateTime<Utc>,
    payload: Payload,
}

impl Envelope {
    /// Type tag attached to every frame carrying an envelope
    pub const WIRE_TYPE: &'static str = "padlink.envelope";

    /// Build an envelope with a fresh id, stamped with the current time
    pub fn new(participant_id: ParticipantId, payload: Payload) -> Self {
        Self {
            participant_id,
            id: MessageId::new(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Build an envelope from the process-wide participant identifier
    pub fn from_process(payload: Payload) -> Self {
        Self::new(ParticipantId::process_default(), payload)
    }

    /// Rebuild an envelope from already-known parts.
    ///
    /// Used by transports that carry the fields separately; the result is as
    /// immutable as any other envelope.
    pub fn from_parts(
        participant_id: ParticipantId,
        id: MessageId,
        timestamp: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            participant_id,
            id,
            timestamp,
            payload,
        }
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.participant_id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id,
            self.payload
        )
    }
}
