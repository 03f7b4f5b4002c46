//! JSON wire codec for envelopes
//!
//! Decoding never panics: malformed bytes surface as [`CodecError::Malformed`]
//! with enough position information to locate the problem in the frame.

use super::Envelope;
use serde_json::error::Category;
use thiserror::Error;

/// Errors produced while encoding or decoding envelopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    #[error("Malformed envelope ({category} error at line {line}, column {column}): {detail}")]
    Malformed {
        category: &'static str,
        line: usize,
        column: usize,
        detail: String,
    },
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        let category = match e.classify() {
            Category::Io => "io",
            Category::Syntax => "syntax",
            Category::Data => "data",
            Category::Eof => "eof",
        };

        CodecError::Malformed {
            category,
            line: e.line(),
            column: e.column(),
            detail: e.to_string(),
        }
    }
}

/// Serialize an envelope into its wire representation
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Parse an envelope from its wire representation
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ControllerEvent, ParticipantId, Payload};
    use proptest::prelude::*;

    fn event_strategy() -> impl Strategy<Value = ControllerEvent> {
        // Multiples of 1/1024 keep the generated values exactly representable.
        let axis = (-1024i32..=1024).prop_map(|step| step as f32 / 1024.0);
        let magnitude = (0i32..=1024).prop_map(|step| step as f32 / 1024.0);

        prop_oneof![
            "[A-Za-z0-9 ]{0,24}".prop_map(ControllerEvent::ControllerIdentified),
            (axis.clone(), axis.clone()).prop_map(|(x, y)| ControllerEvent::LeftPadChanged { x, y }),
            (axis.clone(), axis).prop_map(|(x, y)| ControllerEvent::RightPadChanged { x, y }),
            (magnitude.clone(), any::<bool>())
                .prop_map(|(value, pressed)| ControllerEvent::ButtonAChanged { value, pressed }),
            (magnitude.clone(), any::<bool>())
                .prop_map(|(value, pressed)| ControllerEvent::ButtonBChanged { value, pressed }),
            (magnitude.clone(), any::<bool>())
                .prop_map(|(value, pressed)| ControllerEvent::ButtonXChanged { value, pressed }),
            (magnitude, any::<bool>())
                .prop_map(|(value, pressed)| ControllerEvent::ButtonYChanged { value, pressed }),
        ]
    }

    fn payload_strategy() -> impl Strategy<Value = Payload> {
        prop_oneof![
            (any::<u32>(), any::<u32>(), any::<u32>())
                .prop_map(|(major, minor, build)| Payload::version(major, minor, build)),
            event_strategy().prop_map(Payload::Event),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(payload in payload_strategy()) {
            let envelope = Envelope::new(ParticipantId::new(), payload);
            let bytes = encode(&envelope).unwrap();
            let decoded = decode(&bytes).unwrap();

            prop_assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_button_event_wire_shape() {
        let envelope = Envelope::new(
            ParticipantId::new(),
            Payload::Event(ControllerEvent::ButtonAChanged { value: 1.0, pressed: true }),
        );
        let value: serde_json::Value = serde_json::from_slice(&encode(&envelope).unwrap()).unwrap();

        assert_eq!(value["participantId"], envelope.participant_id().to_string());
        assert_eq!(value["id"], envelope.id().to_string());
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        assert_eq!(value["payload"]["event"]["buttonAChanged"]["pressed"], true);
        assert_eq!(value["payload"]["event"]["buttonAChanged"]["value"], 1.0);
    }

    #[test]
    fn test_version_wire_shape() {
        let envelope = Envelope::new(ParticipantId::new(), Payload::version(2, 7, 41));
        let value: serde_json::Value = serde_json::from_slice(&encode(&envelope).unwrap()).unwrap();

        assert_eq!(value["payload"]["version"]["major"], 2);
        assert_eq!(value["payload"]["version"]["minor"], 7);
        assert_eq!(value["payload"]["version"]["build"], 41);
    }

    #[test]
    fn test_decode_handwritten_frame() {
        let frame = br#"{
            "participantId": "6f1c2a4e-8d1b-4c57-9a0e-2b7f4f6d9c11",
            "id": "0b9e5f7a-3c2d-4e1f-8a6b-5d4c3b2a1f00",
            "timestamp": "2024-03-01T12:30:45Z",
            "payload": {"event": {"leftPadChanged": {"x": 0.5, "y": -1.0}}}
        }"#;

        let envelope = decode(frame).unwrap();
        assert_eq!(
            envelope.payload(),
            &Payload::Event(ControllerEvent::LeftPadChanged { x: 0.5, y: -1.0 })
        );
        assert_eq!(envelope.timestamp().to_rfc3339(), "2024-03-01T12:30:45+00:00");
    }

    #[test]
    fn test_truncated_frame_is_eof_error() {
        let err = decode(br#"{"participantId": "6f1c2a4e"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { category: "eof", .. }));
    }

    #[test]
    fn test_garbage_is_syntax_error() {
        let err = decode(b"not json at all").unwrap_err();
        match err {
            CodecError::Malformed { category, line, .. } => {
                assert_eq!(category, "syntax");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_is_data_error() {
        let frame = br#"{
            "participantId": "6f1c2a4e-8d1b-4c57-9a0e-2b7f4f6d9c11",
            "timestamp": "2024-03-01T12:30:45Z",
            "payload": {"version": {"major": 1, "minor": 0, "build": 0}}
        }"#;

        let err = decode(frame).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { category: "data", .. }));
        assert!(err.to_string().contains("missing field `id`"));
    }

    #[test]
    fn test_unknown_event_tag_is_rejected() {
        let frame = br#"{
            "participantId": "6f1c2a4e-8d1b-4c57-9a0e-2b7f4f6d9c11",
            "id": "0b9e5f7a-3c2d-4e1f-8a6b-5d4c3b2a1f00",
            "timestamp": "2024-03-01T12:30:45Z",
            "payload": {"event": {"triggerPulled": {"value": 1.0}}}
        }"#;

        let err = decode(frame).unwrap_err();
        assert!(err.to_string().contains("unknown variant `triggerPulled`"));
    }
}
