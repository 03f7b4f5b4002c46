//! Test fixtures for coordinators on a loopback call

use super::recording::{DelegateEvents, RecordingDelegate};
use crate::config::SessionSettings;
use crate::coordinator::SessionCoordinator;
use crate::envelope::{ControllerEvent, Payload};
use crate::loopback::{LoopbackCall, LoopbackDevice};
use crate::session::ActivityDescriptor;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_ACTIVITY: &str = "net.padlink.test";

pub fn test_activity() -> ActivityDescriptor {
    ActivityDescriptor::new(TEST_ACTIVITY, "PadLink Test")
}

/// Default settings with a short activation timeout
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        activation_timeout: Duration::from_millis(200),
        ..SessionSettings::default()
    }
}

pub fn button_a(value: f32, pressed: bool) -> Payload {
    Payload::Event(ControllerEvent::ButtonAChanged { value, pressed })
}

/// One device in a loopback call with its coordinator and recorded events
pub struct TestPeer {
    pub device: Arc<LoopbackDevice>,
    pub coordinator: SessionCoordinator,
    pub events: DelegateEvents,
}

impl TestPeer {
    /// Add a device to `call` and start waiting for sessions on it
    pub fn join_call(call: &LoopbackCall, settings: SessionSettings) -> Self {
        let device = call.add_device();
        let (delegate, events) = RecordingDelegate::new();
        let coordinator =
            SessionCoordinator::new(test_activity(), device.clone(), delegate, settings);

        if let Err(e) = coordinator.begin_waiting_for_sessions() {
            panic!("fresh coordinator refused to wait for sessions: {}", e);
        }

        Self {
            device,
            coordinator,
            events,
        }
    }
}
