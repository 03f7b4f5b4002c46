use serde::{Deserialize, Serialize};
use std::fmt;

/// Content carried by an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    /// Protocol version announcement
    Version { major: u32, minor: u32, build: u32 },
    /// Controller input event
    Event(ControllerEvent),
}

impl Payload {
    pub fn version(major: u32, minor: u32, build: u32) -> Self {
        Payload::Version { major, minor, build }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Payload::Event(_))
    }
}

impl From<ControllerEvent> for Payload {
    fn from(event: ControllerEvent) -> Self {
        Payload::Event(event)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Version { major, minor, build } => {
                write!(f, "version {}.{} B{}", major, minor, build)
            }
            Payload::Event(event) => write!(f, "Command {}", event),
        }
    }
}

/// Game controller input, as produced by the hardware input adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerEvent {
    /// A controller was identified by vendor name
    ControllerIdentified(String),
    LeftPadChanged { x: f32, y: f32 },
    RightPadChanged { x: f32, y: f32 },
    ButtonAChanged { value: f32, pressed: bool },
    ButtonBChanged { value: f32, pressed: bool },
    ButtonXChanged { value: f32, pressed: bool },
    ButtonYChanged { value: f32, pressed: bool },
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn button(f: &mut fmt::Formatter<'_>, name: &str, value: f32, pressed: bool) -> fmt::Result {
            write!(f, "{} value:{}", name, value)?;
            if pressed {
                write!(f, " pressed")?;
            }
            Ok(())
        }

        match self {
            ControllerEvent::ControllerIdentified(vendor) => write!(f, "Game controller:{}", vendor),
            ControllerEvent::LeftPadChanged { x, y } => write!(f, "left x:{} y:{}", x, y),
            ControllerEvent::RightPadChanged { x, y } => write!(f, "right x:{} y:{}", x, y),
            ControllerEvent::ButtonAChanged { value, pressed } => button(f, "A", *value, *pressed),
            ControllerEvent::ButtonBChanged { value, pressed } => button(f, "B", *value, *pressed),
            ControllerEvent::ButtonXChanged { value, pressed } => button(f, "X", *value, *pressed),
            ControllerEvent::ButtonYChanged { value, pressed } => button(f, "Y", *value, *pressed),
        }
    }
}
