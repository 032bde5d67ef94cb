//! Sensor events and the callback type that receives them.

use std::sync::Arc;

use serde::Serialize;

/// A confirmed sensor detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    /// A motion sensor saw movement.
    Motion { location: String },

    /// A door contact changed position.
    Door { location: String, open: bool },
}

impl SensorEvent {
    /// Where the sensor is mounted.
    pub fn location(&self) -> &str {
        match self {
            SensorEvent::Motion { location } | SensorEvent::Door { location, .. } => location,
        }
    }

    /// Whether this event can trip an armed alarm.
    ///
    /// Motion and a door opening can; a door closing cannot.
    pub fn is_intrusion(&self) -> bool {
        match self {
            SensorEvent::Motion { .. } => true,
            SensorEvent::Door { open, .. } => *open,
        }
    }
}

/// Receiver of confirmed sensor events.
///
/// Called from the sensor task, so it must not block for long.
pub type SensorCallback = Arc<dyn Fn(SensorEvent) + Send + Sync>;
