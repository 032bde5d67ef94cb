//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices and recording collaborators that can
//! be controlled programmatically without requiring physical hardware.

pub mod collaborators;
pub mod gpio;
pub mod keypad;

// Re-export commonly used types
pub use collaborators::{
    RecordingAlerts, RecordingLed, RecordingSound, RecordingSpeaker, SoundEvent,
};
pub use gpio::{MockPin, MockPinHandle};
pub use keypad::{MockKeypad, MockKeypadHandle};
