//! GPIO sensor listeners.
//!
//! Each sensor owns one pin and runs as its own task, waiting for edges,
//! debouncing them and handing confirmed detections to a [`SensorCallback`].
//! Whether a detection trips the alarm is decided by the callback, not here.

pub mod debounce;
pub mod door;
pub mod event;
pub mod motion;

pub use debounce::{DebounceWindow, debounce};
pub use door::DoorSensor;
pub use event::{SensorCallback, SensorEvent};
pub use motion::MotionSensor;
