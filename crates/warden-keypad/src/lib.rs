//! Keypad processor for the alarm.
//!
//! Reads key presses from a [`KeypadDevice`](warden_hardware::KeypadDevice),
//! keeps the typed password buffer, and turns `ENTER`, `NUML` and the volume
//! keys into alarm signals and audio changes.

pub mod command;
pub mod processor;

pub use command::{KeypadCommand, KeypadHandle, KeypadInbox, keypad_channel};
pub use processor::{KeypadConfig, KeypadProcessor};
