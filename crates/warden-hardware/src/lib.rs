//! Hardware abstraction layer for the Warden alarm.
//!
//! This crate defines the narrow interfaces the alarm core consumes and the
//! devices that implement them:
//!
//! - **Collaborators**: [`SoundPlayer`], [`StatusLed`], [`AlertSink`] and
//!   [`Speaker`]. Synchronous, fire-and-forget calls made from inside state
//!   entry and exit actions.
//! - **Input devices**: [`KeypadDevice`] and [`GpioPin`]. Async sources the
//!   listener tasks await on, with Linux implementations ([`evdev`],
//!   [`sysfs`]) and controllable mocks ([`mock`]).
//!
//! # Design Philosophy
//!
//! - **Async-first input**: device reads use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT), dispatched through the enums in
//!   [`devices`].
//! - **Thread-safe**: every trait requires `Send + Sync` for use with Tokio.
//! - **Error-aware**: every operation returns [`Result<T>`] carrying a
//!   [`HardwareError`].
//!
//! # Example
//!
//! ```no_run
//! use warden_hardware::traits::KeypadDevice;
//! use warden_hardware::types::{ControlKey, Key};
//! use warden_hardware::Result;
//!
//! async fn read_code<K: KeypadDevice>(keypad: &mut K) -> Result<String> {
//!     let mut code = String::new();
//!
//!     loop {
//!         match keypad.read_event().await?.key() {
//!             Some(Key::Numeral(c)) => code.push(c),
//!             Some(Key::Control(ControlKey::Enter)) => break,
//!             Some(Key::Control(ControlKey::Clear)) => code.clear(),
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(code)
//! }
//! ```

pub mod devices;
pub mod error;
pub mod evdev;
pub mod mock;
pub mod sysfs;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{AlertSink, GpioPin, KeypadDevice, SoundPlayer, Speaker, StatusLed};
pub use types::{ControlKey, DeviceInfo, EdgeKind, Key, KeyEvent, VolumeKey};
