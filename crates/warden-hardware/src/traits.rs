//! Device and collaborator trait definitions.
//!
//! Two kinds of interfaces live here:
//!
//! - **Collaborators** (`SoundPlayer`, `StatusLed`, `AlertSink`, `Speaker`):
//!   narrow, synchronous, fire-and-forget operations the alarm core calls
//!   from inside state entry/exit actions. They are object-safe and shared as
//!   `Arc<dyn Trait>`.
//! - **Input devices** (`KeypadDevice`, `GpioPin`): sources the listener tasks
//!   await on. These use native `async fn` methods (Edition 2024 RPITIT) and are
//!   dispatched through the enums in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use warden_core::SoundId;

use crate::error::Result;
use crate::types::{DeviceInfo, EdgeKind, KeyEvent};

/// Audio playback collaborator.
///
/// Implementations must return quickly: `play` starts playback and returns,
/// it never waits for the sound to finish.
pub trait SoundPlayer: Send + Sync {
    /// Start playing `sound`.
    fn play(&self, sound: SoundId) -> Result<()>;

    /// Stop `sound` if it is playing.
    fn stop(&self, sound: SoundId) -> Result<()>;

    /// Current master volume, 0-100.
    fn volume(&self) -> u8;

    /// Set the master volume, 0-100.
    fn set_volume(&self, volume: u8) -> Result<()>;
}

/// Status LED collaborator.
pub trait StatusLed: Send + Sync {
    /// Blink the LED (`true`) or hold it steady (`false`).
    fn set_blinking(&self, blinking: bool) -> Result<()>;
}

/// Out-of-band notification collaborator (email, push, ...).
pub trait AlertSink: Send + Sync {
    /// Report an intrusion, with the location of the sensor that tripped if
    /// known.
    fn intruder_alert(&self, location: Option<&str>) -> Result<()>;

    /// Report a fatal error that is about to stop the appliance.
    fn critical_error(&self, details: &str) -> Result<()>;
}

/// Text-to-speech collaborator.
pub trait Speaker: Send + Sync {
    /// Queue `text` for speech synthesis.
    fn speak(&self, text: &str) -> Result<()>;
}

/// Keypad input device.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return opaque
/// futures. Use generic type parameters, or the
/// [`AnyKeypadDevice`](crate::devices::AnyKeypadDevice) enum wrapper:
///
/// ```no_run
/// use warden_hardware::devices::AnyKeypadDevice;
/// use warden_hardware::mock::MockKeypad;
/// use warden_hardware::traits::KeypadDevice;
///
/// # async fn example() -> warden_hardware::Result<()> {
/// let (keypad, _handle) = MockKeypad::new();
/// let mut keypad = AnyKeypadDevice::Mock(keypad);
///
/// keypad.grab().await?;
/// let event = keypad.read_event().await?;
/// keypad.release().await?;
/// # Ok(())
/// # }
/// ```
pub trait KeypadDevice: Send + Sync {
    /// Take exclusive ownership of the device so its key presses do not reach
    /// any other reader (console, X server).
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Busy` if another process holds the grab, or an
    /// I/O error if the device node cannot be opened.
    async fn grab(&mut self) -> Result<()>;

    /// Give up exclusive ownership. Releasing a device that is not grabbed is
    /// a no-op.
    async fn release(&mut self) -> Result<()>;

    /// Read the next raw event.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or delivers a malformed
    /// frame.
    async fn read_event(&mut self) -> Result<KeyEvent>;

    /// Light or clear the keypad's indicator LED.
    async fn set_indicator(&mut self, lit: bool) -> Result<()>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// A single GPIO input pin.
///
/// The logical level is `true` for high. Pins are owned by exactly one sensor
/// task.
pub trait GpioPin: Send + Sync {
    /// Pin number (BCM numbering).
    fn number(&self) -> u8;

    /// Read the current logical level.
    fn level(&self) -> Result<bool>;

    /// Wait until the pin makes a transition of the given kind.
    async fn wait_for_edge(&mut self, kind: EdgeKind) -> Result<()>;

    /// Forget edges seen so far and take the current level as the baseline
    /// for the next [`wait_for_edge`](GpioPin::wait_for_edge).
    fn clear_edges(&mut self) -> Result<()>;
}
