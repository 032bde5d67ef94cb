//! Mock keypad implementation for testing and development.
//!
//! This module provides a simulated keypad device that can be controlled
//! programmatically for testing without requiring physical hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::{
    HardwareError, Result,
    traits::KeypadDevice,
    types::{ControlKey, DeviceInfo, Key, KeyEvent},
};
use tokio::sync::mpsc;

/// State shared between a mock keypad and its handle.
#[derive(Debug, Default)]
struct Shared {
    grabbed: AtomicBool,
    indicator: AtomicBool,
    failing_grabs: AtomicU32,
    grab_attempts: AtomicU32,
}

/// Mock keypad device for testing and development.
///
/// This device simulates a numeric keypad by receiving raw key events through
/// an internal channel. Tests send input with a [`MockKeypadHandle`].
///
/// # Examples
///
/// ```
/// use warden_hardware::mock::MockKeypad;
/// use warden_hardware::traits::KeypadDevice;
/// use warden_hardware::types::Key;
///
/// #[tokio::main]
/// async fn main() -> warden_hardware::Result<()> {
///     let (mut keypad, handle) = MockKeypad::new();
///
///     handle.type_digits("12").await?;
///
///     assert_eq!(keypad.read_event().await?.key(), Some(Key::Numeral('1')));
///     assert_eq!(keypad.read_event().await?.key(), None); // release
///     assert_eq!(keypad.read_event().await?.key(), Some(Key::Numeral('2')));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    /// Channel receiver for simulated input
    input_rx: mpsc::Receiver<KeyEvent>,

    /// Device name
    name: String,

    shared: Arc<Shared>,
}

impl MockKeypad {
    /// Create a new mock keypad with the default name.
    ///
    /// Returns a tuple of (MockKeypad, MockKeypadHandle) where the handle
    /// can be used to simulate input to the keypad.
    pub fn new() -> (Self, MockKeypadHandle) {
        Self::with_name("Mock Keypad".to_string())
    }

    /// Create a new mock keypad with a custom name.
    pub fn with_name(name: String) -> (Self, MockKeypadHandle) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let shared = Arc::new(Shared::default());

        let keypad = Self {
            input_rx,
            name: name.clone(),
            shared: Arc::clone(&shared),
        };

        let handle = MockKeypadHandle {
            input_tx,
            name,
            shared,
        };

        (keypad, handle)
    }
}

impl KeypadDevice for MockKeypad {
    async fn grab(&mut self) -> Result<()> {
        self.shared.grab_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self.shared.failing_grabs.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_grabs.store(failing - 1, Ordering::SeqCst);
            return Err(HardwareError::busy(self.name.clone()));
        }

        self.shared.grabbed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        self.shared.grabbed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read_event(&mut self) -> Result<KeyEvent> {
        self.input_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Keypad input channel closed"))
    }

    async fn set_indicator(&mut self, lit: bool) -> Result<()> {
        self.shared.indicator.store(lit, Ordering::SeqCst);
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Keypad v1.0"))
    }
}

/// Handle for controlling a mock keypad.
///
/// This handle sends key events to the mock keypad and observes the state the
/// keypad driver left it in (grab, indicator LED). It can be cloned and
/// shared across tasks.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    /// Channel sender for simulated input
    input_tx: mpsc::Sender<KeyEvent>,

    /// Device name
    name: String,

    shared: Arc<Shared>,
}

impl MockKeypadHandle {
    /// Send a raw event to the mock keypad.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped and the channel is closed.
    pub async fn send_event(&self, event: KeyEvent) -> Result<()> {
        self.input_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Keypad input channel closed"))
    }

    /// Press and release `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key has no scan code or the channel is closed.
    pub async fn press(&self, key: Key) -> Result<()> {
        let code = key
            .scan_code()
            .ok_or_else(|| HardwareError::invalid_data(format!("{key:?} is not on the keypad")))?;
        self.send_event(KeyEvent::press(code)).await?;
        self.send_event(KeyEvent::release(code)).await
    }

    /// Type a sequence of numerals.
    ///
    /// # Errors
    ///
    /// Returns an error if any character is not a keypad numeral or the
    /// channel is closed.
    pub async fn type_digits(&self, digits: &str) -> Result<()> {
        for c in digits.chars() {
            self.press(Key::Numeral(c)).await?;
        }
        Ok(())
    }

    /// Type a password followed by `ENTER`.
    ///
    /// # Errors
    ///
    /// Returns an error if any character is not a keypad numeral or the
    /// channel is closed.
    pub async fn enter_password(&self, digits: &str) -> Result<()> {
        self.type_digits(digits).await?;
        self.press(Key::Control(ControlKey::Enter)).await
    }

    /// Make the next `count` grab attempts fail with `HardwareError::Busy`.
    pub fn fail_next_grabs(&self, count: u32) {
        self.shared.failing_grabs.store(count, Ordering::SeqCst);
    }

    /// Number of grab attempts made so far.
    pub fn grab_attempts(&self) -> u32 {
        self.shared.grab_attempts.load(Ordering::SeqCst)
    }

    /// Whether the keypad is currently grabbed.
    pub fn is_grabbed(&self) -> bool {
        self.shared.grabbed.load(Ordering::SeqCst)
    }

    /// Whether the indicator LED is lit.
    pub fn indicator_lit(&self) -> bool {
        self.shared.indicator.load(Ordering::SeqCst)
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
