//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn KeypadDevice>` is not available. The enums below give the
//! listener tasks one concrete type to hold whether they run against real
//! Linux devices or against mocks.
//!
//! # Examples
//!
//! ```
//! use warden_hardware::devices::AnyGpioPin;
//! use warden_hardware::mock::MockPin;
//! use warden_hardware::traits::GpioPin;
//!
//! let (pin, _handle) = MockPin::new(22, true);
//! let pin = AnyGpioPin::Mock(pin);
//! assert_eq!(pin.number(), 22);
//! ```

use crate::evdev::EvdevKeypad;
use crate::mock::{MockKeypad, MockPin};
use crate::sysfs::SysfsPin;
use crate::traits::{GpioPin, KeypadDevice};
use crate::types::{DeviceInfo, EdgeKind, KeyEvent};
use crate::Result;

/// Enum wrapper for keypad device dispatch.
///
/// # Examples
///
/// ```
/// use warden_hardware::devices::AnyKeypadDevice;
/// use warden_hardware::traits::KeypadDevice;
/// use warden_hardware::mock::MockKeypad;
///
/// #[tokio::main]
/// async fn main() -> warden_hardware::Result<()> {
///     let (keypad, _handle) = MockKeypad::new();
///     let any_keypad = AnyKeypadDevice::Mock(keypad);
///
///     let info = any_keypad.get_info().await?;
///     assert_eq!(info.name, "Mock Keypad");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeypadDevice {
    /// Mock keypad for development and testing.
    Mock(MockKeypad),

    /// Linux input device.
    Evdev(EvdevKeypad),
}

impl KeypadDevice for AnyKeypadDevice {
    async fn grab(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.grab().await,
            Self::Evdev(device) => device.grab().await,
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.release().await,
            Self::Evdev(device) => device.release().await,
        }
    }

    async fn read_event(&mut self) -> Result<KeyEvent> {
        match self {
            Self::Mock(device) => device.read_event().await,
            Self::Evdev(device) => device.read_event().await,
        }
    }

    async fn set_indicator(&mut self, lit: bool) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_indicator(lit).await,
            Self::Evdev(device) => device.set_indicator(lit).await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(device) => device.get_info().await,
            Self::Evdev(device) => device.get_info().await,
        }
    }
}

/// Enum wrapper for GPIO pin dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyGpioPin {
    /// Mock pin for development and testing.
    Mock(MockPin),

    /// sysfs-backed pin.
    Sysfs(SysfsPin),
}

impl GpioPin for AnyGpioPin {
    fn number(&self) -> u8 {
        match self {
            Self::Mock(pin) => pin.number(),
            Self::Sysfs(pin) => pin.number(),
        }
    }

    fn level(&self) -> Result<bool> {
        match self {
            Self::Mock(pin) => pin.level(),
            Self::Sysfs(pin) => pin.level(),
        }
    }

    async fn wait_for_edge(&mut self, kind: EdgeKind) -> Result<()> {
        match self {
            Self::Mock(pin) => pin.wait_for_edge(kind).await,
            Self::Sysfs(pin) => pin.wait_for_edge(kind).await,
        }
    }

    fn clear_edges(&mut self) -> Result<()> {
        match self {
            Self::Mock(pin) => pin.clear_edges(),
            Self::Sysfs(pin) => pin.clear_edges(),
        }
    }
}
