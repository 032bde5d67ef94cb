//! GPIO input pins backed by the sysfs interface.
//!
//! Each pin reads `<root>/gpioN/value` (`"0\n"` or `"1\n"`). Edges are detected
//! by polling the value file every [`GPIO_POLL_INTERVAL_MS`] milliseconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace};
use warden_core::constants::GPIO_POLL_INTERVAL_MS;

use crate::{HardwareError, Result, traits::GpioPin, types::EdgeKind};

/// Default sysfs GPIO class directory.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// A GPIO input pin read through sysfs.
#[derive(Debug)]
pub struct SysfsPin {
    number: u8,
    value_path: PathBuf,
    poll_interval: Duration,
    last_level: Option<bool>,
}

impl SysfsPin {
    /// Open pin `number` under the default sysfs root, exporting it as an
    /// input if it is not exported yet.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the pin cannot be exported or configured.
    pub fn open(number: u8) -> Result<Self> {
        Self::open_in(SYSFS_GPIO_ROOT, number)
    }

    /// Open pin `number` under `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the pin cannot be exported or configured.
    pub fn open_in(root: impl AsRef<Path>, number: u8) -> Result<Self> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{number}"));

        if !pin_dir.exists() {
            debug!(pin = number, "Exporting GPIO pin");
            std::fs::write(root.join("export"), number.to_string())?;
        }

        let direction = pin_dir.join("direction");
        if direction.exists() {
            std::fs::write(direction, "in")?;
        }

        Ok(Self {
            number,
            value_path: pin_dir.join("value"),
            poll_interval: Duration::from_millis(GPIO_POLL_INTERVAL_MS),
            last_level: None,
        })
    }

    /// Override the edge polling period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn parse_level(raw: &str) -> Result<bool> {
    match raw.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(HardwareError::invalid_data(format!(
            "unexpected GPIO value {other:?}"
        ))),
    }
}

impl GpioPin for SysfsPin {
    fn number(&self) -> u8 {
        self.number
    }

    fn level(&self) -> Result<bool> {
        parse_level(&std::fs::read_to_string(&self.value_path)?)
    }

    async fn wait_for_edge(&mut self, kind: EdgeKind) -> Result<()> {
        let mut previous = match self.last_level {
            Some(level) => level,
            None => self.level()?,
        };
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let current = self.level()?;
            self.last_level = Some(current);

            if kind.matches(previous, current) {
                trace!(pin = self.number, previous, current, "GPIO edge");
                return Ok(());
            }
            previous = current;
        }
    }

    fn clear_edges(&mut self) -> Result<()> {
        self.last_level = Some(self.level()?);
        Ok(())
    }
}
