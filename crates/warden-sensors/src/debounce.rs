//! Debounce for noisy GPIO inputs.
//!
//! The sensor lines pick up spikes from mains appliances switching on. A
//! spike produces an edge but the level does not hold, so an edge is only
//! believed if a run of consecutive samples all read the expected level.

use std::time::Duration;

use tracing::trace;

use warden_core::constants::{DEBOUNCE_INTERVAL_US, DEBOUNCE_SAMPLES};
use warden_hardware::GpioPin;

/// How many samples to take and how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindow {
    pub samples: u32,
    pub interval: Duration,
}

impl DebounceWindow {
    pub fn new(samples: u32, interval: Duration) -> Self {
        Self { samples, interval }
    }
}

impl Default for DebounceWindow {
    fn default() -> Self {
        Self {
            samples: DEBOUNCE_SAMPLES,
            interval: Duration::from_micros(DEBOUNCE_INTERVAL_US),
        }
    }
}

/// Sample `pin` across `window` and report whether every sample equals
/// `target`.
///
/// A failed read counts as disagreement. The sleep between samples uses the
/// runtime timer, so intervals below a millisecond are rounded up to its
/// resolution.
pub async fn debounce<P: GpioPin>(pin: &P, target: bool, window: DebounceWindow) -> bool {
    for sample in 0..window.samples {
        if sample > 0 {
            tokio::time::sleep(window.interval).await;
        }

        match pin.level() {
            Ok(level) if level == target => {}
            Ok(level) => {
                trace!(pin = pin.number(), sample, level, target, "Debounce sample disagrees");
                return false;
            }
            Err(e) => {
                trace!(pin = pin.number(), sample, error = %e, "Debounce sample unreadable");
                return false;
            }
        }
    }
    true
}
