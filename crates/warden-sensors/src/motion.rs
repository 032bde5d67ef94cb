//! Passive infrared motion sensor.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use warden_core::constants::MOTION_WARMUP_SECS;
use warden_hardware::{EdgeKind, GpioPin};

use crate::debounce::{DebounceWindow, debounce};
use crate::event::{SensorCallback, SensorEvent};

/// A PIR sensor on one GPIO pin. The output goes high on movement.
pub struct MotionSensor<P: GpioPin> {
    pin: P,
    location: String,
    window: DebounceWindow,
    warmup: Duration,
}

impl<P: GpioPin> MotionSensor<P> {
    pub fn new(pin: P, location: impl Into<String>) -> Self {
        Self {
            pin,
            location: location.into(),
            window: DebounceWindow::default(),
            warmup: Duration::from_secs(MOTION_WARMUP_SECS),
        }
    }

    pub fn with_window(mut self, window: DebounceWindow) -> Self {
        self.window = window;
        self
    }

    /// PIR modules report garbage until they have settled after power-up.
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Wait out the warm-up, then report confirmed rising edges until
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the pin error that stopped edge detection.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        on_event: SensorCallback,
    ) -> warden_hardware::Result<()> {
        let pin = self.pin.number();
        debug!(pin, location = %self.location, warmup_secs = self.warmup.as_secs(), "Motion sensor warming up");

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(self.warmup) => {}
        }
        // Power-on transients during the warm-up must not count as motion.
        self.pin.clear_edges()?;
        info!(pin, location = %self.location, "Motion sensor ready");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                edge = self.pin.wait_for_edge(EdgeKind::Rising) => {
                    edge?;
                    if debounce(&self.pin, true, self.window).await {
                        info!(pin, location = %self.location, "Motion detected");
                        on_event(SensorEvent::Motion {
                            location: self.location.clone(),
                        });
                    } else {
                        debug!(pin, location = %self.location, "Ignoring noise on motion sensor");
                    }
                }
            }
        }
    }
}
