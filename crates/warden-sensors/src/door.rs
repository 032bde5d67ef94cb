//! Magnetic door contact.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use warden_hardware::{EdgeKind, GpioPin};

use crate::debounce::{DebounceWindow, debounce};
use crate::event::{SensorCallback, SensorEvent};

/// A reed switch on one GPIO pin. High means closed.
pub struct DoorSensor<P: GpioPin> {
    pin: P,
    location: String,
    window: DebounceWindow,
}

impl<P: GpioPin> DoorSensor<P> {
    pub fn new(pin: P, location: impl Into<String>) -> Self {
        Self {
            pin,
            location: location.into(),
            window: DebounceWindow::default(),
        }
    }

    pub fn with_window(mut self, window: DebounceWindow) -> Self {
        self.window = window;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Report confirmed open/close changes until `cancel` fires.
    ///
    /// The level read at start is taken as the confirmed position. After
    /// that, an edge only counts if the new level differs from the confirmed
    /// one and holds for the whole debounce window.
    ///
    /// # Errors
    ///
    /// Returns the pin error from the initial read or from edge detection.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        on_event: SensorCallback,
    ) -> warden_hardware::Result<()> {
        let pin = self.pin.number();
        let mut closed = self.pin.level()?;
        info!(pin, location = %self.location, open = !closed, "Door sensor ready");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                edge = self.pin.wait_for_edge(EdgeKind::Both) => {
                    edge?;

                    let level = match self.pin.level() {
                        Ok(level) => level,
                        Err(e) => {
                            debug!(pin, error = %e, "Door level unreadable after edge");
                            continue;
                        }
                    };
                    if level == closed {
                        continue;
                    }

                    if debounce(&self.pin, level, self.window).await {
                        closed = level;
                        info!(pin, location = %self.location, open = !closed, "Door changed");
                        on_event(SensorEvent::Door {
                            location: self.location.clone(),
                            open: !closed,
                        });
                    } else {
                        debug!(pin, location = %self.location, "Ignoring noise on door sensor");
                    }
                }
            }
        }
    }
}
