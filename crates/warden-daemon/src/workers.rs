//! Listener wiring.
//!
//! [`Workers::prepare`] does every fallible step (opening GPIO pins, building
//! the keypad processor) before anything runs, so a bad pin leaves no task
//! behind and no secret pipe on disk. [`Workers::spawn`] cannot fail.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use warden_core::constants::GPIO_POLL_INTERVAL_MS;
use warden_core::{Error, Result};
use warden_hardware::devices::{AnyGpioPin, AnyKeypadDevice};
use warden_hardware::sysfs::SysfsPin;
use warden_keypad::{KeypadConfig, KeypadInbox, KeypadProcessor};
use warden_sensors::{DoorSensor, MotionSensor};

use crate::config::SensorPin;
use crate::{AlarmSystem, Collaborators, Config, SecretListener, Supervisor};

/// Every listener the daemon runs, ready to spawn.
pub struct Workers {
    keypad: KeypadProcessor<AnyKeypadDevice>,
    secret: SecretListener,
    motion: Vec<(u8, MotionSensor<AnyGpioPin>)>,
    door: Vec<(u8, DoorSensor<AnyGpioPin>)>,
}

impl Workers {
    /// Build every listener without starting any of them.
    ///
    /// # Errors
    ///
    /// Returns `Error::Hardware` naming the first GPIO pin that cannot be
    /// opened.
    pub fn prepare(
        config: &Config,
        alarm: &AlarmSystem,
        collaborators: &Collaborators,
        keypad: AnyKeypadDevice,
        inbox: KeypadInbox,
    ) -> Result<Self> {
        let root = config.sensors.gpio_root.as_path();

        let motion = config
            .sensors
            .motion
            .iter()
            .map(|sensor| -> Result<_> {
                let pin = open_pin(root, sensor)?;
                let motion = MotionSensor::new(pin, sensor.location.clone())
                    .with_window(config.debounce_window())
                    .with_warmup(config.motion_warmup());
                Ok((sensor.pin, motion))
            })
            .collect::<Result<Vec<_>>>()?;

        let door = config
            .sensors
            .door
            .iter()
            .map(|sensor| -> Result<_> {
                let pin = open_pin(root, sensor)?;
                let door =
                    DoorSensor::new(pin, sensor.location.clone()).with_window(config.debounce_window());
                Ok((sensor.pin, door))
            })
            .collect::<Result<Vec<_>>>()?;

        let keypad = KeypadProcessor::new(
            keypad,
            KeypadConfig::new(config.password.clone()).with_inactivity_reset(config.inactivity_reset()),
            alarm.dispatcher(),
            Arc::clone(&collaborators.sound),
            inbox,
        );

        let mut secret = SecretListener::new(
            &config.secret.pipe,
            config.secret.phrases.clone(),
            alarm.dispatcher(),
        )
        .with_poll_interval(config.secret_poll_interval());
        if config.secret.allow_speech {
            secret = secret.with_speaker(Arc::clone(&collaborators.speaker));
        }

        Ok(Self {
            keypad,
            secret,
            motion,
            door,
        })
    }

    /// Start every listener under `supervisor`.
    pub fn spawn(self, supervisor: &mut Supervisor, alarm: &Arc<AlarmSystem>) {
        let Self {
            keypad,
            secret,
            motion,
            door,
        } = self;

        let token = supervisor.token();
        supervisor.spawn("keypad", async move { Ok(keypad.run(token).await?) });

        let token = supervisor.token();
        supervisor.spawn("secret", secret.run(token));

        let (motion_count, door_count) = (motion.len(), door.len());

        for (pin, sensor) in motion {
            let token = supervisor.token();
            let callback = alarm.sensor_callback();
            supervisor.spawn(format!("motion-{pin}"), async move {
                Ok(sensor.run(token, callback).await?)
            });
        }

        for (pin, sensor) in door {
            let token = supervisor.token();
            let callback = alarm.sensor_callback();
            supervisor.spawn(format!("door-{pin}"), async move {
                Ok(sensor.run(token, callback).await?)
            });
        }

        info!(motion = motion_count, door = door_count, "Listeners started");
    }
}

fn open_pin(root: &Path, sensor: &SensorPin) -> Result<AnyGpioPin> {
    let pin = SysfsPin::open_in(root, sensor.pin)
        .map_err(|e| Error::Hardware(format!("GPIO{} ({}): {e}", sensor.pin, sensor.location)))?
        .with_poll_interval(Duration::from_millis(GPIO_POLL_INTERVAL_MS));
    Ok(AnyGpioPin::Sysfs(pin))
}
