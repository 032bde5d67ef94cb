//! Daemon configuration.
//!
//! Loaded once at startup from a TOML file and never reloaded. Every field
//! except the password has a default matching the stock appliance, so a
//! minimal file is just:
//!
//! ```toml
//! password = "5918462"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use warden_core::constants::{
    DEBOUNCE_INTERVAL_US, DEBOUNCE_SAMPLES, DEFAULT_KEYPAD_DEVICE, DEFAULT_SECRET_PIPE,
    DEFAULT_STATE_FILE, GRACE_PERIOD_SECS, KEYPAD_RESET_SECS, MOTION_WARMUP_SECS,
    PATH_WAIT_TIMEOUT_SECS, SECRET_POLL_INTERVAL_MS,
};
use warden_core::{Error, Password, Result, Signal};
use warden_hardware::sysfs::SYSFS_GPIO_ROOT;
use warden_sensors::DebounceWindow;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/warden/warden.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub password: Password,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    #[serde(default)]
    pub keypad: KeypadSection,

    #[serde(default)]
    pub secret: SecretSection,

    #[serde(default)]
    pub sensors: SensorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeypadSection {
    /// Input device node.
    pub device: PathBuf,

    /// How long to wait for `device` to appear at startup.
    pub wait_timeout_secs: u64,

    pub inactivity_reset_secs: u64,

    /// USB device id (as under `/sys/bus/usb/devices`) to reset before
    /// opening the keypad.
    pub usb_reset: Option<String>,
}

impl Default for KeypadSection {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_KEYPAD_DEVICE),
            wait_timeout_secs: PATH_WAIT_TIMEOUT_SECS,
            inactivity_reset_secs: KEYPAD_RESET_SECS,
            usb_reset: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretSection {
    /// Named pipe path.
    pub pipe: PathBuf,

    /// How often to check that the pipe still exists.
    pub poll_interval_ms: u64,

    /// Forward `say <text>` lines to the speaker.
    pub allow_speech: bool,

    /// Phrase to signal table.
    pub phrases: BTreeMap<String, Signal>,
}

impl Default for SecretSection {
    fn default() -> Self {
        let phrases = [
            ("dynamoHum", Signal::Disarm),
            ("zombyWoof", Signal::Arm),
            ("imTheSlime", Signal::InstantArm),
        ]
        .into_iter()
        .map(|(phrase, signal)| (phrase.to_string(), signal))
        .collect();

        Self {
            pipe: PathBuf::from(DEFAULT_SECRET_PIPE),
            poll_interval_ms: SECRET_POLL_INTERVAL_MS,
            allow_speech: true,
            phrases,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorSection {
    /// sysfs GPIO class directory the pins live under.
    pub gpio_root: PathBuf,
    pub warmup_secs: u64,
    pub debounce_samples: u32,
    pub debounce_interval_us: u64,
    pub motion: Vec<SensorPin>,
    pub door: Vec<SensorPin>,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            gpio_root: PathBuf::from(SYSFS_GPIO_ROOT),
            warmup_secs: MOTION_WARMUP_SECS,
            debounce_samples: DEBOUNCE_SAMPLES,
            debounce_interval_us: DEBOUNCE_INTERVAL_US,
            motion: Vec::new(),
            door: Vec::new(),
        }
    }
}

/// One sensor wired to a GPIO pin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorPin {
    pub pin: u8,
    pub location: String,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_grace_period() -> u64 {
    GRACE_PERIOD_SECS
}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// it does not parse or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.grace_period_secs == 0 {
            return Err(Error::config("grace_period_secs must be at least 1"));
        }
        if self.sensors.debounce_samples == 0 {
            return Err(Error::config("sensors.debounce_samples must be at least 1"));
        }
        if self.secret.poll_interval_ms == 0 {
            return Err(Error::config("secret.poll_interval_ms must be at least 1"));
        }

        if let Some((phrase, signal)) = self
            .secret
            .phrases
            .iter()
            .find(|(_, signal)| !signal.is_operator_command())
        {
            return Err(Error::config(format!(
                "secret phrase {phrase:?} maps to {signal:?}; only arm, instant_arm and disarm are allowed"
            )));
        }
        if self.secret.phrases.keys().any(|phrase| phrase.trim().is_empty()) {
            return Err(Error::config("secret phrases must not be blank"));
        }

        let mut pins = HashSet::new();
        for sensor in self.sensors.motion.iter().chain(&self.sensors.door) {
            if !pins.insert(sensor.pin) {
                return Err(Error::config(format!(
                    "GPIO{} is assigned to more than one sensor",
                    sensor.pin
                )));
            }
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn inactivity_reset(&self) -> Duration {
        Duration::from_secs(self.keypad.inactivity_reset_secs)
    }

    pub fn keypad_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.keypad.wait_timeout_secs)
    }

    pub fn secret_poll_interval(&self) -> Duration {
        Duration::from_millis(self.secret.poll_interval_ms)
    }

    pub fn motion_warmup(&self) -> Duration {
        Duration::from_secs(self.sensors.warmup_secs)
    }

    pub fn debounce_window(&self) -> DebounceWindow {
        DebounceWindow::new(
            self.sensors.debounce_samples,
            Duration::from_micros(self.sensors.debounce_interval_us),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FULL: &str = r#"
password = "1234"
state_file = "/tmp/warden-state.yaml"
grace_period_secs = 45

[keypad]
device = "/dev/input/event3"
wait_timeout_secs = 10
inactivity_reset_secs = 20
usb_reset = "1-1"

[secret]
pipe = "/run/warden/secret"
poll_interval_ms = 250
allow_speech = false

[secret.phrases]
openSesame = "disarm"

[sensors]
gpio_root = "/tmp/gpio"
warmup_secs = 5
debounce_samples = 4
debounce_interval_us = 200

[[sensors.motion]]
pin = 5
location = "hall"

[[sensors.door]]
pin = 22
location = "front door"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(r#"password = "5918462""#).unwrap();

        assert!(config.password.matches("5918462"));
        assert_eq!(config.state_file, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(config.grace_period(), Duration::from_secs(GRACE_PERIOD_SECS));
        assert_eq!(config.keypad.device, PathBuf::from(DEFAULT_KEYPAD_DEVICE));
        assert_eq!(config.keypad.usb_reset, None);
        assert_eq!(config.secret.pipe, PathBuf::from(DEFAULT_SECRET_PIPE));
        assert_eq!(config.secret.phrases.get("zombyWoof"), Some(&Signal::Arm));
        assert_eq!(config.secret.phrases.get("dynamoHum"), Some(&Signal::Disarm));
        assert_eq!(config.secret.phrases.get("imTheSlime"), Some(&Signal::InstantArm));
        assert_eq!(config.debounce_window(), DebounceWindow::default());
        assert!(config.sensors.motion.is_empty());
        assert_eq!(config.sensors.gpio_root, PathBuf::from(SYSFS_GPIO_ROOT));
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(config.grace_period_secs, 45);
        assert_eq!(config.sensors.gpio_root, PathBuf::from("/tmp/gpio"));
        assert_eq!(config.keypad.usb_reset.as_deref(), Some("1-1"));
        assert_eq!(config.inactivity_reset(), Duration::from_secs(20));
        assert_eq!(config.secret_poll_interval(), Duration::from_millis(250));
        assert!(!config.secret.allow_speech);
        assert_eq!(config.secret.phrases.len(), 1);
        assert_eq!(
            config.debounce_window(),
            DebounceWindow::new(4, Duration::from_micros(200))
        );
        assert_eq!(
            config.sensors.door,
            vec![SensorPin {
                pin: 22,
                location: "front door".into()
            }]
        );
    }

    #[rstest]
    #[case::missing_password("grace_period_secs = 30")]
    #[case::empty_password(r#"password = """#)]
    #[case::letters_in_password(r#"password = "12ab""#)]
    #[case::zero_grace("password = \"1\"\ngrace_period_secs = 0")]
    #[case::zero_samples("password = \"1\"\n[sensors]\ndebounce_samples = 0")]
    #[case::timeout_phrase("password = \"1\"\n[secret.phrases]\nsneaky = \"timeout\"")]
    #[case::trigger_phrase("password = \"1\"\n[secret.phrases]\nsneaky = \"trigger\"")]
    #[case::unknown_signal("password = \"1\"\n[secret.phrases]\nsneaky = \"explode\"")]
    #[case::unknown_key("password = \"1\"\nsiren = true")]
    #[case::duplicate_pin(
        "password = \"1\"\n[[sensors.motion]]\npin = 5\nlocation = \"a\"\n[[sensors.door]]\npin = 5\nlocation = \"b\""
    )]
    fn test_invalid_config_rejected(#[case] content: &str) {
        assert!(matches!(Config::from_toml(content), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::from_file(Path::new("/nonexistent/warden.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
