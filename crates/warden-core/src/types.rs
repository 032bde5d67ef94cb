use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Abstract event fed into the alarm state machine.
///
/// Signals carry no payload and are not tied to a hardware source: the keypad,
/// the secret channel, the sensors and the countdown timers all produce the
/// same five values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Arm,
    InstantArm,
    Disarm,
    Timeout,
    Trigger,
}

impl Signal {
    /// Number of signals, used to size the transition table.
    pub const COUNT: usize = 5;

    /// Every signal, in index order.
    pub const ALL: [Signal; Self::COUNT] = [
        Signal::Arm,
        Signal::InstantArm,
        Signal::Disarm,
        Signal::Timeout,
        Signal::Trigger,
    ];

    /// Column of this signal in the transition table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode a raw signal code.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not a valid signal. A raw code outside the closed
    /// enumeration means the signal table itself is corrupt; the alarm must not
    /// keep running with it.
    pub fn from_code(code: u8) -> Self {
        match Self::ALL.get(usize::from(code)) {
            Some(signal) => *signal,
            None => panic!("illegal signal code {code}"),
        }
    }

    /// Signals an operator may send from outside the appliance.
    pub fn is_operator_command(self) -> bool {
        matches!(self, Signal::Arm | Signal::InstantArm | Signal::Disarm)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Arm => "ARM",
            Signal::InstantArm => "INSTANT_ARM",
            Signal::Disarm => "DISARM",
            Signal::Timeout => "TIMEOUT",
            Signal::Trigger => "TRIGGER",
        };
        f.write_str(name)
    }
}

/// Discrete operating mode of the alarm.
///
/// The persisted name of each state is its camelCase identifier (`disarmed`,
/// `disarmedCountdown`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlarmState {
    /// Sensors ignored, nothing to type on the keypad.
    Disarmed,

    /// Arming grace period; expires into `Armed`.
    DisarmedCountdown,

    /// Sensors live.
    Armed,

    /// Intrusion detected; expires into `Triggered` unless disarmed.
    ArmedCountdown,

    /// Alarm sounding, intruder alert sent.
    Triggered,
}

impl AlarmState {
    /// Number of states, used to size the transition table.
    pub const COUNT: usize = 5;

    /// Every state, in index order.
    pub const ALL: [AlarmState; Self::COUNT] = [
        AlarmState::Disarmed,
        AlarmState::DisarmedCountdown,
        AlarmState::Armed,
        AlarmState::ArmedCountdown,
        AlarmState::Triggered,
    ];

    /// Row of this state in the transition table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used in the persisted state record and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            AlarmState::Disarmed => "disarmed",
            AlarmState::DisarmedCountdown => "disarmedCountdown",
            AlarmState::Armed => "armed",
            AlarmState::ArmedCountdown => "armedCountdown",
            AlarmState::Triggered => "triggered",
        }
    }

    /// States in which intrusion sensors are live.
    pub fn is_armed_family(self) -> bool {
        matches!(
            self,
            AlarmState::Armed | AlarmState::ArmedCountdown | AlarmState::Triggered
        )
    }

    /// Grace-period states that run a countdown.
    pub fn is_countdown(self) -> bool {
        matches!(
            self,
            AlarmState::DisarmedCountdown | AlarmState::ArmedCountdown
        )
    }

    /// Sound played while this state is current.
    pub fn sound(self) -> SoundId {
        match self {
            AlarmState::Disarmed => SoundId::Disarmed,
            AlarmState::DisarmedCountdown => SoundId::DisarmedCountdown,
            AlarmState::Armed => SoundId::Armed,
            AlarmState::ArmedCountdown => SoundId::ArmedCountdown,
            AlarmState::Triggered => SoundId::Triggered,
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AlarmState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.name() == s)
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// Keypad password.
///
/// # Security
/// Comparison runs in constant time and `Debug` never prints the digits.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    /// Create a password from the configured string.
    ///
    /// # Errors
    /// Returns `Error::Config` if the password is empty or contains characters
    /// that cannot be typed on the numeric keypad (`0-9` and `.`).
    pub fn new(password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(Error::config("password must not be empty"));
        }
        if let Some(c) = password.chars().find(|c| !(c.is_ascii_digit() || *c == '.')) {
            return Err(Error::config(format!(
                "password contains {c:?}, which is not on the keypad"
            )));
        }
        Ok(Self(password.to_string()))
    }

    /// Exact-equality check against the typed buffer.
    pub fn matches(&self, typed: &str) -> bool {
        self.0.as_bytes().ct_eq(typed.as_bytes()).into()
    }

    /// Number of characters in the password.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; an empty password is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(****)")
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Password::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Sounds the audio collaborator knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundId {
    Disarmed,
    DisarmedCountdown,
    Armed,
    ArmedCountdown,
    Triggered,
    Door,
    NumKey,
    CtrlKey,
    WrongPassword,
    Backspace,
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundId::Disarmed => "disarmed",
            SoundId::DisarmedCountdown => "disarmed_countdown",
            SoundId::Armed => "armed",
            SoundId::ArmedCountdown => "armed_countdown",
            SoundId::Triggered => "triggered",
            SoundId::Door => "door",
            SoundId::NumKey => "num_key",
            SoundId::CtrlKey => "ctrl_key",
            SoundId::WrongPassword => "wrong_password",
            SoundId::Backspace => "backspace",
        };
        f.write_str(name)
    }
}
