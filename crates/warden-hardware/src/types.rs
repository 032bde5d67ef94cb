//! Common types shared across device implementations.
//!
//! This module defines raw keypad events, their decoded form, GPIO edge kinds
//! and device metadata.

use serde::{Deserialize, Serialize};

/// Linux `EV_KEY` event type.
pub const EV_KEY: u16 = 1;

/// `input_event.value` of a key press (0 is release, 2 is autorepeat).
pub const KEY_DOWN: i32 = 1;

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "usb-04d9_1203-event-kbd", "Mock Keypad").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Device node the driver reads from, if any.
    pub path: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            path: None,
        }
    }

    /// Set the device node path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Raw event from an input device, as delivered by evdev.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Event type (`EV_KEY` for keys).
    pub kind: u16,

    /// Scan code.
    pub code: u16,

    /// 1 for press, 0 for release, 2 for autorepeat.
    pub value: i32,
}

impl KeyEvent {
    /// A key-down event for `code`.
    pub fn press(code: u16) -> Self {
        Self {
            kind: EV_KEY,
            code,
            value: KEY_DOWN,
        }
    }

    /// A key-up event for `code`.
    pub fn release(code: u16) -> Self {
        Self {
            kind: EV_KEY,
            code,
            value: 0,
        }
    }

    /// Whether this event is a key press.
    pub fn is_key_down(&self) -> bool {
        self.kind == EV_KEY && self.value == KEY_DOWN
    }

    /// Decode the pressed key, ignoring releases, repeats and unmapped codes.
    pub fn key(&self) -> Option<Key> {
        if self.is_key_down() {
            Key::from_scan_code(self.code)
        } else {
            None
        }
    }
}

/// Control keys of the numeric keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    /// `NUML`: arm the alarm.
    Arm,

    /// `/`: clear the typed buffer.
    Clear,

    /// `BS`: delete the last typed character.
    Backspace,

    /// `ENTER`: submit the typed buffer as a password.
    Enter,
}

/// Volume keys of the numeric keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKey {
    /// `+`
    Up,

    /// `-`
    Down,

    /// `*`
    Mute,
}

/// A decoded keypad key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// `0`-`9` or `.`.
    Numeral(char),

    /// Arm, clear, backspace or enter.
    Control(ControlKey),

    /// Volume up, down or mute.
    Volume(VolumeKey),
}

impl Key {
    /// Map a numeric keypad scan code to a key.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_hardware::types::{ControlKey, Key};
    ///
    /// assert_eq!(Key::from_scan_code(79), Some(Key::Numeral('1')));
    /// assert_eq!(Key::from_scan_code(96), Some(Key::Control(ControlKey::Enter)));
    /// assert_eq!(Key::from_scan_code(30), None);
    /// ```
    pub fn from_scan_code(code: u16) -> Option<Self> {
        let key = match code {
            71 => Key::Numeral('7'),
            72 => Key::Numeral('8'),
            73 => Key::Numeral('9'),
            75 => Key::Numeral('4'),
            76 => Key::Numeral('5'),
            77 => Key::Numeral('6'),
            79 => Key::Numeral('1'),
            80 => Key::Numeral('2'),
            81 => Key::Numeral('3'),
            82 => Key::Numeral('0'),
            83 => Key::Numeral('.'),
            69 => Key::Control(ControlKey::Arm),
            98 => Key::Control(ControlKey::Clear),
            14 => Key::Control(ControlKey::Backspace),
            96 => Key::Control(ControlKey::Enter),
            78 => Key::Volume(VolumeKey::Up),
            74 => Key::Volume(VolumeKey::Down),
            55 => Key::Volume(VolumeKey::Mute),
            _ => return None,
        };
        Some(key)
    }

    /// Scan code that produces this key.
    ///
    /// Returns `None` for characters that are not on the keypad.
    pub fn scan_code(&self) -> Option<u16> {
        let code = match self {
            Key::Numeral('7') => 71,
            Key::Numeral('8') => 72,
            Key::Numeral('9') => 73,
            Key::Numeral('4') => 75,
            Key::Numeral('5') => 76,
            Key::Numeral('6') => 77,
            Key::Numeral('1') => 79,
            Key::Numeral('2') => 80,
            Key::Numeral('3') => 81,
            Key::Numeral('0') => 82,
            Key::Numeral('.') => 83,
            Key::Numeral(_) => return None,
            Key::Control(ControlKey::Arm) => 69,
            Key::Control(ControlKey::Clear) => 98,
            Key::Control(ControlKey::Backspace) => 14,
            Key::Control(ControlKey::Enter) => 96,
            Key::Volume(VolumeKey::Up) => 78,
            Key::Volume(VolumeKey::Down) => 74,
            Key::Volume(VolumeKey::Mute) => 55,
        };
        Some(code)
    }
}

/// Which GPIO transitions a sensor listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Low to high.
    Rising,

    /// High to low.
    Falling,

    /// Either direction.
    Both,
}

impl EdgeKind {
    /// Whether a change from `previous` to `current` is an edge of this kind.
    pub fn matches(self, previous: bool, current: bool) -> bool {
        match self {
            EdgeKind::Rising => !previous && current,
            EdgeKind::Falling => previous && !current,
            EdgeKind::Both => previous != current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(71, '7')]
    #[case(72, '8')]
    #[case(73, '9')]
    #[case(75, '4')]
    #[case(76, '5')]
    #[case(77, '6')]
    #[case(79, '1')]
    #[case(80, '2')]
    #[case(81, '3')]
    #[case(82, '0')]
    #[case(83, '.')]
    fn test_numeral_scan_codes(#[case] code: u16, #[case] numeral: char) {
        let key = Key::from_scan_code(code).unwrap();
        assert_eq!(key, Key::Numeral(numeral));
        assert_eq!(key.scan_code(), Some(code));
    }

    #[rstest]
    #[case(69, Key::Control(ControlKey::Arm))]
    #[case(98, Key::Control(ControlKey::Clear))]
    #[case(14, Key::Control(ControlKey::Backspace))]
    #[case(96, Key::Control(ControlKey::Enter))]
    #[case(78, Key::Volume(VolumeKey::Up))]
    #[case(74, Key::Volume(VolumeKey::Down))]
    #[case(55, Key::Volume(VolumeKey::Mute))]
    fn test_control_and_volume_scan_codes(#[case] code: u16, #[case] key: Key) {
        assert_eq!(Key::from_scan_code(code), Some(key));
        assert_eq!(key.scan_code(), Some(code));
    }

    #[test]
    fn test_only_key_down_is_decoded() {
        assert_eq!(KeyEvent::press(82).key(), Some(Key::Numeral('0')));
        assert_eq!(KeyEvent::release(82).key(), None);

        let repeat = KeyEvent {
            value: 2,
            ..KeyEvent::press(82)
        };
        assert_eq!(repeat.key(), None);

        let sync = KeyEvent {
            kind: 0,
            code: 0,
            value: 0,
        };
        assert_eq!(sync.key(), None);
    }

    #[test]
    fn test_unmapped_numeral_has_no_scan_code() {
        assert_eq!(Key::Numeral('a').scan_code(), None);
    }

    #[rstest]
    #[case(EdgeKind::Rising, false, true, true)]
    #[case(EdgeKind::Rising, true, false, false)]
    #[case(EdgeKind::Falling, true, false, true)]
    #[case(EdgeKind::Falling, false, true, false)]
    #[case(EdgeKind::Both, false, true, true)]
    #[case(EdgeKind::Both, true, false, true)]
    #[case(EdgeKind::Both, true, true, false)]
    fn test_edge_matching(
        #[case] kind: EdgeKind,
        #[case] previous: bool,
        #[case] current: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(kind.matches(previous, current), expected);
    }
}
