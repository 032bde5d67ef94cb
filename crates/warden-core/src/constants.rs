//! Timing, audio and device constants for the alarm.
//!
//! These are the defaults the daemon falls back to when its configuration file
//! does not override them.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use warden_core::constants::*;
//!
//! let grace = Duration::from_secs(GRACE_PERIOD_SECS);
//! assert_eq!(grace.as_secs(), 30);
//! assert_eq!(DEBOUNCE_SAMPLES, 10);
//! ```

// ============================================================================
// State machine timing
// ============================================================================

/// Length of the arming and alarm grace periods, in seconds.
pub const GRACE_PERIOD_SECS: u64 = 30;

/// Maximum number of state transitions kept in the machine history.
///
/// One transition is a few dozen bytes; 100 entries covers days of normal
/// arm/disarm traffic.
pub const MAX_HISTORY_SIZE: usize = 100;

// ============================================================================
// Keypad
// ============================================================================

/// Inactivity period after which a half-typed password is discarded.
pub const KEYPAD_RESET_SECS: u64 = 30;

/// Attempts made to grab the keypad exclusively before giving up.
pub const KEYPAD_GRAB_ATTEMPTS: u32 = 3;

/// Delay before the second grab attempt; doubled after every failure.
pub const KEYPAD_GRAB_BACKOFF_MS: u64 = 250;

/// Default keypad device node.
pub const DEFAULT_KEYPAD_DEVICE: &str = "/dev/input/by-id/usb-04d9_1203-event-kbd";

/// How long to wait for a device node (keypad, USB-backed sensors) to appear.
pub const PATH_WAIT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Audio
// ============================================================================

/// Volume change applied by the `+` and `-` keys.
pub const VOLUME_STEP: u8 = 10;

/// Maximum audio volume.
pub const MAX_VOLUME: u8 = 100;

// ============================================================================
// Sensors
// ============================================================================

/// Delay before motion sensors are trusted after power-on.
pub const MOTION_WARMUP_SECS: u64 = 60;

/// Number of consecutive agreeing samples required by the debounce filter.
pub const DEBOUNCE_SAMPLES: u32 = 10;

/// Spacing between debounce samples, in microseconds.
pub const DEBOUNCE_INTERVAL_US: u64 = 100;

/// Polling period used to detect edges on sysfs GPIO pins.
pub const GPIO_POLL_INTERVAL_MS: u64 = 5;

// ============================================================================
// Secret channel
// ============================================================================

/// Default path of the secret command FIFO.
pub const DEFAULT_SECRET_PIPE: &str = "/tmp/secret";

/// Permissions of the secret FIFO (world-writable).
pub const SECRET_PIPE_MODE: u32 = 0o777;

/// How often the secret channel checks that its FIFO still exists.
pub const SECRET_POLL_INTERVAL_MS: u64 = 500;

/// Longest secret channel line kept, in bytes. Longer lines are discarded.
pub const SECRET_LINE_MAX_LEN: usize = 256;

/// Prefix of secret channel lines forwarded to text-to-speech.
pub const SPEECH_COMMAND_PREFIX: &str = "say ";

// ============================================================================
// Persistence
// ============================================================================

/// Default location of the persisted state record.
pub const DEFAULT_STATE_FILE: &str = "/var/lib/warden/state.yaml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_window_is_short() {
        // The whole window must stay far below a human-visible delay.
        let window_us = u64::from(DEBOUNCE_SAMPLES) * DEBOUNCE_INTERVAL_US;
        assert!(window_us < 50_000);
    }

    #[test]
    fn test_volume_step_divides_range() {
        assert_eq!(MAX_VOLUME % VOLUME_STEP, 0);
    }
}
