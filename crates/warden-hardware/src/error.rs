//! Error types for hardware operations.
//!
//! This module defines error types specific to device operations: keypad and
//! GPIO disconnection, exclusive-grab contention, timeouts and malformed
//! input frames.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device is held exclusively by another process.
    #[error("Device busy: {device}")]
    Busy { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Operation is not supported by this device.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new busy error.
    pub fn busy(device: impl Into<String>) -> Self {
        Self::Busy {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Timeout { .. })
    }
}

impl From<HardwareError> for warden_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Io(io) => warden_core::Error::Io(io),
            other => warden_core::Error::Hardware(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("usb-04d9_1203-event-kbd");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(
            error.to_string(),
            "Device disconnected: usb-04d9_1203-event-kbd"
        );
    }

    #[test]
    fn test_busy_error_is_transient() {
        let error = HardwareError::busy("/dev/input/event0");
        assert!(error.is_transient());
        assert_eq!(error.to_string(), "Device busy: /dev/input/event0");
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(3000);
        assert!(error.is_transient());
        assert_eq!(error.to_string(), "Operation timeout after 3000ms");
    }

    #[test]
    fn test_invalid_data_is_not_transient() {
        let error = HardwareError::invalid_data("short input_event frame");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_conversion_into_core_error() {
        let core: warden_core::Error = HardwareError::disconnected("keypad").into();
        assert!(matches!(core, warden_core::Error::Hardware(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let core: warden_core::Error = HardwareError::Io(io).into();
        assert!(matches!(core, warden_core::Error::Io(_)));
    }
}
