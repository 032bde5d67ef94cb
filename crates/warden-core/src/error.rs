use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // State errors
    #[error("Unknown state name: {0:?}")]
    UnknownState(String),

    #[error("State persistence failed for {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("State machine action failed: {0}")]
    Action(String),

    // Hardware errors
    #[error("Device not found: {path} (waited {waited_secs}s)")]
    DeviceNotFound { path: PathBuf, waited_secs: u64 },

    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a persistence error for the record at `path`.
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error for a failed entry/exit action.
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
