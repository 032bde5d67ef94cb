//! Persisted state record.
//!
//! The machine restores its current state from a [`StateStore`] at startup and
//! writes the new state name back after every committed transition. On disk
//! the record is a one-key YAML document:
//!
//! ```yaml
//! state: armedCountdown
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_core::{AlarmState, Error, Result};

/// Durable storage for the machine's current state.
pub trait StateStore: Send + Sync {
    /// Read the persisted state.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownState` if the record names a state that does not
    /// exist, or `Error::Persistence` if it is missing or unreadable.
    fn load(&self) -> Result<AlarmState>;

    /// Persist `state`, replacing the previous record.
    fn save(&self, state: AlarmState) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    state: String,
}

/// YAML state file.
///
/// Writes go to a sibling temporary file that is synced and then renamed over
/// the record, so a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct YamlStateFile {
    path: PathBuf,
}

impl YamlStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persistence_error(&self, message: impl ToString) -> Error {
        Error::persistence(&self.path, message.to_string())
    }
}

impl StateStore for YamlStateFile {
    fn load(&self) -> Result<AlarmState> {
        let raw = fs::read_to_string(&self.path).map_err(|e| self.persistence_error(e))?;
        let record: Record = serde_yaml::from_str(&raw).map_err(|e| self.persistence_error(e))?;
        record.state.parse()
    }

    fn save(&self, state: AlarmState) -> Result<()> {
        let record = Record {
            state: state.name().to_string(),
        };
        let yaml = serde_yaml::to_string(&record).map_err(|e| self.persistence_error(e))?;

        let temp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(yaml.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp, &self.path)
        };
        write().map_err(|e| self.persistence_error(e))?;

        debug!(path = %self.path.display(), state = %state, "Persisted state");
        Ok(())
    }
}

/// In-memory store that records every save.
///
/// Clones share the same record, so a test can keep one clone to inspect what
/// the machine persisted.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<MemoryRecord>>,
}

#[derive(Debug)]
struct MemoryRecord {
    current: Option<AlarmState>,
    saves: Vec<AlarmState>,
    failing: bool,
}

impl MemoryStateStore {
    /// A store holding `initial`.
    pub fn new(initial: AlarmState) -> Self {
        Self::from_record(Some(initial))
    }

    /// A store with no record; `load` fails.
    pub fn missing() -> Self {
        Self::from_record(None)
    }

    fn from_record(current: Option<AlarmState>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryRecord {
                current,
                saves: Vec::new(),
                failing: false,
            })),
        }
    }

    /// Make subsequent saves fail.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Every state passed to a successful `save`, in order.
    pub fn saves(&self) -> Vec<AlarmState> {
        self.lock().saves.clone()
    }

    /// The currently persisted state.
    pub fn current(&self) -> Option<AlarmState> {
        self.lock().current
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRecord> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<AlarmState> {
        self.lock()
            .current
            .ok_or_else(|| Error::persistence("<memory>", "no state recorded"))
    }

    fn save(&self, state: AlarmState) -> Result<()> {
        let mut record = self.lock();
        if record.failing {
            return Err(Error::persistence("<memory>", "store unavailable"));
        }
        record.current = Some(state);
        record.saves.push(state);
        Ok(())
    }
}
