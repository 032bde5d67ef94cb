//! Secret channel: a named pipe that accepts passphrases.
//!
//! Anyone who can write to the pipe (typically over an SSH session) can arm
//! or disarm the alarm by echoing a known phrase into it:
//!
//! ```text
//! $ echo zombyWoof > /tmp/secret
//! ```
//!
//! Unknown phrases are dropped silently and nothing is ever written back.
//! Lines longer than [`SECRET_LINE_MAX_LEN`] bytes are discarded unread.

use std::collections::HashMap;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tokio::net::unix::pipe;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use warden_core::constants::{
    SECRET_LINE_MAX_LEN, SECRET_PIPE_MODE, SECRET_POLL_INTERVAL_MS, SPEECH_COMMAND_PREFIX,
};
use warden_core::{Result, Signal};
use warden_fsm::Dispatcher;
use warden_hardware::Speaker;

/// Make sure a FIFO with exactly `mode` permissions exists at `path`.
///
/// A regular file (or anything else that is not a FIFO) in the way is
/// replaced. A FIFO with the wrong permissions is fixed in place.
///
/// # Errors
///
/// Returns an I/O error if the path cannot be inspected, removed or created.
pub fn ensure_fifo(path: &Path, mode: u32) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => {
            if meta.permissions().mode() & 0o7777 != mode {
                debug!(path = %path.display(), mode = format_args!("{mode:o}"), "Fixing secret pipe mode");
                fs::set_permissions(path, Permissions::from_mode(mode))?;
            }
            Ok(())
        }
        Ok(_) => {
            warn!(path = %path.display(), "Replacing non-FIFO file at secret pipe path");
            fs::remove_file(path)?;
            create_fifo(path, mode)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_fifo(path, mode),
        Err(e) => Err(e),
    }
}

fn create_fifo(path: &Path, mode: u32) -> io::Result<()> {
    mkfifo(path, Mode::from_bits_truncate(mode)).map_err(io::Error::from)?;
    // mkfifo is subject to the umask.
    fs::set_permissions(path, Permissions::from_mode(mode))
}

/// Device and inode of the FIFO at `path`, or `None` if there is no FIFO.
fn fifo_identity(path: &Path) -> Option<(u64, u64)> {
    fs::symlink_metadata(path)
        .ok()
        .filter(|meta| meta.file_type().is_fifo())
        .map(|meta| (meta.dev(), meta.ino()))
}

/// The open read end of the FIFO, split into bounded lines.
struct OpenPipe {
    lines: FramedRead<pipe::Receiver, LinesCodec>,
    identity: (u64, u64),
}

impl OpenPipe {
    /// Open the FIFO for reading without waiting for a writer.
    ///
    /// Opening read-write keeps a writer on the pipe ourselves, so the reader
    /// never sees end-of-file when a client disconnects.
    fn open(path: &Path) -> io::Result<Self> {
        let file = fs::OpenOptions::new().read(true).write(true).open(path)?;
        let meta = file.metadata()?;
        let receiver = pipe::Receiver::from_file(file)?;

        Ok(Self {
            lines: FramedRead::new(receiver, LinesCodec::new_with_max_length(SECRET_LINE_MAX_LEN)),
            identity: (meta.dev(), meta.ino()),
        })
    }

    /// Whether `path` still names the FIFO this end was opened on.
    fn is_current(&self, path: &Path) -> bool {
        fifo_identity(path) == Some(self.identity)
    }
}

/// Listener on the secret pipe.
pub struct SecretListener {
    path: PathBuf,
    mode: u32,
    poll_interval: Duration,
    phrases: HashMap<String, Signal>,
    dispatcher: Dispatcher,
    speaker: Option<Arc<dyn Speaker>>,
}

impl SecretListener {
    pub fn new(
        path: impl Into<PathBuf>,
        phrases: impl IntoIterator<Item = (String, Signal)>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            path: path.into(),
            mode: SECRET_PIPE_MODE,
            poll_interval: Duration::from_millis(SECRET_POLL_INTERVAL_MS),
            phrases: phrases.into_iter().collect(),
            dispatcher,
            speaker: None,
        }
    }

    /// Forward `say <text>` lines to `speaker`.
    pub fn with_speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// How often to check that the pipe has not been deleted.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve the pipe until `cancel` fires, then remove it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the pipe cannot be created or read.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let result = self.serve(&cancel).await;

        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed secret pipe"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove secret pipe"),
        }

        result
    }

    async fn serve(&self, cancel: &CancellationToken) -> Result<()> {
        ensure_fifo(&self.path, self.mode)?;
        let mut pipe = OpenPipe::open(&self.path)?;
        info!(path = %self.path.display(), "Secret pipe listening");

        let mut watch = tokio::time::interval(self.poll_interval);
        watch.set_missed_tick_behavior(MissedTickBehavior::Skip);
        watch.tick().await;

        // The line stream yields one `None` after each decode error.
        let mut after_error = false;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                _ = watch.tick() => {
                    if !pipe.is_current(&self.path) {
                        warn!(path = %self.path.display(), "Secret pipe deleted or replaced, recreating");
                        ensure_fifo(&self.path, self.mode)?;
                        pipe = OpenPipe::open(&self.path)?;
                        after_error = false;
                    }
                }

                line = pipe.lines.next() => match line {
                    Some(Ok(line)) => {
                        after_error = false;
                        self.handle_line(&line);
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        after_error = true;
                        warn!(max_len = SECRET_LINE_MAX_LEN, "Secret pipe line too long, discarded");
                    }
                    Some(Err(LinesCodecError::Io(e))) if e.kind() == io::ErrorKind::InvalidData => {
                        after_error = true;
                        debug!("Secret pipe received non-UTF-8 input");
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                    None if after_error => after_error = false,
                    None => {
                        debug!("Secret pipe closed, reopening");
                        pipe = OpenPipe::open(&self.path)?;
                    }
                },
            }
        }
    }

    /// Act on one line read from the pipe.
    ///
    /// Returns the signal that was dispatched, if the line was a known
    /// phrase.
    pub fn handle_line(&self, line: &str) -> Option<Signal> {
        if let Some(signal) = self.phrases.get(line).copied() {
            debug!(?signal, "Secret pipe received a known phrase");
            self.dispatcher.dispatch(signal);
            return Some(signal);
        }

        if let (Some(text), Some(speaker)) = (line.strip_prefix(SPEECH_COMMAND_PREFIX), &self.speaker) {
            debug!(text, "Secret pipe speech request");
            if let Err(e) = speaker.speak(text) {
                warn!(error = %e, "Speech request failed");
            }
            return None;
        }

        debug!("Secret pipe received an unknown phrase");
        None
    }
}
