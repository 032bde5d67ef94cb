//! Linux evdev keypad driver.
//!
//! Reads raw `struct input_event` frames from a `/dev/input/event*` node. The
//! node is opened non-blocking and registered with the tokio reactor through
//! [`AsyncFd`], so a pending read never pins a runtime thread.
//!
//! Frame layout on 64-bit Linux (24 bytes, native endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 16   | `struct timeval` |
//! | 16     | 2    | `type` |
//! | 18     | 2    | `code` |
//! | 20     | 4    | `value` |

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

use crate::{
    HardwareError, Result,
    traits::KeypadDevice,
    types::{DeviceInfo, KeyEvent},
};

/// Size of one `input_event` frame.
pub const INPUT_EVENT_SIZE: usize = 24;

const EV_SYN: u16 = 0x00;
const EV_LED: u16 = 0x11;
const LED_NUML: u16 = 0x00;

nix::ioctl_write_int!(eviocgrab, b'E', 0x90);

/// Decode one `input_event` frame.
///
/// # Errors
///
/// Returns `HardwareError::InvalidData` if `frame` is not exactly
/// [`INPUT_EVENT_SIZE`] bytes long.
pub fn decode_frame(frame: &[u8]) -> Result<KeyEvent> {
    if frame.len() != INPUT_EVENT_SIZE {
        return Err(HardwareError::invalid_data(format!(
            "input_event frame of {} bytes, expected {INPUT_EVENT_SIZE}",
            frame.len()
        )));
    }

    Ok(KeyEvent {
        kind: u16::from_ne_bytes([frame[16], frame[17]]),
        code: u16::from_ne_bytes([frame[18], frame[19]]),
        value: i32::from_ne_bytes([frame[20], frame[21], frame[22], frame[23]]),
    })
}

/// Encode an event with a zero timestamp, as written back to the device.
pub fn encode_frame(kind: u16, code: u16, value: i32) -> [u8; INPUT_EVENT_SIZE] {
    let mut frame = [0u8; INPUT_EVENT_SIZE];
    frame[16..18].copy_from_slice(&kind.to_ne_bytes());
    frame[18..20].copy_from_slice(&code.to_ne_bytes());
    frame[20..24].copy_from_slice(&value.to_ne_bytes());
    frame
}

/// Keypad backed by a Linux input device node.
#[derive(Debug)]
pub struct EvdevKeypad {
    path: PathBuf,
    device: AsyncFd<File>,
    grabbed: bool,
}

impl EvdevKeypad {
    /// Open the device node at `path` for reading and LED writes.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the node cannot be opened or registered with
    /// the reactor.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)?;

        debug!(path = %path.display(), "Opened keypad device");

        Ok(Self {
            path,
            device: AsyncFd::new(file)?,
            grabbed: false,
        })
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_grab(&mut self, grab: bool) -> Result<()> {
        let fd = self.device.get_ref().as_raw_fd();
        // SAFETY: `fd` is a valid open descriptor owned by `self.device` for
        // the duration of the call, and EVIOCGRAB takes its argument by value.
        let result = unsafe { eviocgrab(fd, u64::from(grab) as _) };

        match result {
            Ok(_) => {
                self.grabbed = grab;
                Ok(())
            }
            Err(Errno::EBUSY) => Err(HardwareError::busy(self.path.display().to_string())),
            Err(Errno::ENODEV) => Err(HardwareError::disconnected(
                self.path.display().to_string(),
            )),
            Err(errno) => Err(HardwareError::Io(errno.into())),
        }
    }
}

impl KeypadDevice for EvdevKeypad {
    async fn grab(&mut self) -> Result<()> {
        self.set_grab(true)?;
        debug!(path = %self.path.display(), "Grabbed keypad");
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if !self.grabbed {
            return Ok(());
        }
        self.set_grab(false)?;
        debug!(path = %self.path.display(), "Released keypad");
        Ok(())
    }

    async fn read_event(&mut self) -> Result<KeyEvent> {
        let mut frame = [0u8; INPUT_EVENT_SIZE];

        loop {
            let mut guard = self.device.readable().await?;

            match guard.try_io(|inner| inner.get_ref().read(&mut frame)) {
                Ok(Ok(0)) => {
                    return Err(HardwareError::disconnected(
                        self.path.display().to_string(),
                    ));
                }
                Ok(Ok(n)) => return decode_frame(&frame[..n]),
                Ok(Err(e)) if e.raw_os_error() == Some(Errno::ENODEV as i32) => {
                    return Err(HardwareError::disconnected(
                        self.path.display().to_string(),
                    ));
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_would_block) => continue,
            }
        }
    }

    async fn set_indicator(&mut self, lit: bool) -> Result<()> {
        let mut frames = Vec::with_capacity(2 * INPUT_EVENT_SIZE);
        frames.extend_from_slice(&encode_frame(EV_LED, LED_NUML, i32::from(lit)));
        frames.extend_from_slice(&encode_frame(EV_SYN, 0, 0));

        if let Err(e) = self.device.get_ref().write_all(&frames) {
            warn!(path = %self.path.display(), error = %e, "Failed to set keypad LED");
            return Err(e.into());
        }
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        Ok(DeviceInfo::new(name, "evdev keypad").with_path(self.path.display().to_string()))
    }
}
