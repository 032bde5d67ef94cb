//! Device node helpers used at startup.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use warden_core::{Error, Result};

/// Root of the USB device tree in sysfs.
pub const SYSFS_USB_ROOT: &str = "/sys/bus/usb/devices";

/// Wait until `path` exists, checking every `poll`.
///
/// USB devices take a moment to enumerate after boot or after a reset.
///
/// # Errors
///
/// Returns `Error::DeviceNotFound` if the path has not appeared after
/// `timeout`.
pub async fn wait_for_path(path: &Path, timeout: Duration, poll: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;

    loop {
        if path.try_exists().unwrap_or(false) {
            debug!(path = %path.display(), "Device node present");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::DeviceNotFound {
                path: path.to_path_buf(),
                waited_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Reset a USB device by deauthorizing and reauthorizing it.
///
/// `root` is normally [`SYSFS_USB_ROOT`] and `device` an id like `1-1`.
///
/// # Errors
///
/// Returns an I/O error if the `authorized` attribute cannot be written.
pub async fn reset_usb_device(root: &Path, device: &str) -> Result<()> {
    let authorized = root.join(device).join("authorized");

    tokio::fs::write(&authorized, "0").await?;
    tokio::fs::write(&authorized, "1").await?;

    info!(path = %authorized.display(), "Reset USB device");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_path_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        wait_for_path(dir.path(), Duration::ZERO, Duration::from_millis(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_path_appearing_later() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("event3");

        let creator = {
            let node = node.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::write(&node, b"").await.unwrap();
            })
        };

        wait_for_path(&node, Duration::from_secs(5), Duration::from_millis(5))
            .await
            .unwrap();
        creator.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_path_times_out() {
        let result = wait_for_path(
            Path::new("/dev/input/by-id/not-a-keypad"),
            Duration::from_secs(30),
            Duration::from_millis(500),
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::DeviceNotFound { waited_secs: 30, .. })
        ));
    }

    #[tokio::test]
    async fn test_usb_reset_leaves_device_authorized() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("1-1")).unwrap();

        reset_usb_device(root.path(), "1-1").await.unwrap();

        let value = std::fs::read_to_string(root.path().join("1-1/authorized")).unwrap();
        assert_eq!(value, "1");
    }

    #[tokio::test]
    async fn test_usb_reset_unknown_device() {
        let root = tempfile::tempdir().unwrap();
        let result = reset_usb_device(root.path(), "9-9").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
