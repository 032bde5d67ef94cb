//! Listener wiring against a fake sysfs GPIO tree and a real FIFO.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;

use warden_core::AlarmState;
use warden_daemon::{AlarmSystem, Collaborators, Config, Supervisor, Workers};
use warden_fsm::MemoryStateStore;
use warden_hardware::devices::AnyKeypadDevice;
use warden_hardware::mock::MockKeypad;
use warden_keypad::keypad_channel;

const WAIT: Duration = Duration::from_secs(5);

fn config(dir: &Path, gpio_root: &Path) -> Config {
    Config::from_toml(&format!(
        r#"
password = "2468"

[secret]
pipe = '{}'
poll_interval_ms = 20

[sensors]
gpio_root = '{}'
warmup_secs = 1

[[sensors.motion]]
pin = 5
location = "hall"

[[sensors.door]]
pin = 22
location = "front door"
"#,
        dir.join("secret").display(),
        gpio_root.display(),
    ))
    .unwrap()
}

fn fake_pin(root: &Path, number: u8, value: &str) {
    let pin_dir = root.join(format!("gpio{number}"));
    fs::create_dir_all(&pin_dir).unwrap();
    fs::write(pin_dir.join("value"), value).unwrap();
}

fn build_alarm() -> Arc<AlarmSystem> {
    let (handle, _inbox) = keypad_channel();
    let alarm = AlarmSystem::build(
        MemoryStateStore::new(AlarmState::Disarmed),
        Duration::from_secs(30),
        Collaborators::logging(),
        handle,
    )
    .unwrap();
    alarm.start();
    Arc::new(alarm)
}

#[tokio::test]
async fn test_unopenable_pin_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let gpio_root = dir.path().join("no-such-gpio");
    let config = config(dir.path(), &gpio_root);
    let alarm = build_alarm();
    let (keypad, _keypad_handle) = MockKeypad::new();
    let (_handle, inbox) = keypad_channel();

    let result = Workers::prepare(
        &config,
        &alarm,
        &Collaborators::logging(),
        AnyKeypadDevice::Mock(keypad),
        inbox,
    );

    let error = result.err().expect("missing GPIO tree must fail");
    assert!(error.to_string().contains("GPIO5 (hall)"), "{error}");
    // The secret listener never ran, so the pipe was never created.
    assert!(!config.secret.pipe.exists());
    alarm.shutdown();
}

#[tokio::test]
async fn test_missing_door_pin_fails_after_motion_pin_opens() {
    let dir = tempfile::tempdir().unwrap();
    let gpio_root = dir.path().join("gpio");
    fake_pin(&gpio_root, 5, "0\n");
    // gpio22 is absent and cannot be exported.
    fs::create_dir(gpio_root.join("export")).unwrap();
    let config = config(dir.path(), &gpio_root);
    let alarm = build_alarm();
    let (keypad, _keypad_handle) = MockKeypad::new();
    let (_handle, inbox) = keypad_channel();

    let error = Workers::prepare(
        &config,
        &alarm,
        &Collaborators::logging(),
        AnyKeypadDevice::Mock(keypad),
        inbox,
    )
    .err()
    .expect("unexportable pin must fail");
    assert!(error.to_string().contains("GPIO22 (front door)"), "{error}");
    assert!(!config.secret.pipe.exists());
    alarm.shutdown();
}

#[tokio::test]
async fn test_spawned_workers_stop_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let gpio_root = dir.path().join("gpio");
    fake_pin(&gpio_root, 5, "0\n");
    fake_pin(&gpio_root, 22, "1\n");
    let config = config(dir.path(), &gpio_root);
    let alarm = build_alarm();
    let (keypad, _keypad_handle) = MockKeypad::new();
    let (_handle, inbox) = keypad_channel();

    let workers = Workers::prepare(
        &config,
        &alarm,
        &Collaborators::logging(),
        AnyKeypadDevice::Mock(keypad),
        inbox,
    )
    .unwrap();
    let mut supervisor = Supervisor::new();
    workers.spawn(&mut supervisor, &alarm);
    assert_eq!(supervisor.len(), 4);

    let path = config.secret.pipe.clone();
    let mut sender = tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(sender) = pipe::OpenOptions::new().open_sender(&path) {
                return sender;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("secret pipe never became writable");
    sender.write_all(b"imTheSlime\n").await.unwrap();

    tokio::time::timeout(WAIT, async {
        while alarm.current_state() != AlarmState::Armed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("secret phrase never reached the alarm");

    let report = supervisor.shutdown(WAIT).await;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.success, 4);
    assert!(!path.exists());
    alarm.shutdown();
}
