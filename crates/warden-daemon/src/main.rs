//! `wardend`: the alarm daemon.
//!
//! Startup is strict: a bad config, a missing or corrupt state file, or a
//! keypad that never shows up stops the daemon before any listener runs.
//! Once running, the first worker to fail takes the whole daemon down with
//! it, after raising a critical error alert.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use warden_fsm::YamlStateFile;
use warden_hardware::devices::AnyKeypadDevice;
use warden_hardware::evdev::EvdevKeypad;
use warden_keypad::{KeypadInbox, keypad_channel};

use warden_daemon::config::DEFAULT_CONFIG_PATH;
use warden_daemon::device::{SYSFS_USB_ROOT, reset_usb_device, wait_for_path};
use warden_daemon::{AlarmSystem, Collaborators, Config, Supervisor, Workers};

/// How long workers get to stop after a shutdown request.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between checks for the keypad device node.
const PATH_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(version, about = "Home alarm daemon", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the persisted state file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Override the keypad device node
    #[arg(long)]
    keypad: Option<PathBuf>,

    /// Override the secret pipe path
    #[arg(long)]
    secret_pipe: Option<PathBuf>,

    /// Skip the keypad USB reset even if one is configured
    #[arg(long)]
    no_usb_reset: bool,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = warden_core::VERSION, "Starting wardend");

    let collaborators = Collaborators::logging();
    let result = run(args, collaborators.clone()).await;

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "wardend stopped on a fatal error");
        if let Err(alert) = collaborators.alerts.critical_error(&format!("{e:#}")) {
            warn!(error = %alert, "Failed to send critical error alert");
        }
    } else {
        info!("wardend stopped");
    }
    result
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    if let Some(path) = &args.state_file {
        config.state_file.clone_from(path);
    }
    if let Some(path) = &args.keypad {
        config.keypad.device.clone_from(path);
    }
    if let Some(path) = &args.secret_pipe {
        config.secret.pipe.clone_from(path);
    }
    if args.no_usb_reset {
        config.keypad.usb_reset = None;
    }
    Ok(config)
}

async fn run(args: Args, collaborators: Collaborators) -> Result<()> {
    let config = load_config(&args)?;

    if let Some(device) = &config.keypad.usb_reset {
        reset_usb_device(Path::new(SYSFS_USB_ROOT), device)
            .await
            .with_context(|| format!("failed to reset USB device {device}"))?;
    }

    let (keypad_handle, keypad_inbox) = keypad_channel();
    let alarm = AlarmSystem::build(
        YamlStateFile::new(&config.state_file),
        config.grace_period(),
        collaborators.clone(),
        keypad_handle,
    )
    .with_context(|| format!("failed to restore state from {}", config.state_file.display()))?;
    let alarm = Arc::new(alarm);
    alarm.start();

    let result = serve(&config, &alarm, &collaborators, keypad_inbox).await;
    alarm.shutdown();
    result
}

/// Run the listeners until a signal arrives or one of them fails.
///
/// Nothing is spawned until every device is open and both signal handlers
/// are registered, and every spawned worker is stopped before returning.
async fn serve(
    config: &Config,
    alarm: &Arc<AlarmSystem>,
    collaborators: &Collaborators,
    keypad_inbox: KeypadInbox,
) -> Result<()> {
    wait_for_path(
        &config.keypad.device,
        config.keypad_wait_timeout(),
        PATH_POLL_INTERVAL,
    )
    .await
    .context("keypad not available")?;
    let keypad = EvdevKeypad::open(&config.keypad.device)
        .with_context(|| format!("failed to open keypad {}", config.keypad.device.display()))?;

    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;

    let workers = Workers::prepare(
        config,
        alarm,
        collaborators,
        AnyKeypadDevice::Evdev(keypad),
        keypad_inbox,
    )
    .context("failed to prepare listeners")?;

    let mut supervisor = Supervisor::new();
    workers.spawn(&mut supervisor, alarm);

    let outcome = tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            Ok(())
        }
        exit = supervisor.next_exit() => match exit {
            Some(exit) => Err(anyhow::anyhow!("{exit}")),
            None => Err(anyhow::anyhow!("no workers running")),
        },
    };

    let report = supervisor.shutdown(SHUTDOWN_TIMEOUT).await;
    if !report.is_clean() {
        warn!(?report, "Unclean worker shutdown");
    }
    outcome
}
