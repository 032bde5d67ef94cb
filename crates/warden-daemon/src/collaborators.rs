//! Stand-in collaborators that only log.
//!
//! Audio, the status LED, e-mail alerts and speech synthesis are separate
//! services on the appliance. The daemon talks to them through the
//! `warden_hardware` collaborator traits; these implementations record the
//! request in the log so the alarm can run without them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::{error, info, warn};

use warden_core::SoundId;
use warden_core::constants::MAX_VOLUME;
use warden_hardware::{AlertSink, Result, SoundPlayer, Speaker, StatusLed};

/// Sound player that logs what it would play and remembers the volume.
#[derive(Debug)]
pub struct LoggingSound {
    volume: AtomicU8,
}

impl Default for LoggingSound {
    fn default() -> Self {
        Self {
            volume: AtomicU8::new(MAX_VOLUME),
        }
    }
}

impl SoundPlayer for LoggingSound {
    fn play(&self, sound: SoundId) -> Result<()> {
        info!(%sound, volume = self.volume(), "Play sound");
        Ok(())
    }

    fn stop(&self, sound: SoundId) -> Result<()> {
        info!(%sound, "Stop sound");
        Ok(())
    }

    fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.volume.store(volume.min(MAX_VOLUME), Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingLed {
    blinking: AtomicBool,
}

impl StatusLed for LoggingLed {
    fn set_blinking(&self, blinking: bool) -> Result<()> {
        if self.blinking.swap(blinking, Ordering::SeqCst) != blinking {
            info!(blinking, "Status LED");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingAlerts;

impl AlertSink for LoggingAlerts {
    fn intruder_alert(&self, location: Option<&str>) -> Result<()> {
        warn!(location = location.unwrap_or("unknown"), "INTRUDER ALERT");
        Ok(())
    }

    fn critical_error(&self, details: &str) -> Result<()> {
        error!(details, "Critical error");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingSpeaker;

impl Speaker for LoggingSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        info!(text, "Speak");
        Ok(())
    }
}

/// The set of collaborators the alarm is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub sound: Arc<dyn SoundPlayer>,
    pub led: Arc<dyn StatusLed>,
    pub alerts: Arc<dyn AlertSink>,
    pub speaker: Arc<dyn Speaker>,
}

impl Collaborators {
    /// Log-only collaborators.
    pub fn logging() -> Self {
        Self {
            sound: Arc::new(LoggingSound::default()),
            led: Arc::new(LoggingLed::default()),
            alerts: Arc::new(LoggingAlerts),
            speaker: Arc::new(LoggingSpeaker),
        }
    }
}
