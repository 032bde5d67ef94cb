//! Recording collaborators.
//!
//! Each type records every call it receives so tests can assert on the exact
//! sequence of side effects a transition produced.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use warden_core::SoundId;
use warden_core::constants::MAX_VOLUME;

use crate::{
    HardwareError, Result,
    traits::{AlertSink, SoundPlayer, Speaker, StatusLed},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call received by [`RecordingSound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEvent {
    Play(SoundId),
    Stop(SoundId),
}

/// Sound player that records play/stop calls.
#[derive(Debug)]
pub struct RecordingSound {
    events: Mutex<Vec<SoundEvent>>,
    volume: AtomicU8,
    failing: AtomicBool,
}

impl Default for RecordingSound {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            volume: AtomicU8::new(MAX_VOLUME),
            failing: AtomicBool::new(false),
        }
    }
}

impl RecordingSound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `play` fail (the call is still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All calls received so far.
    pub fn events(&self) -> Vec<SoundEvent> {
        lock(&self.events).clone()
    }

    /// Sounds passed to `play`, in order.
    pub fn played(&self) -> Vec<SoundId> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                SoundEvent::Play(sound) => Some(*sound),
                SoundEvent::Stop(_) => None,
            })
            .collect()
    }

    /// How many times `sound` was played.
    pub fn play_count(&self, sound: SoundId) -> usize {
        lock(&self.events)
            .iter()
            .filter(|event| **event == SoundEvent::Play(sound))
            .count()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl SoundPlayer for RecordingSound {
    fn play(&self, sound: SoundId) -> Result<()> {
        lock(&self.events).push(SoundEvent::Play(sound));
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::unsupported(format!("play {sound}")));
        }
        Ok(())
    }

    fn stop(&self, sound: SoundId) -> Result<()> {
        lock(&self.events).push(SoundEvent::Stop(sound));
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

/// Status LED that records every mode change.
#[derive(Debug, Default)]
pub struct RecordingLed {
    modes: Mutex<Vec<bool>>,
}

impl RecordingLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `set_blinking` argument, in order.
    pub fn modes(&self) -> Vec<bool> {
        lock(&self.modes).clone()
    }

    /// Whether the LED is currently blinking.
    pub fn is_blinking(&self) -> bool {
        lock(&self.modes).last().copied().unwrap_or(false)
    }
}

impl StatusLed for RecordingLed {
    fn set_blinking(&self, blinking: bool) -> Result<()> {
        lock(&self.modes).push(blinking);
        Ok(())
    }
}

/// Alert sink that records intrusion and critical-error notifications.
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    intrusions: Mutex<Vec<Option<String>>>,
    critical: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations of every intruder alert, in order.
    pub fn intrusions(&self) -> Vec<Option<String>> {
        lock(&self.intrusions).clone()
    }

    /// Details of every critical-error alert, in order.
    pub fn critical_errors(&self) -> Vec<String> {
        lock(&self.critical).clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn intruder_alert(&self, location: Option<&str>) -> Result<()> {
        lock(&self.intrusions).push(location.map(str::to_owned));
        Ok(())
    }

    fn critical_error(&self, details: &str) -> Result<()> {
        lock(&self.critical).push(details.to_owned());
        Ok(())
    }
}

/// Speaker that records spoken text.
#[derive(Debug, Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).clone()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        lock(&self.spoken).push(text.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sound_orders_events() {
        let sound = RecordingSound::new();

        sound.play(SoundId::Armed).unwrap();
        sound.stop(SoundId::Armed).unwrap();
        sound.play(SoundId::Disarmed).unwrap();

        assert_eq!(
            sound.events(),
            vec![
                SoundEvent::Play(SoundId::Armed),
                SoundEvent::Stop(SoundId::Armed),
                SoundEvent::Play(SoundId::Disarmed),
            ]
        );
        assert_eq!(sound.played(), vec![SoundId::Armed, SoundId::Disarmed]);
        assert_eq!(sound.play_count(SoundId::Armed), 1);
    }

    #[test]
    fn test_recording_sound_failing_still_records() {
        let sound = RecordingSound::new();
        sound.set_failing(true);

        assert!(sound.play(SoundId::NumKey).is_err());
        assert_eq!(sound.play_count(SoundId::NumKey), 1);
    }

    #[test]
    fn test_recording_sound_volume_is_clamped() {
        let sound = RecordingSound::new();
        assert_eq!(sound.volume(), MAX_VOLUME);

        sound.set_volume(40).unwrap();
        assert_eq!(sound.volume(), 40);

        sound.set_volume(250).unwrap();
        assert_eq!(sound.volume(), MAX_VOLUME);
    }

    #[test]
    fn test_recording_led() {
        let led = RecordingLed::new();
        assert!(!led.is_blinking());

        led.set_blinking(true).unwrap();
        led.set_blinking(false).unwrap();

        assert_eq!(led.modes(), vec![true, false]);
        assert!(!led.is_blinking());
    }

    #[test]
    fn test_recording_alerts() {
        let alerts = RecordingAlerts::new();

        alerts.intruder_alert(Some("front door")).unwrap();
        alerts.intruder_alert(None).unwrap();
        alerts.critical_error("keypad vanished").unwrap();

        assert_eq!(
            alerts.intrusions(),
            vec![Some("front door".to_string()), None]
        );
        assert_eq!(alerts.critical_errors(), vec!["keypad vanished"]);
    }

    #[test]
    fn test_recording_speaker() {
        let speaker = RecordingSpeaker::new();
        speaker.speak("hello").unwrap();
        assert_eq!(speaker.spoken(), vec!["hello"]);
    }
}
