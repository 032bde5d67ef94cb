//! Keypad processor.
//!
//! Turns decoded key presses into password entry, arming and volume changes.
//! The typed buffer is owned by the processor task; everything that wants to
//! touch it from outside goes through a [`KeypadHandle`](crate::KeypadHandle).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use warden_core::constants::{
    KEYPAD_GRAB_ATTEMPTS, KEYPAD_GRAB_BACKOFF_MS, KEYPAD_RESET_SECS, MAX_VOLUME, VOLUME_STEP,
};
use warden_core::{AlarmState, Password, Signal, SoundId};
use warden_fsm::{CountdownTimer, Dispatcher};
use warden_hardware::{ControlKey, HardwareError, Key, KeypadDevice, SoundPlayer, VolumeKey};

use crate::command::{KeypadCommand, KeypadInbox};

/// Processor settings.
#[derive(Debug, Clone)]
pub struct KeypadConfig {
    /// Password that disarms the alarm.
    pub password: Password,

    /// Idle time after the last numeral before the buffer is cleared.
    pub inactivity_reset: Duration,

    /// How many times to try the exclusive grab.
    pub grab_attempts: u32,

    /// Delay before the second grab attempt, doubled after each failure.
    pub grab_backoff: Duration,
}

impl KeypadConfig {
    pub fn new(password: Password) -> Self {
        Self {
            password,
            inactivity_reset: Duration::from_secs(KEYPAD_RESET_SECS),
            grab_attempts: KEYPAD_GRAB_ATTEMPTS,
            grab_backoff: Duration::from_millis(KEYPAD_GRAB_BACKOFF_MS),
        }
    }

    /// Override the inactivity reset delay.
    pub fn with_inactivity_reset(mut self, delay: Duration) -> Self {
        self.inactivity_reset = delay;
        self
    }
}

/// Keypad processor bound to one device.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use warden_core::Password;
/// use warden_fsm::Dispatcher;
/// use warden_hardware::mock::{MockKeypad, RecordingSound};
/// use warden_keypad::{KeypadConfig, KeypadProcessor, keypad_channel};
///
/// # async fn example(dispatcher: Dispatcher) -> warden_hardware::Result<()> {
/// let (keypad, _input) = MockKeypad::new();
/// let (_handle, inbox) = keypad_channel();
/// let config = KeypadConfig::new(Password::new("5918462").unwrap());
///
/// let processor = KeypadProcessor::new(
///     keypad,
///     config,
///     dispatcher,
///     Arc::new(RecordingSound::new()),
///     inbox,
/// );
/// processor.run(CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct KeypadProcessor<K: KeypadDevice> {
    device: K,
    config: KeypadConfig,
    dispatcher: Dispatcher,
    sound: Arc<dyn SoundPlayer>,
    inbox: KeypadInbox,
    buffer: String,
    inactivity: Option<CountdownTimer>,
    generation: u64,
}

impl<K: KeypadDevice> KeypadProcessor<K> {
    pub fn new(
        device: K,
        config: KeypadConfig,
        dispatcher: Dispatcher,
        sound: Arc<dyn SoundPlayer>,
        inbox: KeypadInbox,
    ) -> Self {
        Self {
            device,
            config,
            dispatcher,
            sound,
            inbox,
            buffer: String::new(),
            inactivity: None,
            generation: 0,
        }
    }

    /// Characters typed since the last reset.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Whether an inactivity countdown is pending.
    pub fn inactivity_pending(&self) -> bool {
        self.inactivity.is_some()
    }

    /// Grab the device and process input until `cancel` fires or the device
    /// fails.
    ///
    /// The grab is released on the way out in both cases.
    ///
    /// # Errors
    ///
    /// Returns the grab error once every attempt has failed, or the device
    /// error that ended the read loop.
    pub async fn run(mut self, cancel: CancellationToken) -> warden_hardware::Result<()> {
        self.grab_with_retry().await?;

        let muted = self.sound.volume() == 0;
        self.update_indicator(muted).await;
        info!("Keypad processor started");

        let result = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Keypad processor cancelled");
                    break Ok(());
                }

                Some(command) = self.inbox.rx.recv() => {
                    self.handle_command(command);
                }

                event = self.device.read_event() => match event {
                    Ok(event) => {
                        if let Some(key) = event.key() {
                            self.handle_key(key).await;
                        } else {
                            trace!(code = event.code, value = event.value, "Ignoring keypad event");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Keypad read failed");
                        break Err(e);
                    }
                },
            }
        };

        self.cancel_inactivity();
        if let Err(e) = self.device.release().await {
            warn!(error = %e, "Failed to release keypad grab");
        }
        info!("Keypad processor stopped");

        result
    }

    async fn grab_with_retry(&mut self) -> warden_hardware::Result<()> {
        let attempts = self.config.grab_attempts.max(1);
        let mut backoff = self.config.grab_backoff;

        for attempt in 1..=attempts {
            match self.device.grab().await {
                Ok(()) => {
                    debug!(attempt, "Keypad grabbed");
                    return Ok(());
                }
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!(attempt, error = %e, retry_in_ms = backoff.as_millis() as u64, "Keypad grab failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        Err(HardwareError::busy("keypad"))
    }

    fn handle_command(&mut self, command: KeypadCommand) {
        match command {
            KeypadCommand::ResetBuffer => self.reset_buffer(),
            KeypadCommand::InactivityElapsed(generation) if generation == self.generation => {
                if self.inactivity.take().is_some() {
                    debug!(typed = self.buffer.len(), "Keypad idle, clearing buffer");
                    self.buffer.clear();
                }
            }
            KeypadCommand::InactivityElapsed(generation) => {
                trace!(generation, current = self.generation, "Stale inactivity expiry");
            }
        }
    }

    /// Apply one key press.
    pub async fn handle_key(&mut self, key: Key) {
        trace!(?key, "Key pressed");

        match key {
            Key::Numeral(c) => {
                if self.state() != AlarmState::Disarmed {
                    self.buffer.push(c);
                    self.restart_inactivity();
                }
                self.tone(SoundId::NumKey);
            }
            Key::Control(ControlKey::Enter) => self.submit(),
            Key::Control(ControlKey::Arm) => {
                self.dispatcher.dispatch(Signal::Arm);
                self.reset_buffer();
                self.tone(SoundId::CtrlKey);
            }
            Key::Control(ControlKey::Backspace) => {
                self.buffer.pop();
                if self.buffer.is_empty() {
                    self.cancel_inactivity();
                }
                self.tone(SoundId::Backspace);
            }
            Key::Control(ControlKey::Clear) => {
                self.reset_buffer();
                self.tone(SoundId::Backspace);
            }
            Key::Volume(volume) => self.change_volume(volume).await,
        }
    }

    fn submit(&mut self) {
        if self.state() == AlarmState::Disarmed || self.buffer.is_empty() {
            self.tone(SoundId::CtrlKey);
            return;
        }

        let matched = self.config.password.matches(&self.buffer);
        self.reset_buffer();

        if matched {
            info!("Correct password entered");
            self.dispatcher.dispatch(Signal::Disarm);
        } else {
            info!("Wrong password entered");
            self.tone(SoundId::WrongPassword);
        }
    }

    async fn change_volume(&mut self, key: VolumeKey) {
        let current = self.sound.volume();
        let volume = match key {
            VolumeKey::Up => current.saturating_add(VOLUME_STEP).min(MAX_VOLUME),
            VolumeKey::Down => current.saturating_sub(VOLUME_STEP),
            VolumeKey::Mute => 0,
        };

        if let Err(e) = self.sound.set_volume(volume) {
            warn!(volume, error = %e, "Failed to set volume");
        } else {
            debug!(from = current, to = volume, "Volume changed");
        }
        self.tone(SoundId::CtrlKey);
        self.update_indicator(volume == 0).await;
    }

    async fn update_indicator(&mut self, lit: bool) {
        if let Err(e) = self.device.set_indicator(lit).await {
            warn!(lit, error = %e, "Failed to set keypad indicator");
        }
    }

    fn state(&self) -> AlarmState {
        self.dispatcher.current_state().unwrap_or(AlarmState::Disarmed)
    }

    fn reset_buffer(&mut self) {
        self.buffer.clear();
        self.cancel_inactivity();
    }

    fn restart_inactivity(&mut self) {
        self.cancel_inactivity();
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let tx = self.inbox.tx.clone();
        self.inactivity = Some(CountdownTimer::start(self.config.inactivity_reset, move || {
            // The processor may already be gone.
            let _ = tx.send(KeypadCommand::InactivityElapsed(generation));
        }));
    }

    fn cancel_inactivity(&mut self) {
        if let Some(timer) = self.inactivity.take() {
            timer.stop();
        }
    }

    fn tone(&self, sound: SoundId) {
        if let Err(e) = self.sound.play(sound) {
            warn!(%sound, error = %e, "Failed to play keypad tone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::keypad_channel;
    use crate::KeypadHandle;
    use rstest::rstest;
    use warden_fsm::{MemoryStateStore, StateDef, StateMachine};
    use warden_hardware::mock::{MockKeypad, MockKeypadHandle, RecordingSound};

    const PASSWORD: &str = "5918462";

    struct Fixture {
        machine: Arc<StateMachine>,
        sound: Arc<RecordingSound>,
        processor: KeypadProcessor<MockKeypad>,
        keypad: MockKeypadHandle,
        _handle: KeypadHandle,
    }

    fn fixture(initial: AlarmState) -> Fixture {
        let dispatcher = Dispatcher::new();
        let machine = StateMachine::builder()
            .with_store(MemoryStateStore::new(initial))
            .with_dispatcher(dispatcher.clone())
            .state(AlarmState::Disarmed, StateDef::new())
            .build()
            .unwrap();

        let sound = Arc::new(RecordingSound::new());
        let (device, keypad) = MockKeypad::new();
        let (handle, inbox) = keypad_channel();
        let config = KeypadConfig::new(Password::new(PASSWORD).unwrap());
        let processor = KeypadProcessor::new(
            device,
            config,
            dispatcher,
            Arc::clone(&sound) as Arc<dyn SoundPlayer>,
            inbox,
        );

        Fixture {
            machine,
            sound,
            processor,
            keypad,
            _handle: handle,
        }
    }

    async fn type_digits(processor: &mut KeypadProcessor<MockKeypad>, digits: &str) {
        for c in digits.chars() {
            processor.handle_key(Key::Numeral(c)).await;
        }
    }

    #[tokio::test]
    async fn test_numerals_ignored_while_disarmed() {
        let mut f = fixture(AlarmState::Disarmed);

        type_digits(&mut f.processor, "123").await;

        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());
        assert_eq!(f.sound.play_count(SoundId::NumKey), 3);
    }

    #[tokio::test]
    async fn test_correct_password_disarms() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, PASSWORD).await;
        assert_eq!(f.processor.buffer(), PASSWORD);
        assert!(f.processor.inactivity_pending());

        f.processor.handle_key(Key::Control(ControlKey::Enter)).await;

        assert_eq!(f.machine.current_state(), AlarmState::Disarmed);
        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());
        assert_eq!(f.sound.play_count(SoundId::WrongPassword), 0);
    }

    #[tokio::test]
    async fn test_wrong_password_clears_buffer() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, "1234").await;
        f.processor.handle_key(Key::Control(ControlKey::Enter)).await;

        assert_eq!(f.machine.current_state(), AlarmState::Armed);
        assert_eq!(f.processor.buffer(), "");
        assert_eq!(f.sound.play_count(SoundId::WrongPassword), 1);
    }

    #[tokio::test]
    async fn test_password_prefix_does_not_match() {
        let mut f = fixture(AlarmState::ArmedCountdown);

        type_digits(&mut f.processor, &PASSWORD[..6]).await;
        f.processor.handle_key(Key::Control(ControlKey::Enter)).await;

        assert_eq!(f.machine.current_state(), AlarmState::ArmedCountdown);
        assert_eq!(f.sound.play_count(SoundId::WrongPassword), 1);
    }

    #[rstest]
    #[case(AlarmState::Disarmed)]
    #[case(AlarmState::Armed)]
    #[tokio::test]
    async fn test_enter_with_nothing_typed(#[case] state: AlarmState) {
        let mut f = fixture(state);

        f.processor.handle_key(Key::Control(ControlKey::Enter)).await;

        assert_eq!(f.machine.current_state(), state);
        assert_eq!(f.sound.played(), vec![SoundId::CtrlKey]);
    }

    #[tokio::test]
    async fn test_arm_key_dispatches_arm() {
        let mut f = fixture(AlarmState::Disarmed);

        f.processor.handle_key(Key::Control(ControlKey::Arm)).await;

        assert_eq!(f.machine.current_state(), AlarmState::DisarmedCountdown);
        assert_eq!(f.sound.play_count(SoundId::CtrlKey), 1);
    }

    #[tokio::test]
    async fn test_backspace_and_clear() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, "12").await;
        f.processor.handle_key(Key::Control(ControlKey::Backspace)).await;
        assert_eq!(f.processor.buffer(), "1");
        assert!(f.processor.inactivity_pending());

        f.processor.handle_key(Key::Control(ControlKey::Backspace)).await;
        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());

        // Backspace on an empty buffer is harmless.
        f.processor.handle_key(Key::Control(ControlKey::Backspace)).await;
        assert_eq!(f.processor.buffer(), "");

        type_digits(&mut f.processor, "987").await;
        f.processor.handle_key(Key::Control(ControlKey::Clear)).await;
        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());
        assert_eq!(f.sound.play_count(SoundId::Backspace), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_expiry_clears_buffer() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, "59").await;
        tokio::time::sleep(Duration::from_secs(KEYPAD_RESET_SECS + 1)).await;

        let command = f.processor.inbox.rx.recv().await.unwrap();
        assert_eq!(command, KeypadCommand::InactivityElapsed(2));
        f.processor.handle_command(command);

        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());
    }

    #[tokio::test]
    async fn test_stale_inactivity_expiry_is_ignored() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, "59").await;
        f.processor.handle_command(KeypadCommand::InactivityElapsed(1));

        assert_eq!(f.processor.buffer(), "59");
        assert!(f.processor.inactivity_pending());
    }

    #[tokio::test]
    async fn test_reset_command_clears_buffer() {
        let mut f = fixture(AlarmState::Armed);

        type_digits(&mut f.processor, "777").await;
        f.processor.handle_command(KeypadCommand::ResetBuffer);

        assert_eq!(f.processor.buffer(), "");
        assert!(!f.processor.inactivity_pending());
    }

    #[tokio::test]
    async fn test_volume_keys_clamp_and_mute() {
        let mut f = fixture(AlarmState::Disarmed);

        f.processor.handle_key(Key::Volume(VolumeKey::Up)).await;
        assert_eq!(f.sound.volume(), MAX_VOLUME);

        f.processor.handle_key(Key::Volume(VolumeKey::Down)).await;
        assert_eq!(f.sound.volume(), MAX_VOLUME - VOLUME_STEP);
        assert!(!f.keypad.indicator_lit());

        f.processor.handle_key(Key::Volume(VolumeKey::Mute)).await;
        assert_eq!(f.sound.volume(), 0);
        assert!(f.keypad.indicator_lit());

        f.processor.handle_key(Key::Volume(VolumeKey::Down)).await;
        assert_eq!(f.sound.volume(), 0);

        f.processor.handle_key(Key::Volume(VolumeKey::Up)).await;
        assert_eq!(f.sound.volume(), VOLUME_STEP);
        assert!(!f.keypad.indicator_lit());
        assert_eq!(f.sound.play_count(SoundId::CtrlKey), 5);
    }

    #[tokio::test]
    async fn test_failing_sound_does_not_stop_processing() {
        let mut f = fixture(AlarmState::Armed);
        f.sound.set_failing(true);

        type_digits(&mut f.processor, PASSWORD).await;
        f.processor.handle_key(Key::Control(ControlKey::Enter)).await;

        assert_eq!(f.machine.current_state(), AlarmState::Disarmed);
    }
}
