//! Alarm topology.
//!
//! Wires the five alarm states to their side effects: status LED, grace
//! countdowns, intruder alert, keypad reset and per-state sounds. Also owns
//! the policy for sensor events, which only trip the alarm while it is in
//! the armed family of states.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use warden_core::{AlarmState, Error, Result, Signal, SoundId};
use warden_fsm::{CountdownTimer, Dispatcher, StateDef, StateMachine, StateStore, TickFn};
use warden_hardware::SoundPlayer;
use warden_keypad::KeypadHandle;
use warden_sensors::{SensorCallback, SensorEvent};

use crate::collaborators::Collaborators;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct GraceInner {
    generation: u64,
    timer: Option<CountdownTimer>,
}

/// The single running grace countdown.
///
/// Every start and stop bumps the generation. An expiry only dispatches
/// `Timeout` if its generation is still current when it gets the machine
/// lock, so a countdown stopped by a concurrent transition can never fire
/// into the next state.
struct GraceSlot {
    period: Duration,
    runtime: Handle,
    inner: Mutex<GraceInner>,
}

impl GraceSlot {
    fn start(
        self: &Arc<Self>,
        dispatcher: &Dispatcher,
        tick_sound: SoundId,
        player: Arc<dyn SoundPlayer>,
    ) {
        let mut inner = lock(&self.inner);
        if let Some(previous) = inner.timer.take() {
            previous.stop();
        }
        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;

        let slot = Arc::clone(self);
        let dispatcher = dispatcher.clone();
        let on_tick: TickFn = Box::new(move |remaining| {
            debug!(remaining, "Grace countdown");
            if let Err(e) = player.play(tick_sound) {
                warn!(error = %e, "Failed to play countdown tick");
            }
        });

        inner.timer = Some(CountdownTimer::spawn_on(
            &self.runtime,
            self.period,
            Some(on_tick),
            move || {
                let fired =
                    dispatcher.dispatch_when(Signal::Timeout, |_| slot.is_current(generation));
                if !fired {
                    debug!(generation, "Grace countdown expired after being replaced");
                }
            },
        ));
        debug!(generation, period_secs = self.period.as_secs(), "Grace countdown started");
    }

    fn stop(&self) {
        let mut inner = lock(&self.inner);
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(timer) = inner.timer.take() {
            timer.stop();
            debug!("Grace countdown stopped");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = lock(&self.inner);
        inner.generation == generation && inner.timer.is_some()
    }

    fn is_running(&self) -> bool {
        lock(&self.inner)
            .timer
            .as_ref()
            .is_some_and(CountdownTimer::is_running)
    }
}

/// The assembled alarm: state machine plus the shared state its actions
/// use.
pub struct AlarmSystem {
    machine: Arc<StateMachine>,
    dispatcher: Dispatcher,
    grace: Arc<GraceSlot>,
    last_trip: Arc<Mutex<Option<String>>>,
    collaborators: Collaborators,
}

impl AlarmSystem {
    /// Build the machine around `store` and restore its persisted state.
    ///
    /// Must be called from within a tokio runtime; countdowns are spawned on
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` outside a runtime, or the store's error if the
    /// persisted state cannot be read.
    pub fn build(
        store: impl StateStore + 'static,
        grace_period: Duration,
        collaborators: Collaborators,
        keypad: KeypadHandle,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("alarm needs a tokio runtime: {e}")))?;
        let dispatcher = Dispatcher::new();
        let grace = Arc::new(GraceSlot {
            period: grace_period,
            runtime,
            inner: Mutex::new(GraceInner::default()),
        });
        let last_trip = Arc::new(Mutex::new(None));

        let mut builder = StateMachine::builder()
            .with_store(store)
            .with_dispatcher(dispatcher.clone())
            .with_sound_player(Arc::clone(&collaborators.sound));

        for state in AlarmState::ALL {
            let mut def = StateDef::new().with_sound(state.sound());

            let led = Arc::clone(&collaborators.led);
            let blinking = state != AlarmState::Disarmed;
            def = def.on_entry(move || {
                led.set_blinking(blinking)
                    .map_err(|e| Error::action(format!("status LED: {e}")))
            });

            if state.is_countdown() {
                let start_grace = Arc::clone(&grace);
                let stop_grace = Arc::clone(&grace);
                let dispatcher = dispatcher.clone();
                let player = Arc::clone(&collaborators.sound);
                def = def
                    .on_entry(move || {
                        start_grace.start(&dispatcher, state.sound(), Arc::clone(&player));
                        Ok(())
                    })
                    .on_exit(move || {
                        stop_grace.stop();
                        Ok(())
                    });
            }

            if state == AlarmState::Triggered {
                let alerts = Arc::clone(&collaborators.alerts);
                let last_trip = Arc::clone(&last_trip);
                def = def.on_entry(move || {
                    let location = lock(&last_trip).clone();
                    alerts
                        .intruder_alert(location.as_deref())
                        .map_err(|e| Error::action(format!("intruder alert: {e}")))
                });
            }

            let keypad = keypad.clone();
            def = def.on_entry(move || {
                keypad.reset_buffer();
                Ok(())
            });

            builder = builder.state(state, def);
        }

        let machine = builder.build()?;

        Ok(Self {
            machine,
            dispatcher,
            grace,
            last_trip,
            collaborators,
        })
    }

    pub fn machine(&self) -> &Arc<StateMachine> {
        &self.machine
    }

    /// A dispatcher bound to this alarm's machine.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn current_state(&self) -> AlarmState {
        self.machine.current_state()
    }

    /// Run the restored state's entry actions. See
    /// [`StateMachine::enter_initial`].
    pub fn start(&self) -> bool {
        self.machine.enter_initial()
    }

    /// Whether a grace countdown is running.
    pub fn grace_running(&self) -> bool {
        self.grace.is_running()
    }

    /// Location of the sensor that last tripped the alarm.
    pub fn last_trip(&self) -> Option<String> {
        lock(&self.last_trip).clone()
    }

    /// Apply a confirmed sensor event.
    ///
    /// Returns `true` if it tripped the alarm.
    pub fn handle_sensor_event(&self, event: &SensorEvent) -> bool {
        if let SensorEvent::Door { .. } = event {
            if let Err(e) = self.collaborators.sound.play(SoundId::Door) {
                warn!(error = %e, "Failed to play door sound");
            }
        }
        if !event.is_intrusion() {
            return false;
        }

        let table = self.machine.table();
        let tripped = self.machine.dispatch_when(Signal::Trigger, |state| {
            let trips = state.is_armed_family() && table.next(state, Signal::Trigger).is_some();
            if trips {
                *lock(&self.last_trip) = Some(event.location().to_string());
            }
            trips
        });

        if tripped {
            info!(location = event.location(), "Alarm tripped");
        } else {
            debug!(location = event.location(), "Sensor event while not armed");
        }
        tripped
    }

    /// Sensor callback feeding [`handle_sensor_event`](Self::handle_sensor_event).
    pub fn sensor_callback(self: &Arc<Self>) -> SensorCallback {
        let alarm = Arc::clone(self);
        Arc::new(move |event| {
            alarm.handle_sensor_event(&event);
        })
    }

    /// Stop the grace countdown, if any. Used on shutdown.
    pub fn shutdown(&self) {
        self.grace.stop();
    }
}
