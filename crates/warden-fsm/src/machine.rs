//! Alarm state machine.
//!
//! The machine owns the current [`AlarmState`] behind a single mutex. Every
//! event source (keypad, secret channel, sensors, countdown timers) calls
//! [`StateMachine::dispatch`], which holds the mutex for the whole transition:
//! table lookup, exit actions of the old state, the state swap, entry actions
//! of the new state and persistence. Two transitions therefore never
//! interleave, and the exit actions of the outgoing state always complete
//! before the entry actions of the incoming state start.
//!
//! Signals are not queued. When two sources race, whichever acquires the mutex
//! first decides the state the second one transitions from.
//!
//! # Actions
//!
//! Entry and exit actions run while the mutex is held, so an action must never
//! call back into `dispatch`; it would deadlock. Actions that need to feed a
//! signal back later (a countdown expiry) go through a [`Dispatcher`], whose
//! calls happen from another task after the action has returned.
//!
//! # Examples
//!
//! ```
//! use warden_core::{AlarmState, Signal};
//! use warden_fsm::{MemoryStateStore, StateMachine};
//!
//! let machine = StateMachine::builder()
//!     .with_store(MemoryStateStore::new(AlarmState::Disarmed))
//!     .build()
//!     .unwrap();
//!
//! assert!(machine.dispatch(Signal::Arm));
//! assert_eq!(machine.current_state(), AlarmState::DisarmedCountdown);
//!
//! // Trigger is ignored while disarming.
//! assert!(!machine.dispatch(Signal::Trigger));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use warden_core::constants::MAX_HISTORY_SIZE;
use warden_core::{AlarmState, Error, Result, Signal, SoundId};
use warden_hardware::SoundPlayer;

use crate::store::StateStore;
use crate::table::TransitionTable;

/// State entry or exit action.
///
/// A failing action is logged and does not stop the remaining actions.
pub type Action = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Side effects attached to one state.
#[derive(Default)]
pub struct StateDef {
    sound: Option<SoundId>,
    entry: Vec<Action>,
    exit: Vec<Action>,
}

impl StateDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sound played on entry and stopped on exit.
    pub fn with_sound(mut self, sound: SoundId) -> Self {
        self.sound = Some(sound);
        self
    }

    /// Append an entry action.
    pub fn on_entry<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.entry.push(Box::new(action));
        self
    }

    /// Append an exit action.
    pub fn on_exit<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.exit.push(Box::new(action));
        self
    }

    pub fn sound(&self) -> Option<SoundId> {
        self.sound
    }
}

impl fmt::Debug for StateDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDef")
            .field("sound", &self.sound)
            .field("entry_actions", &self.entry.len())
            .field("exit_actions", &self.exit.len())
            .finish()
    }
}

/// A committed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: AlarmState,

    /// The state transitioned to.
    pub to: AlarmState,

    /// The signal that caused the transition.
    pub signal: Signal,

    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from: AlarmState, to: AlarmState, signal: Signal) -> Self {
        Self {
            from,
            to,
            signal,
            at: Utc::now(),
        }
    }
}

struct Inner {
    current: AlarmState,
    history: VecDeque<StateTransition>,
}

impl Inner {
    fn record(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

/// The alarm state machine.
///
/// Built with [`StateMachine::builder`] and shared as `Arc<StateMachine>`.
pub struct StateMachine {
    table: TransitionTable,
    states: [StateDef; AlarmState::COUNT],
    sound: Option<Arc<dyn SoundPlayer>>,
    store: Box<dyn StateStore>,
    inner: Mutex<Inner>,
    entered: AtomicBool,
}

impl StateMachine {
    /// Create a builder.
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed `signal` into the machine.
    ///
    /// Returns `true` if a transition happened. A signal with no edge from the
    /// current state is ignored and returns `false`, as does an edge leading
    /// back to the current state.
    pub fn dispatch(&self, signal: Signal) -> bool {
        self.dispatch_when(signal, |_| true)
    }

    /// Feed `signal` into the machine if `guard` accepts the current state.
    ///
    /// The guard runs while the machine mutex is held, so the state it sees is
    /// the state the transition starts from.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::{AlarmState, Signal};
    /// use warden_fsm::{MemoryStateStore, StateMachine};
    ///
    /// let machine = StateMachine::builder()
    ///     .with_store(MemoryStateStore::new(AlarmState::Armed))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(!machine.dispatch_when(Signal::Trigger, |_| false));
    /// assert!(machine.dispatch_when(Signal::Trigger, AlarmState::is_armed_family));
    /// assert_eq!(machine.current_state(), AlarmState::ArmedCountdown);
    /// ```
    pub fn dispatch_when<G>(&self, signal: Signal, guard: G) -> bool
    where
        G: FnOnce(AlarmState) -> bool,
    {
        let mut inner = self.lock();
        let from = inner.current;

        if !guard(from) {
            trace!(state = %from, %signal, "Signal rejected by guard");
            return false;
        }

        let Some(to) = self.table.next(from, signal) else {
            debug!(state = %from, %signal, "Signal ignored");
            return false;
        };
        if to == from {
            return false;
        }

        self.exit(from);
        inner.current = to;
        self.enter(to);

        if let Err(e) = self.store.save(to) {
            error!(state = %to, error = %e, "Failed to persist state");
        }

        inner.record(StateTransition::new(from, to, signal));
        info!(%from, %to, %signal, "State changed");
        true
    }

    /// Run the entry side effects of the restored state.
    ///
    /// Called once at startup. Nothing is persisted and no transition is
    /// recorded. Later calls do nothing and return `false`.
    pub fn enter_initial(&self) -> bool {
        let inner = self.lock();
        if self.entered.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(state = %inner.current, "Entering initial state");
        self.enter(inner.current);
        true
    }

    fn enter(&self, state: AlarmState) {
        debug!(%state, "Entering state");
        let def = &self.states[state.index()];

        if let (Some(sound), Some(player)) = (def.sound, &self.sound) {
            if let Err(e) = player.play(sound) {
                warn!(%state, %sound, error = %e, "Failed to play state sound");
            }
        }
        for (i, action) in def.entry.iter().enumerate() {
            if let Err(e) = action() {
                warn!(%state, action = i, error = %e, "Entry action failed");
            }
        }
    }

    fn exit(&self, state: AlarmState) {
        debug!(%state, "Exiting state");
        let def = &self.states[state.index()];

        if let (Some(sound), Some(player)) = (def.sound, &self.sound) {
            if let Err(e) = player.stop(sound) {
                warn!(%state, %sound, error = %e, "Failed to stop state sound");
            }
        }
        for (i, action) in def.exit.iter().enumerate() {
            if let Err(e) = action() {
                warn!(%state, action = i, error = %e, "Exit action failed");
            }
        }
    }

    /// The current state.
    pub fn current_state(&self) -> AlarmState {
        self.lock().current
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.lock().history.iter().cloned().collect()
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let inner = self.lock();
        let skip = inner.history.len().saturating_sub(count);
        inner.history.iter().skip(skip).cloned().collect()
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current_state())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StateMachine`].
///
/// The builder restores the current state from the configured store: a
/// missing or unknown record fails the build.
pub struct StateMachineBuilder {
    table: TransitionTable,
    states: [StateDef; AlarmState::COUNT],
    sound: Option<Arc<dyn SoundPlayer>>,
    store: Option<Box<dyn StateStore>>,
    dispatcher: Option<Dispatcher>,
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self {
            table: TransitionTable::alarm(),
            states: std::array::from_fn(|_| StateDef::default()),
            sound: None,
            store: None,
            dispatcher: None,
        }
    }
}

impl StateMachineBuilder {
    /// Replace the transition table (defaults to [`TransitionTable::alarm`]).
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    /// Attach side effects to `state`.
    pub fn state(mut self, state: AlarmState, def: StateDef) -> Self {
        self.states[state.index()] = def;
        self
    }

    /// Sound collaborator used for the per-state sounds.
    pub fn with_sound_player(mut self, player: Arc<dyn SoundPlayer>) -> Self {
        self.sound = Some(player);
        self
    }

    /// Store the state is restored from and persisted to.
    pub fn with_store(mut self, store: impl StateStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Bind `dispatcher` to the machine once it is built.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Restore the current state and build the machine.
    ///
    /// Entry actions of the restored state are not run; call
    /// [`StateMachine::enter_initial`] once every listener is ready.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no store was configured, and the store's
    /// error if the persisted state cannot be loaded.
    pub fn build(self) -> Result<Arc<StateMachine>> {
        let store = self
            .store
            .ok_or_else(|| Error::config("state machine has no state store"))?;
        let current = store.load()?;

        let machine = Arc::new(StateMachine {
            table: self.table,
            states: self.states,
            sound: self.sound,
            store,
            inner: Mutex::new(Inner {
                current,
                history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            }),
            entered: AtomicBool::new(false),
        });

        if let Some(dispatcher) = self.dispatcher {
            dispatcher.bind(&machine)?;
        }

        info!(state = %current, "Restored alarm state");
        Ok(machine)
    }
}

/// Late-bound handle for dispatching into a machine.
///
/// State actions are built before the machine exists, but some of them (a
/// countdown expiry) need to dispatch later. A `Dispatcher` is created first,
/// captured by those actions, and bound when the machine is built. It holds a
/// weak reference, so it never keeps the machine alive.
#[derive(Clone, Default)]
pub struct Dispatcher {
    machine: Arc<OnceLock<Weak<StateMachine>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&self, machine: &Arc<StateMachine>) -> Result<()> {
        self.machine
            .set(Arc::downgrade(machine))
            .map_err(|_| Error::config("dispatcher is already bound to a state machine"))
    }

    fn upgrade(&self) -> Option<Arc<StateMachine>> {
        let machine = self.machine.get().and_then(Weak::upgrade);
        if machine.is_none() {
            warn!("Dispatcher has no live state machine");
        }
        machine
    }

    /// [`StateMachine::dispatch`], or `false` if the machine is gone.
    pub fn dispatch(&self, signal: Signal) -> bool {
        self.upgrade()
            .is_some_and(|machine| machine.dispatch(signal))
    }

    /// [`StateMachine::dispatch_when`], or `false` if the machine is gone.
    pub fn dispatch_when<G>(&self, signal: Signal, guard: G) -> bool
    where
        G: FnOnce(AlarmState) -> bool,
    {
        self.upgrade()
            .is_some_and(|machine| machine.dispatch_when(signal, guard))
    }

    /// Current state of the bound machine.
    pub fn current_state(&self) -> Option<AlarmState> {
        self.upgrade().map(|machine| machine.current_state())
    }

    /// Whether a live machine is bound.
    pub fn is_bound(&self) -> bool {
        self.machine
            .get()
            .is_some_and(|machine| machine.strong_count() > 0)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bound", &self.is_bound())
            .finish()
    }
}
