//! Alarm state machine engine.
//!
//! - [`TransitionTable`]: the `(state, signal) -> state` mapping.
//! - [`StateMachine`]: serialized dispatch with entry/exit actions and
//!   persistence.
//! - [`CountdownTimer`]: cancellable self-firing countdown used for the grace
//!   periods.
//! - [`StateStore`]: the persisted state record.

pub mod machine;
pub mod store;
pub mod table;
pub mod timer;

pub use machine::{Action, Dispatcher, StateDef, StateMachine, StateMachineBuilder, StateTransition};
pub use store::{MemoryStateStore, StateStore, YamlStateFile};
pub use table::TransitionTable;
pub use timer::{CountdownTimer, TickFn, TimerPhase};
