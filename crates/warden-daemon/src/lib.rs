//! Alarm daemon.
//!
//! Composition root for the alarm: loads configuration, builds the state
//! machine and its side effects, and runs the keypad, secret pipe and sensor
//! listeners under one [`Supervisor`](supervisor::Supervisor).

pub mod alarm;
pub mod collaborators;
pub mod config;
pub mod device;
pub mod secret;
pub mod supervisor;
pub mod workers;

pub use alarm::AlarmSystem;
pub use collaborators::Collaborators;
pub use config::Config;
pub use secret::SecretListener;
pub use supervisor::{ShutdownReport, Supervisor, TaskTermination, WorkerExit};
pub use workers::Workers;
