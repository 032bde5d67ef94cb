//! Core types shared by every Warden crate.
//!
//! The alarm is modelled as a closed set of [`AlarmState`]s driven by a closed
//! set of [`Signal`]s. Both are plain enums with stable small-integer indices
//! so the transition table can be a fixed-size array.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
