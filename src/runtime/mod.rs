//! Background task that owns a [`crate::LoggerEngine`] and drives its timers.
//!
//! Store hooks talk to the task through a cloneable [`LoggerHandle`]; all
//! engine state stays on the single task, so no locking is needed.
mod command;
mod handle;
mod logger_runtime;

pub use command::*;
pub use handle::*;
pub use logger_runtime::*;
