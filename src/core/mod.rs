mod async_tracker;
mod cell;
mod clock;
mod dependency_map;
mod engine;
mod event;
mod event_recorder;
mod notification;
mod rules;
mod scheduler;
mod timer;
mod transaction;
mod transaction_manager;

pub(crate) use async_tracker::*;
pub use cell::*;
pub use clock::*;
pub(crate) use dependency_map::*;
pub use engine::*;
pub use event::*;
pub(crate) use event_recorder::*;
pub use notification::*;
pub(crate) use scheduler::*;
pub(crate) use timer::*;
pub use transaction::*;
pub(crate) use transaction_manager::*;

#[cfg(test)]
mod engine_test;
