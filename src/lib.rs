//! Activity logger engine for reactive state stores.
//!
//! A store interception layer reports raw notifications (values initialized
//! or changed, dependencies added, cells mounted/unmounted/destroyed) and
//! intercepted read/write/subscribe call boundaries. The engine
//!
//! - groups the cascade of notifications caused by one operation into a
//!   [`Transaction`],
//! - follows asynchronous cell values through pending, resolved, rejected and
//!   aborted, recovering meaningful old values across races,
//! - drains finalized transactions to a [`TransactionSink`] in strict FIFO
//!   order under a per-slice time budget.
//!
//! [`LoggerEngine`] is the synchronous per-store context; [`LoggerRuntime`]
//! runs one on a tokio task and drives its timers.

mod collaborator;
mod config;
mod core;
mod errors;
pub mod metrics;
mod runtime;

pub use self::core::*;

pub use collaborator::*;
pub use self::config::*;
pub use errors::*;
pub use runtime::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
