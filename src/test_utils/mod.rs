//! Helpers shared by the unit tests: a manual clock, a recording sink and a
//! tiny store that plays the interception layer.
mod common;
mod fake_store;
mod recording_sink;

pub use common::*;
pub use fake_store::*;
pub use recording_sink::*;
