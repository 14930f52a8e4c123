//! Seams to the collaborators the engine does not own: the formatter that
//! receives finalized transactions, the cell-visibility policy and the
//! caller-provenance source.
mod provenance;
mod sink;
mod visibility;
pub use provenance::*;
pub use sink::*;
pub use visibility::*;
