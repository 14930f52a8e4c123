//! Cell Logger Error Hierarchy
//!
//! The engine itself never raises to the store: every failure below is either
//! surfaced at setup time (configuration, runtime wiring) or logged and
//! swallowed on the emission path.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Logger configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Formatter/sink failures for a single transaction
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// Best-effort provenance capture failures
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    /// Command channel and background task failures
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The sink rejected a finalized transaction
    #[error("Sink rejected transaction #{seq}: {reason}")]
    Rejected { seq: u64, reason: String },

    /// The sink panicked while formatting a transaction
    #[error("Sink panicked while emitting transaction #{seq}")]
    Panicked { seq: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("Provenance capture failed: {0}")]
    CaptureFailed(String),

    #[error("Provenance capture was dropped before resolving")]
    Dropped,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Logger runtime is gone; commands can no longer be delivered
    #[error("Failed to send {command} command: runtime stopped")]
    CommandSendFailed { command: &'static str },

    #[error("Failed to receive {command} acknowledgement: runtime stopped")]
    AckReceiveFailed { command: &'static str },
}
