use tokio::time::Instant;

/// Time source shared by the engine components.
///
/// Production code reads the tokio clock (so paused-time tests work); unit
/// tests inject a manual clock to make slice budgets deterministic.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
