use std::time::Duration;

use tokio::time::Instant;

/// Restartable quiet-period timer.
///
/// Disarmed until the first `reset`; every later `reset` pushes the deadline
/// out again, so only a quiet period of `delay` makes it expire.
#[derive(Clone, Debug)]
pub(crate) struct DebounceTimer {
    delay: Duration,
    next_deadline: Option<Instant>,
}

impl DebounceTimer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_deadline: None,
        }
    }

    /// (Re)arms the timer relative to `now`
    pub(crate) fn reset(
        &mut self,
        now: Instant,
    ) {
        self.next_deadline = Some(now + self.delay);
    }

    pub(crate) fn cancel(&mut self) {
        self.next_deadline = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.next_deadline.is_some()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    pub(crate) fn is_expired(
        &self,
        now: Instant,
    ) -> bool {
        matches!(self.next_deadline, Some(deadline) if deadline <= now)
    }
}
