use std::collections::VecDeque;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use prometheus::IntGauge;
use tokio::time::Instant;
use tracing::error;
use tracing::trace;

use super::Clock;
use super::Transaction;
use crate::metrics::SCHEDULER_QUEUE_DEPTH;
use crate::metrics::SINK_FAILURES;
use crate::metrics::TRANSACTIONS_EMITTED;
use crate::EmitError;
use crate::SchedulerConfig;
use crate::SchedulingMode;
use crate::TransactionSink;

/// A slice that yielded with work left over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Continuation {
    /// Earliest time the next slice may run (when the host is idle)
    pub(crate) resume_at: Instant,
    /// Time after which the next slice runs even if the host is busy
    pub(crate) force_at: Instant,
}

/// FIFO of finalized transactions drained to the sink under a per-slice
/// time budget.
pub(crate) struct LogScheduler {
    queue: VecDeque<Transaction>,
    processing: bool,
    mode: SchedulingMode,
    budget: Option<Duration>,
    idle_timeout: Duration,
    resume_delay: Duration,
    continuation: Option<Continuation>,
    sink: Box<dyn TransactionSink>,
    clock: Arc<dyn Clock>,
    /// Shared by every scheduler in the process; each one only adds and
    /// subtracts its own transactions
    queue_depth: IntGauge,
}

impl LogScheduler {
    pub(crate) fn new(
        config: &SchedulerConfig,
        sink: Box<dyn TransactionSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue: VecDeque::new(),
            processing: false,
            mode: config.mode,
            budget: config.slice_budget(),
            idle_timeout: config.idle_timeout(),
            resume_delay: config.resume_delay(),
            continuation: None,
            sink,
            clock,
            queue_depth: SCHEDULER_QUEUE_DEPTH.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_queue_depth(
        mut self,
        gauge: IntGauge,
    ) -> Self {
        self.queue_depth = gauge;
        self
    }

    /// Enqueues a finalized transaction.
    ///
    /// Budgeted idle mode only schedules a slice so emission stays off the
    /// caller's path; the other modes drain right away.
    pub(crate) fn add(
        &mut self,
        transaction: Transaction,
    ) {
        trace!("transaction #{} queued", transaction.seq);
        self.queue.push_back(transaction);
        self.queue_depth.inc();

        if self.is_sliced() {
            self.schedule();
        } else {
            self.process();
        }
    }

    fn is_sliced(&self) -> bool {
        self.mode == SchedulingMode::Idle && self.budget.is_some()
    }

    fn schedule(&mut self) {
        if self.continuation.is_some() || self.queue.is_empty() {
            return;
        }
        let now = self.clock.now();
        self.continuation = Some(Continuation {
            resume_at: now + self.resume_delay,
            force_at: now + self.idle_timeout,
        });
    }

    /// Runs one drain pass. No-op while a pass is already running.
    ///
    /// Budgeted idle mode emits until the budget is spent (at least one
    /// transaction per slice) and then schedules a continuation; immediate
    /// mode and a disabled budget drain everything synchronously.
    /// Transactions added meanwhile are picked up by the next slice.
    pub(crate) fn process(&mut self) {
        if self.processing {
            return;
        }
        self.processing = true;

        match (self.mode, self.budget) {
            (SchedulingMode::Idle, Some(budget)) => self.run_slice(budget),
            _ => {
                while let Some(tx) = self.pop() {
                    self.emit(tx);
                }
            }
        }

        self.processing = false;

        if !self.queue.is_empty() {
            trace!("slice yielded with {} transactions left", self.queue.len());
            self.schedule();
        }
    }

    fn run_slice(
        &mut self,
        budget: Duration,
    ) {
        let started = self.clock.now();
        while let Some(tx) = self.pop() {
            self.emit(tx);
            if self.clock.now().saturating_duration_since(started) >= budget {
                break;
            }
        }
    }

    /// Runs the pending continuation if it is due at `now`.
    ///
    /// `host_idle` tells whether the host has nothing else queued; a busy
    /// host only gets preempted once the idle timeout is reached.
    pub(crate) fn poll(
        &mut self,
        now: Instant,
        host_idle: bool,
    ) -> bool {
        let Some(continuation) = self.continuation else {
            return false;
        };
        let due = (host_idle && now >= continuation.resume_at) || now >= continuation.force_at;
        if !due {
            return false;
        }

        self.continuation = None;
        self.process();
        true
    }

    /// Emits everything synchronously, ignoring the budget
    pub(crate) fn drain(&mut self) {
        if self.processing {
            return;
        }
        self.continuation = None;
        self.processing = true;
        while let Some(tx) = self.pop() {
            self.emit(tx);
        }
        self.processing = false;
    }

    fn pop(&mut self) -> Option<Transaction> {
        let tx = self.queue.pop_front()?;
        self.queue_depth.dec();
        Some(tx)
    }

    /// A failing (or panicking) sink never stops the drain loop
    fn emit(
        &mut self,
        mut tx: Transaction,
    ) {
        tx.resolve_provenance();
        tx.abandon_provenance();

        let seq = tx.seq;
        let sink = &mut self.sink;
        let result = match catch_unwind(AssertUnwindSafe(|| sink.emit(tx))) {
            Ok(result) => result,
            Err(_) => Err(EmitError::Panicked { seq }.into()),
        };

        match result {
            Ok(()) => TRANSACTIONS_EMITTED.inc(),
            Err(e) => {
                SINK_FAILURES.inc();
                error!("failed to emit transaction #{}: {}", seq, e);
            }
        }
    }

    pub(crate) fn continuation(&self) -> Option<Continuation> {
        self.continuation
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Drop for LogScheduler {
    fn drop(&mut self) {
        self.queue_depth.sub(self.queue.len() as i64);
    }
}
