//! The per-instance logging engine.
//!
//! One [`LoggerEngine`] belongs to one store. It owns every piece of mutable
//! state (open transaction, dependency and correlation maps, emission queue),
//! so several stores can run isolated engines side by side. All methods are
//! synchronous; a host drives time through [`LoggerEngine::poll`] and
//! [`LoggerEngine::next_deadline`], or lets [`crate::LoggerRuntime`] do it.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::AsyncValueTracker;
use super::CallDescriptor;
use super::CellValue;
use super::Clock;
use super::DependencyChange;
use super::Event;
use super::EventKind;
use super::EventRecorder;
use super::HandleId;
use super::LogScheduler;
use super::Notification;
use super::OldValue;
use super::Subject;
use super::TokioClock;
use super::TransactionManager;
use crate::LabelPrefixFilter;
use crate::LoggerConfig;
use crate::ProvenanceSource;
use crate::TransactionSink;
use crate::VisibilityPolicy;

/// Token returned by [`LoggerEngine::enter_call`]; hand it back to
/// [`LoggerEngine::exit_call`] when the intercepted call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct CallScope {
    /// Sequence number of the transaction this scope opened, if outermost
    opened: Option<u64>,
}

impl CallScope {
    pub fn is_outermost(&self) -> bool {
        self.opened.is_some()
    }
}

pub struct EngineBuilder {
    config: LoggerConfig,
    sink: Box<dyn TransactionSink>,
    clock: Arc<dyn Clock>,
    visibility: Option<Arc<dyn VisibilityPolicy>>,
    provenance: Option<Arc<dyn ProvenanceSource>>,
}

impl EngineBuilder {
    pub fn new(
        config: LoggerConfig,
        sink: impl TransactionSink + 'static,
    ) -> Self {
        Self {
            config,
            sink: Box::new(sink),
            clock: Arc::new(TokioClock),
            visibility: None,
            provenance: None,
        }
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the label-prefix filter built from the configuration
    pub fn visibility(
        mut self,
        policy: impl VisibilityPolicy + 'static,
    ) -> Self {
        self.visibility = Some(Arc::new(policy));
        self
    }

    pub fn provenance(
        mut self,
        source: impl ProvenanceSource + 'static,
    ) -> Self {
        self.provenance = Some(Arc::new(source));
        self
    }

    pub fn build(self) -> LoggerEngine {
        let visibility: Arc<dyn VisibilityPolicy> = match self.visibility {
            Some(policy) => policy,
            None => Arc::new(LabelPrefixFilter::from_config(&self.config.visibility)),
        };

        LoggerEngine {
            transactions: TransactionManager::new(self.config.transaction.debounce(), self.provenance),
            recorder: EventRecorder::new(visibility.clone()),
            tracker: AsyncValueTracker::new(),
            scheduler: LogScheduler::new(&self.config.scheduler, self.sink, self.clock.clone()),
            visibility,
            clock: self.clock,
        }
    }
}

pub struct LoggerEngine {
    transactions: TransactionManager,
    recorder: EventRecorder,
    tracker: AsyncValueTracker,
    scheduler: LogScheduler,
    visibility: Arc<dyn VisibilityPolicy>,
    clock: Arc<dyn Clock>,
}

impl LoggerEngine {
    pub fn builder(
        config: LoggerConfig,
        sink: impl TransactionSink + 'static,
    ) -> EngineBuilder {
        EngineBuilder::new(config, sink)
    }

    /// An intercepted read/write/subscribe call begins.
    ///
    /// Only the outermost call of a synchronous span opens a transaction
    /// (force-closing any transaction still waiting for its quiet period).
    pub fn enter_call(
        &mut self,
        descriptor: CallDescriptor,
    ) -> CallScope {
        if !self.transactions.enter_call() {
            trace!("nested {} suppressed", descriptor.kind);
            return CallScope { opened: None };
        }

        let now = self.clock.now();
        if let Some(forced) = self.transactions.start(descriptor, now) {
            self.scheduler.add(forced);
        }
        CallScope {
            opened: self.transactions.active_seq(),
        }
    }

    /// The intercepted call returned. The outermost scope stores the result
    /// and lets the transaction close after its quiet period.
    pub fn exit_call(
        &mut self,
        scope: CallScope,
        result: Option<Value>,
    ) {
        if !self.transactions.exit_call() {
            return;
        }
        let Some(seq) = scope.opened else {
            return;
        };
        if self.transactions.active_seq() != Some(seq) {
            debug!("transaction #{} closed before its call returned", seq);
            return;
        }

        if let Some(result) = result {
            self.transactions.set_result(result);
        }
        let now = self.clock.now();
        self.transactions.touch(now);
    }

    /// One raw notification from the store
    pub fn notify(
        &mut self,
        notification: Notification,
    ) {
        let now = self.clock.now();
        trace!("notification: {}", notification.name());
        match notification {
            Notification::ValueChanged { cell, previous, value } => {
                self.on_value_changed(cell, previous, value, now)
            }
            Notification::DependencyAdded { cell, dependency } => match dependency {
                Subject::Cell(dependency) => self.record(
                    Event::new(cell, EventKind::DependenciesChanged {
                        change: DependencyChange::Added(dependency),
                    }),
                    now,
                ),
                Subject::Reclaimed(identity) => {
                    trace!("ignoring reclaimed dependency {} of {}", identity, cell)
                }
            },
            Notification::DependenciesCleared { cell } => self.record(
                Event::new(cell, EventKind::DependenciesChanged {
                    change: DependencyChange::Cleared,
                }),
                now,
            ),
            Notification::Mounted { cell, value } => {
                self.record(Event::new(cell, EventKind::Mounted { value }), now)
            }
            Notification::Unmounted { cell } => self.record(Event::new(cell, EventKind::Unmounted), now),
            Notification::Destroyed { cell } => {
                let id = cell.cell_id();
                self.record(Event::new(cell, EventKind::Destroyed), now);
                if let Some(id) = id {
                    self.recorder.evict(id);
                    self.tracker.evict(id);
                }
            }
        }
    }

    fn on_value_changed(
        &mut self,
        cell: Subject,
        previous: Option<CellValue>,
        value: CellValue,
        now: Instant,
    ) {
        let old = self.tracker.resolve_previous(previous.as_ref());
        if let Some(id) = cell.cell_id() {
            self.tracker.release_superseded(id);
        }

        let event = match value {
            CellValue::Ready(value) => match old {
                None => Event::new(cell, EventKind::Initialized { value }),
                Some(old) => Event::new(cell, EventKind::Changed {
                    old: OldValue::Single(old),
                    new_value: value,
                }),
            },
            CellValue::Async(handle) => {
                let pending_in = self.transactions.active_seq();
                self.tracker.track_pending(cell, handle, old, pending_in)
            }
        };
        self.record(event, now);
    }

    /// Settlement callback of an asynchronous value
    pub fn settle(
        &mut self,
        handle: HandleId,
        outcome: std::result::Result<Value, Value>,
    ) {
        let now = self.clock.now();
        let Some(settlement) = self.tracker.settle(handle, outcome, self.transactions.active()) else {
            return;
        };

        match settlement.open {
            Some(kind) if self.visibility.is_visible(&settlement.event.subject) => {
                let descriptor = CallDescriptor::new(kind, Some(settlement.event.subject.clone()));
                if let Some(forced) = self.transactions.start(descriptor, now) {
                    self.scheduler.add(forced);
                }
                self.record(settlement.event, now);
                // closes after the quiet period so concurrent settlements coalesce
                self.transactions.touch(now);
            }
            _ => self.record(settlement.event, now),
        }
    }

    /// Cancellation callback of an asynchronous value
    pub fn abort(
        &mut self,
        handle: HandleId,
    ) {
        let now = self.clock.now();
        if let Some(event) = self.tracker.abort(handle) {
            self.record(event, now);
        }
    }

    fn record(
        &mut self,
        event: Event,
        now: Instant,
    ) {
        if let Some(tx) = self
            .recorder
            .record(event, &mut self.transactions, &self.tracker, now)
        {
            self.scheduler.add(tx);
        }
    }

    /// Closes the open transaction right away. No-op when none is open.
    pub fn flush(&mut self) {
        let now = self.clock.now();
        if let Some(tx) = self.transactions.end(true, now) {
            self.scheduler.add(tx);
        }
    }

    /// Flushes and then emits every queued transaction synchronously
    pub fn drain(&mut self) {
        self.flush();
        self.scheduler.drain();
    }

    /// Fires an expired debounce timer and runs a due scheduler slice.
    ///
    /// `host_idle` is false when the host still has work queued; the pending
    /// slice then only runs once its idle timeout is reached.
    pub fn poll(
        &mut self,
        host_idle: bool,
    ) {
        let now = self.clock.now();
        if let Some(tx) = self.transactions.poll_expired(now) {
            self.scheduler.add(tx);
        }
        self.scheduler.poll(now, host_idle);
    }

    /// Earliest instant at which [`Self::poll`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let debounce = if self.transactions.in_call() {
            None
        } else {
            self.transactions.next_deadline()
        };
        let slice = self.scheduler.continuation().map(|c| c.resume_at);

        match (debounce, slice) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Instant at which a pending slice preempts a busy host
    pub fn force_deadline(&self) -> Option<Instant> {
        self.scheduler.continuation().map(|c| c.force_at)
    }

    pub fn in_call(&self) -> bool {
        self.transactions.in_call()
    }

    pub fn has_open_transaction(&self) -> bool {
        self.transactions.is_open()
    }

    /// Transactions finalized but not yet emitted
    pub fn queued(&self) -> usize {
        self.scheduler.len()
    }

    pub fn is_idle(&self) -> bool {
        !self.transactions.is_open() && self.scheduler.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    #[cfg(test)]
    pub(crate) fn tracker(&self) -> &AsyncValueTracker {
        &self.tracker
    }

    #[cfg(test)]
    pub(crate) fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }
}
