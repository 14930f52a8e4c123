use std::sync::Arc;

use tokio::time::Instant;
use tracing::trace;

use super::rules;
use super::AsyncValueTracker;
use super::CallDescriptor;
use super::CellId;
use super::CellSnapshot;
use super::DependencyChange;
use super::DependencyMap;
use super::Event;
use super::EventKind;
use super::Transaction;
use super::TransactionManager;
use crate::metrics::EVENTS_FILTERED;
use crate::metrics::EVENTS_RECORDED;
use crate::VisibilityPolicy;

/// Accepts single events, enriches them and appends them to the open
/// transaction, applying the incremental rewrite rules.
pub(crate) struct EventRecorder {
    visibility: Arc<dyn VisibilityPolicy>,
    dependencies: DependencyMap,
}

impl EventRecorder {
    pub(crate) fn new(visibility: Arc<dyn VisibilityPolicy>) -> Self {
        Self {
            visibility,
            dependencies: DependencyMap::new(),
        }
    }

    /// Records one event.
    ///
    /// Returns a transaction that must go to the scheduler: when no
    /// transaction was open, the event is wrapped in a synthesized `Unknown`
    /// transaction that is closed immediately.
    pub(crate) fn record(
        &mut self,
        mut event: Event,
        transactions: &mut TransactionManager,
        tracker: &AsyncValueTracker,
        now: Instant,
    ) -> Option<Transaction> {
        if !self.visibility.is_visible(&event.subject) {
            trace!("dropping {} event for hidden {}", event.kind.name(), event.subject);
            EVENTS_FILTERED.inc();
            return None;
        }

        if let EventKind::DependenciesChanged { change } = &event.kind {
            let Some(cell) = event.subject.cell_id() else {
                return None;
            };
            match change {
                DependencyChange::Added(dependency) => {
                    if !self.visibility.is_visible(&dependency.clone().into()) {
                        EVENTS_FILTERED.inc();
                        return None;
                    }
                    self.dependencies.add(cell, dependency.id);
                }
                DependencyChange::Cleared => self.dependencies.clear(cell),
            }
        }

        if !event.kind.is_terminal() {
            if let Some(cell) = event.subject.cell_id() {
                event.snapshot = Some(CellSnapshot {
                    dependencies: self.dependencies.dependencies_of(cell),
                    dependents: self.dependencies.dependents_of(cell),
                    pending_handles: tracker.pending_for(cell),
                });
            }
        }

        if transactions.begin(CallDescriptor::unknown(), now) {
            Self::append(event, transactions);
            return transactions.end(true, now);
        }

        Self::append(event, transactions);
        transactions.touch(now);
        None
    }

    fn append(
        event: Event,
        transactions: &mut TransactionManager,
    ) {
        if let Some(events) = transactions.push_event(event) {
            EVENTS_RECORDED.inc();
            rules::merge_changed(events);
            rules::reorder_abort(events);
        }
    }

    /// Eviction hook for a `destroyed` cell
    pub(crate) fn evict(
        &mut self,
        cell: CellId,
    ) {
        self.dependencies.evict(cell);
    }

    #[cfg(test)]
    pub(crate) fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }
}
