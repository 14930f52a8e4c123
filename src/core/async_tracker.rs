//! State machine for in-flight asynchronous cell values.
//!
//! ```text
//!             +-> resolved
//!  pending ---+-> rejected
//!             +-> aborted   (late settlements are ignored)
//! ```
//!
//! A handle leaves `in_flight` on its first terminal transition, so any
//! later abort or settlement for it finds nothing and is a no-op.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use super::AsyncOrigin;
use super::CellId;
use super::CellValue;
use super::Event;
use super::EventKind;
use super::HandleId;
use super::Payload;
use super::Subject;
use super::TransactionKind;

#[derive(Debug)]
struct TrackedHandle {
    subject: Subject,
    origin: AsyncOrigin,
    /// Transaction that was open when the handle became pending
    pending_in: Option<u64>,
}

/// Result of a settlement that still has to be recorded
#[derive(Debug)]
pub(crate) struct Settlement {
    pub(crate) event: Event,
    /// Set when the event needs a fresh transaction of this kind
    pub(crate) open: Option<TransactionKind>,
}

#[derive(Debug, Default)]
pub(crate) struct AsyncValueTracker {
    /// Last known settled value (or the pre-pending value) per handle
    correlation: HashMap<HandleId, Payload>,
    in_flight: HashMap<HandleId, TrackedHandle>,
    by_cell: HashMap<CellId, Vec<HandleId>>,
}

impl AsyncValueTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Maps a raw previous value to the "old value" worth reporting.
    ///
    /// `None` means the new value counts as initial: either the cell never had
    /// a value, or its previous value was a handle that never settled and had
    /// no meaningful predecessor of its own.
    pub(crate) fn resolve_previous(
        &self,
        previous: Option<&CellValue>,
    ) -> Option<Payload> {
        match previous? {
            CellValue::Ready(value) => Some(Payload::Value(value.clone())),
            CellValue::Async(handle) => self.correlation.get(handle).cloned(),
        }
    }

    /// Forgets correlations of handles the cell no longer needs; call after
    /// `resolve_previous` and before tracking the cell's new value.
    pub(crate) fn release_superseded(
        &mut self,
        cell: CellId,
    ) {
        let Some(handles) = self.by_cell.get_mut(&cell) else {
            return;
        };
        for handle in handles.iter() {
            self.correlation.remove(handle);
        }
        handles.retain(|h| self.in_flight.contains_key(h));
        if handles.is_empty() {
            self.by_cell.remove(&cell);
        }
    }

    /// Starts tracking a new pending handle and returns its `pending` event.
    pub(crate) fn track_pending(
        &mut self,
        subject: Subject,
        handle: HandleId,
        previous: Option<Payload>,
        pending_in: Option<u64>,
    ) -> Event {
        // registered before settlement so a successor superseding this
        // handle early still finds the right old value; handles of reclaimed
        // subjects have no cell that could ever read it back
        if let Some(cell) = subject.cell_id() {
            if let Some(old_value) = &previous {
                self.correlation.insert(handle, old_value.clone());
            }
            self.by_cell.entry(cell).or_default().push(handle);
        }

        let origin = AsyncOrigin::from_previous(previous);
        self.in_flight.insert(
            handle,
            TrackedHandle {
                subject: subject.clone(),
                origin: origin.clone(),
                pending_in,
            },
        );

        Event::new(subject, EventKind::AsyncPending { handle, origin })
    }

    /// Handles the cancellation callback. `None` if the handle already
    /// settled, was already aborted, or was never tracked.
    pub(crate) fn abort(
        &mut self,
        handle: HandleId,
    ) -> Option<Event> {
        let Some(tracked) = self.in_flight.remove(&handle) else {
            trace!("ignoring abort of {}: not in flight", handle);
            return None;
        };

        Some(Event::new(
            tracked.subject,
            EventKind::AsyncAborted {
                handle,
                origin: tracked.origin,
            },
        ))
    }

    /// Handles a settlement. `active` is the currently open transaction.
    pub(crate) fn settle(
        &mut self,
        handle: HandleId,
        outcome: Result<Value, Value>,
        active: Option<(u64, TransactionKind)>,
    ) -> Option<Settlement> {
        let Some(tracked) = self.in_flight.remove(&handle) else {
            trace!("ignoring settlement of {}: aborted or unknown", handle);
            return None;
        };

        if self.is_owned(&tracked.subject, handle) {
            self.correlation.insert(handle, Payload::from(outcome.clone()));
        }

        let (kind, tx_kind) = match outcome {
            Ok(value) => (
                EventKind::AsyncResolved {
                    handle,
                    origin: tracked.origin,
                    value,
                },
                TransactionKind::AsyncResolved,
            ),
            Err(error) => (
                EventKind::AsyncRejected {
                    handle,
                    origin: tracked.origin,
                    error,
                },
                TransactionKind::AsyncRejected,
            ),
        };

        let open = can_open_transaction(tracked.pending_in, active).then_some(tx_kind);
        Some(Settlement {
            event: Event::new(tracked.subject, kind),
            open,
        })
    }

    /// Handles of `cell` that have not settled yet
    pub(crate) fn pending_for(
        &self,
        cell: CellId,
    ) -> Vec<HandleId> {
        self.by_cell
            .get(&cell)
            .map(|handles| {
                handles
                    .iter()
                    .filter(|h| self.in_flight.contains_key(h))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drops the correlations owned by a reclaimed cell. Handles still in
    /// flight stay tracked so their terminal event is still reported.
    pub(crate) fn evict(
        &mut self,
        cell: CellId,
    ) {
        if let Some(handles) = self.by_cell.remove(&cell) {
            for handle in handles {
                self.correlation.remove(&handle);
            }
        }
    }

    /// Whether a live cell still lists `handle`; evicted or reclaimed
    /// owners never read the correlation again
    fn is_owned(
        &self,
        subject: &Subject,
        handle: HandleId,
    ) -> bool {
        subject
            .cell_id()
            .and_then(|cell| self.by_cell.get(&cell))
            .is_some_and(|handles| handles.contains(&handle))
    }

    #[cfg(test)]
    pub(crate) fn correlated(
        &self,
        handle: HandleId,
    ) -> Option<&Payload> {
        self.correlation.get(&handle)
    }
}

/// Whether a settlement needs its own transaction.
///
/// It does not when the transaction it became pending in is still open
/// (synchronous continuation), or when the open transaction is itself a
/// settlement transaction (concurrent settlements coalesce).
pub(crate) fn can_open_transaction(
    pending_in: Option<u64>,
    active: Option<(u64, TransactionKind)>,
) -> bool {
    match active {
        None => true,
        Some((seq, _)) if pending_in == Some(seq) => false,
        Some((_, kind)) if kind.is_settlement() => false,
        Some(_) => true,
    }
}
