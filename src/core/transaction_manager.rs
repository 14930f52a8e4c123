use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::CallDescriptor;
use super::DebounceTimer;
use super::Event;
use super::Transaction;
use super::TransactionKind;
use crate::ProvenanceCapture;
use crate::ProvenanceSource;

/// Owns the single open-transaction slot and its debounce timer.
///
/// Invariants:
/// - at most one transaction is open; `start` force-closes the previous one
/// - sequence numbers are strictly increasing
/// - a closed transaction is returned to the caller and never touched again
pub(crate) struct TransactionManager {
    open: Option<Transaction>,
    timer: DebounceTimer,
    next_seq: u64,
    /// Depth of intercepted store calls currently on the stack
    call_depth: usize,
    provenance: Option<Arc<dyn ProvenanceSource>>,
}

impl TransactionManager {
    pub(crate) fn new(
        debounce: Duration,
        provenance: Option<Arc<dyn ProvenanceSource>>,
    ) -> Self {
        Self {
            open: None,
            timer: DebounceTimer::new(debounce),
            next_seq: 1,
            call_depth: 0,
            provenance,
        }
    }

    /// Opens a new transaction. Returns the previously open transaction,
    /// force-closed at `now`, if there was one.
    pub(crate) fn start(
        &mut self,
        descriptor: CallDescriptor,
        now: Instant,
    ) -> Option<Transaction> {
        let forced = self.close(Some(now));
        if let Some(tx) = &forced {
            debug!("transaction #{} force-closed by a new {}", tx.seq, descriptor.kind);
        }
        self.open_new(descriptor, now);
        forced
    }

    /// Opens a transaction only when none is open. Returns whether it did.
    pub(crate) fn begin(
        &mut self,
        descriptor: CallDescriptor,
        now: Instant,
    ) -> bool {
        if self.is_open() {
            return false;
        }
        self.open_new(descriptor, now);
        true
    }

    fn open_new(
        &mut self,
        descriptor: CallDescriptor,
        now: Instant,
    ) {
        let capture = self.provenance.as_ref().map(|source| source.capture(&descriptor));

        let seq = self.next_seq;
        self.next_seq += 1;
        let mut tx = Transaction::open(seq, descriptor, now);

        match capture {
            Some(ProvenanceCapture::Ready(provenance)) => tx.provenance = Some(provenance),
            Some(ProvenanceCapture::Deferred(receiver)) => tx.defer_provenance(receiver),
            Some(ProvenanceCapture::Unavailable) | None => {}
        }

        trace!("transaction #{} opened: {}", tx.seq, tx.kind);
        self.open = Some(tx);
    }

    /// Immediate: closes and returns the open transaction.
    /// Otherwise: stamps the end time and (re)arms the debounce timer.
    pub(crate) fn end(
        &mut self,
        immediate: bool,
        now: Instant,
    ) -> Option<Transaction> {
        if immediate {
            return self.close(Some(now));
        }

        self.touch(now);
        None
    }

    /// Records activity on the open transaction: its end timestamp moves to
    /// `now` and the debounce restarts.
    pub(crate) fn touch(
        &mut self,
        now: Instant,
    ) {
        if let Some(tx) = self.open.as_mut() {
            tx.stamp_end(now);
            self.timer.reset(now);
        }
    }

    /// Closes the open transaction once its quiet period has elapsed.
    ///
    /// Never fires while an intercepted call is still on the stack. The end
    /// timestamp stays at the last activity, not the firing time.
    pub(crate) fn poll_expired(
        &mut self,
        now: Instant,
    ) -> Option<Transaction> {
        if self.call_depth > 0 || !self.timer.is_expired(now) {
            return None;
        }
        let tx = self.close(None);
        if let Some(tx) = &tx {
            trace!("transaction #{} closed after quiet period", tx.seq);
        }
        tx
    }

    fn close(
        &mut self,
        stamp: Option<Instant>,
    ) -> Option<Transaction> {
        self.timer.cancel();
        let mut tx = self.open.take()?;
        if let Some(now) = stamp {
            tx.stamp_end(now);
        }
        tx.resolve_provenance();
        Some(tx)
    }

    pub(crate) fn push_event(
        &mut self,
        event: Event,
    ) -> Option<&mut Vec<Event>> {
        let tx = self.open.as_mut()?;
        tx.events.push(event);
        Some(&mut tx.events)
    }

    pub(crate) fn set_result(
        &mut self,
        result: Value,
    ) {
        if let Some(tx) = self.open.as_mut() {
            tx.result = Some(result);
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub(crate) fn active_seq(&self) -> Option<u64> {
        self.open.as_ref().map(|tx| tx.seq)
    }

    pub(crate) fn active(&self) -> Option<(u64, TransactionKind)> {
        self.open.as_ref().map(|tx| (tx.seq, tx.kind))
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.timer.next_deadline()
    }

    /// Returns true when this is the outermost call, i.e. the caller should
    /// start a transaction. Nested calls inside the synchronous span are
    /// suppressed.
    pub(crate) fn enter_call(&mut self) -> bool {
        self.call_depth += 1;
        self.call_depth == 1
    }

    /// Returns true when the outermost call has finished
    pub(crate) fn exit_call(&mut self) -> bool {
        self.call_depth = self.call_depth.saturating_sub(1);
        self.call_depth == 0
    }

    pub(crate) fn in_call(&self) -> bool {
        self.call_depth > 0
    }

    #[cfg(test)]
    pub(crate) fn open_transaction(&self) -> Option<&Transaction> {
        self.open.as_ref()
    }
}
