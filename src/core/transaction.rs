use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::Instant;
use tracing::debug;

use super::Event;
use super::Subject;
use crate::ProvenanceError;

/// What triggered a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    CellRead,
    CellWrite,
    Subscribe,
    Unsubscribe,
    AsyncResolved,
    AsyncRejected,
    /// Synthesized for events raised outside any intercepted call
    Unknown,
}

impl TransactionKind {
    /// Transactions opened by an async settlement rather than a store call
    pub fn is_settlement(&self) -> bool {
        matches!(self, TransactionKind::AsyncResolved | TransactionKind::AsyncRejected)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            TransactionKind::CellRead => "retrieved value",
            TransactionKind::CellWrite => "set value",
            TransactionKind::Subscribe => "subscribed",
            TransactionKind::Unsubscribe => "unsubscribed",
            TransactionKind::AsyncResolved => "async resolved",
            TransactionKind::AsyncRejected => "async rejected",
            TransactionKind::Unknown => "unknown event",
        };
        f.write_str(name)
    }
}

/// Describes the operation a transaction is attributed to
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    pub kind: TransactionKind,
    pub subject: Option<Subject>,
    pub args: Option<Vec<Value>>,
}

impl CallDescriptor {
    pub fn new(
        kind: TransactionKind,
        subject: Option<Subject>,
    ) -> Self {
        Self {
            kind,
            subject,
            args: None,
        }
    }

    pub fn read(subject: impl Into<Subject>) -> Self {
        Self::new(TransactionKind::CellRead, Some(subject.into()))
    }

    pub fn write(
        subject: impl Into<Subject>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            kind: TransactionKind::CellWrite,
            subject: Some(subject.into()),
            args: Some(args),
        }
    }

    pub fn subscribe(subject: impl Into<Subject>) -> Self {
        Self::new(TransactionKind::Subscribe, Some(subject.into()))
    }

    pub fn unsubscribe(subject: impl Into<Subject>) -> Self {
        Self::new(TransactionKind::Unsubscribe, Some(subject.into()))
    }

    pub fn unknown() -> Self {
        Self::new(TransactionKind::Unknown, None)
    }
}

/// Caller provenance attached to a transaction on a best-effort basis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Provenance {
    /// Owning component, when the host can name one
    pub owner: Option<String>,
    /// Outermost-first call frames
    pub frames: Vec<String>,
}

pub(crate) type ProvenanceReceiver = oneshot::Receiver<std::result::Result<Provenance, ProvenanceError>>;

/// A grouped batch of events attributed to one triggering operation.
///
/// Mutated only while open inside the transaction manager; once handed to the
/// scheduler only a late provenance may still be attached.
#[derive(Debug)]
pub struct Transaction {
    pub seq: u64,
    pub kind: TransactionKind,
    pub subject: Option<Subject>,
    pub args: Option<Vec<Value>>,
    pub result: Option<Value>,
    pub events: Vec<Event>,
    pub started_at: Instant,
    pub ended_at: Instant,
    pub provenance: Option<Provenance>,
    pending_provenance: Option<ProvenanceReceiver>,
}

impl Transaction {
    pub(crate) fn open(
        seq: u64,
        descriptor: CallDescriptor,
        now: Instant,
    ) -> Self {
        Self {
            seq,
            kind: descriptor.kind,
            subject: descriptor.subject,
            args: descriptor.args,
            result: None,
            events: Vec::new(),
            started_at: now,
            ended_at: now,
            provenance: None,
            pending_provenance: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn stamp_end(
        &mut self,
        now: Instant,
    ) {
        // monotonic clocks never go backwards, but a manual test clock may
        self.ended_at = now.max(self.started_at);
    }

    pub(crate) fn defer_provenance(
        &mut self,
        receiver: ProvenanceReceiver,
    ) {
        self.pending_provenance = Some(receiver);
    }

    #[cfg(test)]
    pub(crate) fn has_pending_provenance(&self) -> bool {
        self.pending_provenance.is_some()
    }

    /// Attaches a deferred provenance if it has resolved by now.
    ///
    /// Failures are swallowed: the transaction simply carries no provenance.
    pub(crate) fn resolve_provenance(&mut self) {
        let Some(receiver) = self.pending_provenance.as_mut() else {
            return;
        };

        match receiver.try_recv() {
            Ok(Ok(provenance)) => {
                self.provenance = Some(provenance);
                self.pending_provenance = None;
            }
            Ok(Err(e)) => {
                debug!("transaction #{} proceeds without provenance: {}", self.seq, e);
                self.pending_provenance = None;
            }
            Err(TryRecvError::Closed) => {
                debug!("transaction #{} proceeds without provenance: {}", self.seq, ProvenanceError::Dropped);
                self.pending_provenance = None;
            }
            Err(TryRecvError::Empty) => {}
        }
    }

    /// Gives up on a provenance that is still pending.
    pub(crate) fn abandon_provenance(&mut self) {
        if self.pending_provenance.take().is_some() {
            debug!("transaction #{} emitted before provenance resolved", self.seq);
        }
    }
}
