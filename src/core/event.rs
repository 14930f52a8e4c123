use serde::Serialize;
use serde_json::Value;

use super::CellId;
use super::CellRef;
use super::HandleId;
use super::Payload;
use super::Subject;

/// Whether an asynchronous value is a cell's first value or replaces one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AsyncOrigin {
    Initial,
    Changed { old_value: Payload },
}

impl AsyncOrigin {
    pub fn from_previous(previous: Option<Payload>) -> Self {
        match previous {
            Some(old_value) => AsyncOrigin::Changed { old_value },
            None => AsyncOrigin::Initial,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, AsyncOrigin::Initial)
    }
}

/// Old value(s) carried by a `changed` event.
///
/// `Merged` replaces `Single` once two `changed` events for the same cell have
/// been folded together inside one transaction; order is oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OldValue {
    Single(Payload),
    Merged(Vec<Payload>),
}

impl OldValue {
    pub fn into_vec(self) -> Vec<Payload> {
        match self {
            OldValue::Single(payload) => vec![payload],
            OldValue::Merged(payloads) => payloads,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DependencyChange {
    Added(CellRef),
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventKind {
    Initialized {
        value: Value,
    },
    Changed {
        old: OldValue,
        new_value: Value,
    },
    AsyncPending {
        handle: HandleId,
        origin: AsyncOrigin,
    },
    AsyncResolved {
        handle: HandleId,
        origin: AsyncOrigin,
        value: Value,
    },
    AsyncRejected {
        handle: HandleId,
        origin: AsyncOrigin,
        error: Value,
    },
    AsyncAborted {
        handle: HandleId,
        origin: AsyncOrigin,
    },
    DependenciesChanged {
        change: DependencyChange,
    },
    Mounted {
        value: Option<Value>,
    },
    Unmounted,
    Destroyed,
}

impl EventKind {
    /// Terminal events are not enriched with a graph snapshot
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Unmounted | EventKind::Destroyed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Initialized { .. } => "initialized",
            EventKind::Changed { .. } => "changed",
            EventKind::AsyncPending { origin, .. } if origin.is_initial() => "initial async pending",
            EventKind::AsyncPending { .. } => "changed async pending",
            EventKind::AsyncResolved { origin, .. } if origin.is_initial() => "initial async resolved",
            EventKind::AsyncResolved { .. } => "changed async resolved",
            EventKind::AsyncRejected { origin, .. } if origin.is_initial() => "initial async rejected",
            EventKind::AsyncRejected { .. } => "changed async rejected",
            EventKind::AsyncAborted { origin, .. } if origin.is_initial() => "initial async aborted",
            EventKind::AsyncAborted { .. } => "changed async aborted",
            EventKind::DependenciesChanged { .. } => "dependencies changed",
            EventKind::Mounted { .. } => "mounted",
            EventKind::Unmounted => "unmounted",
            EventKind::Destroyed => "destroyed",
        }
    }
}

/// Graph state of the subject cell at the time the event was recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellSnapshot {
    pub dependencies: Vec<CellId>,
    pub dependents: Vec<CellId>,
    pub pending_handles: Vec<HandleId>,
}

/// One state-change notification inside a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub subject: Subject,
    pub kind: EventKind,
    pub snapshot: Option<CellSnapshot>,
}

impl Event {
    pub fn new(
        subject: Subject,
        kind: EventKind,
    ) -> Self {
        Self {
            subject,
            kind,
            snapshot: None,
        }
    }
}
