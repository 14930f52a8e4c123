//! Cell identity and value payloads as seen by the logger.
//!
//! The store owns the cells; the logger only ever holds a stable [`CellId`]
//! plus a display label. A cell the store has already reclaimed is reported
//! as a bare identity string ([`Subject::Reclaimed`]).

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Stable identity of a cell inside one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "cell{}", self.0)
    }
}

/// Identity of one in-flight asynchronous value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "handle{}", self.0)
    }
}

/// A live cell reference: identity plus optional debug label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CellRef {
    pub id: CellId,
    pub label: Option<Arc<str>>,
}

impl CellRef {
    pub fn new(id: u64) -> Self {
        Self {
            id: CellId(id),
            label: None,
        }
    }

    pub fn labeled(
        id: u64,
        label: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            id: CellId(id),
            label: Some(label.into()),
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}:{}", self.id, label),
            None => write!(f, "{}", self.id),
        }
    }
}

/// What an event or transaction is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Subject {
    Cell(CellRef),
    /// The cell was already reclaimed; only its identity string survives
    Reclaimed(String),
}

impl Subject {
    pub fn cell_id(&self) -> Option<CellId> {
        match self {
            Subject::Cell(cell) => Some(cell.id),
            Subject::Reclaimed(_) => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Subject::Cell(cell) => cell.label.as_deref(),
            Subject::Reclaimed(_) => None,
        }
    }

    /// Whether two subjects denote the same cell
    pub fn same_cell(
        &self,
        other: &Subject,
    ) -> bool {
        match (self, other) {
            (Subject::Cell(a), Subject::Cell(b)) => a.id == b.id,
            (Subject::Reclaimed(a), Subject::Reclaimed(b)) => a == b,
            _ => false,
        }
    }
}

impl From<CellRef> for Subject {
    fn from(cell: CellRef) -> Self {
        Subject::Cell(cell)
    }
}

impl fmt::Display for Subject {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Subject::Cell(cell) => cell.fmt(f),
            Subject::Reclaimed(identity) => f.write_str(identity),
        }
    }
}

/// Raw value a store reports for a cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Ready(Value),
    Async(HandleId),
}

/// A settled value or error, used wherever an "old value" is reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    Value(Value),
    Error(Value),
}

impl From<Result<Value, Value>> for Payload {
    fn from(outcome: Result<Value, Value>) -> Self {
        match outcome {
            Ok(value) => Payload::Value(value),
            Err(error) => Payload::Error(error),
        }
    }
}
