use serde_json::Value;

use super::CellValue;
use super::Subject;

/// Raw notification raised by the store interception layer
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A cell received a value. `previous` is `None` for its first value ever.
    ValueChanged {
        cell: Subject,
        previous: Option<CellValue>,
        value: CellValue,
    },
    DependencyAdded {
        cell: Subject,
        dependency: Subject,
    },
    DependenciesCleared {
        cell: Subject,
    },
    Mounted {
        cell: Subject,
        value: Option<Value>,
    },
    Unmounted {
        cell: Subject,
    },
    /// The store reclaimed the cell
    Destroyed {
        cell: Subject,
    },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::ValueChanged { .. } => "value_changed",
            Notification::DependencyAdded { .. } => "dependency_added",
            Notification::DependenciesCleared { .. } => "dependencies_cleared",
            Notification::Mounted { .. } => "mounted",
            Notification::Unmounted { .. } => "unmounted",
            Notification::Destroyed { .. } => "destroyed",
        }
    }
}
