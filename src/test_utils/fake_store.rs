use std::collections::HashMap;

use serde_json::Value;

use crate::CallDescriptor;
use crate::CellRef;
use crate::CellValue;
use crate::LoggerEngine;
use crate::Notification;
use crate::Subject;

type Formula = fn(&[Value]) -> Value;

struct Derived {
    dependencies: Vec<CellRef>,
    formula: Formula,
    /// Dependency values the cached value was computed from
    computed_from: Option<Vec<Value>>,
}

/// Minimal store with primitive and derived cells. Every read and write goes
/// through the engine the way an interception layer would report it.
pub struct FakeStore {
    pub engine: LoggerEngine,
    values: HashMap<u64, Value>,
    derived: HashMap<u64, Derived>,
    next_id: u64,
}

impl FakeStore {
    pub fn new(engine: LoggerEngine) -> Self {
        Self {
            engine,
            values: HashMap::new(),
            derived: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn primitive(
        &mut self,
        label: &str,
    ) -> CellRef {
        let cell = CellRef::labeled(self.next_id, label);
        self.next_id += 1;
        cell
    }

    pub fn derived(
        &mut self,
        label: &str,
        dependencies: Vec<CellRef>,
        formula: Formula,
    ) -> CellRef {
        let cell = self.primitive(label);
        self.derived.insert(
            cell.id.0,
            Derived {
                dependencies,
                formula,
                computed_from: None,
            },
        );
        cell
    }

    pub fn set(
        &mut self,
        cell: &CellRef,
        value: Value,
    ) {
        let scope = self
            .engine
            .enter_call(CallDescriptor::write(cell.clone(), vec![value.clone()]));
        self.write_value(cell, value);
        self.engine.exit_call(scope, None);
    }

    pub fn get(
        &mut self,
        cell: &CellRef,
    ) -> Value {
        let scope = self.engine.enter_call(CallDescriptor::read(cell.clone()));
        let value = self.read(cell);
        self.engine.exit_call(scope, Some(value.clone()));
        value
    }

    fn read(
        &mut self,
        cell: &CellRef,
    ) -> Value {
        let Some(derived) = self.derived.get(&cell.id.0) else {
            return self.values.get(&cell.id.0).cloned().unwrap_or(Value::Null);
        };
        let dependencies = derived.dependencies.clone();

        // nested reads: suppressed by the engine's call-depth tracking
        let inputs: Vec<Value> = dependencies.iter().map(|dep| self.get(dep)).collect();

        let derived = match self.derived.get_mut(&cell.id.0) {
            Some(derived) => derived,
            None => return Value::Null,
        };
        if derived.computed_from.as_ref() == Some(&inputs) {
            return self.values.get(&cell.id.0).cloned().unwrap_or(Value::Null);
        }

        let first_compute = derived.computed_from.is_none();
        let value = (derived.formula)(&inputs);
        derived.computed_from = Some(inputs);

        if first_compute {
            for dep in &dependencies {
                self.engine.notify(Notification::DependencyAdded {
                    cell: Subject::Cell(cell.clone()),
                    dependency: Subject::Cell(dep.clone()),
                });
            }
        }
        self.write_value(cell, value.clone());
        value
    }

    fn write_value(
        &mut self,
        cell: &CellRef,
        value: Value,
    ) {
        let previous = self.values.insert(cell.id.0, value.clone());
        if previous.as_ref() == Some(&value) {
            return;
        }
        self.engine.notify(Notification::ValueChanged {
            cell: Subject::Cell(cell.clone()),
            previous: previous.map(CellValue::Ready),
            value: CellValue::Ready(value),
        });
    }
}
