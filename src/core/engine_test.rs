use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serde_json::Value;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::test_config;
use crate::test_utils::FakeStore;
use crate::test_utils::ManualClock;
use crate::test_utils::RecordingSink;
use crate::LabelPrefixFilter;
use crate::LoggerConfig;
use crate::MockProvenanceSource;
use crate::Provenance;
use crate::ProvenanceCapture;

const DEBOUNCE: Duration = Duration::from_millis(100);

fn engine_with(config: LoggerConfig) -> (LoggerEngine, RecordingSink, ManualClock) {
    enable_logger();
    let clock = ManualClock::new();
    let sink = RecordingSink::new();
    let engine = LoggerEngine::builder(config, sink.clone())
        .clock(Arc::new(clock.clone()))
        .build();
    (engine, sink, clock)
}

fn engine() -> (LoggerEngine, RecordingSink, ManualClock) {
    engine_with(test_config())
}

fn cell(id: u64) -> CellRef {
    CellRef::labeled(id, format!("c{id}"))
}

fn subject(id: u64) -> Subject {
    cell(id).into()
}

fn changed(
    id: u64,
    previous: Option<CellValue>,
    value: CellValue,
) -> Notification {
    Notification::ValueChanged {
        cell: subject(id),
        previous,
        value,
    }
}

fn names(tx: &Transaction) -> Vec<&'static str> {
    tx.events.iter().map(|e| e.kind.name()).collect()
}

#[test]
fn test_each_outer_call_produces_one_transaction() {
    let (engine, sink, _clock) = engine();
    let mut store = FakeStore::new(engine);
    let cells: Vec<CellRef> = ["a", "b", "c"].iter().map(|l| store.primitive(l)).collect();

    for (i, cell) in cells.iter().enumerate() {
        store.set(cell, json!(i));
    }
    store.engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.iter().map(|tx| tx.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    for (tx, cell) in emitted.iter().zip(&cells) {
        assert_eq!(tx.kind, TransactionKind::CellWrite);
        assert_eq!(tx.subject, Some(Subject::Cell(cell.clone())));
        assert_eq!(names(tx), vec!["initialized"]);
    }
}

#[test]
fn test_repeated_changes_merge_within_transaction() {
    let (mut engine, sink, _clock) = engine();
    engine.notify(changed(1, None, CellValue::Ready(json!("v1"))));

    let scope = engine.enter_call(CallDescriptor::write(cell(1), vec![json!("v3")]));
    engine.notify(changed(1, Some(CellValue::Ready(json!("v1"))), CellValue::Ready(json!("v2"))));
    engine.notify(changed(1, Some(CellValue::Ready(json!("v2"))), CellValue::Ready(json!("v3"))));
    engine.exit_call(scope, None);
    engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].kind, TransactionKind::Unknown);
    assert_eq!(emitted[1].events.len(), 1);
    assert_eq!(
        emitted[1].events[0].kind,
        EventKind::Changed {
            old: OldValue::Merged(vec![Payload::Value(json!("v1")), Payload::Value(json!("v2"))]),
            new_value: json!("v3"),
        }
    );
}

#[test]
fn test_superseded_async_value_is_aborted_before_new_pending() {
    let (mut engine, sink, _clock) = engine();

    let scope = engine.enter_call(CallDescriptor::write(cell(1), vec![]));
    engine.notify(changed(1, Some(CellValue::Ready(json!(0))), CellValue::Async(HandleId(1))));
    engine.notify(changed(
        1,
        Some(CellValue::Async(HandleId(1))),
        CellValue::Async(HandleId(2)),
    ));
    engine.abort(HandleId(1));
    engine.exit_call(scope, None);
    engine.flush();

    // late settlement of the aborted handle
    engine.settle(HandleId(1), Ok(json!(1)));
    engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    let events = &emitted[0].events;
    assert_eq!(
        names(&emitted[0]),
        vec!["changed async pending", "changed async aborted", "changed async pending"]
    );
    assert!(matches!(events[1].kind, EventKind::AsyncAborted { handle: HandleId(1), .. }));
    assert_eq!(
        events[2].kind,
        EventKind::AsyncPending {
            handle: HandleId(2),
            origin: AsyncOrigin::Changed {
                old_value: Payload::Value(json!(0)),
            },
        }
    );
    assert_eq!(engine.tracker().pending_for(CellId(1)), vec![HandleId(2)]);
}

#[test]
fn test_quiet_period_flushes_one_transaction() {
    let (mut engine, sink, clock) = engine();
    let started = clock.now();

    let scope = engine.enter_call(CallDescriptor::write(cell(1), vec![json!(1)]));
    clock.advance(Duration::from_millis(5));
    engine.notify(changed(1, None, CellValue::Ready(json!(1))));
    engine.exit_call(scope, None);
    assert_eq!(engine.next_deadline(), Some(clock.now() + DEBOUNCE));

    clock.advance(Duration::from_millis(50));
    engine.poll(true);
    assert_eq!(sink.len(), 0);

    // activity after the call returned extends the quiet period
    engine.notify(Notification::Mounted {
        cell: subject(1),
        value: Some(json!(1)),
    });
    let last_activity = clock.now();
    clock.advance(Duration::from_millis(60));
    engine.poll(true);
    assert_eq!(sink.len(), 0);

    clock.advance(Duration::from_millis(60));
    engine.poll(true);

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(names(&emitted[0]), vec!["initialized", "mounted"]);
    assert_eq!(emitted[0].started_at, started);
    assert_eq!(emitted[0].ended_at, last_activity);
    assert!(engine.is_idle());
}

#[test]
fn test_new_call_force_flushes_pending_transaction() {
    let (mut engine, sink, clock) = engine();
    let first_start = clock.now();

    let scope = engine.enter_call(CallDescriptor::write(cell(1), vec![json!(1)]));
    engine.notify(changed(1, None, CellValue::Ready(json!(1))));
    engine.exit_call(scope, None);

    clock.advance(Duration::from_millis(30));
    let forced_at = clock.now();
    let scope = engine.enter_call(CallDescriptor::read(cell(2)));

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].seq, 1);
    assert_eq!(emitted[0].events.len(), 1);
    assert_eq!(emitted[0].started_at, first_start);
    assert_eq!(emitted[0].ended_at, forced_at);

    // later events land in the new transaction only
    engine.notify(changed(2, None, CellValue::Ready(json!(2))));
    engine.exit_call(scope, Some(json!(2)));
    engine.flush();
    let emitted = sink.take();
    assert_eq!(emitted[0].seq, 2);
    assert_eq!(emitted[0].result, Some(json!(2)));
}

#[test]
fn test_budgeted_slices_drain_in_order() {
    let mut config = test_config();
    config.scheduler.slice_budget_ms = 10;
    let clock = ManualClock::new();
    let sink = RecordingSink::new().with_cost(clock.clone(), Duration::from_millis(5));
    let mut store = FakeStore::new(
        LoggerEngine::builder(config, sink.clone())
            .clock(Arc::new(clock.clone()))
            .build(),
    );
    let a = store.primitive("a");
    for i in 0..5 {
        store.set(&a, json!(i));
    }
    store.engine.flush();

    assert_eq!(store.engine.queued(), 5);
    assert_eq!(sink.len(), 0);
    assert!(store.engine.next_deadline().is_some());

    let mut slices = Vec::new();
    while !store.engine.is_idle() {
        clock.advance(Duration::from_millis(1));
        let before = sink.len();
        store.engine.poll(true);
        slices.push(sink.len() - before);
    }

    assert_eq!(slices, vec![2, 2, 1]);
    assert_eq!(sink.seqs(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_write_then_read_derived_cell() {
    let (engine, sink, _clock) = engine();
    let mut store = FakeStore::new(engine);
    let a = store.primitive("a");
    let b = store.derived("b", vec![a.clone()], |inputs: &[Value]| {
        json!(inputs[0].as_i64().unwrap_or_default() * 2)
    });

    store.set(&a, json!(1));
    assert_eq!(store.get(&b), json!(2));
    assert_eq!(store.get(&b), json!(2));
    store.engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.len(), 3);

    assert_eq!(emitted[0].kind, TransactionKind::CellWrite);
    assert_eq!(
        emitted[0].events[0].kind,
        EventKind::Initialized { value: json!(1) }
    );

    assert_eq!(emitted[1].kind, TransactionKind::CellRead);
    assert_eq!(emitted[1].subject, Some(Subject::Cell(b.clone())));
    assert_eq!(emitted[1].result, Some(json!(2)));
    let initialized = emitted[1]
        .events
        .iter()
        .find(|e| matches!(e.kind, EventKind::Initialized { .. }))
        .expect("derived value initialized");
    assert!(initialized.subject.same_cell(&Subject::Cell(b.clone())));
    assert_eq!(initialized.kind, EventKind::Initialized { value: json!(2) });
    assert_eq!(
        initialized.snapshot.as_ref().map(|s| s.dependencies.clone()),
        Some(vec![a.id])
    );

    assert_eq!(emitted[2].kind, TransactionKind::CellRead);
    assert!(emitted[2].is_empty());
}

#[test]
fn test_flush_without_open_transaction_is_noop() {
    let (mut engine, sink, _clock) = engine();

    engine.flush();
    engine.flush();
    assert_eq!(sink.len(), 0);

    let scope = engine.enter_call(CallDescriptor::read(cell(1)));
    engine.exit_call(scope, None);
    engine.flush();
    engine.flush();
    assert_eq!(sink.seqs(), vec![1]);
}

#[test]
fn test_concurrent_settlements_coalesce() {
    let (mut engine, sink, clock) = engine();

    let scope = engine.enter_call(CallDescriptor::write(cell(1), vec![]));
    engine.notify(changed(1, None, CellValue::Async(HandleId(1))));
    engine.notify(changed(2, None, CellValue::Async(HandleId(2))));
    engine.exit_call(scope, None);
    engine.flush();

    engine.settle(HandleId(1), Ok(json!("one")));
    engine.settle(HandleId(2), Err(json!("two failed")));
    clock.advance(DEBOUNCE);
    engine.poll(true);

    let emitted = sink.take();
    assert_eq!(emitted.len(), 2);
    assert_eq!(names(&emitted[0]), vec!["initial async pending", "initial async pending"]);
    assert_eq!(emitted[1].kind, TransactionKind::AsyncResolved);
    assert_eq!(emitted[1].subject, Some(subject(1)));
    assert_eq!(names(&emitted[1]), vec!["initial async resolved", "initial async rejected"]);
}

#[test]
fn test_synchronous_settlement_stays_in_pending_transaction() {
    let (mut engine, sink, _clock) = engine();

    let scope = engine.enter_call(CallDescriptor::read(cell(1)));
    engine.notify(changed(1, None, CellValue::Async(HandleId(1))));
    engine.exit_call(scope, None);
    engine.settle(HandleId(1), Ok(json!(1)));
    engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(names(&emitted[0]), vec!["initial async pending", "initial async resolved"]);
}

#[test]
fn test_settlement_during_unrelated_transaction_opens_its_own() {
    let (mut engine, sink, _clock) = engine();

    let scope = engine.enter_call(CallDescriptor::read(cell(1)));
    engine.notify(changed(1, None, CellValue::Async(HandleId(1))));
    engine.exit_call(scope, None);
    engine.flush();

    let scope = engine.enter_call(CallDescriptor::read(cell(2)));
    engine.exit_call(scope, None);
    engine.settle(HandleId(1), Ok(json!(1)));
    engine.drain();

    let emitted = sink.take();
    assert_eq!(emitted.iter().map(|tx| tx.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(emitted[1].is_empty());
    assert_eq!(emitted[2].kind, TransactionKind::AsyncResolved);
}

#[test]
fn test_hidden_settlement_opens_nothing() {
    let mut config = test_config();
    config.visibility.hidden_prefixes = vec!["internal".to_string()];
    let (mut engine, sink, _clock) = engine_with(config);
    let hidden = CellRef::labeled(1, "internal/cache");

    let scope = engine.enter_call(CallDescriptor::read(cell(2)));
    engine.notify(Notification::ValueChanged {
        cell: hidden.into(),
        previous: None,
        value: CellValue::Async(HandleId(1)),
    });
    engine.exit_call(scope, None);
    engine.flush();
    engine.settle(HandleId(1), Ok(json!(1)));

    assert!(!engine.has_open_transaction());
    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert!(emitted[0].is_empty());
}

#[test]
fn test_orphan_notification_is_emitted_alone() {
    let (mut engine, sink, _clock) = engine();

    engine.notify(Notification::Mounted {
        cell: subject(1),
        value: None,
    });
    engine.notify(Notification::Unmounted {
        cell: Subject::Reclaimed("atom#7".to_string()),
    });

    let emitted = sink.take();
    assert_eq!(emitted.len(), 2);
    assert!(emitted.iter().all(|tx| tx.kind == TransactionKind::Unknown));
    assert_eq!(emitted[1].events[0].subject.to_string(), "atom#7");
}

#[test]
fn test_destroyed_cell_is_evicted() {
    let (mut engine, _sink, _clock) = engine();

    engine.notify(Notification::DependencyAdded {
        cell: subject(2),
        dependency: subject(1),
    });
    engine.notify(changed(2, None, CellValue::Async(HandleId(1))));
    engine.settle(HandleId(1), Ok(json!(1)));
    assert_eq!(engine.recorder().dependencies().dependents_of(CellId(1)), vec![CellId(2)]);
    assert!(engine.tracker().correlated(HandleId(1)).is_some());

    engine.notify(Notification::Destroyed { cell: subject(2) });

    assert!(engine.recorder().dependencies().dependencies_of(CellId(2)).is_empty());
    assert!(engine.recorder().dependencies().dependents_of(CellId(1)).is_empty());
    assert!(engine.tracker().correlated(HandleId(1)).is_none());
}

#[test]
fn test_reclaimed_dependency_is_ignored() {
    let (mut engine, sink, _clock) = engine();

    engine.notify(Notification::DependencyAdded {
        cell: subject(2),
        dependency: Subject::Reclaimed("atom#1".to_string()),
    });

    assert_eq!(sink.len(), 0);
    assert!(engine.recorder().dependencies().dependencies_of(CellId(2)).is_empty());
}

#[test]
fn test_nested_calls_share_outer_transaction() {
    let (mut engine, sink, clock) = engine();

    let outer = engine.enter_call(CallDescriptor::write(cell(1), vec![json!(1)]));
    assert!(outer.is_outermost());
    let inner = engine.enter_call(CallDescriptor::read(cell(2)));
    assert!(!inner.is_outermost());
    engine.notify(changed(2, None, CellValue::Ready(json!(2))));
    engine.exit_call(inner, Some(json!(2)));

    // a long synchronous span never trips the quiet period
    clock.advance(DEBOUNCE * 5);
    assert!(engine.next_deadline().is_none());
    engine.poll(true);
    assert_eq!(sink.len(), 0);

    engine.notify(changed(1, None, CellValue::Ready(json!(1))));
    engine.exit_call(outer, None);
    engine.flush();

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].kind, TransactionKind::CellWrite);
    assert_eq!(emitted[0].result, None);
    assert_eq!(emitted[0].events.len(), 2);
}

#[test]
fn test_deferred_provenance_attached_before_emission() {
    let mut config = test_config();
    config.scheduler.slice_budget_ms = 16;
    let clock = ManualClock::new();
    let sink = RecordingSink::new();
    let (sender, capture) = ProvenanceCapture::deferred();
    let capture = std::sync::Mutex::new(Some(capture));
    let mut source = MockProvenanceSource::new();
    source
        .expect_capture()
        .returning(move |_| capture.lock().unwrap().take().unwrap_or(ProvenanceCapture::Unavailable));
    let mut engine = LoggerEngine::builder(config, sink.clone())
        .clock(Arc::new(clock.clone()))
        .provenance(source)
        .build();

    let scope = engine.enter_call(CallDescriptor::read(cell(1)));
    engine.exit_call(scope, None);
    engine.flush();
    assert!(engine.transactions().open_transaction().is_none());

    let provenance = Provenance {
        owner: Some("Counter".to_string()),
        frames: vec!["Counter::render".to_string()],
    };
    sender.send(Ok(provenance.clone())).unwrap();
    clock.advance(Duration::from_millis(1));
    engine.poll(true);

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].provenance, Some(provenance));
}

#[test]
fn test_hidden_prefix_filter_from_builder() {
    let clock = ManualClock::new();
    let sink = RecordingSink::new();
    let mut engine = LoggerEngine::builder(test_config(), sink.clone())
        .clock(Arc::new(clock.clone()))
        .visibility(LabelPrefixFilter::new(vec!["c1".to_string()]))
        .build();

    engine.notify(changed(1, None, CellValue::Ready(json!(1))));
    engine.notify(changed(2, None, CellValue::Ready(json!(2))));

    let emitted = sink.take();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].events[0].subject, subject(2));
}

#[test]
fn test_settlement_of_destroyed_cell_leaves_no_correlation() {
    let (mut engine, sink, _clock) = engine();

    engine.notify(changed(
        1,
        Some(CellValue::Ready(json!(0))),
        CellValue::Async(HandleId(7)),
    ));
    engine.notify(Notification::Destroyed { cell: subject(1) });
    engine.settle(HandleId(7), Ok(json!(42)));
    engine.drain();

    assert!(engine.tracker().correlated(HandleId(7)).is_none());
    let resolved = sink
        .take()
        .iter()
        .any(|tx| names(tx).contains(&"changed async resolved"));
    assert!(resolved);
}
