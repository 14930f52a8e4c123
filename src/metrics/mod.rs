use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;


lazy_static! {
    pub static ref TRANSACTIONS_EMITTED: IntCounter = IntCounter::with_opts(Opts::new(
        "transactions_emitted",
        "Finalized transactions handed to the sink"
    ))
    .expect("metric can not be created");

    pub static ref EVENTS_RECORDED: IntCounter = IntCounter::with_opts(Opts::new(
        "events_recorded",
        "Events appended to a transaction"
    ))
    .expect("metric can not be created");

    pub static ref EVENTS_FILTERED: IntCounter = IntCounter::with_opts(Opts::new(
        "events_filtered",
        "Events dropped by the visibility policy"
    ))
    .expect("metric can not be created");

    pub static ref SINK_FAILURES: IntCounter = IntCounter::with_opts(Opts::new(
        "sink_failures",
        "Transactions the sink failed to emit"
    ))
    .expect("metric can not be created");

    pub static ref SCHEDULER_QUEUE_DEPTH: IntGauge = IntGauge::with_opts(Opts::new(
        "scheduler_queue_depth",
        "Finalized transactions waiting for emission"
    ))
    .expect("metric can not be created");
}

/// Registers the logger metrics on a caller-owned registry
pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(TRANSACTIONS_EMITTED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EVENTS_RECORDED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EVENTS_FILTERED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SINK_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SCHEDULER_QUEUE_DEPTH.clone()))
        .expect("collector can be registered");
}
