use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ScanTrigger;

static SCANS: AtomicU64 = AtomicU64::new(0);
static MARKED: AtomicU64 = AtomicU64::new(0);
static RESTORED: AtomicU64 = AtomicU64::new(0);
static MUTATION_TRIGGERS: AtomicU64 = AtomicU64::new(0);
static RULE_INSTALLS: AtomicU64 = AtomicU64::new(0);
static PERSIST_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref SCAN_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_scans_total", "Scanner passes by trigger"),
        &["trigger"]
    )
    .expect("scan counter");
    static ref MARKED_COUNTER: IntCounter = IntCounter::new(
        "overlay_elements_marked_total",
        "Elements marked as suppressed"
    )
    .expect("marked counter");
    static ref RESTORED_COUNTER: IntCounter = IntCounter::new(
        "overlay_elements_restored_total",
        "Elements restored to their baseline"
    )
    .expect("restored counter");
    static ref MUTATION_TRIGGER_COUNTER: IntCounter = IntCounter::new(
        "overlay_mutation_triggers_total",
        "Mutation windows that led to a rescan"
    )
    .expect("mutation trigger counter");
    static ref RULE_INSTALL_COUNTER: IntCounter = IntCounter::new(
        "overlay_rule_installs_total",
        "Stylesheet writes (idempotent skips excluded)"
    )
    .expect("rule install counter");
    static ref PERSIST_FAILURE_COUNTER: IntCounter = IntCounter::new(
        "overlay_persist_failures_total",
        "Settings writes that failed"
    )
    .expect("persist failure counter");
    static ref SUPPRESSED_GAUGE: IntGauge = IntGauge::new(
        "overlay_suppressed_elements",
        "Elements currently suppressed"
    )
    .expect("suppressed gauge");
}

pub fn record_scan(trigger: ScanTrigger, newly_marked: usize) {
    SCANS.fetch_add(1, Ordering::Relaxed);
    SCAN_COUNTER.with_label_values(&[trigger.as_str()]).inc();
    if newly_marked > 0 {
        MARKED.fetch_add(newly_marked as u64, Ordering::Relaxed);
        MARKED_COUNTER.inc_by(newly_marked as u64);
    }
}

pub fn record_restored(count: usize) {
    if count > 0 {
        RESTORED.fetch_add(count as u64, Ordering::Relaxed);
        RESTORED_COUNTER.inc_by(count as u64);
    }
}

pub fn record_mutation_trigger() {
    MUTATION_TRIGGERS.fetch_add(1, Ordering::Relaxed);
    MUTATION_TRIGGER_COUNTER.inc();
}

pub fn record_rule_install() {
    RULE_INSTALLS.fetch_add(1, Ordering::Relaxed);
    RULE_INSTALL_COUNTER.inc();
}

pub fn record_persist_failure() {
    PERSIST_FAILURES.fetch_add(1, Ordering::Relaxed);
    PERSIST_FAILURE_COUNTER.inc();
}

pub fn set_suppressed(count: usize) {
    SUPPRESSED_GAUGE.set(count as i64);
}

pub fn register_metrics(registry: &Registry) {
    register(registry, SCAN_COUNTER.clone());
    register(registry, MARKED_COUNTER.clone());
    register(registry, RESTORED_COUNTER.clone());
    register(registry, MUTATION_TRIGGER_COUNTER.clone());
    register(registry, RULE_INSTALL_COUNTER.clone());
    register(registry, PERSIST_FAILURE_COUNTER.clone());
    register(registry, SUPPRESSED_GAUGE.clone());
}

fn register<C>(registry: &Registry, collector: C)
where
    C: prometheus::core::Collector + Clone + 'static,
{
    match registry.register(Box::new(collector)) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
        Err(err) => tracing::warn!(target: "overlay-engine", ?err, "failed to register metric"),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct EngineMetricsSnapshot {
    pub scans: u64,
    pub marked: u64,
    pub restored: u64,
    pub mutation_triggers: u64,
    pub rule_installs: u64,
    pub persist_failures: u64,
}

pub fn snapshot() -> EngineMetricsSnapshot {
    EngineMetricsSnapshot {
        scans: SCANS.load(Ordering::Relaxed),
        marked: MARKED.load(Ordering::Relaxed),
        restored: RESTORED.load(Ordering::Relaxed),
        mutation_triggers: MUTATION_TRIGGERS.load(Ordering::Relaxed),
        rule_installs: RULE_INSTALLS.load(Ordering::Relaxed),
        persist_failures: PERSIST_FAILURES.load(Ordering::Relaxed),
    }
}
