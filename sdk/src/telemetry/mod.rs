//! Worker telemetry.
//!
//! Decision processing reports counters and timings through a [`MetricsSink`].
//! The sink is injected at construction time so embedders can forward the
//! values into whatever metrics system they run; the SDK itself carries no
//! exporter dependencies.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metric names emitted by the worker.
pub mod names {
    pub const DECISION_TASK_COMPLETED: &str = "cadence.decision_task.completed";
    pub const DECISION_TASK_FAILED: &str = "cadence.decision_task.failed";
    pub const DECISION_TASK_LATENCY: &str = "cadence.decision_task.latency";
    pub const DECISION_TASK_REPLAY_LATENCY: &str = "cadence.decision_task.replay_latency";
    pub const DECISIONS_SENT: &str = "cadence.decisions.sent";
    pub const HISTORY_PAGES_FETCHED: &str = "cadence.history.pages_fetched";
    pub const CACHE_HIT: &str = "cadence.workflow_cache.hit";
    pub const CACHE_MISS: &str = "cadence.workflow_cache.miss";
    pub const CACHE_EVICTION: &str = "cadence.workflow_cache.eviction";
    pub const WORKFLOW_COMPLETED: &str = "cadence.workflow.completed";
    pub const WORKFLOW_FAILED: &str = "cadence.workflow.failed";
    pub const WORKFLOW_PANICKED: &str = "cadence.workflow.panicked";
}

/// Destination for counters and timings.
///
/// Every method has a no-op default so implementors only override what they
/// forward.
pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &'static str, value: u64) {
        let _ = (name, value);
    }

    fn record_duration(&self, name: &'static str, duration: Duration) {
        let _ = (name, duration);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Sink that keeps values in memory, for tests and local inspection.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<&'static str, u64>>,
    durations: Mutex<HashMap<&'static str, Vec<Duration>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (zero if never incremented)
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// All durations recorded under a name
    pub fn durations(&self, name: &str) -> Vec<Duration> {
        self.durations.lock().get(name).cloned().unwrap_or_default()
    }

    pub fn reset(&self) {
        self.counters.lock().clear();
        self.durations.lock().clear();
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment_counter(&self, name: &'static str, value: u64) {
        *self.counters.lock().entry(name).or_insert(0) += value;
    }

    fn record_duration(&self, name: &'static str, duration: Duration) {
        self.durations.lock().entry(name).or_default().push(duration);
    }
}

/// Shared handle to the no-op sink.
pub fn noop_metrics() -> Arc<dyn MetricsSink> {
    Arc::new(NoopMetrics)
}

/// A timing in progress. Recorded into the sink when finished.
#[must_use = "a timer records nothing unless finished"]
pub struct RecordingTimer {
    name: &'static str,
    started: Instant,
}

impl RecordingTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the elapsed time and return it
    pub fn finish(self, sink: &dyn MetricsSink) -> Duration {
        let elapsed = self.started.elapsed();
        sink.record_duration(self.name, elapsed);
        elapsed
    }
}
