//! Per-runtime execution metrics.
//!
//! Counters belong to the runtime instance that records them; there is no
//! process-global registry. Every execute call lands here exactly once,
//! whether it succeeded, failed in the handler, or was turned away before
//! dispatch.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Aggregate counters for one operation (or the whole runtime).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperationMetrics {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
}

/// Point-in-time metrics view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub operations_executed: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
    pub avg_duration_ms: f64,
    /// Succeeded over executed; zero before any call.
    pub success_rate: f64,
    pub by_operation: BTreeMap<String, OperationMetrics>,
}

#[derive(Debug, Default)]
struct Totals {
    executed: u64,
    succeeded: u64,
    total_duration: Duration,
}

impl Totals {
    fn add(&mut self, succeeded: bool, duration: Duration) {
        self.executed += 1;
        if succeeded {
            self.succeeded += 1;
        }
        self.total_duration += duration;
    }

    fn view(&self) -> OperationMetrics {
        let avg_duration_ms = if self.executed == 0 {
            0.0
        } else {
            self.total_duration.as_secs_f64() * 1000.0 / self.executed as f64
        };
        OperationMetrics {
            executed: self.executed,
            succeeded: self.succeeded,
            failed: self.executed - self.succeeded,
            avg_duration_ms,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    inner: Mutex<RecorderInner>,
}

#[derive(Debug, Default)]
struct RecorderInner {
    all: Totals,
    by_operation: HashMap<String, Totals>,
}

impl MetricsRecorder {
    pub(crate) fn record(&self, operation: &str, succeeded: bool, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.all.add(succeeded, duration);
        inner
            .by_operation
            .entry(operation.to_string())
            .or_default()
            .add(succeeded, duration);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let all = inner.all.view();
        MetricsSnapshot {
            operations_executed: all.executed,
            operations_succeeded: all.succeeded,
            operations_failed: all.failed,
            avg_duration_ms: all.avg_duration_ms,
            success_rate: if all.executed == 0 {
                0.0
            } else {
                all.succeeded as f64 / all.executed as f64
            },
            by_operation: inner
                .by_operation
                .iter()
                .map(|(name, totals)| (name.clone(), totals.view()))
                .collect(),
        }
    }
}
