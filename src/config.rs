use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bucket layout for the work queue latency histograms, in microseconds.
pub const DEFAULT_LATENCY_BUCKETS: &[f64] = &[
    10.0,
    100.0,
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
    100_000_000.0,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkqueueMetricsConfig {
    /// Buckets for the time an item waits before being handed out
    pub latency_buckets: Vec<f64>,
    /// Buckets for the time spent processing an item
    pub work_duration_buckets: Vec<f64>,
    /// How often a queue refreshes its unfinished-work gauges. Zero is read
    /// as one millisecond.
    pub unfinished_work_update_period_ms: u64,
}

impl Default for WorkqueueMetricsConfig {
    fn default() -> Self {
        Self {
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
            work_duration_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
            unfinished_work_update_period_ms: 500,
        }
    }
}

impl WorkqueueMetricsConfig {
    pub fn unfinished_work_update_period(&self) -> Duration {
        Duration::from_millis(self.unfinished_work_update_period_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Label value for this queue's series. Empty disables instrumentation.
    pub name: String,
    pub metrics: WorkqueueMetricsConfig,
}

impl WorkQueueConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
