//! Per-item work queue instrumentation.
//!
//! A [`QueueMetrics`] remembers when each item entered the queue and when its
//! processing began, and turns those timestamps into wait latency, work
//! duration and in-flight gauges. It holds no lock of its own: every hook
//! takes `&mut self`, so the queue has to call it while holding the lock that
//! already protects its item state.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};

use crate::{
    clock::Clock,
    config::WorkqueueMetricsConfig,
    error::Result,
    metric::{CounterVec, GaugeVec, HistogramVec, Metric},
    metrics::{CounterImpl, GaugeImpl, HistogramImpl},
    registry::{MetricsProvider, default_provider},
};

const NAME_LABEL: &str = "name";

/// The metric families shared by every named work queue.
pub struct WorkqueueMetricFamilies {
    pub depth: Arc<GaugeVec>,
    pub adds: Arc<CounterVec>,
    pub latency: Arc<HistogramVec>,
    pub work_duration: Arc<HistogramVec>,
    pub unfinished_work_seconds: Arc<GaugeVec>,
    pub longest_running_processor: Arc<GaugeVec>,
    pub retries: Arc<CounterVec>,
}

impl WorkqueueMetricFamilies {
    pub fn new(config: &WorkqueueMetricsConfig) -> Self {
        Self {
            depth: GaugeVec::new(
                "workqueue_depth",
                "Current depth of workqueue",
                &[NAME_LABEL],
            ),
            adds: CounterVec::new(
                "workqueue_adds_total",
                "Total number of adds handled by workqueue",
                &[NAME_LABEL],
            ),
            latency: HistogramVec::with_buckets(
                "workqueue_queue_latency_microseconds",
                "How long an item stays in workqueue before being requested",
                config.latency_buckets.clone(),
                &[NAME_LABEL],
            ),
            work_duration: HistogramVec::with_buckets(
                "workqueue_work_duration_microseconds",
                "How long processing an item from workqueue takes",
                config.work_duration_buckets.clone(),
                &[NAME_LABEL],
            ),
            unfinished_work_seconds: GaugeVec::new(
                "workqueue_unfinished_work_seconds",
                "How many seconds of work has been done that is in progress and hasn't been \
                 observed by work_duration. Large values indicate stuck threads. One can deduce \
                 the number of stuck threads by observing the rate at which this increases.",
                &[NAME_LABEL],
            ),
            longest_running_processor: GaugeVec::new(
                "workqueue_longest_running_processor_microseconds",
                "How many microseconds the longest running processor for workqueue has been running",
                &[NAME_LABEL],
            ),
            retries: CounterVec::new(
                "workqueue_retries_total",
                "Total number of retries handled by workqueue",
                &[NAME_LABEL],
            ),
        }
    }

    /// All families, in declaration order.
    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            self.depth.clone().into(),
            self.adds.clone().into(),
            self.latency.clone().into(),
            self.work_duration.clone().into(),
            self.unfinished_work_seconds.clone().into(),
            self.longest_running_processor.clone().into(),
            self.retries.clone().into(),
        ]
    }

    pub fn register_in(&self, provider: &MetricsProvider) -> Result<()> {
        for metric in self.metrics() {
            provider.register(metric)?;
        }
        Ok(())
    }

    /// Families built from the default config and registered with the
    /// default provider on first use.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<WorkqueueMetricFamilies> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let families = Self::new(&WorkqueueMetricsConfig::default());
            if let Err(e) = families.register_in(default_provider()) {
                panic!("failed to register workqueue metrics: {e}");
            }
            families
        })
    }
}

/// Hooks a work queue calls at each item lifecycle event.
///
/// Callers must hold their own lock across every call; implementations do no
/// synchronisation.
pub trait QueueMetricsHooks<T> {
    fn add(&mut self, item: &T);

    fn get(&mut self, item: &T);

    fn done(&mut self, item: &T);

    fn update_unfinished_work(&mut self);
}

/// A disabled tracker (`None`) ignores every hook.
impl<T, M: QueueMetricsHooks<T>> QueueMetricsHooks<T> for Option<M> {
    fn add(&mut self, item: &T) {
        if let Some(m) = self {
            m.add(item);
        }
    }

    fn get(&mut self, item: &T) {
        if let Some(m) = self {
            m.get(item);
        }
    }

    fn done(&mut self, item: &T) {
        if let Some(m) = self {
            m.done(item);
        }
    }

    fn update_unfinished_work(&mut self) {
        if let Some(m) = self {
            m.update_unfinished_work();
        }
    }
}

pub struct QueueMetrics<T> {
    clock: Arc<dyn Clock>,

    // current depth of the queue
    depth: Arc<dyn GaugeImpl>,
    // total number of adds handled by the queue
    adds: Arc<dyn CounterImpl>,
    // how long an item waits before being handed out
    latency: Arc<dyn HistogramImpl>,
    // how long processing an item takes
    work_duration: Arc<dyn HistogramImpl>,
    add_times: HashMap<T, DateTime<Utc>>,
    processing_start_times: HashMap<T, DateTime<Utc>>,

    // how long have current processors been working
    unfinished_work_seconds: Arc<dyn GaugeImpl>,
    longest_running_processor: Arc<dyn GaugeImpl>,
}

impl<T: Eq + Hash + Clone> QueueMetrics<T> {
    /// Tracker for the queue called `name`, or `None` if `name` is empty.
    pub fn new(
        families: &WorkqueueMetricFamilies,
        name: &str,
        clock: Arc<dyn Clock>,
    ) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        Some(Self {
            clock,
            depth: families.depth.with_label_values(&[name]),
            adds: families.adds.with_label_values(&[name]),
            latency: families.latency.with_label_values(&[name]),
            work_duration: families.work_duration.with_label_values(&[name]),
            add_times: HashMap::new(),
            processing_start_times: HashMap::new(),
            unfinished_work_seconds: families.unfinished_work_seconds.with_label_values(&[name]),
            longest_running_processor: families
                .longest_running_processor
                .with_label_values(&[name]),
        })
    }

    /// Whether `item` has an enqueue time that no `get` has consumed yet.
    pub fn is_waiting(&self, item: &T) -> bool {
        self.add_times.contains_key(item)
    }

    /// Whether `item` has been handed out and not yet marked done.
    pub fn is_processing(&self, item: &T) -> bool {
        self.processing_start_times.contains_key(item)
    }

    pub fn waiting_len(&self) -> usize {
        self.add_times.len()
    }

    pub fn processing_len(&self) -> usize {
        self.processing_start_times.len()
    }

    // Truncated to whole microseconds; a clock that went backwards reads as 0.
    fn since_in_microseconds(&self, start: DateTime<Utc>) -> f64 {
        let micros = self
            .clock
            .since(start)
            .num_microseconds()
            .unwrap_or(i64::MAX);
        micros.max(0) as f64
    }
}

impl<T: Eq + Hash + Clone> QueueMetricsHooks<T> for QueueMetrics<T> {
    fn add(&mut self, item: &T) {
        self.adds.inc();
        self.depth.inc();
        if !self.add_times.contains_key(item) {
            self.add_times.insert(item.clone(), self.clock.now());
        }
    }

    fn get(&mut self, item: &T) {
        self.depth.dec();
        self.processing_start_times
            .insert(item.clone(), self.clock.now());
        if let Some(start) = self.add_times.remove(item) {
            self.latency.observe(self.since_in_microseconds(start));
        }
    }

    fn done(&mut self, item: &T) {
        if let Some(start) = self.processing_start_times.remove(item) {
            self.work_duration
                .observe(self.since_in_microseconds(start));
        }
    }

    fn update_unfinished_work(&mut self) {
        let mut total = 0.0;
        let mut oldest = 0.0;
        for start in self.processing_start_times.values() {
            let age = self.since_in_microseconds(*start);
            total += age;
            if age > oldest {
                oldest = age;
            }
        }
        // seconds; microseconds is unhelpfully granular here
        self.unfinished_work_seconds.set(total / 1_000_000.0);
        self.longest_running_processor.set(oldest);
    }
}

pub trait RetryMetricsHooks {
    fn retry(&self);
}

pub struct RetryMetrics {
    retries: Arc<dyn CounterImpl>,
}

impl RetryMetrics {
    /// Retry counter for the queue called `name`, or `None` if `name` is empty.
    pub fn new(families: &WorkqueueMetricFamilies, name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        Some(Self {
            retries: families.retries.with_label_values(&[name]),
        })
    }
}

impl RetryMetricsHooks for RetryMetrics {
    fn retry(&self) {
        self.retries.inc();
    }
}

impl RetryMetricsHooks for Option<RetryMetrics> {
    fn retry(&self) {
        if let Some(m) = self {
            m.retry();
        }
    }
}
