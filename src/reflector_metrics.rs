//! Instrumentation for reflectors, the list/watch loops that mirror remote
//! resources into a local store.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::{
    error::Result,
    metric::{CounterVec, GaugeVec, HistogramVec, Metric},
    metrics::{CounterImpl, GaugeImpl, HistogramImpl},
    registry::{MetricsProvider, default_provider},
};

pub struct ReflectorMetricFamilies {
    pub lists_total: Arc<CounterVec>,
    pub list_duration: Arc<HistogramVec>,
    pub items_per_list: Arc<HistogramVec>,
    pub watches_total: Arc<CounterVec>,
    pub short_watches_total: Arc<CounterVec>,
    pub watch_duration: Arc<HistogramVec>,
    pub items_per_watch: Arc<HistogramVec>,
    pub last_resource_version: Arc<GaugeVec>,
}

impl Default for ReflectorMetricFamilies {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflectorMetricFamilies {
    pub fn new() -> Self {
        let labels = &["name"];
        Self {
            lists_total: CounterVec::new(
                "reflector_lists_total",
                "Total number of API lists done by the reflectors",
                labels,
            ),
            list_duration: HistogramVec::new(
                "reflector_list_duration_seconds",
                "How long an API list takes to return and decode for the reflectors",
                labels,
            ),
            items_per_list: HistogramVec::new(
                "reflector_items_per_list",
                "How many items an API list returns to the reflectors",
                labels,
            ),
            watches_total: CounterVec::new(
                "reflector_watches_total",
                "Total number of API watches done by the reflectors",
                labels,
            ),
            short_watches_total: CounterVec::new(
                "reflector_short_watches_total",
                "Total number of short API watches done by the reflectors",
                labels,
            ),
            watch_duration: HistogramVec::new(
                "reflector_watch_duration_seconds",
                "How long an API watch takes to return and decode for the reflectors",
                labels,
            ),
            items_per_watch: HistogramVec::new(
                "reflector_items_per_watch",
                "How many items an API watch returns to the reflectors",
                labels,
            ),
            last_resource_version: GaugeVec::new(
                "reflector_last_resource_version",
                "Last resource version seen for the reflectors",
                labels,
            ),
        }
    }

    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            self.lists_total.clone().into(),
            self.list_duration.clone().into(),
            self.items_per_list.clone().into(),
            self.watches_total.clone().into(),
            self.short_watches_total.clone().into(),
            self.watch_duration.clone().into(),
            self.items_per_watch.clone().into(),
            self.last_resource_version.clone().into(),
        ]
    }

    pub fn register_in(&self, provider: &MetricsProvider) -> Result<()> {
        for metric in self.metrics() {
            provider.register(metric)?;
        }
        Ok(())
    }

    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<ReflectorMetricFamilies> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let families = Self::new();
            if let Err(e) = families.register_in(default_provider()) {
                panic!("failed to register reflector metrics: {e}");
            }
            families
        })
    }
}

pub struct ReflectorMetrics {
    number_of_lists: Arc<dyn CounterImpl>,
    list_duration: Arc<dyn HistogramImpl>,
    number_of_items_in_list: Arc<dyn HistogramImpl>,

    number_of_watches: Arc<dyn CounterImpl>,
    number_of_short_watches: Arc<dyn CounterImpl>,
    watch_duration: Arc<dyn HistogramImpl>,
    number_of_items_in_watch: Arc<dyn HistogramImpl>,

    last_resource_version: Arc<dyn GaugeImpl>,
}

impl ReflectorMetrics {
    /// Metrics for the reflector called `name`, or `None` if `name` is empty.
    pub fn new(families: &ReflectorMetricFamilies, name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        let labels = &[name];
        Some(Self {
            number_of_lists: families.lists_total.with_label_values(labels),
            list_duration: families.list_duration.with_label_values(labels),
            number_of_items_in_list: families.items_per_list.with_label_values(labels),
            number_of_watches: families.watches_total.with_label_values(labels),
            number_of_short_watches: families.short_watches_total.with_label_values(labels),
            watch_duration: families.watch_duration.with_label_values(labels),
            number_of_items_in_watch: families.items_per_watch.with_label_values(labels),
            last_resource_version: families.last_resource_version.with_label_values(labels),
        })
    }

    pub fn record_list(&self, duration: Duration, items: usize) {
        self.number_of_lists.inc();
        self.list_duration.observe(duration.as_secs_f64());
        self.number_of_items_in_list.observe(items as f64);
    }

    /// A watch counts as short when it ended sooner than the reflector expected.
    pub fn record_watch(&self, duration: Duration, items: usize, short: bool) {
        self.number_of_watches.inc();
        if short {
            self.number_of_short_watches.inc();
        }
        self.watch_duration.observe(duration.as_secs_f64());
        self.number_of_items_in_watch.observe(items as f64);
    }

    pub fn set_last_resource_version(&self, version: f64) {
        self.last_resource_version.set(version);
    }
}
