//! Metric descriptors: immutable identity plus a write-once implementation slot.
//!
//! Every constructor hands back an `Arc` bound to the no-op implementation, so
//! instrumentation call sites are safe before (or without) registration. A
//! backend binds the real implementation exactly once while registering.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{
    error::{MetricsError, Result},
    metrics::{
        CounterImpl, CounterVecImpl, GaugeImpl, GaugeVecImpl, HistogramImpl, HistogramVecImpl,
        NoopMetric,
    },
    registry::Registry,
};

struct Slot<T: ?Sized> {
    bound: OnceLock<Arc<T>>,
}

impl<T: ?Sized> Slot<T> {
    fn new() -> Self {
        Self {
            bound: OnceLock::new(),
        }
    }

    fn get(&self) -> Option<&Arc<T>> {
        self.bound.get()
    }

    fn bind(&self, name: &str, imp: Arc<T>) -> Result<()> {
        self.bound.set(imp).map_err(|_| {
            log::warn!("Metric {name} is already bound, keeping the first implementation");
            MetricsError::AlreadyBound(name.to_string())
        })
    }
}

fn check_cardinality(name: &str, label_names: &[String], values: &[&str]) -> Result<()> {
    if label_names.len() != values.len() {
        return Err(MetricsError::LabelCardinality {
            name: name.to_string(),
            expected: label_names.len(),
            got: values.len(),
        });
    }
    Ok(())
}

fn owned_labels(label_names: &[&str]) -> Vec<String> {
    label_names.iter().map(|l| l.to_string()).collect()
}

/// A metric that varies over time and can be set to arbitrary values.
pub struct Gauge {
    name: String,
    help: String,
    slot: Slot<dyn GaugeImpl>,
}

impl Gauge {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Replace the no-op implementation. Called by a backend while registering.
    pub fn bind(&self, imp: Arc<dyn GaugeImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    fn imp(&self) -> &dyn GaugeImpl {
        match self.slot.get() {
            Some(imp) => &**imp,
            None => &NoopMetric,
        }
    }
}

impl GaugeImpl for Gauge {
    fn inc(&self) {
        self.imp().inc()
    }

    fn dec(&self) {
        self.imp().dec()
    }

    fn set(&self, value: f64) {
        self.imp().set(value)
    }
}

/// A metric that only ever increments.
pub struct Counter {
    name: String,
    help: String,
    slot: Slot<dyn CounterImpl>,
}

impl Counter {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn bind(&self, imp: Arc<dyn CounterImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    fn imp(&self) -> &dyn CounterImpl {
        match self.slot.get() {
            Some(imp) => &**imp,
            None => &NoopMetric,
        }
    }
}

impl CounterImpl for Counter {
    fn inc(&self) {
        self.imp().inc()
    }
}

/// A metric that records an aggregation of observed values.
///
/// Empty buckets leave the choice of bucket layout to the backend.
pub struct Histogram {
    name: String,
    help: String,
    buckets: Vec<f64>,
    slot: Slot<dyn HistogramImpl>,
}

impl Histogram {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Arc<Self> {
        Self::with_buckets(name, help, Vec::new())
    }

    pub fn with_buckets(
        name: impl Into<String>,
        help: impl Into<String>,
        buckets: Vec<f64>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            buckets,
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn bind(&self, imp: Arc<dyn HistogramImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    fn imp(&self) -> &dyn HistogramImpl {
        match self.slot.get() {
            Some(imp) => &**imp,
            None => &NoopMetric,
        }
    }
}

impl HistogramImpl for Histogram {
    fn observe(&self, value: f64) {
        self.imp().observe(value)
    }
}

/// A series of gauges with the same label names but different values.
pub struct GaugeVec {
    name: String,
    help: String,
    label_names: Vec<String>,
    slot: Slot<dyn GaugeVecImpl>,
}

impl GaugeVec {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            label_names: owned_labels(label_names),
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn bind(&self, imp: Arc<dyn GaugeVecImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    pub fn try_with_label_values(&self, values: &[&str]) -> Result<Arc<dyn GaugeImpl>> {
        check_cardinality(&self.name, &self.label_names, values)?;
        let imp: Arc<dyn GaugeImpl> = match self.slot.get() {
            Some(vec) => vec.with_label_values(values),
            None => Arc::new(NoopMetric),
        };
        Ok(imp)
    }

    /// Gauge for the given label values. A wrong number of values yields a no-op.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<dyn GaugeImpl> {
        self.try_with_label_values(values).unwrap_or_else(|e| -> Arc<dyn GaugeImpl> {
            log::error!("{e}");
            Arc::new(NoopMetric)
        })
    }
}

/// A series of counters with the same label names but different values.
pub struct CounterVec {
    name: String,
    help: String,
    label_names: Vec<String>,
    slot: Slot<dyn CounterVecImpl>,
}

impl CounterVec {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            label_names: owned_labels(label_names),
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn bind(&self, imp: Arc<dyn CounterVecImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    pub fn try_with_label_values(&self, values: &[&str]) -> Result<Arc<dyn CounterImpl>> {
        check_cardinality(&self.name, &self.label_names, values)?;
        let imp: Arc<dyn CounterImpl> = match self.slot.get() {
            Some(vec) => vec.with_label_values(values),
            None => Arc::new(NoopMetric),
        };
        Ok(imp)
    }

    pub fn with_label_values(&self, values: &[&str]) -> Arc<dyn CounterImpl> {
        self.try_with_label_values(values).unwrap_or_else(|e| -> Arc<dyn CounterImpl> {
            log::error!("{e}");
            Arc::new(NoopMetric)
        })
    }
}

/// A series of histograms with the same label names and buckets.
pub struct HistogramVec {
    name: String,
    help: String,
    buckets: Vec<f64>,
    label_names: Vec<String>,
    slot: Slot<dyn HistogramVecImpl>,
}

impl HistogramVec {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Self::with_buckets(name, help, Vec::new(), label_names)
    }

    pub fn with_buckets(
        name: impl Into<String>,
        help: impl Into<String>,
        buckets: Vec<f64>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            buckets,
            label_names: owned_labels(label_names),
            slot: Slot::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn bind(&self, imp: Arc<dyn HistogramVecImpl>) -> Result<()> {
        self.slot.bind(&self.name, imp)
    }

    pub fn try_with_label_values(&self, values: &[&str]) -> Result<Arc<dyn HistogramImpl>> {
        check_cardinality(&self.name, &self.label_names, values)?;
        let imp: Arc<dyn HistogramImpl> = match self.slot.get() {
            Some(vec) => vec.with_label_values(values),
            None => Arc::new(NoopMetric),
        };
        Ok(imp)
    }

    pub fn with_label_values(&self, values: &[&str]) -> Arc<dyn HistogramImpl> {
        self.try_with_label_values(values).unwrap_or_else(|e| -> Arc<dyn HistogramImpl> {
            log::error!("{e}");
            Arc::new(NoopMetric)
        })
    }
}

/// Any metric that can be registered in a [`Registry`].
///
/// A given metric may only be registered in a single registry and does
/// nothing until registered.
#[derive(Clone)]
pub enum Metric {
    Gauge(Arc<Gauge>),
    GaugeVec(Arc<GaugeVec>),
    Counter(Arc<Counter>),
    CounterVec(Arc<CounterVec>),
    Histogram(Arc<Histogram>),
    HistogramVec(Arc<HistogramVec>),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Gauge(m) => m.name(),
            Metric::GaugeVec(m) => m.name(),
            Metric::Counter(m) => m.name(),
            Metric::CounterVec(m) => m.name(),
            Metric::Histogram(m) => m.name(),
            Metric::HistogramVec(m) => m.name(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Metric::Gauge(_) => "gauge",
            Metric::GaugeVec(_) => "gauge_vec",
            Metric::Counter(_) => "counter",
            Metric::CounterVec(_) => "counter_vec",
            Metric::Histogram(_) => "histogram",
            Metric::HistogramVec(_) => "histogram_vec",
        }
    }

    /// Register this metric in the given registry.
    pub fn register_in(&self, registry: &dyn Registry) -> Result<()> {
        match self {
            Metric::Gauge(m) => registry.register_gauge(m),
            Metric::GaugeVec(m) => registry.register_gauge_vec(m),
            Metric::Counter(m) => registry.register_counter(m),
            Metric::CounterVec(m) => registry.register_counter_vec(m),
            Metric::Histogram(m) => registry.register_histogram(m),
            Metric::HistogramVec(m) => registry.register_histogram_vec(m),
        }
    }

    /// Register this metric in the given registry, panicking if it fails.
    ///
    /// A failure here is a configuration mistake (duplicate or malformed
    /// name), never a runtime condition.
    pub fn must_register_in(&self, registry: &dyn Registry) {
        if let Err(e) = self.register_in(registry) {
            panic!("failed to register {} {}: {e}", self.kind(), self.name());
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

macro_rules! impl_into_metric {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<Arc<$ty>> for Metric {
                fn from(metric: Arc<$ty>) -> Self {
                    Metric::$ty(metric)
                }
            }
        )*
    };
}

impl_into_metric!(Gauge, GaugeVec, Counter, CounterVec, Histogram, HistogramVec);
