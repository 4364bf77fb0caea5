//! [`Registry`] backed by a `prometheus::Registry`.
//!
//! Kept behind the `prometheus` feature so the facade itself never forces the
//! dependency on consumers.

use std::sync::Arc;

use prometheus::{HistogramOpts, Opts};

use crate::{
    error::{MetricsError, Result},
    metric::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec},
    metrics::{
        CounterImpl, CounterVecImpl, GaugeImpl, GaugeVecImpl, HistogramImpl, HistogramVecImpl,
        NoopMetric,
    },
    registry::{Registry, resolve_registry},
};

#[derive(Clone, Default)]
pub struct PrometheusRegistry {
    reg: prometheus::Registry,
}

impl PrometheusRegistry {
    pub fn new(reg: prometheus::Registry) -> Self {
        Self { reg }
    }

    /// The underlying registry, for gathering and exposition.
    pub fn inner(&self) -> &prometheus::Registry {
        &self.reg
    }

    fn register<C>(&self, name: &str, collector: C) -> Result<()>
    where
        C: prometheus::core::Collector + 'static,
    {
        self.reg
            .register(Box::new(collector))
            .map_err(|e| backend_error(name, e))?;
        log::debug!("Registered {name} with prometheus");
        Ok(())
    }
}

/// Resolve the default registry promise to the default prometheus registry.
pub fn resolve_to_default_prometheus() -> Result<()> {
    resolve_registry(Arc::new(PrometheusRegistry::new(
        prometheus::default_registry().clone(),
    )))
}

fn backend_error(name: &str, err: prometheus::Error) -> MetricsError {
    match err {
        prometheus::Error::AlreadyReg => MetricsError::DuplicateMetric(name.to_string()),
        other => MetricsError::Backend {
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}

fn label_refs(label_names: &[String]) -> Vec<&str> {
    label_names.iter().map(String::as_str).collect()
}

fn histogram_opts(name: &str, help: &str, buckets: &[f64]) -> HistogramOpts {
    let opts = HistogramOpts::new(name, help);
    if buckets.is_empty() {
        opts
    } else {
        opts.buckets(buckets.to_vec())
    }
}

impl Registry for PrometheusRegistry {
    fn register_gauge(&self, metric: &Arc<Gauge>) -> Result<()> {
        let actual = prometheus::Gauge::with_opts(Opts::new(metric.name(), metric.help()))
            .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(actual))
    }

    fn register_gauge_vec(&self, metric: &Arc<GaugeVec>) -> Result<()> {
        let actual = prometheus::GaugeVec::new(
            Opts::new(metric.name(), metric.help()),
            &label_refs(metric.label_names()),
        )
        .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(PromGaugeVec(actual)))
    }

    fn register_histogram(&self, metric: &Arc<Histogram>) -> Result<()> {
        let actual = prometheus::Histogram::with_opts(histogram_opts(
            metric.name(),
            metric.help(),
            metric.buckets(),
        ))
        .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(actual))
    }

    fn register_histogram_vec(&self, metric: &Arc<HistogramVec>) -> Result<()> {
        let actual = prometheus::HistogramVec::new(
            histogram_opts(metric.name(), metric.help(), metric.buckets()),
            &label_refs(metric.label_names()),
        )
        .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(PromHistogramVec(actual)))
    }

    fn register_counter(&self, metric: &Arc<Counter>) -> Result<()> {
        let actual = prometheus::Counter::with_opts(Opts::new(metric.name(), metric.help()))
            .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(actual))
    }

    fn register_counter_vec(&self, metric: &Arc<CounterVec>) -> Result<()> {
        let actual = prometheus::CounterVec::new(
            Opts::new(metric.name(), metric.help()),
            &label_refs(metric.label_names()),
        )
        .map_err(|e| backend_error(metric.name(), e))?;
        self.register(metric.name(), actual.clone())?;
        metric.bind(Arc::new(PromCounterVec(actual)))
    }
}

impl GaugeImpl for prometheus::Gauge {
    fn inc(&self) {
        prometheus::Gauge::inc(self)
    }

    fn dec(&self) {
        prometheus::Gauge::dec(self)
    }

    fn set(&self, value: f64) {
        prometheus::Gauge::set(self, value)
    }
}

impl CounterImpl for prometheus::Counter {
    fn inc(&self) {
        prometheus::Counter::inc(self)
    }
}

impl HistogramImpl for prometheus::Histogram {
    fn observe(&self, value: f64) {
        prometheus::Histogram::observe(self, value)
    }
}

// Child series are memoised by prometheus per label tuple.
struct PromGaugeVec(prometheus::GaugeVec);

impl GaugeVecImpl for PromGaugeVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn GaugeImpl> {
        match self.0.get_metric_with_label_values(values) {
            Ok(gauge) => Arc::new(gauge),
            Err(e) => {
                log::error!("Failed to resolve gauge series: {e}");
                Arc::new(NoopMetric)
            }
        }
    }
}

struct PromCounterVec(prometheus::CounterVec);

impl CounterVecImpl for PromCounterVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn CounterImpl> {
        match self.0.get_metric_with_label_values(values) {
            Ok(counter) => Arc::new(counter),
            Err(e) => {
                log::error!("Failed to resolve counter series: {e}");
                Arc::new(NoopMetric)
            }
        }
    }
}

struct PromHistogramVec(prometheus::HistogramVec);

impl HistogramVecImpl for PromHistogramVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn HistogramImpl> {
        match self.0.get_metric_with_label_values(values) {
            Ok(histogram) => Arc::new(histogram),
            Err(e) => {
                log::error!("Failed to resolve histogram series: {e}");
                Arc::new(NoopMetric)
            }
        }
    }
}
