//! Behavioural contracts for the metric shapes a backend has to provide.

use std::sync::Arc;

/// Mechanics of a gauge, a value that can go up, down, or be set.
pub trait GaugeImpl: Send + Sync {
    /// Increment the gauge by 1.0
    fn inc(&self);

    /// Decrement the gauge by 1.0
    fn dec(&self);

    /// Set the gauge to an arbitrary value
    fn set(&self, value: f64);
}

/// Mechanics of a counter, which only ever increments.
pub trait CounterImpl: Send + Sync {
    /// Increment the counter by 1
    fn inc(&self);
}

/// Mechanics of a histogram, which aggregates observed values.
pub trait HistogramImpl: Send + Sync {
    /// Note that a particular value occurred
    fn observe(&self, value: f64);
}

/// A family of gauges sharing label names.
pub trait GaugeVecImpl: Send + Sync {
    /// Gauge for the given label values, in label-name order
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn GaugeImpl>;
}

/// A family of counters sharing label names.
pub trait CounterVecImpl: Send + Sync {
    /// Counter for the given label values, in label-name order
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn CounterImpl>;
}

/// A family of histograms sharing label names.
pub trait HistogramVecImpl: Send + Sync {
    /// Histogram for the given label values, in label-name order
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn HistogramImpl>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetric;

impl GaugeImpl for NoopMetric {
    fn inc(&self) {}
    fn dec(&self) {}
    fn set(&self, _value: f64) {}
}

impl CounterImpl for NoopMetric {
    fn inc(&self) {}
}

impl HistogramImpl for NoopMetric {
    fn observe(&self, _value: f64) {}
}

/// Vector factory that hands out [`NoopMetric`] forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVec;

impl GaugeVecImpl for NoopVec {
    fn with_label_values(&self, _values: &[&str]) -> Arc<dyn GaugeImpl> {
        Arc::new(NoopMetric)
    }
}

impl CounterVecImpl for NoopVec {
    fn with_label_values(&self, _values: &[&str]) -> Arc<dyn CounterImpl> {
        Arc::new(NoopMetric)
    }
}

impl HistogramVecImpl for NoopVec {
    fn with_label_values(&self, _values: &[&str]) -> Arc<dyn HistogramImpl> {
        Arc::new(NoopMetric)
    }
}
