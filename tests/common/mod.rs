#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::{EnvFilter, fmt, util::SubscriberInitExt};
use workqueue_metrics::{
    error::{MetricsError, Result},
    metric::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec},
    metrics::{CounterImpl, CounterVecImpl, GaugeImpl, GaugeVecImpl, HistogramImpl, HistogramVecImpl},
    registry::Registry,
};

static INIT: Once = Once::new();

/// Initializes logging for integration tests with a consistent configuration.
/// This function is safe to call multiple times as it will only initialize logging once.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("workqueue_metrics=debug,test=debug"));

        let json_layer = fmt::layer()
            .json()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true);

        use tracing_subscriber::layer::SubscriberExt;
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init();
    });
}

type SeriesKey = (String, Vec<String>);

#[derive(Debug, Clone, Default)]
struct Series {
    value: f64,
    observations: Vec<f64>,
}

type Store = Arc<Mutex<HashMap<SeriesKey, Series>>>;

struct FakeSeries {
    key: SeriesKey,
    store: Store,
}

impl FakeSeries {
    fn update(&self, f: impl FnOnce(&mut Series)) {
        let mut store = self.store.lock().unwrap();
        f(store.entry(self.key.clone()).or_default());
    }
}

impl GaugeImpl for FakeSeries {
    fn inc(&self) {
        self.update(|s| s.value += 1.0);
    }

    fn dec(&self) {
        self.update(|s| s.value -= 1.0);
    }

    fn set(&self, value: f64) {
        self.update(|s| s.value = value);
    }
}

impl CounterImpl for FakeSeries {
    fn inc(&self) {
        self.update(|s| s.value += 1.0);
    }
}

impl HistogramImpl for FakeSeries {
    fn observe(&self, value: f64) {
        self.update(|s| s.observations.push(value));
    }
}

struct FakeVec {
    name: String,
    store: Store,
}

impl FakeVec {
    fn series(&self, values: &[&str]) -> Arc<FakeSeries> {
        Arc::new(FakeSeries {
            key: (
                self.name.clone(),
                values.iter().map(|v| v.to_string()).collect(),
            ),
            store: self.store.clone(),
        })
    }
}

impl GaugeVecImpl for FakeVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn GaugeImpl> {
        self.series(values)
    }
}

impl CounterVecImpl for FakeVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn CounterImpl> {
        self.series(values)
    }
}

impl HistogramVecImpl for FakeVec {
    fn with_label_values(&self, values: &[&str]) -> Arc<dyn HistogramImpl> {
        self.series(values)
    }
}

/// In-memory backend that remembers the order metrics were registered in.
#[derive(Default)]
pub struct RecordingRegistry {
    registrations: Mutex<Vec<String>>,
    names: Mutex<HashSet<String>>,
    store: Store,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.registrations.lock().unwrap().clone()
    }

    /// Current value of a gauge or counter series.
    pub fn value(&self, name: &str, labels: &[&str]) -> Option<f64> {
        self.store
            .lock()
            .unwrap()
            .get(&key(name, labels))
            .map(|s| s.value)
    }

    /// Every value observed by a histogram series, in order.
    pub fn observations(&self, name: &str, labels: &[&str]) -> Vec<f64> {
        self.store
            .lock()
            .unwrap()
            .get(&key(name, labels))
            .map(|s| s.observations.clone())
            .unwrap_or_default()
    }

    fn claim(&self, name: &str) -> Result<()> {
        if !self.names.lock().unwrap().insert(name.to_string()) {
            return Err(MetricsError::DuplicateMetric(name.to_string()));
        }
        self.registrations.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn scalar(&self, name: &str) -> Arc<FakeSeries> {
        Arc::new(FakeSeries {
            key: key(name, &[]),
            store: self.store.clone(),
        })
    }

    fn vec(&self, name: &str) -> Arc<FakeVec> {
        Arc::new(FakeVec {
            name: name.to_string(),
            store: self.store.clone(),
        })
    }
}

fn key(name: &str, labels: &[&str]) -> SeriesKey {
    (
        name.to_string(),
        labels.iter().map(|l| l.to_string()).collect(),
    )
}

impl Registry for RecordingRegistry {
    fn register_gauge(&self, metric: &Arc<Gauge>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.scalar(metric.name()))
    }

    fn register_gauge_vec(&self, metric: &Arc<GaugeVec>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.vec(metric.name()))
    }

    fn register_histogram(&self, metric: &Arc<Histogram>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.scalar(metric.name()))
    }

    fn register_histogram_vec(&self, metric: &Arc<HistogramVec>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.vec(metric.name()))
    }

    fn register_counter(&self, metric: &Arc<Counter>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.scalar(metric.name()))
    }

    fn register_counter_vec(&self, metric: &Arc<CounterVec>) -> Result<()> {
        self.claim(metric.name())?;
        metric.bind(self.vec(metric.name()))
    }
}
