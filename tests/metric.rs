use workqueue_metrics::{
    error::MetricsError,
    metric::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, Metric},
    metrics::{CounterImpl, GaugeImpl, HistogramImpl, NoopMetric},
    registry::MetricsProvider,
};

mod common;
use common::RecordingRegistry;

#[test]
fn test_unregistered_metrics_are_noops() {
    let gauge = Gauge::new("g", "gauge");
    let counter = Counter::new("c", "counter");
    let histogram = Histogram::new("h", "histogram");
    let gauge_vec = GaugeVec::new("gv", "gauge vec", &["name"]);
    let counter_vec = CounterVec::new("cv", "counter vec", &["name"]);
    let histogram_vec = HistogramVec::new("hv", "histogram vec", &["name"]);

    gauge.inc();
    gauge.dec();
    gauge.set(42.0);
    counter.inc();
    histogram.observe(1.5);
    gauge_vec.with_label_values(&["a"]).set(1.0);
    counter_vec.with_label_values(&["a"]).inc();
    histogram_vec.with_label_values(&["a"]).observe(2.0);

    assert!(!gauge.is_bound());
    assert!(!counter.is_bound());
    assert!(!histogram.is_bound());
    assert!(!gauge_vec.is_bound());
    assert!(!counter_vec.is_bound());
    assert!(!histogram_vec.is_bound());
}

#[test]
fn test_descriptor_identity() {
    let histogram = HistogramVec::with_buckets(
        "request_latency",
        "Request latency",
        vec![0.1, 1.0, 10.0],
        &["name", "code"],
    );

    assert_eq!(histogram.name(), "request_latency");
    assert_eq!(histogram.help(), "Request latency");
    assert_eq!(histogram.buckets(), &[0.1, 1.0, 10.0]);
    assert_eq!(histogram.label_names(), &["name", "code"]);

    let metric = Metric::from(histogram);
    assert_eq!(metric.name(), "request_latency");
    assert!(format!("{metric:?}").contains("histogram_vec"));
}

#[test]
fn test_bind_happens_once() {
    let gauge = Gauge::new("g", "gauge");
    gauge.bind(std::sync::Arc::new(NoopMetric)).unwrap();

    let err = gauge.bind(std::sync::Arc::new(NoopMetric)).unwrap_err();
    assert!(matches!(err, MetricsError::AlreadyBound(ref name) if name == "g"));
}

#[test]
fn test_registering_in_two_backends_fails() {
    let counter = Counter::new("shared", "shared");
    let first = RecordingRegistry::new();
    let second = RecordingRegistry::new();

    Metric::from(counter.clone())
        .register_in(&*first)
        .unwrap();
    let err = Metric::from(counter.clone())
        .register_in(&*second)
        .unwrap_err();
    assert!(matches!(err, MetricsError::AlreadyBound(_)));

    counter.inc();
    assert_eq!(first.value("shared", &[]), Some(1.0));
}

#[test]
fn test_label_cardinality_is_checked() {
    let vec = CounterVec::new("requests", "requests", &["name", "code"]);

    let err = vec.try_with_label_values(&["only-one"]).err().unwrap();
    assert!(matches!(
        err,
        MetricsError::LabelCardinality {
            expected: 2,
            got: 1,
            ..
        }
    ));

    // the lenient form degrades to a no-op instead of failing
    vec.with_label_values(&["a", "b", "c"]).inc();
    assert!(vec.try_with_label_values(&["a", "b"]).is_ok());
}

#[test]
fn test_label_isolation() {
    let provider = MetricsProvider::new();
    let backend = RecordingRegistry::new();

    let gauges = GaugeVec::new("depth", "depth", &["name"]);
    let histograms = HistogramVec::new("latency", "latency", &["name"]);
    provider.register(gauges.clone()).unwrap();
    provider.register(histograms.clone()).unwrap();
    provider.resolve(backend.clone()).unwrap();

    let a = gauges.with_label_values(&["a"]);
    let b = gauges.with_label_values(&["b"]);
    a.inc();
    a.inc();
    b.dec();

    histograms.with_label_values(&["a"]).observe(10.0);
    histograms.with_label_values(&["b"]).observe(20.0);
    histograms.with_label_values(&["a"]).observe(30.0);

    assert_eq!(backend.value("depth", &["a"]), Some(2.0));
    assert_eq!(backend.value("depth", &["b"]), Some(-1.0));
    assert_eq!(backend.observations("latency", &["a"]), vec![10.0, 30.0]);
    assert_eq!(backend.observations("latency", &["b"]), vec![20.0]);
}

#[test]
fn test_children_taken_before_registration_stay_noop() {
    let provider = MetricsProvider::new();
    let backend = RecordingRegistry::new();
    let counters = CounterVec::new("adds", "adds", &["name"]);
    provider.register(counters.clone()).unwrap();

    let early = counters.with_label_values(&["q"]);
    provider.resolve(backend.clone()).unwrap();
    let late = counters.with_label_values(&["q"]);

    early.inc();
    late.inc();
    assert_eq!(backend.value("adds", &["q"]), Some(1.0));
}

#[test]
fn test_bound_scalars_delegate_to_backend() {
    let provider = MetricsProvider::new();
    let backend = RecordingRegistry::new();
    let gauge = Gauge::new("depth", "depth");
    let counter = Counter::new("adds", "adds");
    let histogram = Histogram::new("latency", "latency");
    provider.register(gauge.clone()).unwrap();
    provider.register(counter.clone()).unwrap();
    provider.register(histogram.clone()).unwrap();
    provider.resolve(backend.clone()).unwrap();

    gauge.set(4.0);
    gauge.dec();
    counter.inc();
    counter.inc();
    histogram.observe(0.5);

    assert_eq!(backend.value("depth", &[]), Some(3.0));
    assert_eq!(backend.value("adds", &[]), Some(2.0));
    assert_eq!(backend.observations("latency", &[]), vec![0.5]);
}
