use std::time::Duration;

use workqueue_metrics::{
    reflector_metrics::{ReflectorMetricFamilies, ReflectorMetrics},
    registry::MetricsProvider,
};

mod common;
use common::RecordingRegistry;

fn resolved_families() -> (ReflectorMetricFamilies, std::sync::Arc<RecordingRegistry>) {
    let provider = MetricsProvider::new();
    let families = ReflectorMetricFamilies::new();
    families.register_in(&provider).unwrap();
    let backend = RecordingRegistry::new();
    provider.resolve(backend.clone()).unwrap();
    (families, backend)
}

#[test]
fn test_reflector_families_registered() {
    let (_families, backend) = resolved_families();
    assert_eq!(
        backend.registered_names(),
        vec![
            "reflector_lists_total",
            "reflector_list_duration_seconds",
            "reflector_items_per_list",
            "reflector_watches_total",
            "reflector_short_watches_total",
            "reflector_watch_duration_seconds",
            "reflector_items_per_watch",
            "reflector_last_resource_version",
        ]
    );
}

#[test]
fn test_list_and_watch_recording() {
    let (families, backend) = resolved_families();
    let metrics = ReflectorMetrics::new(&families, "pods").unwrap();

    metrics.record_list(Duration::from_millis(250), 40);
    metrics.record_watch(Duration::from_secs(300), 12, false);
    metrics.record_watch(Duration::from_millis(500), 0, true);
    metrics.set_last_resource_version(1234.0);

    let pods = &["pods"];
    assert_eq!(backend.value("reflector_lists_total", pods), Some(1.0));
    assert_eq!(
        backend.observations("reflector_list_duration_seconds", pods),
        vec![0.25]
    );
    assert_eq!(backend.observations("reflector_items_per_list", pods), vec![40.0]);
    assert_eq!(backend.value("reflector_watches_total", pods), Some(2.0));
    assert_eq!(backend.value("reflector_short_watches_total", pods), Some(1.0));
    assert_eq!(
        backend.observations("reflector_watch_duration_seconds", pods),
        vec![300.0, 0.5]
    );
    assert_eq!(
        backend.observations("reflector_items_per_watch", pods),
        vec![12.0, 0.0]
    );
    assert_eq!(
        backend.value("reflector_last_resource_version", pods),
        Some(1234.0)
    );
}

#[test]
fn test_unnamed_reflector_has_no_metrics() {
    let (families, _backend) = resolved_families();
    assert!(ReflectorMetrics::new(&families, "").is_none());
}
