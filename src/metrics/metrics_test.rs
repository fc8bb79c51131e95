use serial_test::serial;

use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("split_watch".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    WATCH_EVENTS_TOTAL.with_label_values(&["ADDED"]).inc();
    let metrics = registry.gather();
    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();

    assert!(
        metric_names.contains(&"split_watch_watch_events_total"),
        "Missing split_watch_watch_events_total"
    );
}

#[test]
fn test_reconnect_counter_is_labelled_by_cause() {
    WATCH_RECONNECTS_TOTAL.with_label_values(&["test_cause"]).inc();
    WATCH_RECONNECTS_TOTAL.with_label_values(&["test_cause"]).inc();

    assert!(WATCH_RECONNECTS_TOTAL.with_label_values(&["test_cause"]).get() >= 2);
    assert_eq!(WATCH_RECONNECTS_TOTAL.with_label_values(&["unused_cause"]).get(), 0);
}

#[test]
#[serial(observer_gauge)]
fn test_render_contains_prefixed_names() {
    let registry = create_test_registry();
    OBSERVER_CONNECTIONS.set(3);

    let body = render(&registry);

    assert!(body.contains("split_watch_observer_connections"));
}
