use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref WATCH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_total", "Change events received from the resource store"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_RECONNECTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_reconnects_total", "Watch retries grouped by what ended the previous attempt"),
        &["cause"]
    )
    .expect("metric can not be created");

    pub static ref BROADCAST_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "broadcast_failures_total",
        "Observer sends that failed and dropped the connection"
    )
    .expect("metric can not be created");

    pub static ref OBSERVER_CONNECTIONS: IntGauge = IntGauge::new(
        "observer_connections",
        "Currently registered observer connections"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("split_watch".to_string()), None).expect("registry can be created");
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(WATCH_EVENTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_RECONNECTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(BROADCAST_FAILURES_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(OBSERVER_CONNECTIONS.clone()))
        .expect("collector can be registered");
}

static INIT: Once = Once::new();

/// Registers the collectors on the process registry.
pub fn init_metrics() {
    INIT.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Text exposition of every registered metric.
pub fn render_metrics() -> String {
    render(&REGISTRY)
}

fn render(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
