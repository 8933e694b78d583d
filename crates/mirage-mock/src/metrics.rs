//! Prometheus metrics for the mock server.
//!
//! Tracks request outcomes, injected delays, snapshot lifecycle and kafka
//! scenario activity.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Requests handled by the runtime server
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_requests_total",
        "Total number of requests handled by the mock server",
        &["method", "status", "outcome"]  // outcome: mock|proxy|error
    )
    .unwrap();

    /// Per-route response delay in milliseconds
    pub static ref REQUEST_DELAY_MS: HistogramVec = register_histogram_vec!(
        "mirage_request_delay_ms",
        "Histogram of response delays applied before writing, in milliseconds",
        &["route"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Requests currently pinned to a snapshot
    pub static ref SNAPSHOT_IN_FLIGHT: GaugeVec = register_gauge_vec!(
        "mirage_snapshot_in_flight",
        "Requests currently pinned to each live snapshot",
        &["version"]
    )
    .unwrap();

    /// Reload attempts
    pub static ref SNAPSHOT_RELOADS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_snapshot_reloads_total",
        "Total number of contract reload attempts",
        &["result"]  // result: success|failure
    )
    .unwrap();

    /// Retired snapshots still waiting for their last request
    pub static ref SNAPSHOTS_RETIRED: Gauge = register_gauge!(
        "mirage_snapshots_retired",
        "Number of retired snapshots not yet reclaimed"
    )
    .unwrap();

    /// Messages published into the in-memory kafka store
    pub static ref KAFKA_PUBLISHED_TOTAL: CounterVec = register_counter_vec!(
        "mirage_kafka_published_total",
        "Total number of messages published by kafka scenarios",
        &["topic"]
    )
    .unwrap();

    /// Scenario execution lifecycle events
    pub static ref KAFKA_EXECUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_kafka_executions_total",
        "Kafka scenario execution lifecycle events",
        &["event"]  // event: started|stopped|finished
    )
    .unwrap();

    /// Proxied requests by upstream status
    pub static ref PROXY_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_proxy_requests_total",
        "Total number of requests forwarded to the proxy upstream",
        &["status"]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_request(method: &str, status: u16, outcome: &str) {
    REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string(), outcome])
        .inc();
}

pub fn record_delay(route: &str, delay_ms: f64) {
    REQUEST_DELAY_MS
        .with_label_values(&[route])
        .observe(delay_ms);
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    SNAPSHOT_RELOADS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_kafka_publish(topic: &str) {
    KAFKA_PUBLISHED_TOTAL.with_label_values(&[topic]).inc();
}

pub fn record_execution_event(event: &str) {
    KAFKA_EXECUTIONS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_proxy(status: u16) {
    PROXY_REQUESTS_TOTAL
        .with_label_values(&[&status.to_string()])
        .inc();
}
