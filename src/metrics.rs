use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry, Encoder,
    HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use std::time::Instant;

use crate::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Backend request metrics
    pub static ref BACKEND_REQUESTS: IntCounterVec = register_int_counter_vec_with_registry!(
        "saymon_backend_requests_total",
        "Total number of requests sent to the backend",
        &["endpoint", "method"],
        REGISTRY
    ).unwrap();

    pub static ref BACKEND_REQUEST_FAILURES: IntCounterVec = register_int_counter_vec_with_registry!(
        "saymon_backend_request_failures_total",
        "Total number of failed backend requests",
        &["endpoint", "category"],
        REGISTRY
    ).unwrap();

    pub static ref BACKEND_REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        "saymon_backend_request_duration_seconds",
        "Backend request duration in seconds",
        &["endpoint"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0],
        REGISTRY
    ).unwrap();

    // Query translation metrics
    pub static ref QUERIES: IntCounterVec = register_int_counter_vec_with_registry!(
        "saymon_queries_total",
        "Series queries by outcome",
        &["outcome"],
        REGISTRY
    ).unwrap();
}

pub fn init_metrics() {
    // Touch every collector so the first scrape lists them all
    lazy_static::initialize(&BACKEND_REQUESTS);
    lazy_static::initialize(&BACKEND_REQUEST_FAILURES);
    lazy_static::initialize(&BACKEND_REQUEST_DURATION);
    lazy_static::initialize(&QUERIES);
}

/// Render the registry in the Prometheus text format.
pub fn gather() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::DatasourceError::Internal(e.to_string()))
}

pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str, method: &str) -> Self {
        BACKEND_REQUESTS.with_label_values(&[endpoint, method]).inc();
        Self {
            endpoint,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        BACKEND_REQUEST_DURATION
            .with_label_values(&[self.endpoint])
            .observe(duration);
    }
}

pub fn record_request_failure(endpoint: &str, category: &str) {
    BACKEND_REQUEST_FAILURES
        .with_label_values(&[endpoint, category])
        .inc();
}

pub fn record_query(outcome: &str) {
    QUERIES.with_label_values(&[outcome]).inc();
}
