// Metrics and observability module
// This file handles the prometheus metrics exported by the route processor
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

pub static ROUTES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "route_processed_total",
        "routing calls by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static ROUTE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "route_errors_total",
        "failed routing calls by error class",
        &["class"]
    )
    .unwrap()
});

pub static ROUTE_STEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "route_steps_total",
        "executed route steps by command",
        &["command"]
    )
    .unwrap()
});

pub static ROUTE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "route_latency_seconds",
        "wall time of a routing call",
        &["outcome"]
    )
    .unwrap()
});

/// Text exposition of the default registry.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
