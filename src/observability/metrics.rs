//! Metrics collection and exposition.
//!
//! # Metrics
//! Per breaker, labelled by `name`:
//! - `voiceroi_circuit_calls_total` (counter): calls admitted and attempted
//! - `voiceroi_circuit_successes_total` (counter)
//! - `voiceroi_circuit_failures_total` (counter)
//! - `voiceroi_circuit_rejections_total` (counter): fail-fast rejections only
//! - `voiceroi_circuit_timeouts_total` (counter): caller-side deadlines hit
//! - `voiceroi_circuit_state` (gauge): 0=CLOSED, 0.5=HALF_OPEN, 1=OPEN
//! - `voiceroi_circuit_consecutive_opens` (gauge)
//! - `voiceroi_circuit_success_rate` (gauge): percentage over the rolling window
//!
//! HTTP surface:
//! - `voiceroi_http_requests_total` (counter): by method, path, status
//! - `voiceroi_http_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Rejections never touch `calls_total` or `failures_total`
//! - Without an installed recorder every helper is a no-op

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::resilience::CircuitState;

pub const CALLS_TOTAL: &str = "voiceroi_circuit_calls_total";
pub const SUCCESSES_TOTAL: &str = "voiceroi_circuit_successes_total";
pub const FAILURES_TOTAL: &str = "voiceroi_circuit_failures_total";
pub const REJECTIONS_TOTAL: &str = "voiceroi_circuit_rejections_total";
pub const TIMEOUTS_TOTAL: &str = "voiceroi_circuit_timeouts_total";
pub const STATE: &str = "voiceroi_circuit_state";
pub const CONSECUTIVE_OPENS: &str = "voiceroi_circuit_consecutive_opens";
pub const SUCCESS_RATE: &str = "voiceroi_circuit_success_rate";

pub const HTTP_REQUESTS_TOTAL: &str = "voiceroi_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "voiceroi_http_request_duration_seconds";

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

/// Register help text for every metric with the current recorder.
pub fn describe() {
    describe_counter!(CALLS_TOTAL, "Total calls through circuit breaker");
    describe_counter!(SUCCESSES_TOTAL, "Successful calls through circuit breaker");
    describe_counter!(FAILURES_TOTAL, "Failed calls through circuit breaker");
    describe_counter!(REJECTIONS_TOTAL, "Rejected calls (circuit open)");
    describe_counter!(TIMEOUTS_TOTAL, "Timed out calls");
    describe_gauge!(STATE, "Current circuit state (0=CLOSED, 0.5=HALF_OPEN, 1=OPEN)");
    describe_gauge!(CONSECUTIVE_OPENS, "Number of consecutive OPEN transitions");
    describe_gauge!(SUCCESS_RATE, "Success rate percentage");
    describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests served");
    describe_histogram!(HTTP_REQUEST_DURATION, "HTTP request latency in seconds");
}

pub fn record_call(name: &str) {
    counter!(CALLS_TOTAL, "name" => name.to_owned()).increment(1);
}

pub fn record_success(name: &str) {
    counter!(SUCCESSES_TOTAL, "name" => name.to_owned()).increment(1);
}

pub fn record_failure(name: &str) {
    counter!(FAILURES_TOTAL, "name" => name.to_owned()).increment(1);
}

pub fn record_rejection(name: &str) {
    counter!(REJECTIONS_TOTAL, "name" => name.to_owned()).increment(1);
}

pub fn record_timeout(name: &str) {
    counter!(TIMEOUTS_TOTAL, "name" => name.to_owned()).increment(1);
}

pub fn record_state(name: &str, state: CircuitState) {
    gauge!(STATE, "name" => name.to_owned()).set(state.gauge_value());
}

pub fn record_consecutive_opens(name: &str, opens: u64) {
    gauge!(CONSECUTIVE_OPENS, "name" => name.to_owned()).set(opens as f64);
}

pub fn record_success_rate(name: &str, percent: f64) {
    gauge!(SUCCESS_RATE, "name" => name.to_owned()).set(percent);
}

/// Record one served HTTP request.
pub fn record_request(method: &str, path: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_owned()),
        ("path", path.to_owned()),
        ("status", status.to_string()),
    ];
    counter!(HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(HTTP_REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
}
