//! Metrics collection and exposition.
//!
//! # Metrics
//! - `engine_endpoint_check_total` (counter): probe outcomes by `tag`, `ok`
//! - `engine_endpoint_check_millis` (gauge): last probe latency by `tag`
//! - `engine_subscription_refresh_total` (counter): refresh runs by `outcome`
//! - `engine_health_recheck_total` (counter): re-check runs by `outcome`
//! - `engine_restart_requests_total` (counter): restart requests by `source`
//! - `engine_process_launches_total` (counter): engine process launches

use std::time::Duration;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const ENDPOINT_CHECK_TOTAL: &str = "engine_endpoint_check_total";
pub const ENDPOINT_CHECK_MILLIS: &str = "engine_endpoint_check_millis";
pub const SUBSCRIPTION_REFRESH_TOTAL: &str = "engine_subscription_refresh_total";
pub const HEALTH_RECHECK_TOTAL: &str = "engine_health_recheck_total";
pub const RESTART_REQUESTS_TOTAL: &str = "engine_restart_requests_total";
pub const PROCESS_LAUNCHES_TOTAL: &str = "engine_process_launches_total";

/// Install the global Prometheus recorder and describe the metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    ::metrics::describe_counter!(ENDPOINT_CHECK_TOTAL, "subscription endpoint check result");
    ::metrics::describe_gauge!(ENDPOINT_CHECK_MILLIS, "subscription endpoint check costs in milliseconds");
    ::metrics::describe_counter!(SUBSCRIPTION_REFRESH_TOTAL, "subscription reconciliation runs");
    ::metrics::describe_counter!(HEALTH_RECHECK_TOTAL, "health reconciliation runs");
    ::metrics::describe_counter!(RESTART_REQUESTS_TOTAL, "engine restart requests");
    ::metrics::describe_counter!(PROCESS_LAUNCHES_TOTAL, "engine process launches");
}

pub fn record_endpoint_check(tag: &str, ok: bool, elapsed: Duration) {
    ::metrics::counter!(ENDPOINT_CHECK_TOTAL, "tag" => tag.to_string(), "ok" => ok.to_string())
        .increment(1);
    ::metrics::gauge!(ENDPOINT_CHECK_MILLIS, "tag" => tag.to_string())
        .set(elapsed.as_millis() as f64);
}

pub fn record_subscription_refresh(outcome: &'static str) {
    ::metrics::counter!(SUBSCRIPTION_REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_health_recheck(outcome: &'static str) {
    ::metrics::counter!(HEALTH_RECHECK_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_restart_request(source: &'static str) {
    ::metrics::counter!(RESTART_REQUESTS_TOTAL, "source" => source).increment(1);
}

pub fn record_process_launch() {
    ::metrics::counter!(PROCESS_LAUNCHES_TOTAL).increment(1);
}
