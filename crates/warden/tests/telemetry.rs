//! Process-wide telemetry setup.

use warden::config::WardenConfig;
use warden::param::context::{RELEASE_FAILURES_METRIC, RESOLUTION_FAILURES_METRIC};
use warden::telemetry::metrics::{RELEASE_FAILURES, RESOLUTION_FAILURES};
use warden::telemetry::TelemetryError;

#[test]
fn test_described_metrics_match_the_engine_counters() {
    assert_eq!(RESOLUTION_FAILURES, RESOLUTION_FAILURES_METRIC);
    assert_eq!(RELEASE_FAILURES, RELEASE_FAILURES_METRIC);
}

#[test]
fn test_init_installs_logging_once() {
    let config = WardenConfig::production();
    warden::init(&config).unwrap();

    let err = warden::init(&config).unwrap_err();
    assert!(matches!(err, TelemetryError::LoggingInit(_)));
}
