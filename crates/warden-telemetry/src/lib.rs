//! # Warden Telemetry
//!
//! Logging setup and metric names for Warden.
//!
//! Warden's crates emit `tracing` events (route registration at `info`,
//! compilation and resolution at `debug`, release failures at `warn`) and
//! `metrics` counters. This crate installs a `tracing-subscriber` for
//! applications that do not bring their own, and documents the metrics.

#![doc(html_root_url = "https://docs.rs/warden-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};
pub use metrics::describe_metrics;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
