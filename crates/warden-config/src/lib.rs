//! Typed configuration for Warden.
//!
//! [`WardenConfig`] holds every setting that changes how routes are
//! registered and called:
//!
//! - [`PrecheckConfig`] - whether the value pre-check runs at registration
//! - [`ResolutionConfig`] - cycle detection and maximum dependency depth
//! - [`TipConfig`] - how errors point at the offending declaration
//! - [`LoggingConfig`] - log level and format
//!
//! # Configuration File Format
//!
//! ```toml
//! [precheck]
//! ignore_pre_check = false
//!
//! [resolution]
//! detect_cycles = true
//! max_depth = 32
//!
//! [tip]
//! enabled = true
//! include_snippet = true
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every value can be overridden with `WARDEN__SECTION__KEY`, e.g.
//! `WARDEN__PRECHECK__IGNORE_PRE_CHECK=true` or
//! `WARDEN__LOGGING__FORMAT=compact`.

#![doc(html_root_url = "https://docs.rs/warden-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{WardenConfig, WardenConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use schema::{
    LoggingConfig, PrecheckConfig, ResolutionConfig, TipConfig, DEFAULT_MAX_DEPTH, MAX_DEPTH_LIMIT,
};
