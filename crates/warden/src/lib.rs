//! # Warden
//!
//! **Declarative request parameter resolution for Rust web handlers**
//!
//! Handlers declare what they need. Warden resolves it from the request:
//!
//! - Typed fields from query, header, cookie, path, body, form and files,
//!   with defaults, aliases and constraints
//! - Nested dependencies, including resources released in reverse order of
//!   acquisition once the handler is done
//! - Registration-time checks, so a bad declaration fails when the route is
//!   built instead of on the first request
//! - Pre and post plugins wrapped around resolution
//!
//! ## Quick Start
//!
//! ```
//! use serde_json::json;
//! use warden::prelude::*;
//! use warden_test::TestRequest;
//!
//! let signature = Signature::new("get_item")
//!     .param("item_id", Annotation::Integer, Field::path())
//!     .param("q", Annotation::optional(Annotation::String), Field::query().default(json!(null)));
//! let handler = Handler::sync(|args: CallArgs| {
//!     let item_id: i64 = args.value("item_id")?;
//!     let q: Option<String> = args.value("q")?;
//!     Ok(json!({ "item_id": item_id, "q": q }))
//! });
//! let route = RouteBuilder::new(signature, handler).build(&WardenConfig::default())?;
//!
//! let request = TestRequest::get("/items/7?q=rust").path_param("item_id", 7).build()?;
//! let response = route.call_sync(&request)?;
//! assert_eq!(response, json!({ "item_id": 7, "q": "rust" }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Each route runs a fixed chain:
//!
//! ```text
//! Request → pre plugins → engine (resolve, acquire) → post plugins → handler
//!                                                                      ↓
//! Response ←──────────────── engine (release, LIFO) ←──────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/warden/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod route;

pub use route::{Route, RouteBuilder, RouteDoc};

// Re-export core types
pub use warden_core as core;

// Re-export field descriptors
pub use warden_field as field;

// Re-export compiler and engine
pub use warden_param as param;

// Re-export plugin chain
pub use warden_plugin as plugin;

// Re-export configuration
pub use warden_config as config;

// Re-export logging and metrics
pub use warden_telemetry as telemetry;

use warden_config::WardenConfig;
use warden_telemetry::TelemetryError;

/// Installs logging as configured and registers metric descriptions.
///
/// Call once at startup. A second call fails with
/// [`TelemetryError::LoggingInit`] because a global subscriber is already
/// set.
pub fn init(config: &WardenConfig) -> Result<(), TelemetryError> {
    warden_telemetry::init_logging(&config.logging.to_log_config())?;
    warden_telemetry::describe_metrics();
    tracing::info!(
        ignore_pre_check = config.precheck.ignore_pre_check,
        max_depth = config.resolution.max_depth,
        "warden initialized"
    );
    Ok(())
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use warden::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Route, RouteBuilder};

    pub use warden_core::{
        CallArgs, ErrorCategory, ExitOutcome, Provided, RequestAccessor, Resolved,
        ScopedResource, UploadedFile, WardenError, WardenResult,
    };

    pub use warden_field::{Annotation, ExtraParam, Field, ModelRegistry, ModelSchema};

    pub use warden_param::{Dependency, Signature};

    pub use warden_plugin::{
        AtMostOneOfConfig, AtMostOneOfFactory, Handler, Plugin, PluginManager, PluginPosition,
        RequiredConfig, RequiredFactory,
    };

    pub use warden_config::{ConfigLoader, WardenConfig};
}
