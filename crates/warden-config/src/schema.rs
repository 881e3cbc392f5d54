//! Configuration sections.

use serde::{Deserialize, Serialize};
use warden_core::TipStyle;
use warden_telemetry::{LogConfig, LogFormat};

fn default_true() -> bool {
    true
}

/// Registration-time pre-check settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PrecheckConfig {
    /// Defer the value pre-check to the first call of each route.
    ///
    /// `Depends` return annotations are checked at registration either way.
    #[serde(default)]
    pub ignore_pre_check: bool,
}

/// Dependency graph settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Report cyclic `Depends` graphs as configuration errors.
    #[serde(default = "default_true")]
    pub detect_cycles: bool,

    /// Maximum nesting of dependencies.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Default maximum dependency depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Upper bound accepted for `resolution.max_depth`.
pub const MAX_DEPTH_LIMIT: usize = 1024;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Tip error settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TipConfig {
    /// Attach the offending declaration to errors.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Render the declaration snippet in error messages.
    #[serde(default = "default_true")]
    pub include_snippet: bool,
}

impl Default for TipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_snippet: true,
        }
    }
}

impl TipConfig {
    /// The tip style these settings describe.
    #[must_use]
    pub fn style(&self) -> TipStyle {
        TipStyle {
            enabled: self.enabled,
            include_snippet: self.include_snippet,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Converts to the telemetry crate's logging configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            span_events: self.format != LogFormat::Json && self.level.contains("debug"),
            file_line_info: self.include_location,
            include_target: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_defaults() {
        assert!(!PrecheckConfig::default().ignore_pre_check);
        let resolution = ResolutionConfig::default();
        assert!(resolution.detect_cycles);
        assert_eq!(resolution.max_depth, 32);
        assert_eq!(TipConfig::default().style(), TipStyle::default());
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let resolution: ResolutionConfig = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert!(resolution.detect_cycles);
        assert_eq!(resolution.max_depth, 8);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<TipConfig, _> = serde_json::from_str(r#"{"snippet": false}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_logging_conversion() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Compact,
            include_location: true,
            ..LoggingConfig::default()
        };
        let log = logging.to_log_config();
        assert_eq!(log.format, LogFormat::Compact);
        assert!(log.span_events);
        assert!(log.file_line_info);
    }
}
