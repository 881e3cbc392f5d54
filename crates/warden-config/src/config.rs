//! The root configuration type.

use serde::{Deserialize, Serialize};
use warden_telemetry::LogFormat;

use crate::{ConfigError, LoggingConfig, PrecheckConfig, ResolutionConfig, TipConfig, MAX_DEPTH_LIMIT};

/// Complete Warden configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use warden_config::WardenConfig;
///
/// let config = WardenConfig::default();
/// assert!(!config.precheck.ignore_pre_check);
/// assert_eq!(config.resolution.max_depth, 32);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Pre-check settings.
    #[serde(default)]
    pub precheck: PrecheckConfig,

    /// Dependency graph settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Tip error settings.
    #[serde(default)]
    pub tip: TipConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> WardenConfigBuilder {
        WardenConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if:
    /// - `resolution.max_depth` is 0 or above [`MAX_DEPTH_LIMIT`]
    /// - `logging.level` is not a valid filter directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution.max_depth == 0 || self.resolution.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::invalid_value(
                "resolution.max_depth",
                format!("must be between 1 and {MAX_DEPTH_LIMIT}"),
            ));
        }

        if self.logging.enabled {
            warden_telemetry::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Development preset.
    ///
    /// - Pretty debug logs with source locations
    /// - Value pre-check deferred to the first call, so a broken route does
    ///   not stop the others from registering
    ///
    /// # Example
    ///
    /// ```
    /// use warden_config::WardenConfig;
    ///
    /// let config = WardenConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert!(config.precheck.ignore_pre_check);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;

        config.precheck.ignore_pre_check = true;

        config
    }

    /// Production preset.
    ///
    /// - JSON logs at info level
    /// - Every check runs at registration
    /// - Error messages carry the declaring callable but no snippet
    ///
    /// # Example
    ///
    /// ```
    /// use warden_config::WardenConfig;
    /// use warden_telemetry::LogFormat;
    ///
    /// let config = WardenConfig::production();
    /// assert_eq!(config.logging.format, LogFormat::Json);
    /// assert!(!config.tip.include_snippet);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;

        config.precheck.ignore_pre_check = false;
        config.resolution.detect_cycles = true;

        config.tip.include_snippet = false;

        config
    }
}

/// Builder for [`WardenConfig`].
#[derive(Debug, Default)]
pub struct WardenConfigBuilder {
    config: WardenConfig,
}

impl WardenConfigBuilder {
    /// Set the pre-check section.
    #[must_use]
    pub fn precheck(mut self, precheck: PrecheckConfig) -> Self {
        self.config.precheck = precheck;
        self
    }

    /// Set the resolution section.
    #[must_use]
    pub fn resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Set the tip section.
    #[must_use]
    pub fn tip(mut self, tip: TipConfig) -> Self {
        self.config.tip = tip;
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Defer the value pre-check to the first call.
    #[must_use]
    pub fn ignore_pre_check(mut self, ignore: bool) -> Self {
        self.config.precheck.ignore_pre_check = ignore;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> WardenConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WardenConfig::default().validate().is_ok());
        assert!(WardenConfig::development().validate().is_ok());
        assert!(WardenConfig::production().validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut config = WardenConfig::default();
        config.resolution.max_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resolution.max_depth"));
    }

    #[test]
    fn test_bad_level_rejected_only_when_enabled() {
        let mut config = WardenConfig::default();
        config.logging.level = "warden=[".to_string();
        assert!(config.validate().is_err());
        config.logging.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WardenConfig::builder()
            .ignore_pre_check(true)
            .resolution(ResolutionConfig {
                detect_cycles: false,
                max_depth: 4,
            })
            .build();
        assert!(config.precheck.ignore_pre_check);
        assert_eq!(config.resolution.max_depth, 4);
        assert_eq!(config.tip, TipConfig::default());
    }
}
