//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while layering or validating a [`WardenConfig`](crate::WardenConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required layer file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path as given.
        path: PathBuf,
    },

    /// Failed to read a configuration or `.env` file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// The file being read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A TOML layer did not parse.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A JSON layer did not parse, or a merged layer has unknown keys.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The format is neither TOML nor JSON.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A `WARDEN__SECTION__KEY` override names no setting.
    #[error("unknown configuration field: {field} in section {section}")]
    UnknownField {
        /// Key after the section.
        field: String,
        /// Section part of the variable.
        section: String,
    },

    /// A setting is outside its accepted range.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted setting path, e.g. `resolution.max_depth`.
        field: String,
        /// What is accepted.
        reason: String,
    },

    /// An override value does not parse as the setting's type.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// Parser message.
        reason: String,
    },

    /// The `.env` file could not be loaded.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl ConfigError {
    /// Missing layer file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable layer file.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Unknown override key.
    pub fn unknown_field(field: impl Into<String>, section: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
            section: section.into(),
        }
    }

    /// Out-of-range setting.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Unparseable override value.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
