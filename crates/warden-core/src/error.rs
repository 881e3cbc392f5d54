//! Error types for Warden.
//!
//! Two families of errors exist:
//!
//! - [`ConfigError`]: raised while a route is registered (bad defaults,
//!   dependency return-type mismatches, unsupported parameter shapes). A
//!   route that hits one must not register.
//! - [`WardenError`]: raised while a request is resolved (missing values,
//!   failed constraints, failing dependencies) and wrapping [`ConfigError`]
//!   so registration can report through the same type.
//!
//! Every request-time error carries enough structure (category, offending
//! parameter, source kind, and once tip-wrapped, the declaring callable's
//! location) for an adapter to render an actionable response.

use crate::source::SourceKind;
use crate::tip::TipError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`WardenError`].
pub type WardenResult<T> = Result<T, WardenError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A required value is absent from the request.
    NotFound,
    /// A value failed coercion or a declared constraint.
    Validation,
    /// A dependency callable failed.
    Dependency,
    /// A resource guard failed to release.
    Resource,
    /// The handler itself failed.
    Handler,
    /// A plugin rejected the request.
    Plugin,
    /// The route is misconfigured.
    Configuration,
    /// Internal errors (misused call arguments, accessor failures).
    Internal,
    /// Several errors surfaced together.
    Multiple,
}

impl ErrorCategory {
    /// Returns the snake_case name used in logs and metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Dependency => "dependency",
            Self::Resource => "resource",
            Self::Handler => "handler",
            Self::Plugin => "plugin",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::Multiple => "multiple",
        }
    }

    /// Returns true for errors caused by the incoming request's data.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound | Self::Validation)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration-time configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A default, default factory or example value does not fit the annotation.
    #[error("`{param}`: {what} value {value} is not a valid {annotation}: {reason}")]
    FieldValueType {
        /// Parameter name
        param: String,
        /// Which value was checked (`default`, `default_factory`, `example`)
        what: &'static str,
        /// The rendered annotation
        annotation: String,
        /// The offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Both `default` and `default_factory` were set.
    #[error("`{param}`: default and default_factory can not be set at the same time")]
    ConflictingDefault {
        /// Parameter name
        param: String,
    },

    /// A dependency's return type differs from the consuming annotation.
    #[error(
        "`{param}`: dependency `{dependency}` returns {found}, but the parameter is annotated as {expected}"
    )]
    ReturnTypeMismatch {
        /// Consuming parameter name
        param: String,
        /// Dependency qualified name
        dependency: String,
        /// The parameter's annotation
        expected: String,
        /// The dependency's declared return type
        found: String,
    },

    /// A parameter has no default and is not a model, request or view receiver.
    #[error(
        "`{callable}`: parameter `{param}: {annotation}` has no default and is neither a model, the request nor the view receiver"
    )]
    UnsupportedParameter {
        /// Declaring callable
        callable: String,
        /// Parameter name
        param: String,
        /// The rendered annotation
        annotation: String,
    },

    /// A named annotation could not be resolved.
    #[error("`{param}`: can not resolve annotation `{name}`")]
    UnresolvedAnnotation {
        /// Parameter name
        param: String,
        /// The unresolved name
        name: String,
    },

    /// A dependency graph refers back to itself.
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// The dependency path, first and last entries being the same callable
        cycle: Vec<String>,
    },

    /// Dependencies nest deeper than the configured limit.
    #[error("dependency depth {depth} exceeds the limit of {limit} at `{path}`")]
    DepthExceeded {
        /// Depth reached
        depth: usize,
        /// Configured limit
        limit: usize,
        /// Dependency path
        path: String,
    },

    /// A `pattern` constraint is not a valid regular expression.
    #[error("`{param}`: invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Parameter name
        param: String,
        /// The pattern
        pattern: String,
        /// Regex compile error
        reason: String,
    },

    /// A field descriptor is unusable for its parameter.
    #[error("`{param}`: {reason}")]
    InvalidField {
        /// Parameter name
        param: String,
        /// Why it is unusable
        reason: String,
    },

    /// Two parameters of one callable share a name.
    #[error("`{callable}`: parameter `{param}` is declared twice")]
    DuplicateParameter {
        /// Declaring callable
        callable: String,
        /// Parameter name
        param: String,
    },

    /// A plugin rejected the route configuration.
    #[error("plugin `{plugin}`: {message}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Reason
        message: String,
    },
}

impl ConfigError {
    /// Returns the parameter the error is about, if any.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::FieldValueType { param, .. }
            | Self::ConflictingDefault { param }
            | Self::ReturnTypeMismatch { param, .. }
            | Self::UnsupportedParameter { param, .. }
            | Self::UnresolvedAnnotation { param, .. }
            | Self::InvalidPattern { param, .. }
            | Self::InvalidField { param, .. }
            | Self::DuplicateParameter { param, .. } => Some(param),
            Self::CircularDependency { .. } | Self::DepthExceeded { .. } | Self::Plugin { .. } => {
                None
            }
        }
    }
}

/// The standard error type for request resolution.
///
/// # Example
///
/// ```
/// use warden_core::{ErrorCategory, SourceKind, WardenError};
///
/// let err = WardenError::not_found("demo_value", SourceKind::Query);
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.param(), Some("demo_value"));
/// assert_eq!(err.to_string(), "Can not found demo_value value");
/// ```
#[derive(Error, Debug)]
pub enum WardenError {
    /// A required value is absent.
    #[error("Can not found {param} value")]
    NotFound {
        /// Parameter name
        param: String,
        /// Where the value was looked up
        source_kind: SourceKind,
    },

    /// A value failed coercion or a constraint.
    #[error("validation failed for {source_kind} parameter '{param}': {message}")]
    Validation {
        /// Parameter name
        param: String,
        /// Where the value came from
        source_kind: SourceKind,
        /// The violated constraint, e.g. `lt`
        constraint: Option<String>,
        /// What went wrong
        message: String,
    },

    /// A descriptor's custom not-found error.
    #[error("{error}")]
    Custom {
        /// Parameter name
        param: String,
        /// The error produced by the descriptor's factory
        #[source]
        error: anyhow::Error,
    },

    /// A dependency callable or its resource guard failed to produce a value.
    #[error("dependency `{dependency}` failed: {error}")]
    Dependency {
        /// Dependency qualified name
        dependency: String,
        /// Underlying error
        #[source]
        error: anyhow::Error,
    },

    /// A resource guard failed to release.
    #[error("releasing resource from `{dependency}` failed: {error}")]
    Resource {
        /// Dependency qualified name
        dependency: String,
        /// Underlying error
        #[source]
        error: anyhow::Error,
    },

    /// The handler failed.
    #[error("handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// A request accessor failed to produce a source mapping.
    #[error("reading {source_kind} failed: {message}")]
    Accessor {
        /// Source being read
        source_kind: SourceKind,
        /// What went wrong
        message: String,
    },

    /// A call argument was missing or had the wrong shape.
    #[error("invalid call argument `{name}`: {reason}")]
    Argument {
        /// Argument name
        name: String,
        /// What went wrong
        reason: String,
    },

    /// A plugin rejected the request.
    #[error("plugin `{plugin}` rejected the request: {message}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Reason
        message: String,
    },

    /// A registration-time configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error annotated with the declaration that caused it.
    #[error("{0}")]
    Tip(Box<TipError>),

    /// Several errors surfaced together.
    #[error("{0}")]
    Multiple(MultiError),
}

impl WardenError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(param: impl Into<String>, source_kind: SourceKind) -> Self {
        Self::NotFound {
            param: param.into(),
            source_kind,
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(
        param: impl Into<String>,
        source_kind: SourceKind,
        constraint: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            param: param.into(),
            source_kind,
            constraint: constraint.map(str::to_owned),
            message: message.into(),
        }
    }

    /// Creates a dependency failure.
    #[must_use]
    pub fn dependency(dependency: impl Into<String>, error: anyhow::Error) -> Self {
        Self::Dependency {
            dependency: dependency.into(),
            error,
        }
    }

    /// Creates a resource release failure.
    #[must_use]
    pub fn resource(dependency: impl Into<String>, error: anyhow::Error) -> Self {
        Self::Resource {
            dependency: dependency.into(),
            error,
        }
    }

    /// Creates a handler failure.
    #[must_use]
    pub fn handler(error: impl Into<anyhow::Error>) -> Self {
        Self::Handler(error.into())
    }

    /// Creates an accessor failure.
    #[must_use]
    pub fn accessor(source_kind: SourceKind, message: impl Into<String>) -> Self {
        Self::Accessor {
            source_kind,
            message: message.into(),
        }
    }

    /// Creates a call argument error.
    #[must_use]
    pub fn argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Argument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a plugin rejection.
    #[must_use]
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Returns the error category. Tip-wrapped errors report their inner category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::Custom { .. } => ErrorCategory::NotFound,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Dependency { .. } => ErrorCategory::Dependency,
            Self::Resource { .. } => ErrorCategory::Resource,
            Self::Handler(_) => ErrorCategory::Handler,
            Self::Accessor { .. } | Self::Argument { .. } => ErrorCategory::Internal,
            Self::Plugin { .. } => ErrorCategory::Plugin,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Tip(tip) => tip.inner().category(),
            Self::Multiple(_) => ErrorCategory::Multiple,
        }
    }

    /// Returns the offending parameter, if known.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::NotFound { param, .. }
            | Self::Validation { param, .. }
            | Self::Custom { param, .. } => Some(param),
            Self::Argument { name, .. } => Some(name),
            Self::Config(err) => err.param(),
            Self::Tip(tip) => tip.param_name().or_else(|| tip.inner().param()),
            _ => None,
        }
    }

    /// Returns the source kind of not-found and validation errors.
    #[must_use]
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            Self::NotFound { source_kind, .. }
            | Self::Validation { source_kind, .. }
            | Self::Accessor { source_kind, .. } => Some(*source_kind),
            Self::Tip(tip) => tip.inner().source_kind(),
            _ => None,
        }
    }

    /// Returns the violated constraint of a validation error.
    #[must_use]
    pub fn constraint(&self) -> Option<&str> {
        match self.root() {
            Self::Validation { constraint, .. } => constraint.as_deref(),
            _ => None,
        }
    }

    /// Returns true if this error already carries tip context.
    #[must_use]
    pub const fn is_tip(&self) -> bool {
        matches!(self, Self::Tip(_))
    }

    /// Returns the tip context, if any.
    #[must_use]
    pub fn as_tip(&self) -> Option<&TipError> {
        match self {
            Self::Tip(tip) => Some(tip),
            _ => None,
        }
    }

    /// Returns the error underneath any tip context.
    #[must_use]
    pub fn root(&self) -> &WardenError {
        match self {
            Self::Tip(tip) => tip.inner().root(),
            other => other,
        }
    }

    /// Returns the collected errors of a multiple-error result.
    #[must_use]
    pub fn errors(&self) -> &[WardenError] {
        match self {
            Self::Multiple(multi) => multi.errors(),
            other => std::slice::from_ref(other),
        }
    }

    /// Looks for a user error of type `E` carried by this error.
    ///
    /// Searches dependency, handler, resource and custom not-found payloads,
    /// looking through tip context and every member of a multiple-error result.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Custom { error, .. }
            | Self::Dependency { error, .. }
            | Self::Resource { error, .. }
            | Self::Handler(error) => error.downcast_ref::<E>(),
            Self::Tip(tip) => tip.inner().downcast_ref::<E>(),
            Self::Multiple(multi) => multi.iter().find_map(WardenError::downcast_ref::<E>),
            _ => None,
        }
    }

    /// Attaches errors that occurred after this one, such as failed releases.
    ///
    /// Returns `self` unchanged when `secondary` is empty; otherwise a
    /// multiple-error result with `self` first.
    #[must_use]
    pub fn with_secondary(self, secondary: Vec<WardenError>) -> WardenError {
        if secondary.is_empty() {
            return self;
        }
        let mut errors = Vec::with_capacity(secondary.len() + 1);
        flatten(self, &mut errors);
        for error in secondary {
            flatten(error, &mut errors);
        }
        WardenError::Multiple(MultiError { errors })
    }

    /// Returns a serialisable summary for error-reporting integrations.
    #[must_use]
    pub fn details(&self) -> ErrorDetails {
        let tip = self.as_tip();
        ErrorDetails {
            category: self.category(),
            message: self.root().to_string(),
            param: self.param().map(str::to_owned),
            source_kind: self.source_kind(),
            constraint: self.constraint().map(str::to_owned),
            callable: tip.map(|t| t.qualname().to_owned()),
            file: tip.map(|t| t.file().to_owned()),
            line: tip.map(TipError::line),
        }
    }
}

/// A structured summary of a [`WardenError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Error category
    pub category: ErrorCategory,
    /// Message of the underlying error
    pub message: String,
    /// Offending parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Source kind of the offending parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<SourceKind>,
    /// Violated constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Qualified name of the declaring callable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callable: Option<String>,
    /// File of the declaring callable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line of the declaring callable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Several errors that must all reach the caller.
///
/// Produced when a request failed and releasing its resources failed too.
/// The first error is the primary failure and is reported as the `source`.
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<WardenError>,
}

impl MultiError {
    /// Returns the errors in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[WardenError] {
        &self.errors
    }

    /// Iterates over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, WardenError> {
        self.errors.iter()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; a `MultiError` holds at least two errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consumes the wrapper and returns the errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<WardenError> {
        self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.errors.len())?;
        for (index, error) in self.errors.iter().enumerate() {
            write!(f, "\n[{}] {error}", index + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Folds collected errors into one result.
///
/// Nested multiple-error results are flattened so every error is reachable
/// at one level. Returns `None` when nothing failed.
///
/// # Example
///
/// ```
/// use warden_core::{raise_multiple, SourceKind, WardenError};
///
/// assert!(raise_multiple(Vec::new()).is_none());
///
/// let single = raise_multiple(vec![WardenError::not_found("a", SourceKind::Query)]).unwrap();
/// assert!(matches!(single, WardenError::NotFound { .. }));
///
/// let both = raise_multiple(vec![
///     WardenError::not_found("a", SourceKind::Query),
///     WardenError::not_found("b", SourceKind::Query),
/// ])
/// .unwrap();
/// assert_eq!(both.errors().len(), 2);
/// ```
#[must_use]
pub fn raise_multiple(errors: Vec<WardenError>) -> Option<WardenError> {
    let mut flat = Vec::with_capacity(errors.len());
    for error in errors {
        flatten(error, &mut flat);
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(WardenError::Multiple(MultiError { errors: flat })),
    }
}

fn flatten(error: WardenError, into: &mut Vec<WardenError>) {
    match error {
        WardenError::Multiple(multi) => {
            for inner in multi.into_errors() {
                flatten(inner, into);
            }
        }
        other => into.push(other),
    }
}
