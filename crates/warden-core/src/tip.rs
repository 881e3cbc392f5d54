//! Tip errors: errors annotated with the declaration that caused them.
//!
//! When a parameter fails to resolve, the engine wraps the error with the
//! location and rendering of the declaring callable, so the message points
//! straight at the offending parameter:
//!
//! ```text
//! Can not found demo_value value
//!   --> src/routes.rs:42
//!    |
//!    | async fn demo(
//! -> |     demo_value: String = Query(),
//!    | )
//! ```
//!
//! Wrapping is idempotent: an error that already carries tip context is
//! returned unchanged, so recursive dependency resolution never nests tips.

use crate::error::WardenError;
use serde::Serialize;
use std::fmt;
use std::panic::Location;

/// A position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    /// File path as recorded by the compiler
    pub file: &'static str,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Returns the location of the caller.
    ///
    /// Called from a `#[track_caller]` constructor this yields the user's
    /// declaration site.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// What kind of callable declared the failing parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    /// A free function or closure
    Function,
    /// A class-like dependency (constructed, then called)
    Class,
    /// A structured request model
    Model,
    /// A class-based view
    View,
}

/// Identity and location of a declaring callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallableInfo {
    /// Qualified name, e.g. `users::get_user`
    pub qualname: String,
    /// Where the callable was declared
    pub location: SourceLocation,
    /// Whether the callable is asynchronous
    pub is_async: bool,
    /// Callable kind
    pub kind: CallableKind,
}

impl CallableInfo {
    /// Creates callable info.
    pub fn new(
        qualname: impl Into<String>,
        location: SourceLocation,
        is_async: bool,
        kind: CallableKind,
    ) -> Self {
        Self {
            qualname: qualname.into(),
            location,
            is_async,
            kind,
        }
    }

    /// Renders the declaration head, e.g. `async fn demo(`.
    #[must_use]
    pub fn header(&self) -> String {
        let asyncness = if self.is_async { "async " } else { "" };
        match self.kind {
            CallableKind::Function => format!("{asyncness}fn {}(", self.qualname),
            CallableKind::Class | CallableKind::Model | CallableKind::View => {
                format!("struct {} {{", self.qualname)
            }
        }
    }

    fn footer(&self) -> &'static str {
        match self.kind {
            CallableKind::Function => ")",
            CallableKind::Class | CallableKind::Model | CallableKind::View => "}",
        }
    }
}

/// The rendered declaration of one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParamDeclaration {
    /// Parameter name
    pub name: String,
    /// Rendered annotation
    pub annotation: String,
    /// Rendered descriptor, e.g. `Query(default="123")`; empty when absent
    pub descriptor: String,
}

impl ParamDeclaration {
    /// Creates a declaration.
    pub fn new(
        name: impl Into<String>,
        annotation: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for ParamDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.annotation)?;
        if !self.descriptor.is_empty() {
            write!(f, " = {}", self.descriptor)?;
        }
        Ok(())
    }
}

/// An error annotated with the callable and parameter that caused it.
#[derive(Debug)]
pub struct TipError {
    callable: CallableInfo,
    param: Option<ParamDeclaration>,
    error: WardenError,
    include_snippet: bool,
}

impl TipError {
    /// Source file of the declaring callable.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.callable.location.file
    }

    /// Line of the declaring callable.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.callable.location.line
    }

    /// Qualified name of the declaring callable.
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.callable.qualname
    }

    /// Whether the declaring callable is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.callable.is_async
    }

    /// The declaring callable.
    #[must_use]
    pub fn callable(&self) -> &CallableInfo {
        &self.callable
    }

    /// The offending parameter declaration.
    #[must_use]
    pub fn param(&self) -> Option<&ParamDeclaration> {
        self.param.as_ref()
    }

    /// The offending parameter's name.
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        self.param.as_ref().map(|p| p.name.as_str())
    }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &WardenError {
        &self.error
    }

    /// Consumes the tip and returns the wrapped error.
    #[must_use]
    pub fn into_inner(self) -> WardenError {
        self.error
    }

    /// Renders the declaration snippet with an arrow on the failing line.
    #[must_use]
    pub fn snippet(&self) -> String {
        let header = self.callable.header();
        match &self.param {
            Some(param) => format!(
                "   |\n   | {header}\n-> |     {param},\n   | {}",
                self.callable.footer()
            ),
            None => format!("   |\n-> | {header}"),
        }
    }
}

impl fmt::Display for TipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n  --> {}", self.error, self.callable.location)?;
        if self.include_snippet {
            write!(f, "\n{}", self.snippet())?;
        } else if let Some(param) = &self.param {
            write!(f, " in {}, parameter `{}`", self.callable.qualname, param.name)?;
        }
        Ok(())
    }
}

impl std::error::Error for TipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// How tip context is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipStyle {
    /// Attach tip context at all
    pub enabled: bool,
    /// Render the declaration snippet in the message
    pub include_snippet: bool,
}

impl Default for TipStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            include_snippet: true,
        }
    }
}

impl TipStyle {
    /// Wraps `error` with tip context.
    ///
    /// Returns `error` unchanged if it already carries tip context or if
    /// tips are disabled.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_core::tip::{CallableInfo, CallableKind, ParamDeclaration, SourceLocation, TipStyle};
    /// use warden_core::{SourceKind, WardenError};
    ///
    /// let demo = CallableInfo::new("demo", SourceLocation::caller(), true, CallableKind::Function);
    /// let param = ParamDeclaration::new("demo_value", "String", "Query()");
    /// let style = TipStyle::default();
    ///
    /// let once = style.wrap(WardenError::not_found("demo_value", SourceKind::Query), &demo, Some(&param));
    /// let text = once.to_string();
    /// let twice = style.wrap(once, &demo, Some(&param));
    /// assert_eq!(twice.to_string(), text);
    /// ```
    #[must_use]
    pub fn wrap(
        &self,
        error: WardenError,
        callable: &CallableInfo,
        param: Option<&ParamDeclaration>,
    ) -> WardenError {
        if !self.enabled || error.is_tip() {
            return error;
        }
        WardenError::Tip(Box::new(TipError {
            callable: callable.clone(),
            param: param.cloned(),
            error,
            include_snippet: self.include_snippet,
        }))
    }
}
