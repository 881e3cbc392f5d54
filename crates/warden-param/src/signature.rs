//! Callable signatures.
//!
//! Rust has no runtime signature introspection, so a handler or dependency
//! describes its parameters explicitly: a name, an annotation, and a
//! default saying where the value comes from.

use crate::dependency::Dependency;
use std::fmt;
use warden_core::{CallableInfo, CallableKind, ParamDeclaration, SourceLocation};
use warden_field::{Annotation, Field};

/// What a parameter declares as its default.
#[derive(Clone)]
pub enum ParamDefault {
    /// No default: the parameter must be a model, the request or the view receiver
    Empty,
    /// A field descriptor
    Field(Field),
    /// A nested dependency
    Depends(Dependency),
    /// A dependency built on demand, allowing references to dependencies
    /// declared later (and therefore cycles)
    DependsLazy(fn() -> Dependency),
}

impl ParamDefault {
    /// Renders the default as it appears in a declaration.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Field(field) => field.render(),
            Self::Depends(dependency) => format!("Depends({})", dependency.qualname()),
            Self::DependsLazy(_) => "Depends(<lazy>)".to_string(),
        }
    }
}

impl From<Field> for ParamDefault {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<Dependency> for ParamDefault {
    fn from(dependency: Dependency) -> Self {
        Self::Depends(dependency)
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            other => f.write_str(&other.render()),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub annotation: Annotation,
    /// Declared default
    pub default: ParamDefault,
}

impl Param {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, annotation: Annotation, default: impl Into<ParamDefault>) -> Self {
        Self {
            name: name.into(),
            annotation,
            default: default.into(),
        }
    }

    /// Creates a parameter without a default.
    pub fn bare(name: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            name: name.into(),
            annotation,
            default: ParamDefault::Empty,
        }
    }

    /// Renders the declaration for error messages.
    #[must_use]
    pub fn declaration(&self) -> ParamDeclaration {
        ParamDeclaration::new(
            self.name.clone(),
            self.annotation.to_string(),
            self.default.render(),
        )
    }
}

/// The declared shape of a handler.
///
/// # Example
///
/// ```
/// use warden_field::{Annotation, Field};
/// use warden_param::Signature;
///
/// let signature = Signature::new_async("demo")
///     .param("demo_value", Annotation::String, Field::query().default("123"))
///     .param("page", Annotation::Integer, Field::query().ge(1));
/// assert_eq!(signature.params().len(), 2);
/// assert!(signature.info().is_async);
/// ```
#[derive(Debug, Clone)]
pub struct Signature {
    info: CallableInfo,
    params: Vec<Param>,
}

impl Signature {
    /// Declares a synchronous function.
    #[must_use]
    #[track_caller]
    pub fn new(qualname: impl Into<String>) -> Self {
        Self::with_info(CallableInfo::new(
            qualname,
            SourceLocation::caller(),
            false,
            CallableKind::Function,
        ))
    }

    /// Declares an asynchronous function.
    #[must_use]
    #[track_caller]
    pub fn new_async(qualname: impl Into<String>) -> Self {
        Self::with_info(CallableInfo::new(
            qualname,
            SourceLocation::caller(),
            true,
            CallableKind::Function,
        ))
    }

    /// Declares a signature from explicit callable info.
    #[must_use]
    pub fn with_info(info: CallableInfo) -> Self {
        Self {
            info,
            params: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        default: impl Into<ParamDefault>,
    ) -> Self {
        self.params.push(Param::new(name, annotation, default));
        self
    }

    /// Adds a parameter without a default.
    #[must_use]
    pub fn bare(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.params.push(Param::bare(name, annotation));
        self
    }

    /// Adds a parameter receiving the framework's raw request.
    #[must_use]
    pub fn request(self, name: impl Into<String>) -> Self {
        self.bare(name, Annotation::Request)
    }

    /// Adds the class-view receiver.
    #[must_use]
    pub fn view_self(self) -> Self {
        self.bare("self", Annotation::ViewSelf)
    }

    /// Adds an already built parameter.
    #[must_use]
    pub fn push(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Callable identity and location.
    #[must_use]
    pub fn info(&self) -> &CallableInfo {
        &self.info
    }

    /// Qualified name.
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.info.qualname
    }

    /// Declared parameters in order.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Provided;

    #[test]
    fn test_declaration_rendering() {
        let param = Param::new("demo_value", Annotation::String, Field::query().default("123"));
        assert_eq!(
            param.declaration().to_string(),
            "demo_value: String = Query(default=\"123\")"
        );

        let dep = Dependency::function("get_user", |_| Ok(Provided::json("so1n")));
        let param = Param::new("user", Annotation::String, dep);
        assert_eq!(param.declaration().to_string(), "user: String = Depends(get_user)");

        let bare = Param::bare("req", Annotation::Request);
        assert_eq!(bare.declaration().to_string(), "req: Request");
    }

    #[test]
    fn test_signature_captures_location() {
        let signature = Signature::new("handler").request("req").view_self();
        assert!(signature.info().location.file.ends_with("signature.rs"));
        assert!(!signature.info().is_async);
        assert_eq!(signature.params()[1].annotation, Annotation::ViewSelf);
        assert_eq!(signature.qualname(), "handler");
    }
}
