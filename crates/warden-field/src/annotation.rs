//! Parameter annotations.

use crate::model::ModelSchema;
use std::fmt;
use std::sync::Arc;
use warden_core::TypeTag;

/// The declared type of a parameter.
///
/// Request data is JSON, so most annotations describe a JSON shape the raw
/// value is coerced into. [`Annotation::Type`] names an opaque Rust type,
/// used for dependency results and uploaded files.
#[derive(Clone)]
pub enum Annotation {
    /// Any JSON value, passed through
    Any,
    /// Text
    String,
    /// Signed integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// Homogeneous list
    List(Box<Annotation>),
    /// Value or null
    Optional(Box<Annotation>),
    /// A forward reference, resolved against a model registry at compile time
    Named(String),
    /// A structured request model
    Model(Arc<ModelSchema>),
    /// An opaque Rust type
    Type(TypeTag),
    /// The framework's raw request object
    Request,
    /// The class-view receiver
    ViewSelf,
}

impl Annotation {
    /// Annotation for the Rust type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeTag::of::<T>())
    }

    /// `List(inner)`.
    #[must_use]
    pub fn list(inner: Annotation) -> Self {
        Self::List(Box::new(inner))
    }

    /// `Optional(inner)`.
    #[must_use]
    pub fn optional(inner: Annotation) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// A forward reference by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A structured model annotation.
    #[must_use]
    pub fn model(schema: ModelSchema) -> Self {
        Self::Model(Arc::new(schema))
    }

    /// Returns true if `null` is an acceptable value.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::Any)
    }

    /// Strips any `Optional` wrappers.
    #[must_use]
    pub fn inner(&self) -> &Annotation {
        match self {
            Self::Optional(inner) => inner.inner(),
            other => other,
        }
    }

    /// Returns the model schema of a (possibly optional) model annotation.
    #[must_use]
    pub fn as_model(&self) -> Option<&Arc<ModelSchema>> {
        match self.inner() {
            Self::Model(schema) => Some(schema),
            _ => None,
        }
    }

    /// Returns true if the annotation still contains an unresolved name.
    #[must_use]
    pub fn has_unresolved(&self) -> bool {
        match self {
            Self::Named(_) => true,
            Self::List(inner) | Self::Optional(inner) => inner.has_unresolved(),
            _ => false,
        }
    }

    /// Returns true if the annotation describes a list.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.inner(), Self::List(_))
    }

    /// Returns true if a value declared as `found` can be injected into a
    /// parameter annotated with `self`.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_field::Annotation;
    ///
    /// assert!(Annotation::String.accepts(&Annotation::String));
    /// assert!(Annotation::optional(Annotation::Integer).accepts(&Annotation::Integer));
    /// assert!(Annotation::Float.accepts(&Annotation::Integer));
    /// assert!(!Annotation::String.accepts(&Annotation::Integer));
    /// ```
    #[must_use]
    pub fn accepts(&self, found: &Annotation) -> bool {
        match (self, found) {
            (Self::Any, _) => true,
            (expected, found) if expected == found => true,
            (Self::Optional(expected), Self::Optional(found)) => expected.accepts(found),
            (Self::Optional(expected), found) => expected.accepts(found),
            (Self::Float, Self::Integer) => true,
            (Self::List(expected), Self::List(found)) => expected.accepts(found),
            _ => false,
        }
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, Self::Any)
            | (Self::String, Self::String)
            | (Self::Integer, Self::Integer)
            | (Self::Float, Self::Float)
            | (Self::Boolean, Self::Boolean)
            | (Self::Request, Self::Request)
            | (Self::ViewSelf, Self::ViewSelf) => true,
            (Self::List(a), Self::List(b)) | (Self::Optional(a), Self::Optional(b)) => a == b,
            (Self::Named(a), Self::Named(b)) => a == b,
            (Self::Model(a), Self::Model(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            (Self::Type(a), Self::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Value"),
            Self::String => f.write_str("String"),
            Self::Integer => f.write_str("i64"),
            Self::Float => f.write_str("f64"),
            Self::Boolean => f.write_str("bool"),
            Self::List(inner) => write!(f, "Vec<{inner}>"),
            Self::Optional(inner) => write!(f, "Option<{inner}>"),
            Self::Named(name) => f.write_str(name),
            Self::Model(schema) => f.write_str(schema.name()),
            Self::Type(tag) => write!(f, "{tag}"),
            Self::Request => f.write_str("Request"),
            Self::ViewSelf => f.write_str("Self"),
        }
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Annotation({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Session;

    #[test]
    fn test_display() {
        assert_eq!(Annotation::list(Annotation::Integer).to_string(), "Vec<i64>");
        assert_eq!(
            Annotation::optional(Annotation::String).to_string(),
            "Option<String>"
        );
        assert_eq!(Annotation::of::<Session>().to_string(), "Session");
        assert_eq!(Annotation::named("User").to_string(), "User");
    }

    #[test]
    fn test_accepts_types() {
        assert!(Annotation::of::<Session>().accepts(&Annotation::of::<Session>()));
        assert!(!Annotation::of::<Session>().accepts(&Annotation::of::<String>()));
        assert!(Annotation::Any.accepts(&Annotation::of::<Session>()));
        assert!(!Annotation::Integer.accepts(&Annotation::optional(Annotation::Integer)));
        assert!(Annotation::list(Annotation::Float).accepts(&Annotation::list(Annotation::Integer)));
    }

    #[test]
    fn test_unresolved_detection() {
        assert!(Annotation::list(Annotation::named("X")).has_unresolved());
        assert!(!Annotation::list(Annotation::Integer).has_unresolved());
    }

    #[test]
    fn test_inner_and_model() {
        let schema = ModelSchema::new("User");
        let annotation = Annotation::optional(Annotation::model(schema));
        assert_eq!(annotation.as_model().unwrap().name(), "User");
        assert!(annotation.is_optional());
        assert!(!Annotation::String.is_optional());
        assert!(Annotation::optional(Annotation::list(Annotation::String)).is_list());
    }
}
