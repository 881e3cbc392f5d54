//! Resolved values and assembled call arguments.

use crate::error::{WardenError, WardenResult};
use crate::view::ClassView;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A Rust type identity with a printable name.
///
/// Used to tag type-erased values and to compare the declared return type
/// of a dependency against the annotation of the parameter consuming it.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Returns the tag for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the full type name, including the module path.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    ///
    /// Generic types are returned in full.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        if self.name.contains('<') {
            return self.name;
        }
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns true if this tag identifies `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A resolved parameter value.
///
/// Data taken from the request stays JSON; results of dependencies, uploaded
/// files and the raw request are carried as shared, type-erased objects.
#[derive(Clone)]
pub enum Resolved {
    /// JSON data (request values, defaults, coerced scalars)
    Value(Value),
    /// A shared Rust object tagged with its type
    Object(TypeTag, Arc<dyn Any + Send + Sync>),
}

impl Resolved {
    /// Wraps a JSON value.
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// The JSON `null` value.
    #[must_use]
    pub const fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// Wraps an owned Rust object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(TypeTag::of::<T>(), Arc::new(value))
    }

    /// Wraps an already shared Rust object.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Object(TypeTag::of::<T>(), value)
    }

    /// Returns true for JSON `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// Returns the JSON value, if this is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Object(..) => None,
        }
    }

    /// Consumes the value and returns the JSON value, if this is one.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Object(..) => None,
        }
    }

    /// Returns the type tag of an object value.
    #[must_use]
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Value(_) => None,
            Self::Object(tag, _) => Some(*tag),
        }
    }

    /// Returns a short description of what this value holds, for messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Value(Value::Null) => "null",
            Self::Value(Value::Bool(_)) => "bool",
            Self::Value(Value::Number(_)) => "number",
            Self::Value(Value::String(_)) => "string",
            Self::Value(Value::Array(_)) => "array",
            Self::Value(Value::Object(_)) => "object",
            Self::Object(tag, _) => tag.short_name(),
        }
    }

    /// Downcasts an object value to `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Value(_) => None,
            Self::Object(_, object) => Arc::clone(object).downcast::<T>().ok(),
        }
    }

    /// Deserializes a JSON value into `T`; `name` identifies it in errors.
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> WardenResult<T> {
        match self {
            Self::Value(value) => serde_json::from_value(value.clone())
                .map_err(|e| WardenError::argument(name, e.to_string())),
            Self::Object(tag, _) => Err(WardenError::argument(
                name,
                format!("holds a `{tag}` object, not JSON data"),
            )),
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl PartialEq for Resolved {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Object(_, a), Self::Object(_, b)) => {
                Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "Value({value})"),
            Self::Object(tag, _) => write!(f, "Object({})", tag.name()),
        }
    }
}

/// Arguments assembled for one call of a handler or dependency.
///
/// The raw request (when declared) is passed positionally; every other
/// parameter is keyed by name in declaration order.
#[derive(Default)]
pub struct CallArgs {
    positional: Vec<Resolved>,
    keyword: IndexMap<String, Resolved>,
    view: Option<Box<dyn ClassView>>,
}

impl CallArgs {
    /// Creates empty call arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn push(&mut self, value: Resolved) {
        self.positional.push(value);
    }

    /// Inserts a keyword argument, returning any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Resolved) -> Option<Resolved> {
        self.keyword.insert(name.into(), value)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: Resolved) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns a keyword argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.keyword.get(name)
    }

    /// Returns true if the keyword argument exists and is not `null`.
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.keyword.get(name).is_some_and(|v| !v.is_null())
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn positional(&self) -> &[Resolved] {
        &self.positional
    }

    /// Returns the keyword arguments in declaration order.
    #[must_use]
    pub fn keyword(&self) -> &IndexMap<String, Resolved> {
        &self.keyword
    }

    /// Returns the number of arguments, positional and keyword.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// Returns true if no arguments were assembled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deserializes the keyword argument `name` into `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_core::{CallArgs, Resolved};
    ///
    /// let args = CallArgs::new().with("page", Resolved::json(3));
    /// let page: u32 = args.value("page").unwrap();
    /// assert_eq!(page, 3);
    /// ```
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> WardenResult<T> {
        self.get(name)
            .ok_or_else(|| WardenError::argument(name, "was not resolved"))?
            .deserialize(name)
    }

    /// Downcasts the keyword argument `name` to a shared `T`.
    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> WardenResult<Arc<T>> {
        let resolved = self
            .get(name)
            .ok_or_else(|| WardenError::argument(name, "was not resolved"))?;
        resolved.downcast::<T>().ok_or_else(|| {
            WardenError::argument(
                name,
                format!(
                    "expected `{}`, found {}",
                    std::any::type_name::<T>(),
                    resolved.kind_name()
                ),
            )
        })
    }

    /// Returns the first positional argument downcast to `T`.
    ///
    /// Handlers declaring the raw request receive it here.
    #[must_use]
    pub fn raw<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.positional.iter().find_map(Resolved::downcast::<T>)
    }

    /// Attaches the class-view instance.
    pub fn set_view(&mut self, view: Box<dyn ClassView>) {
        self.view = Some(view);
    }

    /// Returns the class-view instance downcast to `V`.
    #[must_use]
    pub fn view<V: ClassView>(&self) -> Option<&V> {
        self.view
            .as_deref()
            .and_then(|view| view.as_any().downcast_ref::<V>())
    }

    /// Returns true if a class-view instance is attached.
    #[must_use]
    pub fn has_view(&self) -> bool {
        self.view.is_some()
    }

    /// Detaches the class-view instance.
    pub fn take_view(&mut self) -> Option<Box<dyn ClassView>> {
        self.view.take()
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("positional", &self.positional)
            .field("keyword", &self.keyword)
            .field("view", &self.view.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Session {
        uid: u64,
    }

    #[test]
    fn test_type_tag_names() {
        let tag = TypeTag::of::<String>();
        assert_eq!(tag.short_name(), "String");
        assert!(tag.name().ends_with("String"));
        assert!(tag.is::<String>());
        assert_ne!(tag, TypeTag::of::<u32>());
        assert_eq!(TypeTag::of::<Option<u8>>().short_name(), "core::option::Option<u8>");
    }

    #[test]
    fn test_resolved_object_downcast() {
        let value = Resolved::object(Session { uid: 7 });
        assert_eq!(value.downcast::<Session>().unwrap().uid, 7);
        assert!(value.downcast::<String>().is_none());
        assert_eq!(value.kind_name(), "Session");
        assert!(value.as_json().is_none());
    }

    #[test]
    fn test_resolved_json_helpers() {
        assert!(Resolved::null().is_null());
        assert!(!Resolved::json(0).is_null());
        assert_eq!(Resolved::json("x").kind_name(), "string");
        let n: i64 = Resolved::json(5).deserialize("n").unwrap();
        assert_eq!(n, 5);
    }

    #[test]
    fn test_resolved_equality() {
        assert_eq!(Resolved::json(1), Resolved::json(1));
        let shared = Arc::new(Session { uid: 1 });
        let a = Resolved::shared(Arc::clone(&shared));
        let b = Resolved::shared(shared);
        assert_eq!(a, b);
        assert_ne!(a, Resolved::object(Session { uid: 1 }));
    }

    #[test]
    fn test_call_args_typed_access() {
        let mut args = CallArgs::new()
            .with("name", Resolved::json("so1n"))
            .with("session", Resolved::object(Session { uid: 9 }))
            .with("missing", Resolved::null());
        args.push(Resolved::object(String::from("raw")));

        let name: String = args.value("name").unwrap();
        assert_eq!(name, "so1n");
        assert_eq!(args.object::<Session>("session").unwrap().uid, 9);
        assert_eq!(args.raw::<String>().unwrap().as_str(), "raw");
        assert!(args.is_present("name"));
        assert!(!args.is_present("missing"));
        assert_eq!(args.len(), 4);
        assert_eq!(
            args.keyword().keys().collect::<Vec<_>>(),
            vec!["name", "session", "missing"]
        );
    }

    #[test]
    fn test_call_args_errors_name_the_argument() {
        let args = CallArgs::new().with("page", Resolved::json(json!("abc")));
        let err = args.value::<u32>("page").unwrap_err();
        assert!(err.to_string().contains("page"));

        let err = args.object::<Session>("page").unwrap_err();
        assert!(err.to_string().contains("Session"));

        let err = args.value::<u32>("absent").unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
