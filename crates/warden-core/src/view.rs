//! Class-based view injection.
//!
//! A class-based handler declares view-level attributes (parameters that
//! belong to the view struct rather than to one method). They are resolved
//! once per request and handed to the instance as [`ViewFields`]; the
//! instance assigns them to its own statically declared fields.

use crate::error::{WardenError, WardenResult};
use crate::value::Resolved;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

/// A class-based view instance that receives view-level fields.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use warden_core::{ClassView, ViewFields, WardenResult};
///
/// #[derive(Default)]
/// struct UserView {
///     tenant: String,
/// }
///
/// impl ClassView for UserView {
///     fn inject(&mut self, mut fields: ViewFields) -> WardenResult<()> {
///         self.tenant = fields.take_value("tenant")?;
///         Ok(())
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait ClassView: Any + Send + Sync {
    /// Assigns the resolved view-level fields onto the instance.
    fn inject(&mut self, fields: ViewFields) -> WardenResult<()>;

    /// Returns `self` as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Resolved view-level fields, keyed by attribute name.
#[derive(Debug, Default, Clone)]
pub struct ViewFields {
    values: IndexMap<String, Resolved>,
}

impl ViewFields {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a resolved attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: Resolved) {
        self.values.insert(name.into(), value);
    }

    /// Returns an attribute without removing it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.values.get(name)
    }

    /// Removes an attribute and deserializes it into `T`.
    pub fn take_value<T: DeserializeOwned>(&mut self, name: &str) -> WardenResult<T> {
        self.values
            .shift_remove(name)
            .ok_or_else(|| WardenError::argument(name, "view attribute was not resolved"))?
            .deserialize(name)
    }

    /// Removes an attribute and downcasts it to a shared `T`.
    pub fn take_object<T: Any + Send + Sync>(&mut self, name: &str) -> WardenResult<Arc<T>> {
        let resolved = self
            .values
            .shift_remove(name)
            .ok_or_else(|| WardenError::argument(name, "view attribute was not resolved"))?;
        resolved.downcast::<T>().ok_or_else(|| {
            WardenError::argument(
                name,
                format!("view attribute is a {}", resolved.kind_name()),
            )
        })
    }

    /// Returns the attribute names in resolution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no attributes were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CounterView {
        tenant: String,
        limit: Option<Arc<u32>>,
    }

    impl ClassView for CounterView {
        fn inject(&mut self, mut fields: ViewFields) -> WardenResult<()> {
            self.tenant = fields.take_value("tenant")?;
            self.limit = Some(fields.take_object("limit")?);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_inject_assigns_fields() {
        let mut fields = ViewFields::new();
        fields.insert("tenant", Resolved::json("acme"));
        fields.insert("limit", Resolved::object(10_u32));
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["tenant", "limit"]);

        let mut view = CounterView::default();
        view.inject(fields).unwrap();
        assert_eq!(view.tenant, "acme");
        assert_eq!(*view.limit.unwrap(), 10);
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let mut view = CounterView::default();
        let err = view.inject(ViewFields::new()).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}
