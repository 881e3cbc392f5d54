//! Structured request models.
//!
//! A model groups several request values into one parameter. A handler
//! parameter annotated with a model (and without a descriptor) is expanded
//! field by field, each field resolved from its own source; the resulting
//! mapping then constructs the model. The same schema used as the annotation
//! of a `Body()` field validates a nested JSON object instead.

use crate::annotation::Annotation;
use crate::field::Field;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use warden_core::{Resolved, SourceKind, SourceLocation, TypeTag};

type Constructor = Arc<dyn Fn(Value) -> anyhow::Result<Resolved> + Send + Sync>;

/// One field of a model.
#[derive(Debug, Clone)]
pub struct ModelField {
    /// Field name
    pub name: String,
    /// Field annotation
    pub annotation: Annotation,
    /// Explicit descriptor, if declared
    pub field: Option<Field>,
}

/// The schema of a structured request model.
///
/// # Example
///
/// ```
/// use serde::Deserialize;
/// use serde_json::json;
/// use warden_core::SourceKind;
/// use warden_field::{Annotation, Field, ModelSchema};
///
/// #[derive(Deserialize)]
/// struct Paging {
///     page: i64,
///     size: i64,
/// }
///
/// let schema = ModelSchema::for_type::<Paging>()
///     .default_source(SourceKind::Query)
///     .field("page", Annotation::Integer)
///     .field_with("size", Annotation::Integer, Field::query().default(20).le(100));
///
/// let built = schema.construct(json!({"page": 1, "size": 20})).unwrap();
/// assert_eq!(built.downcast::<Paging>().unwrap().size, 20);
/// ```
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    fields: Vec<ModelField>,
    default_source: Option<SourceKind>,
    constructor: Option<Constructor>,
    type_tag: Option<TypeTag>,
    location: SourceLocation,
}

impl ModelSchema {
    /// Creates an untyped schema; constructed values stay JSON.
    #[must_use]
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            default_source: None,
            constructor: None,
            type_tag: None,
            location: SourceLocation::caller(),
        }
    }

    /// Creates a schema that constructs `T` by deserializing the mapping.
    #[must_use]
    #[track_caller]
    pub fn for_type<T>() -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        let tag = TypeTag::of::<T>();
        let mut schema = Self::new(tag.short_name());
        schema.type_tag = Some(tag);
        schema.constructor = Some(Arc::new(|value: Value| {
            let typed: T = serde_json::from_value(value)?;
            Ok(Resolved::object(typed))
        }));
        schema
    }

    /// Declares a field resolved through the model-wide default source.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.fields.push(ModelField {
            name: name.into(),
            annotation,
            field: None,
        });
        self
    }

    /// Declares a field with an explicit descriptor.
    #[must_use]
    pub fn field_with(mut self, name: impl Into<String>, annotation: Annotation, field: Field) -> Self {
        self.fields.push(ModelField {
            name: name.into(),
            annotation,
            field: Some(field),
        });
        self
    }

    /// Sets the source used by fields without an explicit descriptor.
    #[must_use]
    pub fn default_source(mut self, kind: SourceKind) -> Self {
        self.default_source = Some(kind);
        self
    }

    /// Sets a custom constructor.
    #[must_use]
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Resolved> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in order.
    #[must_use]
    pub fn fields(&self) -> &[ModelField] {
        &self.fields
    }

    /// Model-wide default source, if any.
    #[must_use]
    pub fn default_source_kind(&self) -> Option<SourceKind> {
        self.default_source
    }

    /// Rust type constructed by the schema, if typed.
    #[must_use]
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.type_tag
    }

    /// Where the schema was declared.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Returns the descriptor a field is resolved with, if it has one.
    #[must_use]
    pub fn descriptor_for(&self, field: &ModelField) -> Option<Field> {
        field
            .field
            .clone()
            .or_else(|| self.default_source.map(Field::source))
    }

    /// Returns a copy of the schema with every field annotation replaced by
    /// what `map` returns for it.
    pub fn try_map_annotations<E>(
        &self,
        mut map: impl FnMut(&ModelField) -> Result<Annotation, E>,
    ) -> Result<Self, E> {
        let fields = self
            .fields
            .iter()
            .map(|model_field| {
                Ok(ModelField {
                    name: model_field.name.clone(),
                    annotation: map(model_field)?,
                    field: model_field.field.clone(),
                })
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            name: self.name.clone(),
            fields,
            default_source: self.default_source,
            constructor: self.constructor.clone(),
            type_tag: self.type_tag,
            location: self.location,
        })
    }

    /// Constructs the model from a resolved mapping.
    pub fn construct(&self, value: Value) -> anyhow::Result<Resolved> {
        match &self.constructor {
            Some(constructor) => constructor(value),
            None => Ok(Resolved::Value(value)),
        }
    }

    /// Validates a nested JSON object against the declared fields.
    ///
    /// Missing optional fields become `null`; missing fields with a default
    /// take it; unknown keys are kept.
    pub fn coerce_object(&self, value: Value) -> Result<Value, String> {
        let Value::Object(mut object) = value else {
            return Err(format!("value is not a valid {} object", self.name));
        };
        for model_field in &self.fields {
            let key = model_field
                .field
                .as_ref()
                .map_or_else(|| model_field.name.clone(), |f| {
                    f.alias_name().unwrap_or(&model_field.name).to_string()
                });
            let coerced = match object.remove(&key) {
                Some(raw) => {
                    let coerced = model_field
                        .annotation
                        .coerce(raw)
                        .map_err(|reason| format!("{key}: {reason}"))?;
                    if let Some(field) = &model_field.field {
                        field
                            .constraints()
                            .check(&coerced)
                            .map_err(|violation| format!("{key}: {}", violation.message))?;
                    }
                    coerced
                }
                None => match model_field.field.as_ref().map(|f| f.apply_default(&key)) {
                    Some(Ok(default)) => default,
                    _ if model_field.annotation.is_optional() => Value::Null,
                    _ => return Err(format!("{key}: field required")),
                },
            };
            object.insert(key, coerced);
        }
        Ok(Value::Object(object))
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("default_source", &self.default_source)
            .finish_non_exhaustive()
    }
}

/// Models addressable by name, for resolving forward references.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelSchema>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its name.
    pub fn register(&mut self, schema: ModelSchema) -> Arc<ModelSchema> {
        let schema = Arc::new(schema);
        self.models
            .insert(schema.name().to_string(), Arc::clone(&schema));
        schema
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, schema: ModelSchema) -> Self {
        self.register(schema);
        self
    }

    /// Looks a schema up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(name).cloned()
    }

    /// Returns the number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Replaces the forward references of `annotation` itself with their
    /// models. Names inside the fields of those models are left as they are;
    /// the rule compiler resolves them, guarding against recursive models.
    ///
    /// Returns the first unknown name on failure.
    pub fn resolve(&self, annotation: &Annotation) -> Result<Annotation, String> {
        match annotation {
            Annotation::Named(name) => self
                .get(name)
                .map(Annotation::Model)
                .ok_or_else(|| name.clone()),
            Annotation::List(inner) => Ok(Annotation::list(self.resolve(inner)?)),
            Annotation::Optional(inner) => Ok(Annotation::optional(self.resolve(inner)?)),
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        uid: i64,
        name: String,
        age: Option<i64>,
    }

    fn user_schema() -> ModelSchema {
        ModelSchema::for_type::<User>()
            .field("uid", Annotation::Integer)
            .field_with("name", Annotation::String, Field::body().min_length(2))
            .field("age", Annotation::optional(Annotation::Integer))
    }

    #[test]
    fn test_coerce_object() {
        let schema = user_schema();
        let coerced = schema
            .coerce_object(json!({"uid": "10", "name": "so1n", "extra": true}))
            .unwrap();
        assert_eq!(coerced, json!({"uid": 10, "name": "so1n", "age": null, "extra": true}));

        assert_eq!(
            schema.coerce_object(json!({"name": "so1n"})).unwrap_err(),
            "uid: field required"
        );
        assert!(schema
            .coerce_object(json!({"uid": 1, "name": "x"}))
            .unwrap_err()
            .starts_with("name: ensure this value has at least 2"));
        assert!(schema.coerce_object(json!([1])).is_err());
    }

    #[test]
    fn test_typed_construction() {
        let schema = user_schema();
        assert_eq!(schema.name(), "User");
        assert!(schema.type_tag().unwrap().is::<User>());
        let built = schema
            .construct(json!({"uid": 1, "name": "so1n", "age": null}))
            .unwrap();
        assert_eq!(
            *built.downcast::<User>().unwrap(),
            User {
                uid: 1,
                name: "so1n".into(),
                age: None
            }
        );
        assert!(schema.construct(json!({"uid": "x"})).is_err());
    }

    #[test]
    fn test_descriptor_for_uses_default_source() {
        let schema = ModelSchema::new("Paging")
            .default_source(SourceKind::Query)
            .field("page", Annotation::Integer);
        let descriptor = schema.descriptor_for(&schema.fields()[0]).unwrap();
        assert_eq!(descriptor.kind(), SourceKind::Query);

        let bare = ModelSchema::new("Bare").field("x", Annotation::Integer);
        assert!(bare.descriptor_for(&bare.fields()[0]).is_none());
    }

    #[test]
    fn test_registry_resolves_forward_references() {
        let registry = ModelRegistry::new().with(user_schema());
        let resolved = registry
            .resolve(&Annotation::optional(Annotation::named("User")))
            .unwrap();
        assert_eq!(resolved.as_model().unwrap().name(), "User");
        assert_eq!(
            registry.resolve(&Annotation::named("Ghost")).unwrap_err(),
            "Ghost"
        );
        assert_eq!(registry.len(), 1);
    }
}
