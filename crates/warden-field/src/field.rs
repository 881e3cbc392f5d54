//! The Field Descriptor.

use crate::annotation::Annotation;
use crate::constraint::Constraints;
use crate::extra::ExtraParam;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use warden_core::{
    ConfigError, FileMap, Mapping, Resolved, SourceKind, SourceLocation, UploadedFile,
    WardenError, WardenResult,
};

/// Produces a fresh default value on every call.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Builds the error raised when a required value is absent.
///
/// Receives the parameter name.
pub type NotFoundFactory = Arc<dyn Fn(&str) -> anyhow::Error + Send + Sync>;

/// A declarative marker saying where a parameter's value comes from and
/// which rules it must satisfy.
///
/// Descriptors are built once, where the route is declared, and are never
/// mutated afterwards; the rule compiler works on a compiled copy.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use warden_core::Mapping;
/// use warden_field::{Annotation, Field};
///
/// let field = Field::query().default("123");
/// let resolved = field
///     .resolve("demo_value", "demo_value", &Annotation::String, &Mapping::new())
///     .unwrap();
/// assert_eq!(resolved.as_json(), Some(&json!("123")));
/// ```
#[derive(Clone)]
pub struct Field {
    kind: SourceKind,
    alias: Option<String>,
    default: Option<Value>,
    default_factory: Option<DefaultFactory>,
    raw_return: bool,
    constraints: Constraints,
    example: Option<Value>,
    description: Option<String>,
    extra: Vec<ExtraParam>,
    not_found: Option<NotFoundFactory>,
    location: SourceLocation,
}

impl Field {
    #[track_caller]
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            alias: None,
            default: None,
            default_factory: None,
            raw_return: false,
            constraints: Constraints::default(),
            example: None,
            description: None,
            extra: Vec::new(),
            not_found: None,
            location: SourceLocation::caller(),
        }
    }

    /// A field read from the query string.
    #[must_use]
    #[track_caller]
    pub fn query() -> Self {
        Self::new(SourceKind::Query)
    }

    /// A field read from the headers.
    #[must_use]
    #[track_caller]
    pub fn header() -> Self {
        Self::new(SourceKind::Header)
    }

    /// A field read from the cookies.
    #[must_use]
    #[track_caller]
    pub fn cookie() -> Self {
        Self::new(SourceKind::Cookie)
    }

    /// A field read from the path parameters.
    #[must_use]
    #[track_caller]
    pub fn path() -> Self {
        Self::new(SourceKind::Path)
    }

    /// A field read from the request body.
    #[must_use]
    #[track_caller]
    pub fn body() -> Self {
        Self::new(SourceKind::Body)
    }

    /// A field read from the JSON body.
    #[must_use]
    #[track_caller]
    pub fn json() -> Self {
        Self::new(SourceKind::Json)
    }

    /// A field read from the form.
    #[must_use]
    #[track_caller]
    pub fn form() -> Self {
        Self::new(SourceKind::Form)
    }

    /// A multi-valued form field.
    #[must_use]
    #[track_caller]
    pub fn multiform() -> Self {
        Self::new(SourceKind::MultiForm)
    }

    /// A multi-valued query parameter.
    #[must_use]
    #[track_caller]
    pub fn multiquery() -> Self {
        Self::new(SourceKind::MultiQuery)
    }

    /// An uploaded file.
    #[must_use]
    #[track_caller]
    pub fn file() -> Self {
        Self::new(SourceKind::File)
    }

    /// A field of the given source kind.
    ///
    /// Used when a model declares a model-wide default source.
    #[must_use]
    #[track_caller]
    pub fn source(kind: SourceKind) -> Self {
        Self::new(kind)
    }

    /// Sets the wire-level key.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the value used when the key is absent.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a factory called for a fresh default whenever the key is absent.
    #[must_use]
    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default_factory = Some(Arc::new(factory));
        self
    }

    /// Passes the whole extracted mapping through without validation.
    #[must_use]
    pub fn raw_return(mut self) -> Self {
        self.raw_return = true;
        self
    }

    /// Exclusive lower bound.
    #[must_use]
    pub fn gt(mut self, bound: impl Into<f64>) -> Self {
        self.constraints.gt = Some(bound.into());
        self
    }

    /// Inclusive lower bound.
    #[must_use]
    pub fn ge(mut self, bound: impl Into<f64>) -> Self {
        self.constraints.ge = Some(bound.into());
        self
    }

    /// Exclusive upper bound.
    #[must_use]
    pub fn lt(mut self, bound: impl Into<f64>) -> Self {
        self.constraints.lt = Some(bound.into());
        self
    }

    /// Inclusive upper bound.
    #[must_use]
    pub fn le(mut self, bound: impl Into<f64>) -> Self {
        self.constraints.le = Some(bound.into());
        self
    }

    /// The value must be a multiple of `step`.
    #[must_use]
    pub fn multiple_of(mut self, step: impl Into<f64>) -> Self {
        self.constraints.multiple_of = Some(step.into());
        self
    }

    /// Minimum length of a string or list.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints.min_length = Some(len);
        self
    }

    /// Maximum length of a string or list.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints.max_length = Some(len);
        self
    }

    /// Regular expression a string must match.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    /// Restricts the value to an enumeration.
    #[must_use]
    pub fn one_of<I, V>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints.one_of = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    /// Example value, checked at registration and shown in documentation.
    #[must_use]
    pub fn example(mut self, value: impl Into<Value>) -> Self {
        self.example = Some(value.into());
        self
    }

    /// Documentation text.
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Attaches a plugin tag.
    #[must_use]
    pub fn extra(mut self, tag: ExtraParam) -> Self {
        self.extra.push(tag);
        self
    }

    /// Sets the error raised when the value is absent and no default exists.
    #[must_use]
    pub fn not_found<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> anyhow::Error + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(factory));
        self
    }

    /// Source kind.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Wire-level alias, if set.
    #[must_use]
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Static default value, if set.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns true if a default factory is set.
    #[must_use]
    pub fn has_default_factory(&self) -> bool {
        self.default_factory.is_some()
    }

    /// Returns true if neither a default nor a default factory is set.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none() && self.default_factory.is_none()
    }

    /// Returns true if the raw mapping is passed through.
    #[must_use]
    pub fn is_raw_return(&self) -> bool {
        self.raw_return
    }

    /// Declared constraints.
    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Example value, if set.
    #[must_use]
    pub fn example_value(&self) -> Option<&Value> {
        self.example.as_ref()
    }

    /// Documentation text, if set.
    #[must_use]
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Plugin tags.
    #[must_use]
    pub fn extras(&self) -> &[ExtraParam] {
        &self.extra
    }

    /// Where the descriptor was declared.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Returns the key looked up in the source mapping.
    ///
    /// The alias when set; otherwise the parameter name, with `_` replaced
    /// by `-` for headers.
    #[must_use]
    pub fn resolve_alias_or_name(&self, param: &str) -> String {
        match (&self.alias, self.kind) {
            (Some(alias), _) => alias.clone(),
            (None, SourceKind::Header) => param.replace('_', "-"),
            (None, _) => param.to_string(),
        }
    }

    /// Looks `key` up in a raw source mapping.
    ///
    /// Header keys match case-insensitively. Returns `None` when absent.
    #[must_use]
    pub fn extract(&self, key: &str, mapping: &Mapping) -> Option<Value> {
        if let Some(value) = mapping.get(key) {
            return Some(value.clone());
        }
        if self.kind == SourceKind::Header {
            return mapping
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.clone());
        }
        None
    }

    /// Returns the default for an absent value, or the not-found error.
    pub fn apply_default(&self, param: &str) -> WardenResult<Value> {
        if let Some(value) = &self.default {
            return Ok(value.clone());
        }
        if let Some(factory) = &self.default_factory {
            return Ok(factory());
        }
        Err(self.not_found_error(param))
    }

    fn not_found_error(&self, param: &str) -> WardenError {
        match &self.not_found {
            Some(factory) => WardenError::Custom {
                param: param.to_string(),
                error: factory(param),
            },
            None => WardenError::not_found(param, self.kind),
        }
    }

    /// Coerces an extracted value and checks the constraints.
    ///
    /// Model annotations construct the model from the coerced value.
    pub fn validate(
        &self,
        param: &str,
        annotation: &Annotation,
        value: Value,
    ) -> WardenResult<Resolved> {
        let value = annotation
            .coerce(value)
            .map_err(|reason| WardenError::validation(param, self.kind, Some("type"), reason))?;
        self.constraints.check(&value).map_err(|violation| {
            WardenError::validation(param, self.kind, Some(violation.constraint), violation.message)
        })?;
        match annotation.as_model() {
            Some(schema) if !value.is_null() => schema.construct(value).map_err(|e| {
                WardenError::validation(param, self.kind, Some("model"), e.to_string())
            }),
            _ => Ok(Resolved::Value(value)),
        }
    }

    /// Resolves the parameter from a raw source mapping.
    ///
    /// `key` is the frozen key computed by
    /// [`resolve_alias_or_name`](Self::resolve_alias_or_name) at compile time.
    pub fn resolve(
        &self,
        param: &str,
        key: &str,
        annotation: &Annotation,
        mapping: &Mapping,
    ) -> WardenResult<Resolved> {
        if self.raw_return {
            let raw: serde_json::Map<String, Value> = mapping
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            return Ok(Resolved::Value(Value::Object(raw)));
        }
        match self.extract(key, mapping) {
            Some(value) => self.validate(param, annotation, value),
            None => self.apply_default(param).map(Resolved::Value),
        }
    }

    /// Resolves the parameter from the uploaded files.
    pub fn resolve_file(&self, param: &str, key: &str, files: &FileMap) -> WardenResult<Resolved> {
        if self.raw_return {
            return Ok(Resolved::object(files.clone()));
        }
        match files.get(key) {
            Some(file) => Ok(Resolved::object(file.clone())),
            None => self.apply_default(param).map(Resolved::Value),
        }
    }

    /// Returns a copy checked and prepared for `param: annotation`.
    ///
    /// Rejects conflicting defaults, invalid patterns, and sources that can
    /// not produce the annotated type.
    pub fn compiled(&self, param: &str, annotation: &Annotation) -> Result<Field, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidField {
            param: param.to_string(),
            reason,
        };
        if self.default.is_some() && self.default_factory.is_some() {
            return Err(ConfigError::ConflictingDefault {
                param: param.to_string(),
            });
        }
        let inner = annotation.inner();
        match self.kind {
            SourceKind::Depends => {
                return Err(invalid(
                    "Depends is not a field source; declare a dependency instead".to_string(),
                ));
            }
            SourceKind::File if !self.raw_return => {
                let is_file = matches!(inner, Annotation::Any)
                    || matches!(inner, Annotation::Type(tag) if tag.is::<UploadedFile>());
                if !is_file {
                    return Err(invalid(format!(
                        "File fields must be annotated as UploadedFile, found {annotation}"
                    )));
                }
            }
            kind if !self.raw_return => {
                if let Annotation::Type(_) | Annotation::Request | Annotation::ViewSelf = inner {
                    return Err(invalid(format!(
                        "{annotation} can not be read from the {kind} source"
                    )));
                }
                if kind.is_multi() && !matches!(inner, Annotation::List(_) | Annotation::Any) {
                    return Err(invalid(format!(
                        "{} fields yield lists, found {annotation}",
                        kind.descriptor_name()
                    )));
                }
            }
            _ => {}
        }
        let mut compiled = self.clone();
        compiled.constraints.compile(param)?;
        Ok(compiled)
    }

    /// Checks the default, default factory and example against the annotation.
    ///
    /// The default factory is called once.
    pub fn precheck(&self, param: &str, annotation: &Annotation) -> Result<(), ConfigError> {
        if self.raw_return {
            return Ok(());
        }
        if let Some(value) = &self.default {
            self.check_value(param, annotation, "default", value.clone())?;
        }
        if let Some(factory) = &self.default_factory {
            self.check_value(param, annotation, "default_factory", factory())?;
        }
        if let Some(value) = &self.example {
            self.check_value(param, annotation, "example", value.clone())?;
        }
        Ok(())
    }

    fn check_value(
        &self,
        param: &str,
        annotation: &Annotation,
        what: &'static str,
        value: Value,
    ) -> Result<(), ConfigError> {
        let rendered = value.to_string();
        let mismatch = |reason: String| ConfigError::FieldValueType {
            param: param.to_string(),
            what,
            annotation: annotation.to_string(),
            value: rendered.clone(),
            reason,
        };
        let coerced = annotation.coerce(value).map_err(&mismatch)?;
        self.constraints
            .check(&coerced)
            .map_err(|violation| mismatch(violation.to_string()))?;
        Ok(())
    }

    /// Renders the descriptor, e.g. `Query(default="123", gt=1)`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(alias) = &self.alias {
            parts.push(format!("alias={alias:?}"));
        }
        if let Some(default) = &self.default {
            parts.push(format!("default={default}"));
        }
        if self.default_factory.is_some() {
            parts.push("default_factory=<fn>".to_string());
        }
        if self.raw_return {
            parts.push("raw_return=true".to_string());
        }
        parts.extend(self.constraints.render());
        for tag in &self.extra {
            parts.push(format!("extra={tag}"));
        }
        format!("{}({})", self.kind.descriptor_name(), parts.join(", "))
    }

    /// Returns serialisable metadata for documentation generators.
    #[must_use]
    pub fn describe(&self) -> FieldDescription {
        FieldDescription {
            source: self.kind,
            alias: self.alias.clone(),
            required: self.is_required(),
            default: self.default.clone(),
            has_default_factory: self.default_factory.is_some(),
            raw_return: self.raw_return,
            constraints: self.constraints.clone(),
            example: self.example.clone(),
            description: self.description.clone(),
            extra: self.extra.clone(),
            location: self.location,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Field metadata exposed to documentation generators.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescription {
    /// Source kind
    pub source: SourceKind,
    /// Wire-level alias
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// True if no default applies
    pub required: bool,
    /// Static default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// True if defaults come from a factory
    pub has_default_factory: bool,
    /// True if the raw mapping is passed through
    pub raw_return: bool,
    /// Declared constraints
    pub constraints: Constraints,
    /// Example value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Documentation text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Plugin tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ExtraParam>,
    /// Declaration site
    pub location: SourceLocation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[derive(Debug)]
    struct MissingToken;

    impl fmt::Display for MissingToken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("token is required")
        }
    }

    impl std::error::Error for MissingToken {}

    #[test]
    fn test_header_key_normalisation_and_lookup() {
        let field = Field::header();
        let key = field.resolve_alias_or_name("user_agent");
        assert_eq!(key, "user-agent");
        let headers = mapping(&[("User-Agent", json!("curl"))]);
        assert_eq!(field.extract(&key, &headers), Some(json!("curl")));

        let query = Field::query();
        assert_eq!(query.resolve_alias_or_name("user_agent"), "user_agent");
        assert_eq!(query.extract("User-Agent", &mapping(&[("user-agent", json!(1))])), None);
    }

    #[test]
    fn test_default_and_factory() {
        let field = Field::query().default("123");
        assert_eq!(field.apply_default("demo_value").unwrap(), json!("123"));

        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen = Arc::clone(&counter);
        let field = Field::query().default_factory(move || {
            json!(seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
        });
        assert_eq!(field.apply_default("n").unwrap(), json!(0));
        assert_eq!(field.apply_default("n").unwrap(), json!(1));
    }

    #[test]
    fn test_not_found_default_and_custom() {
        let err = Field::query().apply_default("demo_value").unwrap_err();
        assert!(matches!(err, WardenError::NotFound { ref param, source_kind: SourceKind::Query } if param == "demo_value"));

        let err = Field::header()
            .not_found(|_| MissingToken.into())
            .apply_default("token")
            .unwrap_err();
        assert!(err.downcast_ref::<MissingToken>().is_some());
        assert_eq!(err.to_string(), "token is required");
        assert_eq!(err.param(), Some("token"));
    }

    #[test]
    fn test_resolve_validates_found_values() {
        let field = Field::query().gt(1).lt(10);
        let found = field
            .resolve("n", "n", &Annotation::Integer, &mapping(&[("n", json!("2"))]))
            .unwrap();
        assert_eq!(found, Resolved::json(2));

        let err = field
            .resolve("n", "n", &Annotation::Integer, &mapping(&[("n", json!("11"))]))
            .unwrap_err();
        assert_eq!(err.constraint(), Some("lt"));
        assert_eq!(err.param(), Some("n"));

        let err = field
            .resolve("n", "n", &Annotation::Integer, &mapping(&[("n", json!("x"))]))
            .unwrap_err();
        assert_eq!(err.constraint(), Some("type"));
    }

    #[test]
    fn test_raw_return_passes_mapping() {
        let field = Field::body().raw_return();
        let body = mapping(&[("a", json!(1)), ("b", json!("x"))]);
        let resolved = field.resolve("body", "body", &Annotation::Any, &body).unwrap();
        assert_eq!(resolved, Resolved::json(json!({"a": 1, "b": "x"})));
    }

    #[test]
    fn test_resolve_file() {
        let mut files = FileMap::new();
        files.insert("avatar".to_string(), UploadedFile::new("a.png", "png"));
        let field = Field::file();
        let resolved = field.resolve_file("avatar", "avatar", &files).unwrap();
        assert_eq!(resolved.downcast::<UploadedFile>().unwrap().filename, "a.png");
        assert!(field.resolve_file("other", "other", &files).is_err());
    }

    #[test]
    fn test_compiled_rejects_bad_shapes() {
        let both = Field::query().default(1).default_factory(|| json!(2));
        assert!(matches!(
            both.compiled("n", &Annotation::Integer),
            Err(ConfigError::ConflictingDefault { .. })
        ));
        assert!(matches!(
            Field::file().compiled("f", &Annotation::String),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(Field::file()
            .compiled("f", &Annotation::optional(Annotation::of::<UploadedFile>()))
            .is_ok());
        assert!(matches!(
            Field::multiquery().compiled("ids", &Annotation::Integer),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(matches!(
            Field::query().pattern("(").compiled("p", &Annotation::String),
            Err(ConfigError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Field::source(SourceKind::Depends).compiled("d", &Annotation::Any),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_precheck_values() {
        assert!(Field::query().default(5).gt(1).precheck("n", &Annotation::Integer).is_ok());

        let err = Field::query()
            .default("abc")
            .precheck("n", &Annotation::Integer)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FieldValueType { what: "default", .. }));

        let err = Field::query()
            .default_factory(|| json!(0))
            .gt(1)
            .precheck("n", &Annotation::Integer)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FieldValueType { what: "default_factory", .. }));

        let err = Field::query()
            .example("x")
            .precheck("n", &Annotation::Float)
            .unwrap_err();
        assert!(err.to_string().contains("example"));
    }

    #[test]
    fn test_render_and_describe() {
        let field = Field::query()
            .alias("q")
            .default(1)
            .gt(0)
            .extra(ExtraParam::at_most_one_of("g"));
        assert_eq!(
            field.render(),
            "Query(alias=\"q\", default=1, gt=0, extra=AtMostOneOf(group=\"g\"))"
        );
        let described = serde_json::to_value(field.describe()).unwrap();
        assert_eq!(described["source"], "query");
        assert_eq!(described["required"], false);
        assert_eq!(described["constraints"]["gt"], 0.0);
        assert!(described["location"]["file"].as_str().unwrap().ends_with("field.rs"));
    }
}
