//! The rule compiler.
//!
//! Turns declared signatures into a [`RuleSet`]: every parameter gets a
//! resolution instruction, dependencies are compiled recursively, models are
//! expanded field by field, and every descriptor is checked for the shape
//! errors that can be found without a request.
//!
//! All errors are tip-wrapped with the declaring callable and parameter, so
//! a failing registration points at the exact line to fix.

use crate::dependency::{Dependency, DependencyId};
use crate::precheck::check_return;
use crate::rule::{CompiledDependency, ParamRule, RuleKind, RuleSet};
use crate::signature::{Param, ParamDefault, Signature};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use warden_core::{
    CallableInfo, CallableKind, ConfigError, TipStyle, WardenError, WardenResult,
};
use warden_field::{Annotation, Field, ModelRegistry, ModelSchema};

/// Default limit on dependency nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Compiler settings.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Fail fast when a dependency refers back to itself.
    pub detect_cycles: bool,
    /// Maximum dependency nesting.
    pub max_depth: usize,
    /// How configuration errors are annotated.
    pub tip: TipStyle,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_depth: DEFAULT_MAX_DEPTH,
            tip: TipStyle::default(),
        }
    }
}

/// One entry of the compile stack.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Dependency(DependencyId),
    Model(String),
}

impl Frame {
    fn name(&self) -> &str {
        match self {
            Self::Dependency(id) => id.qualname(),
            Self::Model(name) => name,
        }
    }
}

/// Dependencies and models currently being compiled, outermost first.
#[derive(Debug, Default)]
struct ResolutionStack {
    stack: Vec<Frame>,
}

impl ResolutionStack {
    /// Returns the cycle path if `frame` is already being compiled.
    fn check_cycle(&self, frame: &Frame) -> Option<Vec<String>> {
        let pos = self.stack.iter().position(|entry| entry == frame)?;
        let mut cycle: Vec<String> = self.stack[pos..]
            .iter()
            .map(|entry| entry.name().to_string())
            .collect();
        cycle.push(frame.name().to_string());
        Some(cycle)
    }

    fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn path(&self, next: &Frame) -> String {
        self.stack
            .iter()
            .chain(std::iter::once(next))
            .map(Frame::name)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Compiles signatures into rule sets.
///
/// # Example
///
/// ```
/// use warden_field::{Annotation, Field, ModelRegistry};
/// use warden_param::{CompileOptions, RuleCompiler, RuleKind, Signature};
///
/// let registry = ModelRegistry::new();
/// let signature = Signature::new("demo")
///     .param("x_token", Annotation::String, Field::header());
///
/// let rules = RuleCompiler::new(&registry, CompileOptions::default())
///     .compile_signature(&signature)
///     .unwrap();
/// let rule = rules.param("x_token").unwrap();
/// assert!(matches!(&rule.kind, RuleKind::Field { key, .. } if key == "x-token"));
/// ```
#[derive(Debug)]
pub struct RuleCompiler<'r> {
    registry: &'r ModelRegistry,
    options: CompileOptions,
    stack: ResolutionStack,
}

impl<'r> RuleCompiler<'r> {
    /// Creates a compiler resolving forward references against `registry`.
    #[must_use]
    pub fn new(registry: &'r ModelRegistry, options: CompileOptions) -> Self {
        Self {
            registry,
            options,
            stack: ResolutionStack::default(),
        }
    }

    /// Compiles a handler signature without pre-depends or view attributes.
    pub fn compile_signature(&mut self, handler: &Signature) -> WardenResult<RuleSet> {
        self.compile(handler, &[], &[])
    }

    /// Compiles a route: its pre-depends, its handler and, for class-based
    /// views, the view-level attributes.
    pub fn compile(
        &mut self,
        handler: &Signature,
        pre_depends: &[Dependency],
        view_attributes: &[Param],
    ) -> WardenResult<RuleSet> {
        let pre_depends = pre_depends
            .iter()
            .map(|dependency| self.compile_dependency(dependency))
            .collect::<WardenResult<Vec<_>>>()?;
        let params = self.compile_params(handler.info(), handler.params())?;
        let view_attributes = self.compile_params(handler.info(), view_attributes)?;
        if let Some(rule) = view_attributes
            .iter()
            .find(|rule| matches!(rule.kind, RuleKind::Request | RuleKind::ViewSelf))
        {
            let error = ConfigError::InvalidField {
                param: rule.name.clone(),
                reason: "view attributes can not receive the request or the view itself"
                    .to_string(),
            };
            return Err(self.wrap(error.into(), handler.info(), Some(rule)));
        }

        debug!(
            handler = %handler.qualname(),
            pre_depends = pre_depends.len(),
            params = params.len(),
            view_attributes = view_attributes.len(),
            "compiled parameter rules"
        );
        Ok(RuleSet {
            handler: handler.info().clone(),
            pre_depends,
            params,
            view_attributes,
        })
    }

    fn wrap(&self, error: WardenError, owner: &CallableInfo, rule: Option<&ParamRule>) -> WardenError {
        self.options
            .tip
            .wrap(error, owner, rule.map(|rule| &rule.declaration))
    }

    fn compile_params(
        &mut self,
        owner: &CallableInfo,
        params: &[Param],
    ) -> WardenResult<Vec<ParamRule>> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(params.len());
        for param in params {
            let declaration = param.declaration();
            if !seen.insert(param.name.as_str()) {
                let error = ConfigError::DuplicateParameter {
                    callable: owner.qualname.clone(),
                    param: param.name.clone(),
                };
                return Err(self.options.tip.wrap(error.into(), owner, Some(&declaration)));
            }
            let rule = self
                .compile_param(owner, param)
                .map_err(|e| self.options.tip.wrap(e, owner, Some(&declaration)))?;
            rules.push(rule);
        }
        Ok(rules)
    }

    fn compile_param(&mut self, owner: &CallableInfo, param: &Param) -> WardenResult<ParamRule> {
        let annotation = self.resolve_annotation(&param.name, &param.annotation)?;
        let kind = match &param.default {
            ParamDefault::Field(field) => self.field_kind(&param.name, &annotation, field)?,
            ParamDefault::Depends(dependency) => {
                self.depends_kind(&param.name, &annotation, dependency)?
            }
            ParamDefault::DependsLazy(factory) => {
                let dependency = factory();
                self.depends_kind(&param.name, &annotation, &dependency)?
            }
            ParamDefault::Empty => match &annotation {
                Annotation::Request => RuleKind::Request,
                Annotation::ViewSelf => RuleKind::ViewSelf,
                Annotation::Model(schema) => self.model_kind(schema)?,
                other => {
                    return Err(ConfigError::UnsupportedParameter {
                        callable: owner.qualname.clone(),
                        param: param.name.clone(),
                        annotation: other.to_string(),
                    }
                    .into())
                }
            },
        };
        Ok(ParamRule {
            name: param.name.clone(),
            annotation,
            kind,
            declaration: param.declaration(),
        })
    }

    /// Pushes `frame`, failing on a cycle or when nesting exceeds the limit.
    fn enter(&mut self, frame: Frame) -> Result<(), ConfigError> {
        if self.options.detect_cycles {
            if let Some(cycle) = self.stack.check_cycle(&frame) {
                return Err(ConfigError::CircularDependency { cycle });
            }
        }
        if self.stack.depth() >= self.options.max_depth {
            return Err(ConfigError::DepthExceeded {
                depth: self.stack.depth() + 1,
                limit: self.options.max_depth,
                path: self.stack.path(&frame),
            });
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Replaces every forward reference in `annotation` with its model,
    /// including references declared by the fields of nested models.
    fn resolve_annotation(&mut self, param: &str, annotation: &Annotation) -> WardenResult<Annotation> {
        match annotation {
            Annotation::Named(name) => {
                let schema =
                    self.registry
                        .get(name)
                        .ok_or_else(|| ConfigError::UnresolvedAnnotation {
                            param: param.to_string(),
                            name: name.clone(),
                        })?;
                self.resolve_model(&schema)
            }
            Annotation::Model(schema) => self.resolve_model(schema),
            Annotation::List(inner) => Ok(Annotation::list(self.resolve_annotation(param, inner)?)),
            Annotation::Optional(inner) => {
                Ok(Annotation::optional(self.resolve_annotation(param, inner)?))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_model(&mut self, schema: &Arc<ModelSchema>) -> WardenResult<Annotation> {
        self.enter(Frame::Model(schema.name().to_string()))?;
        let resolved = schema
            .try_map_annotations(|field| self.resolve_annotation(&field.name, &field.annotation));
        self.stack.pop();
        Ok(Annotation::Model(Arc::new(resolved?)))
    }

    fn field_kind(
        &self,
        param: &str,
        annotation: &Annotation,
        field: &Field,
    ) -> Result<RuleKind, ConfigError> {
        let field = field.compiled(param, annotation)?;
        let key = field.resolve_alias_or_name(param);
        Ok(RuleKind::Field { field, key })
    }

    fn depends_kind(
        &mut self,
        param: &str,
        annotation: &Annotation,
        dependency: &Dependency,
    ) -> WardenResult<RuleKind> {
        let compiled = self.compile_dependency(dependency)?;
        check_return(param, annotation, &compiled)?;
        Ok(RuleKind::Depends(compiled))
    }

    /// Compiles a dependency and everything it depends on.
    pub fn compile_dependency(
        &mut self,
        dependency: &Dependency,
    ) -> WardenResult<Arc<CompiledDependency>> {
        self.enter(Frame::Dependency(dependency.id()))?;
        let compiled = self.compile_dependency_body(dependency);
        self.stack.pop();
        compiled.map(Arc::new)
    }

    fn compile_dependency_body(&mut self, dependency: &Dependency) -> WardenResult<CompiledDependency> {
        let info = dependency.info();
        let returns = match dependency.return_annotation() {
            Some(annotation) => Some(
                self.resolve_annotation("return", annotation)
                    .map_err(|e| self.options.tip.wrap(e, info, None))?,
            ),
            None => None,
        };
        let attributes = self.compile_params(info, dependency.attributes())?;
        let params = self.compile_params(info, dependency.params())?;
        if let Some(rule) = attributes
            .iter()
            .chain(&params)
            .find(|rule| matches!(rule.kind, RuleKind::ViewSelf))
        {
            let error = ConfigError::InvalidField {
                param: rule.name.clone(),
                reason: "only a class-based view handler may declare the view receiver".to_string(),
            };
            return Err(self.wrap(error.into(), info, Some(rule)));
        }
        debug!(
            dependency = %dependency.qualname(),
            class = dependency.is_class(),
            attributes = attributes.len(),
            params = params.len(),
            "compiled dependency"
        );
        Ok(CompiledDependency {
            dependency: dependency.clone(),
            returns,
            attributes,
            params,
        })
    }

    fn model_kind(&mut self, schema: &Arc<ModelSchema>) -> WardenResult<RuleKind> {
        let info = CallableInfo::new(schema.name(), schema.location(), false, CallableKind::Model);
        let mut fields = Vec::with_capacity(schema.fields().len());
        for model_field in schema.fields() {
            let param = match (&model_field.field, &model_field.annotation) {
                (None, Annotation::Model(_) | Annotation::Named(_)) => {
                    Param::bare(&model_field.name, model_field.annotation.clone())
                }
                _ => match schema.descriptor_for(model_field) {
                    Some(field) => Param::new(&model_field.name, model_field.annotation.clone(), field),
                    None => {
                        let declaration = Param::bare(&model_field.name, model_field.annotation.clone())
                            .declaration();
                        let error = ConfigError::InvalidField {
                            param: model_field.name.clone(),
                            reason: format!(
                                "model `{}` declares no descriptor for this field and no default source",
                                schema.name()
                            ),
                        };
                        return Err(self.options.tip.wrap(error.into(), &info, Some(&declaration)));
                    }
                },
            };
            let declaration = param.declaration();
            let rule = self
                .compile_param(&info, &param)
                .map_err(|e| self.options.tip.wrap(e, &info, Some(&declaration)))?;
            fields.push(rule);
        }
        Ok(RuleKind::Model {
            schema: Arc::clone(schema),
            info,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ErrorCategory, Provided, SourceKind};

    fn compile(signature: &Signature) -> WardenResult<RuleSet> {
        RuleCompiler::new(&ModelRegistry::new(), CompileOptions::default())
            .compile_signature(signature)
    }

    fn config_error(err: &WardenError) -> &ConfigError {
        match err.root() {
            WardenError::Config(inner) => inner,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    fn ping() -> Dependency {
        Dependency::function("ping", |_| Ok(Provided::json("pong"))).returns(Annotation::String)
    }

    fn cycle_a() -> Dependency {
        Dependency::function("cycle_a", |_| Ok(Provided::json(1)))
            .param("b", Annotation::Any, ParamDefault::DependsLazy(cycle_b))
    }

    fn cycle_b() -> Dependency {
        Dependency::function("cycle_b", |_| Ok(Provided::json(1)))
            .param("a", Annotation::Any, ParamDefault::DependsLazy(cycle_a))
    }

    #[test]
    fn test_field_rules_freeze_keys() {
        let signature = Signature::new("demo")
            .param("page", Annotation::Integer, Field::query().alias("p"))
            .param("user_agent", Annotation::String, Field::header())
            .request("request");
        let rules = compile(&signature).unwrap();
        assert_eq!(rules.params.len(), 3);
        assert!(matches!(&rules.params[0].kind, RuleKind::Field { key, .. } if key == "p"));
        assert!(matches!(&rules.params[1].kind, RuleKind::Field { key, .. } if key == "user-agent"));
        assert!(matches!(rules.params[2].kind, RuleKind::Request));
        assert_eq!(rules.params[0].source_kind(), Some(SourceKind::Query));
    }

    #[test]
    fn test_unsupported_parameter_fails_loudly() {
        let signature = Signature::new("demo").bare("orphan", Annotation::Integer);
        let err = compile(&signature).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(matches!(config_error(&err), ConfigError::UnsupportedParameter { param, .. } if param == "orphan"));
        let tip = err.as_tip().unwrap();
        assert_eq!(tip.qualname(), "demo");
        assert_eq!(tip.param_name(), Some("orphan"));
    }

    #[test]
    fn test_unresolved_annotation() {
        let signature = Signature::new("demo").bare("user", Annotation::named("User"));
        let err = compile(&signature).unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::UnresolvedAnnotation { name, .. } if name == "User"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let signature = Signature::new("demo")
            .param("a", Annotation::String, Field::query())
            .param("a", Annotation::String, Field::header());
        let err = compile(&signature).unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_return_type_mismatch_names_both_types() {
        let signature = Signature::new("demo").param("count", Annotation::Integer, ping());
        let err = compile(&signature).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("String"), "{text}");
        assert!(text.contains("i64"), "{text}");
        assert_eq!(err.as_tip().unwrap().param_name(), Some("count"));
    }

    #[test]
    fn test_dependency_tree() {
        let outer = Dependency::function("outer", |_| Ok(Provided::json(1)))
            .param("inner", Annotation::String, ping())
            .param("q", Annotation::String, Field::query());
        let signature = Signature::new("demo").param("value", Annotation::Any, outer);
        let rules = compile(&signature).unwrap();
        let RuleKind::Depends(outer) = &rules.params[0].kind else {
            panic!("expected a dependency rule");
        };
        assert_eq!(outer.qualname(), "outer");
        assert_eq!(outer.params.len(), 2);
        assert_eq!(rules.all_rules().len(), 4);
        assert!(rules.declares("q"));
    }

    #[test]
    fn test_cycles_are_detected() {
        let signature = Signature::new("demo").param("a", Annotation::Any, ParamDefault::DependsLazy(cycle_a));
        let err = compile(&signature).unwrap_err();
        match config_error(&err) {
            ConfigError::CircularDependency { cycle } => {
                assert_eq!(cycle, &["cycle_a", "cycle_b", "cycle_a"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_depth_limit_without_cycle_detection() {
        let options = CompileOptions {
            detect_cycles: false,
            max_depth: 4,
            ..CompileOptions::default()
        };
        let signature = Signature::new("demo").param("a", Annotation::Any, ParamDefault::DependsLazy(cycle_a));
        let err = RuleCompiler::new(&ModelRegistry::new(), options)
            .compile_signature(&signature)
            .unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::DepthExceeded { limit: 4, .. }));
    }

    #[test]
    fn test_model_expansion() {
        let registry = ModelRegistry::new().with(
            warden_field::ModelSchema::new("Paging")
                .field_with("page", Annotation::Integer, Field::query().default(1))
                .field_with("size", Annotation::Integer, Field::query().default(20)),
        );
        let signature = Signature::new("demo").bare("paging", Annotation::named("Paging"));
        let rules = RuleCompiler::new(&registry, CompileOptions::default())
            .compile_signature(&signature)
            .unwrap();
        let RuleKind::Model { fields, info, .. } = &rules.params[0].kind else {
            panic!("expected a model rule");
        };
        assert_eq!(info.qualname, "Paging");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_model_field_without_descriptor() {
        let registry = ModelRegistry::new()
            .with(warden_field::ModelSchema::new("Loose").field("name", Annotation::String));
        let signature = Signature::new("demo").bare("loose", Annotation::named("Loose"));
        let err = RuleCompiler::new(&registry, CompileOptions::default())
            .compile_signature(&signature)
            .unwrap_err();
        let tip = err.as_tip().unwrap();
        assert_eq!(tip.qualname(), "Loose");
        assert_eq!(tip.param_name(), Some("name"));
    }

    fn tree() -> warden_field::ModelSchema {
        warden_field::ModelSchema::new("Tree")
            .field_with("v", Annotation::Integer, Field::query().default(1))
            .field("child", Annotation::named("Tree"))
    }

    #[test]
    fn test_nested_body_models_are_resolved() {
        let registry = ModelRegistry::new()
            .with(warden_field::ModelSchema::new("Address").field("city", Annotation::String))
            .with(
                warden_field::ModelSchema::new("User")
                    .field("name", Annotation::String)
                    .field("address", Annotation::named("Address")),
            );
        let signature =
            Signature::new("demo").param("user", Annotation::named("User"), Field::json());
        let rules = RuleCompiler::new(&registry, CompileOptions::default())
            .compile_signature(&signature)
            .unwrap();
        let user = rules.params[0].annotation.as_model().unwrap();
        let address = &user.fields()[1].annotation;
        assert_eq!(address.as_model().unwrap().name(), "Address");
    }

    #[test]
    fn test_unknown_nested_model_fails() {
        let registry = ModelRegistry::new().with(
            warden_field::ModelSchema::new("User").field("address", Annotation::named("Ghost")),
        );
        let signature =
            Signature::new("demo").param("user", Annotation::named("User"), Field::json());
        let err = RuleCompiler::new(&registry, CompileOptions::default())
            .compile_signature(&signature)
            .unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::UnresolvedAnnotation { name, .. } if name == "Ghost"));
    }

    #[test]
    fn test_recursive_model_is_a_cycle() {
        let registry = ModelRegistry::new().with(tree());
        let signature = Signature::new("demo").bare("tree", Annotation::named("Tree"));
        let err = RuleCompiler::new(&registry, CompileOptions::default())
            .compile_signature(&signature)
            .unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::CircularDependency { cycle }
            if cycle == &["Tree", "Tree"]));
    }

    #[test]
    fn test_recursive_model_hits_depth_limit() {
        let options = CompileOptions {
            detect_cycles: false,
            max_depth: 8,
            ..CompileOptions::default()
        };
        let registry = ModelRegistry::new().with(tree());
        let signature = Signature::new("demo").bare("tree", Annotation::named("Tree"));
        let err = RuleCompiler::new(&registry, options)
            .compile_signature(&signature)
            .unwrap_err();
        assert!(matches!(config_error(&err), ConfigError::DepthExceeded { limit: 8, .. }));
    }

    #[test]
    fn test_view_receiver_only_on_handlers() {
        let dependency = Dependency::function("bad", |_| Ok(Provided::json(1)))
            .param("self", Annotation::ViewSelf, ParamDefault::Empty);
        let signature = Signature::new("demo").param("x", Annotation::Any, dependency);
        assert!(compile(&signature).is_err());

        let view = Signature::new("View.get").view_self();
        assert!(matches!(compile(&view).unwrap().params[0].kind, RuleKind::ViewSelf));
    }
}
