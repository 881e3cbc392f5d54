//! Compiled parameter rules.
//!
//! A [`RuleSet`] is the resolution plan of one route: what every parameter
//! of the handler, its pre-depends and its view attributes resolves from.
//! Dependencies make the plan a tree. Rule sets are built once, at
//! registration, and shared read-only by every request.

use crate::dependency::Dependency;
use serde::Serialize;
use std::sync::Arc;
use warden_core::{CallableInfo, ParamDeclaration, SourceKind};
use warden_field::{Annotation, ExtraParam, Field, FieldDescription, ModelSchema};

/// The resolution instruction for one parameter.
#[derive(Debug, Clone)]
pub struct ParamRule {
    /// Parameter name
    pub name: String,
    /// Resolved annotation (no forward references left)
    pub annotation: Annotation,
    /// How the value is produced
    pub kind: RuleKind,
    /// The declaration, rendered for tip errors
    pub declaration: ParamDeclaration,
}

/// How a parameter's value is produced.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Read from a request source through a compiled descriptor
    Field {
        /// The compiled descriptor
        field: Field,
        /// The frozen lookup key
        key: String,
    },
    /// Produced by a dependency
    Depends(Arc<CompiledDependency>),
    /// A model expanded field by field
    Model {
        /// The model schema
        schema: Arc<ModelSchema>,
        /// The model as a declaring callable, for tip errors
        info: CallableInfo,
        /// One rule per model field
        fields: Vec<ParamRule>,
    },
    /// The framework's raw request, passed positionally
    Request,
    /// The class-view receiver, never resolved
    ViewSelf,
}

impl ParamRule {
    /// Returns the source kind this rule reads from, if it reads one.
    #[must_use]
    pub fn source_kind(&self) -> Option<SourceKind> {
        match &self.kind {
            RuleKind::Field { field, .. } => Some(field.kind()),
            RuleKind::Depends(_) => Some(SourceKind::Depends),
            _ => None,
        }
    }

    /// Returns the descriptor of a field rule.
    #[must_use]
    pub fn field(&self) -> Option<&Field> {
        match &self.kind {
            RuleKind::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns the plugin tags of a field rule.
    #[must_use]
    pub fn extras(&self) -> &[ExtraParam] {
        self.field().map_or(&[], Field::extras)
    }

    /// Visits this rule and every rule nested under it, depth-first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ParamRule)) {
        visit(self);
        match &self.kind {
            RuleKind::Depends(dependency) => dependency.walk(visit),
            RuleKind::Model { fields, .. } => {
                for rule in fields {
                    rule.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// Describes the rule for documentation generators.
    #[must_use]
    pub fn describe(&self) -> ParamDescription {
        let mut description = ParamDescription {
            name: self.name.clone(),
            annotation: self.annotation.to_string(),
            source: "",
            key: None,
            field: None,
            dependency: None,
            fields: Vec::new(),
        };
        match &self.kind {
            RuleKind::Field { field, key } => {
                description.source = field.kind().as_str();
                description.key = Some(key.clone());
                description.field = Some(field.describe());
            }
            RuleKind::Depends(dependency) => {
                description.source = SourceKind::Depends.as_str();
                description.dependency = Some(Box::new(dependency.describe()));
            }
            RuleKind::Model { fields, .. } => {
                description.source = "model";
                description.fields = fields.iter().map(ParamRule::describe).collect();
            }
            RuleKind::Request => description.source = "request",
            RuleKind::ViewSelf => description.source = "view_self",
        }
        description
    }
}

/// A dependency with its own parameters compiled.
#[derive(Debug, Clone)]
pub struct CompiledDependency {
    /// The dependency
    pub dependency: Dependency,
    /// Resolved return annotation, if declared
    pub returns: Option<Annotation>,
    /// Class attribute rules, resolved before construction
    pub attributes: Vec<ParamRule>,
    /// Call parameter rules
    pub params: Vec<ParamRule>,
}

impl CompiledDependency {
    /// Callable identity and location.
    #[must_use]
    pub fn info(&self) -> &CallableInfo {
        self.dependency.info()
    }

    /// Qualified name.
    #[must_use]
    pub fn qualname(&self) -> &str {
        self.dependency.qualname()
    }

    /// Visits every attribute and parameter rule, depth-first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ParamRule)) {
        for rule in self.attributes.iter().chain(&self.params) {
            rule.walk(visit);
        }
    }

    /// Describes the dependency for documentation generators.
    #[must_use]
    pub fn describe(&self) -> DependencyDescription {
        DependencyDescription {
            callable: self.info().clone(),
            returns: self.returns.as_ref().map(ToString::to_string),
            attributes: self.attributes.iter().map(ParamRule::describe).collect(),
            params: self.params.iter().map(ParamRule::describe).collect(),
        }
    }
}

/// The compiled resolution plan of a route.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// The handler
    pub handler: CallableInfo,
    /// Route-wide dependencies resolved before the handler's parameters
    pub pre_depends: Vec<Arc<CompiledDependency>>,
    /// The handler's parameters
    pub params: Vec<ParamRule>,
    /// Class-view attributes, resolved once per request onto the instance
    pub view_attributes: Vec<ParamRule>,
}

impl RuleSet {
    /// Visits every rule of the route, depth-first: pre-depends, then
    /// parameters, then view attributes.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ParamRule)) {
        for dependency in &self.pre_depends {
            dependency.walk(visit);
        }
        for rule in self.params.iter().chain(&self.view_attributes) {
            rule.walk(visit);
        }
    }

    /// Returns every rule of the route, depth-first.
    #[must_use]
    pub fn all_rules(&self) -> Vec<&ParamRule> {
        let mut rules = Vec::new();
        self.walk(&mut |rule| rules.push(rule));
        rules
    }

    /// Returns the top-level rule for `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamRule> {
        self.params.iter().find(|rule| rule.name == name)
    }

    /// Returns true if any rule of the route is named `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.all_rules().iter().any(|rule| rule.name == name)
    }

    /// Describes the route for documentation generators.
    #[must_use]
    pub fn describe(&self) -> RouteDescription {
        RouteDescription {
            handler: self.handler.clone(),
            pre_depends: self.pre_depends.iter().map(|d| d.describe()).collect(),
            params: self.params.iter().map(ParamRule::describe).collect(),
            view_attributes: self.view_attributes.iter().map(ParamRule::describe).collect(),
        }
    }
}

/// Parameter metadata exposed to documentation generators.
#[derive(Debug, Clone, Serialize)]
pub struct ParamDescription {
    /// Parameter name
    pub name: String,
    /// Rendered annotation
    pub annotation: String,
    /// Source kind, or `model`, `request`, `view_self`
    pub source: &'static str,
    /// Frozen lookup key of a field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Field metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldDescription>,
    /// Nested dependency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Box<DependencyDescription>>,
    /// Expanded model fields
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ParamDescription>,
}

/// Dependency metadata exposed to documentation generators.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyDescription {
    /// The dependency callable
    pub callable: CallableInfo,
    /// Rendered return annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    /// Class attributes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ParamDescription>,
    /// Call parameters
    pub params: Vec<ParamDescription>,
}

/// Route metadata exposed to documentation generators.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDescription {
    /// The handler
    pub handler: CallableInfo,
    /// Route-wide pre-depends
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_depends: Vec<DependencyDescription>,
    /// Handler parameters
    pub params: Vec<ParamDescription>,
    /// Class-view attributes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub view_attributes: Vec<ParamDescription>,
}
