//! Registration-time value checks.
//!
//! The compiler rejects descriptor shapes; the pre-check goes further and
//! validates the values a route carries before any request arrives: every
//! field's default, default factory output and example must fit its
//! annotation, and every dependency's declared return type must fit the
//! parameter it is injected into.

use crate::rule::{CompiledDependency, ParamRule, RuleKind, RuleSet};
use tracing::debug;
use warden_core::{CallableInfo, ConfigError, ParamDeclaration, TipStyle, WardenError};
use warden_field::Annotation;

/// Checks a dependency's declared return type against the consuming
/// parameter's annotation.
///
/// Dependencies without a declared return type are accepted.
pub fn check_return(
    param: &str,
    annotation: &Annotation,
    dependency: &CompiledDependency,
) -> Result<(), ConfigError> {
    match &dependency.returns {
        Some(found) if !annotation.accepts(found) => Err(ConfigError::ReturnTypeMismatch {
            param: param.to_string(),
            dependency: dependency.qualname().to_string(),
            expected: annotation.to_string(),
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}

/// A failed pre-check, with the declaration it concerns.
///
/// Kept apart from [`WardenError`] so a deferred outcome can be cloned and
/// reported on every call that observes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecheckFailure {
    /// What went wrong
    pub error: ConfigError,
    /// The declaring callable
    pub callable: CallableInfo,
    /// The offending parameter
    pub param: Option<ParamDeclaration>,
}

impl PrecheckFailure {
    /// Converts the failure into a tip-wrapped error.
    #[must_use]
    pub fn into_error(self, tip: &TipStyle) -> WardenError {
        tip.wrap(self.error.into(), &self.callable, self.param.as_ref())
    }
}

/// Validates the values carried by a compiled route.
///
/// Running it twice yields the same outcome; the only side effect is one
/// call of each default factory per run.
#[derive(Debug, Clone, Copy)]
pub struct PreCheck<'a> {
    rules: &'a RuleSet,
}

impl<'a> PreCheck<'a> {
    /// Creates a pre-check over `rules`.
    #[must_use]
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Runs every check, stopping at the first failure.
    pub fn run(&self) -> Result<(), PrecheckFailure> {
        self.visit(&mut |owner, rule| match &rule.kind {
            RuleKind::Field { field, .. } => field
                .precheck(&rule.name, &rule.annotation)
                .map_err(|error| failure(error, owner, rule)),
            RuleKind::Depends(dependency) => check_return(&rule.name, &rule.annotation, dependency)
                .map_err(|error| failure(error, owner, rule)),
            _ => Ok(()),
        })?;
        debug!(handler = %self.rules.handler.qualname, "pre-check passed");
        Ok(())
    }

    /// Checks only dependency return types.
    pub fn check_returns(&self) -> Result<(), PrecheckFailure> {
        self.visit(&mut |owner, rule| match &rule.kind {
            RuleKind::Depends(dependency) => check_return(&rule.name, &rule.annotation, dependency)
                .map_err(|error| failure(error, owner, rule)),
            _ => Ok(()),
        })
    }

    fn visit(
        &self,
        check: &mut dyn FnMut(&CallableInfo, &ParamRule) -> Result<(), PrecheckFailure>,
    ) -> Result<(), PrecheckFailure> {
        for dependency in &self.rules.pre_depends {
            visit_dependency(dependency, check)?;
        }
        let handler = &self.rules.handler;
        for rule in self.rules.params.iter().chain(&self.rules.view_attributes) {
            visit_rule(handler, rule, check)?;
        }
        Ok(())
    }
}

fn failure(error: ConfigError, owner: &CallableInfo, rule: &ParamRule) -> PrecheckFailure {
    PrecheckFailure {
        error,
        callable: owner.clone(),
        param: Some(rule.declaration.clone()),
    }
}

fn visit_dependency(
    dependency: &CompiledDependency,
    check: &mut dyn FnMut(&CallableInfo, &ParamRule) -> Result<(), PrecheckFailure>,
) -> Result<(), PrecheckFailure> {
    for rule in dependency.attributes.iter().chain(&dependency.params) {
        visit_rule(dependency.info(), rule, check)?;
    }
    Ok(())
}

fn visit_rule(
    owner: &CallableInfo,
    rule: &ParamRule,
    check: &mut dyn FnMut(&CallableInfo, &ParamRule) -> Result<(), PrecheckFailure>,
) -> Result<(), PrecheckFailure> {
    check(owner, rule)?;
    match &rule.kind {
        RuleKind::Depends(dependency) => visit_dependency(dependency, check),
        RuleKind::Model { info, fields, .. } => {
            for field in fields {
                visit_rule(info, field, check)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, RuleCompiler};
    use crate::dependency::Dependency;
    use crate::signature::Signature;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use warden_core::Provided;
    use warden_field::{Field, ModelRegistry};

    fn rules(signature: &Signature) -> RuleSet {
        RuleCompiler::new(&ModelRegistry::new(), CompileOptions::default())
            .compile_signature(signature)
            .unwrap()
    }

    #[test]
    fn test_bad_default_is_reported_with_owner() {
        let dependency = Dependency::function("load", |_| Ok(Provided::json(1)))
            .param("limit", Annotation::Integer, Field::query().default("many"));
        let rules = rules(&Signature::new("demo").param("loaded", Annotation::Any, dependency));
        let failure = PreCheck::new(&rules).run().unwrap_err();
        assert!(matches!(failure.error, ConfigError::FieldValueType { what: "default", .. }));
        assert_eq!(failure.callable.qualname, "load");
        assert_eq!(failure.param.as_ref().map(|p| p.name.as_str()), Some("limit"));

        let error = failure.into_error(&TipStyle::default());
        assert_eq!(error.as_tip().unwrap().qualname(), "load");
    }

    #[test]
    fn test_example_and_constraints() {
        let signature = Signature::new("demo")
            .param("age", Annotation::Integer, Field::query().gt(0).example(-3));
        let failure = PreCheck::new(&rules(&signature)).run().unwrap_err();
        assert!(matches!(failure.error, ConfigError::FieldValueType { what: "example", .. }));
    }

    #[test]
    fn test_run_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let signature = Signature::new("demo").param(
            "n",
            Annotation::Integer,
            Field::query().default_factory(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                serde_json::json!(7)
            }),
        );
        let rules = rules(&signature);
        let check = PreCheck::new(&rules);
        assert_eq!(check.run(), Ok(()));
        assert_eq!(check.run(), Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(check.check_returns(), Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
