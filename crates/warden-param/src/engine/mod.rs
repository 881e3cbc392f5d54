//! The execution engine.
//!
//! An [`Engine`] owns a compiled [`RuleSet`] and runs it against requests:
//!
//! 1. resolve the pre-depends, in declaration order;
//! 2. resolve the handler's parameters into [`CallArgs`];
//! 3. when the accessor provides a class-view instance, resolve the view
//!    attributes and inject them;
//! 4. call `next` (the handler, or the rest of the plugin chain);
//! 5. release every resource guard, last acquired first, whatever happened
//!    before, surfacing release failures next to the main error.
//!
//! The async variant ([`Engine::run`]) awaits pending accessors, async
//! dependencies and async guards. The sync variant ([`Engine::run_sync`])
//! blocks the calling thread on them instead.

mod async_engine;
mod sync_engine;

use crate::precheck::{PreCheck, PrecheckFailure};
use crate::rule::{ParamRule, RuleKind, RuleSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use warden_core::{
    CallArgs, CallableInfo, Resolved, SourceKind, TipStyle, WardenError, WardenResult,
};

/// Engine settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// How resolution errors are annotated.
    pub tip: TipStyle,
    /// Defer the value pre-check to the first request.
    pub ignore_pre_check: bool,
}

/// Runs a compiled route against requests.
#[derive(Debug)]
pub struct Engine {
    rules: Arc<RuleSet>,
    options: EngineOptions,
    prechecked: OnceLock<Result<(), PrecheckFailure>>,
}

impl Engine {
    /// Creates an engine, running the value pre-check now unless
    /// `ignore_pre_check` is set.
    ///
    /// Dependency return types are checked either way.
    pub fn new(rules: impl Into<Arc<RuleSet>>, options: EngineOptions) -> WardenResult<Self> {
        let rules = rules.into();
        PreCheck::new(&rules)
            .check_returns()
            .map_err(|failure| failure.into_error(&options.tip))?;
        let engine = Self {
            rules,
            options,
            prechecked: OnceLock::new(),
        };
        if options.ignore_pre_check {
            debug!(handler = %engine.rules.handler.qualname, "value pre-check deferred");
        } else {
            engine.precheck()?;
        }
        info!(
            handler = %engine.rules.handler.qualname,
            params = engine.rules.params.len(),
            "route engine ready"
        );
        Ok(engine)
    }

    /// The compiled rules.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// The engine settings.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Returns true once the value pre-check has run.
    #[must_use]
    pub fn is_prechecked(&self) -> bool {
        self.prechecked.get().is_some()
    }

    /// Runs the value pre-check once and returns its remembered outcome.
    pub fn precheck(&self) -> WardenResult<()> {
        self.prechecked
            .get_or_init(|| PreCheck::new(&self.rules).run())
            .clone()
            .map_err(|failure| failure.into_error(&self.options.tip))
    }

    fn wrap(&self, error: WardenError, owner: &CallableInfo, rule: Option<&ParamRule>) -> WardenError {
        self.options
            .tip
            .wrap(error, owner, rule.map(|rule| &rule.declaration))
    }
}

/// Adds a resolved value to the call arguments the way its rule dictates.
fn assign(args: &mut CallArgs, rule: &ParamRule, value: Resolved) {
    match rule.kind {
        RuleKind::Request => args.push(value),
        RuleKind::ViewSelf => {}
        _ => {
            args.insert(rule.name.clone(), value);
        }
    }
}

/// Converts a resolved model field into the JSON the model is built from.
fn model_entry(rule: &ParamRule, value: Resolved) -> WardenResult<serde_json::Value> {
    let kind = value.kind_name();
    value.into_json().ok_or_else(|| {
        WardenError::validation(
            &rule.name,
            rule.source_kind().unwrap_or(SourceKind::Body),
            Some("model"),
            format!("model fields must resolve to data, found {kind}"),
        )
    })
}

fn construct_model(
    rule: &ParamRule,
    schema: &warden_field::ModelSchema,
    object: serde_json::Map<String, serde_json::Value>,
) -> WardenResult<Resolved> {
    schema.construct(serde_json::Value::Object(object)).map_err(|e| {
        WardenError::validation(
            &rule.name,
            schema.default_source_kind().unwrap_or(SourceKind::Body),
            Some("model"),
            e.to_string(),
        )
    })
}
