//! Blocking resolution.
//!
//! Mirrors the async engine step for step. Pending accessors, async
//! dependencies and async guards are driven to completion on the calling
//! thread, so this variant must not run on an async runtime worker whose
//! progress those futures depend on.

use super::async_engine::view_fields;
use super::{assign, construct_model, model_entry, Engine};
use crate::context::{EngineState, ResolutionContext};
use crate::rule::{CompiledDependency, ParamRule, RuleKind};
use tracing::{debug, debug_span};
use warden_core::{
    CallArgs, CallableInfo, RequestAccessor, Resolved, SourceKind, TipStyle, WardenError,
    WardenResult,
};

impl Engine {
    /// Resolves a request on the calling thread and calls `next` with the
    /// assembled arguments.
    pub fn run_sync<T, F>(&self, accessor: &dyn RequestAccessor, next: F) -> WardenResult<T>
    where
        F: FnOnce(CallArgs) -> WardenResult<T>,
    {
        let span = debug_span!("resolve", handler = %self.rules.handler.qualname);
        let _entered = span.enter();
        self.precheck()?;
        let mut ctx = ResolutionContext::new(accessor);
        let result = self.drive_sync(&mut ctx, next);
        ctx.finish_blocking(result)
    }

    fn drive_sync<T, F>(&self, ctx: &mut ResolutionContext<'_>, next: F) -> WardenResult<T>
    where
        F: FnOnce(CallArgs) -> WardenResult<T>,
    {
        let tip = &self.options.tip;
        let handler = &self.rules.handler;

        ctx.set_state(EngineState::ResolvingPreDepends);
        for dependency in &self.rules.pre_depends {
            resolve_dependency(ctx, dependency, tip)
                .map_err(|e| self.wrap(e, dependency.info(), None))?;
        }

        ctx.set_state(EngineState::ResolvingParameters);
        let mut args = resolve_params(ctx, handler, &self.rules.params, tip)?;

        if let Some(mut view) = ctx.accessor().cbv_instance() {
            ctx.set_state(EngineState::ResolvingViewAttributes);
            let attributes = resolve_params(ctx, handler, &self.rules.view_attributes, tip)?;
            view.inject(view_fields(&attributes))
                .map_err(|e| self.wrap(e, handler, None))?;
            args.set_view(view);
        }

        ctx.set_state(EngineState::Invoking);
        next(args)
    }
}

fn resolve_params(
    ctx: &mut ResolutionContext<'_>,
    owner: &CallableInfo,
    rules: &[ParamRule],
    tip: &TipStyle,
) -> WardenResult<CallArgs> {
    let mut args = CallArgs::new();
    for rule in rules {
        let value = resolve_rule(ctx, rule, tip)
            .map_err(|e| tip.wrap(e, owner, Some(&rule.declaration)))?;
        assign(&mut args, rule, value);
    }
    Ok(args)
}

fn resolve_rule(
    ctx: &mut ResolutionContext<'_>,
    rule: &ParamRule,
    tip: &TipStyle,
) -> WardenResult<Resolved> {
    match &rule.kind {
        RuleKind::Field { field, key } if field.kind() == SourceKind::File => {
            field.resolve_file(&rule.name, key, ctx.files_blocking()?)
        }
        RuleKind::Field { field, key } => {
            let mapping = ctx.mapping_blocking(field.kind())?;
            field.resolve(&rule.name, key, &rule.annotation, mapping)
        }
        RuleKind::Depends(dependency) => resolve_dependency(ctx, dependency, tip),
        RuleKind::Model {
            schema,
            info,
            fields,
        } => {
            let object = resolve_model(ctx, info, fields, tip)?;
            construct_model(rule, schema, object)
        }
        RuleKind::Request => Ok(ctx.accessor().raw_request()),
        RuleKind::ViewSelf => Ok(Resolved::null()),
    }
}

fn resolve_model(
    ctx: &mut ResolutionContext<'_>,
    info: &CallableInfo,
    fields: &[ParamRule],
    tip: &TipStyle,
) -> WardenResult<serde_json::Map<String, serde_json::Value>> {
    let mut object = serde_json::Map::new();
    for field in fields {
        let value = match &field.kind {
            RuleKind::Model {
                info: nested_info,
                fields: nested,
                ..
            } => resolve_model(ctx, nested_info, nested, tip).map(serde_json::Value::Object),
            _ => resolve_rule(ctx, field, tip).and_then(|value| model_entry(field, value)),
        }
        .map_err(|e| tip.wrap(e, info, Some(&field.declaration)))?;
        object.insert(field.name.clone(), value);
    }
    Ok(object)
}

fn resolve_dependency(
    ctx: &mut ResolutionContext<'_>,
    dependency: &CompiledDependency,
    tip: &TipStyle,
) -> WardenResult<Resolved> {
    let info = dependency.info();
    let qualname = dependency.qualname();
    let instance = if dependency.dependency.is_class() {
        let attributes = resolve_params(ctx, info, &dependency.attributes, tip)?;
        dependency
            .dependency
            .construct(attributes)
            .map_err(|e| WardenError::dependency(qualname, e))?
    } else {
        None
    };
    let args = resolve_params(ctx, info, &dependency.params, tip)?;
    debug!(dependency = %qualname, args = args.len(), "calling dependency");
    let provided = dependency
        .dependency
        .call_blocking(instance, args)
        .map_err(|e| WardenError::dependency(qualname, e))?;
    ctx.enter_blocking(qualname, provided)
}
