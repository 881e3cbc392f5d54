//! Async resolution.

use super::{assign, construct_model, model_entry, Engine};
use crate::context::{EngineState, ResolutionContext};
use crate::rule::{CompiledDependency, ParamRule, RuleKind};
use std::future::Future;
use tracing::{debug, debug_span, Instrument};
use warden_core::{
    BoxFuture, CallArgs, CallableInfo, RequestAccessor, Resolved, SourceKind, TipStyle,
    ViewFields, WardenError, WardenResult,
};

impl Engine {
    /// Resolves a request and calls `next` with the assembled arguments.
    ///
    /// Resource guards are released after `next` completes, whether or not
    /// anything failed. If the returned future is dropped midway, the guards
    /// acquired so far are released from the context's `Drop`.
    pub async fn run<T, F, Fut>(&self, accessor: &dyn RequestAccessor, next: F) -> WardenResult<T>
    where
        F: FnOnce(CallArgs) -> Fut,
        Fut: Future<Output = WardenResult<T>>,
    {
        let span = debug_span!("resolve", handler = %self.rules.handler.qualname);
        async move {
            self.precheck()?;
            let mut ctx = ResolutionContext::new(accessor);
            let result = self.drive(&mut ctx, next).await;
            ctx.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn drive<T, F, Fut>(&self, ctx: &mut ResolutionContext<'_>, next: F) -> WardenResult<T>
    where
        F: FnOnce(CallArgs) -> Fut,
        Fut: Future<Output = WardenResult<T>>,
    {
        let tip = &self.options.tip;
        let handler = &self.rules.handler;

        ctx.set_state(EngineState::ResolvingPreDepends);
        for dependency in &self.rules.pre_depends {
            resolve_dependency(ctx, dependency, tip)
                .await
                .map_err(|e| self.wrap(e, dependency.info(), None))?;
        }

        ctx.set_state(EngineState::ResolvingParameters);
        let mut args = resolve_params(ctx, handler, &self.rules.params, tip).await?;

        if let Some(mut view) = ctx.accessor().cbv_instance() {
            ctx.set_state(EngineState::ResolvingViewAttributes);
            let attributes = resolve_params(ctx, handler, &self.rules.view_attributes, tip).await?;
            view.inject(view_fields(&attributes))
                .map_err(|e| self.wrap(e, handler, None))?;
            args.set_view(view);
        }

        ctx.set_state(EngineState::Invoking);
        next(args).await
    }
}

pub(super) fn view_fields(attributes: &CallArgs) -> ViewFields {
    let mut fields = ViewFields::new();
    for (name, value) in attributes.keyword() {
        fields.insert(name.clone(), value.clone());
    }
    fields
}

async fn resolve_params(
    ctx: &mut ResolutionContext<'_>,
    owner: &CallableInfo,
    rules: &[ParamRule],
    tip: &TipStyle,
) -> WardenResult<CallArgs> {
    let mut args = CallArgs::new();
    for rule in rules {
        let value = resolve_rule(ctx, rule, tip)
            .await
            .map_err(|e| tip.wrap(e, owner, Some(&rule.declaration)))?;
        assign(&mut args, rule, value);
    }
    Ok(args)
}

fn resolve_rule<'a, 'r: 'a>(
    ctx: &'a mut ResolutionContext<'r>,
    rule: &'a ParamRule,
    tip: &'a TipStyle,
) -> BoxFuture<'a, WardenResult<Resolved>> {
    Box::pin(async move {
        match &rule.kind {
            RuleKind::Field { field, key } if field.kind() == SourceKind::File => {
                let files = ctx.files().await?;
                field.resolve_file(&rule.name, key, files)
            }
            RuleKind::Field { field, key } => {
                let mapping = ctx.mapping(field.kind()).await?;
                field.resolve(&rule.name, key, &rule.annotation, mapping)
            }
            RuleKind::Depends(dependency) => resolve_dependency(ctx, dependency, tip).await,
            RuleKind::Model {
                schema,
                info,
                fields,
            } => {
                let object = resolve_model(ctx, info, fields, tip).await?;
                construct_model(rule, schema, object)
            }
            RuleKind::Request => Ok(ctx.accessor().raw_request()),
            RuleKind::ViewSelf => Ok(Resolved::null()),
        }
    })
}

fn resolve_model<'a, 'r: 'a>(
    ctx: &'a mut ResolutionContext<'r>,
    info: &'a CallableInfo,
    fields: &'a [ParamRule],
    tip: &'a TipStyle,
) -> BoxFuture<'a, WardenResult<serde_json::Map<String, serde_json::Value>>> {
    Box::pin(async move {
        let mut object = serde_json::Map::new();
        for field in fields {
            let value = match &field.kind {
                RuleKind::Model {
                    info: nested_info,
                    fields: nested,
                    ..
                } => resolve_model(ctx, nested_info, nested, tip)
                    .await
                    .map(serde_json::Value::Object),
                _ => match resolve_rule(ctx, field, tip).await {
                    Ok(value) => model_entry(field, value),
                    Err(error) => Err(error),
                },
            }
            .map_err(|e| tip.wrap(e, info, Some(&field.declaration)))?;
            object.insert(field.name.clone(), value);
        }
        Ok(object)
    })
}

fn resolve_dependency<'a, 'r: 'a>(
    ctx: &'a mut ResolutionContext<'r>,
    dependency: &'a CompiledDependency,
    tip: &'a TipStyle,
) -> BoxFuture<'a, WardenResult<Resolved>> {
    Box::pin(async move {
        let info = dependency.info();
        let qualname = dependency.qualname();
        let instance = if dependency.dependency.is_class() {
            let attributes = resolve_params(ctx, info, &dependency.attributes, tip).await?;
            dependency
                .dependency
                .construct(attributes)
                .map_err(|e| WardenError::dependency(qualname, e))?
        } else {
            None
        };
        let args = resolve_params(ctx, info, &dependency.params, tip).await?;
        debug!(dependency = %qualname, args = args.len(), "calling dependency");
        let provided = dependency
            .dependency
            .call(instance, args)
            .await
            .map_err(|e| WardenError::dependency(qualname, e))?;
        ctx.enter(qualname, provided).await
    })
}
