//! Route registration.
//!
//! A [`RouteBuilder`] gathers everything a route declares and turns it into
//! a callable [`Route`]: rules are compiled, the engine runs its pre-check,
//! plugin managers get their hooks, and the chain is assembled.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use warden_config::WardenConfig;
use warden_core::{RequestAccessor, RouteId, WardenError, WardenResult};
use warden_field::{Annotation, ModelRegistry};
use warden_param::{
    CompileOptions, Dependency, Engine, EngineOptions, Param, ParamDefault, RouteDescription,
    RuleCompiler, RuleSet, Signature,
};
use warden_plugin::{Chain, Handler, PluginManager, RouteMeta};

/// Collects a route's declarations before registration.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use warden::prelude::*;
///
/// let signature = Signature::new("demo")
///     .param("demo_value", Annotation::String, Field::query().default("123"));
/// let handler = Handler::sync(|args: CallArgs| Ok(json!(args.value::<String>("demo_value")?)));
///
/// let route = RouteBuilder::new(signature, handler).build(&WardenConfig::default())?;
/// assert_eq!(route.stage_names(), ["engine"]);
/// # Ok::<(), WardenError>(())
/// ```
#[derive(Debug)]
pub struct RouteBuilder {
    signature: Signature,
    handler: Handler,
    pre_depends: Vec<Dependency>,
    view_attributes: Vec<Param>,
    plugins: Vec<PluginManager>,
    models: ModelRegistry,
}

impl RouteBuilder {
    /// Starts a route for `handler`, which takes the arguments `signature`
    /// declares.
    #[must_use]
    pub fn new(signature: Signature, handler: Handler) -> Self {
        Self {
            signature,
            handler,
            pre_depends: Vec::new(),
            view_attributes: Vec::new(),
            plugins: Vec::new(),
            models: ModelRegistry::new(),
        }
    }

    /// Adds a dependency that runs before the handler's own parameters.
    /// Its result is discarded.
    pub fn pre_depend(mut self, dependency: Dependency) -> Self {
        self.pre_depends.push(dependency);
        self
    }

    /// Declares a class-view attribute, resolved before the handler runs.
    pub fn view_attribute(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        default: impl Into<ParamDefault>,
    ) -> Self {
        self.view_attributes.push(Param::new(name, annotation, default));
        self
    }

    /// Attaches a plugin. Plugins run in the order they are attached, pre
    /// plugins first.
    pub fn plugin(mut self, manager: PluginManager) -> Self {
        self.plugins.push(manager);
        self
    }

    /// Sets the registry used to resolve named model annotations.
    pub fn models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Compiles and checks the route.
    ///
    /// Every declaration problem surfaces here: unknown annotations,
    /// circular dependencies, return type mismatches, invalid values (unless
    /// the pre-check is deferred by configuration) and plugin hook failures.
    pub fn build(self, config: &WardenConfig) -> WardenResult<Route> {
        let id = RouteId::new();
        let tip = config.tip.style();
        let options = CompileOptions {
            detect_cycles: config.resolution.detect_cycles,
            max_depth: config.resolution.max_depth,
            tip,
        };
        let rules = RuleCompiler::new(&self.models, options).compile(
            &self.signature,
            &self.pre_depends,
            &self.view_attributes,
        )?;
        debug!(route = %id, handler = %rules.handler.qualname, "rules compiled");

        let engine = Arc::new(Engine::new(
            rules,
            EngineOptions {
                tip,
                ignore_pre_check: config.precheck.ignore_pre_check,
            },
        )?);

        let meta = RouteMeta::new(id, engine.rules());
        let plugins = self
            .plugins
            .iter()
            .map(|manager| manager.build(&meta).map_err(WardenError::from))
            .collect::<WardenResult<Vec<_>>>()?;

        let chain = Chain::builder(id, Arc::clone(&engine), self.handler)
            .plugins(plugins)
            .build();
        info!(
            route = %id,
            handler = %engine.rules().handler.qualname,
            stages = chain.stage_names().len(),
            "route registered"
        );
        Ok(Route { chain })
    }
}

/// A registered route.
#[derive(Debug)]
pub struct Route {
    chain: Chain,
}

impl Route {
    /// The route identifier plugins are checked against.
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.chain.route()
    }

    /// The compiled rules.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleSet> {
        self.chain.engine().rules()
    }

    /// Stage names in execution order, `engine` marking where parameters
    /// are resolved.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.chain.stage_names()
    }

    /// Handles one request.
    pub async fn call(&self, accessor: &dyn RequestAccessor) -> WardenResult<Value> {
        self.chain.call(accessor).await
    }

    /// Handles one request on the current thread.
    pub fn call_sync(&self, accessor: &dyn RequestAccessor) -> WardenResult<Value> {
        self.chain.call_sync(accessor)
    }

    /// Describes the route for documentation generators.
    #[must_use]
    pub fn describe(&self) -> RouteDoc {
        RouteDoc {
            route: self.id(),
            stages: self.stage_names(),
            description: self.rules().describe(),
        }
    }
}

/// Serializable route metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDoc {
    /// Route identifier
    pub route: RouteId,
    /// Stage names in execution order
    pub stages: Vec<&'static str>,
    /// Handler, parameters and dependencies
    #[serde(flatten)]
    pub description: RouteDescription,
}
