//! Plugin chain builder.
//!
//! A chain is frozen at registration. Its stages run in this order:
//!
//! 1. pre plugins, in the order they were added
//! 2. the resolution engine, which resolves the call arguments
//! 3. post plugins, in the order they were added
//! 4. the handler
//!
//! Post plugins run inside the engine's scope, so resources yielded by
//! dependencies are still alive while they run and are released after the
//! outermost post plugin returns.

use crate::handler::Handler;
use crate::plugin::{Next, Plugin, PluginCall, PluginPosition};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use warden_core::{RequestAccessor, RouteId, WardenResult};
use warden_param::Engine;

/// A type-erased plugin that can be stored in a chain.
pub type BoxedPlugin = Arc<dyn Plugin>;

/// The frozen call stack of one route.
pub struct Chain {
    route: RouteId,
    pre: Vec<BoxedPlugin>,
    engine: Arc<Engine>,
    post: Vec<BoxedPlugin>,
    handler: Handler,
}

impl Chain {
    /// Creates a new chain builder.
    #[must_use]
    pub fn builder(route: RouteId, engine: Arc<Engine>, handler: Handler) -> ChainBuilder {
        ChainBuilder {
            route,
            engine,
            handler,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    /// The route this chain serves.
    #[must_use]
    pub fn route(&self) -> RouteId {
        self.route
    }

    /// The resolution engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Runs the chain for one request.
    pub async fn call(&self, accessor: &dyn RequestAccessor) -> WardenResult<Value> {
        let span = tracing::debug_span!("plugin_chain", route = %self.route);
        let call = PluginCall::new(self.route, accessor);
        self.build_next().run(call).instrument(span).await
    }

    /// Runs the chain for one request on the calling thread.
    pub fn call_sync(&self, accessor: &dyn RequestAccessor) -> WardenResult<Value> {
        let span = tracing::debug_span!("plugin_chain", route = %self.route);
        let _entered = span.enter();
        let call = PluginCall::new(self.route, accessor);
        self.build_next().run_sync(call)
    }

    fn build_next(&self) -> Next<'_> {
        let mut next = Next::handler(&self.handler);

        for plugin in self.post.iter().rev() {
            next = Next::plugin(plugin.as_ref(), next);
        }

        next = Next::engine(&self.engine, next);

        for plugin in self.pre.iter().rev() {
            next = Next::plugin(plugin.as_ref(), next);
        }

        next
    }

    /// Returns the names of all stages in call order; the engine appears as
    /// `engine`.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.pre.iter().map(|p| p.name()).collect();
        names.push("engine");
        names.extend(self.post.iter().map(|p| p.name()));
        names
    }

    /// Returns the number of plugins.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.pre.len() + self.post.len()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("route", &self.route)
            .field("stages", &self.stage_names())
            .field("handler", &self.handler)
            .finish()
    }
}

/// Builder for a [`Chain`].
pub struct ChainBuilder {
    route: RouteId,
    engine: Arc<Engine>,
    handler: Handler,
    pre: Vec<BoxedPlugin>,
    post: Vec<BoxedPlugin>,
}

impl ChainBuilder {
    /// Adds a plugin; it is placed by its [`PluginPosition`].
    pub fn plugin(mut self, plugin: BoxedPlugin) -> Self {
        match plugin.position() {
            PluginPosition::Pre => self.pre.push(plugin),
            PluginPosition::Post => self.post.push(plugin),
        }
        self
    }

    /// Adds several plugins.
    pub fn plugins(self, plugins: impl IntoIterator<Item = BoxedPlugin>) -> Self {
        plugins.into_iter().fold(self, Self::plugin)
    }

    /// Freezes the chain.
    #[must_use]
    pub fn build(self) -> Chain {
        tracing::debug!(
            route = %self.route,
            pre = self.pre.len(),
            post = self.post.len(),
            "plugin chain built"
        );
        Chain {
            route: self.route,
            pre: self.pre,
            engine: self.engine,
            post: self.post,
            handler: self.handler,
        }
    }
}
