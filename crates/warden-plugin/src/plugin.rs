//! The plugin trait and the `Next` continuation.
//!
//! A plugin wraps the rest of a route's chain. Pre plugins run before
//! parameter resolution and see only the raw request; post plugins run
//! after it and see the resolved call arguments. Each plugin decides
//! whether to continue by calling [`Next::run`] (or [`Next::run_sync`])
//! exactly once, or to short-circuit by returning its own result.

use crate::handler::Handler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use warden_core::{BoxFuture, CallArgs, RequestAccessor, RouteId, WardenError, WardenResult};
use warden_param::Engine;

/// Where a plugin sits relative to parameter resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginPosition {
    /// Before parameter resolution
    Pre,
    /// After parameter resolution, around the handler
    Post,
}

impl fmt::Display for PluginPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// One request travelling through a chain.
pub struct PluginCall<'a> {
    route: RouteId,
    accessor: &'a dyn RequestAccessor,
    args: Option<CallArgs>,
}

impl<'a> PluginCall<'a> {
    /// Starts a call for `route`.
    #[must_use]
    pub fn new(route: RouteId, accessor: &'a dyn RequestAccessor) -> Self {
        Self {
            route,
            accessor,
            args: None,
        }
    }

    /// The route being called.
    #[must_use]
    pub fn route(&self) -> RouteId {
        self.route
    }

    /// The raw request.
    #[must_use]
    pub fn accessor(&self) -> &'a dyn RequestAccessor {
        self.accessor
    }

    /// The resolved arguments; `None` before resolution.
    #[must_use]
    pub fn args(&self) -> Option<&CallArgs> {
        self.args.as_ref()
    }

    /// Mutable access to the resolved arguments.
    pub fn args_mut(&mut self) -> Option<&mut CallArgs> {
        self.args.as_mut()
    }

    /// Returns the resolved arguments, or an error naming `plugin` if the
    /// call has not been resolved yet.
    pub fn resolved(&self, plugin: &str) -> WardenResult<&CallArgs> {
        self.args.as_ref().ok_or_else(|| {
            WardenError::plugin(plugin, "arguments are only available to post plugins")
        })
    }

    pub(crate) fn with_args(mut self, args: CallArgs) -> Self {
        self.args = Some(args);
        self
    }

    fn take_args(&mut self) -> CallArgs {
        self.args.take().unwrap_or_default()
    }
}

impl fmt::Debug for PluginCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCall")
            .field("route", &self.route)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A stage of a route's chain.
///
/// # Example
///
/// ```
/// use serde_json::Value;
/// use warden_core::{BoxFuture, WardenResult};
/// use warden_plugin::{Next, Plugin, PluginCall, PluginPosition};
///
/// struct Envelope;
///
/// impl Plugin for Envelope {
///     fn name(&self) -> &'static str {
///         "envelope"
///     }
///
///     fn position(&self) -> PluginPosition {
///         PluginPosition::Post
///     }
///
///     fn process<'a>(&'a self, call: PluginCall<'a>, next: Next<'a>) -> BoxFuture<'a, WardenResult<Value>> {
///         Box::pin(async move {
///             let data = next.run(call).await?;
///             Ok(serde_json::json!({ "code": 0, "data": data }))
///         })
///     }
///
///     fn process_sync(&self, call: PluginCall<'_>, next: Next<'_>) -> WardenResult<Value> {
///         let data = next.run_sync(call)?;
///         Ok(serde_json::json!({ "code": 0, "data": data }))
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Where the plugin runs.
    fn position(&self) -> PluginPosition;

    /// Processes a call on the async path.
    fn process<'a>(&'a self, call: PluginCall<'a>, next: Next<'a>) -> BoxFuture<'a, WardenResult<Value>>;

    /// Processes a call on the blocking path.
    fn process_sync(&self, call: PluginCall<'_>, next: Next<'_>) -> WardenResult<Value>;
}

/// The rest of a chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Plugin {
        plugin: &'a dyn Plugin,
        next: Box<Next<'a>>,
    },
    Engine {
        engine: &'a Engine,
        next: Box<Next<'a>>,
    },
    Handler(&'a Handler),
}

impl<'a> Next<'a> {
    pub(crate) fn plugin(plugin: &'a dyn Plugin, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Plugin {
                plugin,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn engine(engine: &'a Engine, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Engine {
                engine,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn handler(handler: &'a Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Runs the rest of the chain.
    ///
    /// Consumes `self`, so it can only be called once.
    pub fn run(self, mut call: PluginCall<'a>) -> BoxFuture<'a, WardenResult<Value>> {
        match self.inner {
            NextInner::Plugin { plugin, next } => plugin.process(call, *next),
            NextInner::Engine { engine, next } => Box::pin(async move {
                let accessor = call.accessor();
                engine
                    .run(accessor, move |args| next.run(call.with_args(args)))
                    .await
            }),
            NextInner::Handler(handler) => {
                let args = call.take_args();
                handler.call(args)
            }
        }
    }

    /// Runs the rest of the chain on the calling thread.
    pub fn run_sync(self, mut call: PluginCall<'a>) -> WardenResult<Value> {
        match self.inner {
            NextInner::Plugin { plugin, next } => plugin.process_sync(call, *next),
            NextInner::Engine { engine, next } => {
                let accessor = call.accessor();
                engine.run_sync(accessor, move |args| next.run_sync(call.with_args(args)))
            }
            NextInner::Handler(handler) => handler.call_blocking(call.take_args()),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            NextInner::Plugin { plugin, .. } => write!(f, "Next(plugin {})", plugin.name()),
            NextInner::Engine { .. } => f.write_str("Next(engine)"),
            NextInner::Handler(_) => f.write_str("Next(handler)"),
        }
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plugin({})", self.name())
    }
}
