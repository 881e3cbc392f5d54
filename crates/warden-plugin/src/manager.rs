//! Plugin factories and the managers that bind them to routes.
//!
//! A [`PluginFactory`] describes *what* plugin to build and with which
//! typed configuration; a [`PluginManager`] is the unit a route is given.
//! When the route is registered the manager runs, in order:
//!
//! 1. `pre_check_hook` - validates the configuration against the route; runs
//!    at most once per route, later calls for the same route are no-ops
//! 2. `pre_load_hook` - derives runtime configuration from the route, e.g.
//!    by scanning its parameters for extra-param tags
//! 3. `build` - produces the plugin placed into the route's chain

use crate::chain::BoxedPlugin;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use warden_core::{ConfigError, RouteId};
use warden_field::ExtraParam;
use warden_param::RuleSet;

/// Read-only view of a route handed to plugin hooks.
#[derive(Debug, Clone, Copy)]
pub struct RouteMeta<'a> {
    id: RouteId,
    rules: &'a RuleSet,
}

impl<'a> RouteMeta<'a> {
    /// Creates a view of `rules` for route `id`.
    #[must_use]
    pub fn new(id: RouteId, rules: &'a RuleSet) -> Self {
        Self { id, rules }
    }

    /// The route id.
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// The compiled rules.
    #[must_use]
    pub fn rules(&self) -> &'a RuleSet {
        self.rules
    }

    /// Names of the handler's parameters, in declaration order.
    #[must_use]
    pub fn param_names(&self) -> Vec<&'a str> {
        self.rules.params.iter().map(|rule| rule.name.as_str()).collect()
    }

    /// Returns true if the handler has a parameter named `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.rules.param(name).is_some()
    }

    /// Every extra-param tag on the handler's parameters, with the name of
    /// the parameter carrying it.
    ///
    /// Nested rules are skipped: their values never reach the handler's
    /// arguments, which is what plugins check.
    pub fn extras(&self) -> impl Iterator<Item = (&'a str, &'a ExtraParam)> + 'a {
        self.rules
            .params
            .iter()
            .flat_map(|rule| rule.extras().iter().map(move |extra| (rule.name.as_str(), extra)))
    }
}

/// Builds a plugin for a route.
pub trait PluginFactory: Send + Sync + 'static {
    /// Build-time configuration.
    type Config: Clone + Send + Sync + 'static;

    /// Plugin name, used in errors.
    fn name(&self) -> &'static str;

    /// Validates `config` against the route.
    fn pre_check_hook(&self, config: &Self::Config, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        let _ = (config, route);
        Ok(())
    }

    /// Derives runtime configuration from the route.
    fn pre_load_hook(&self, config: &mut Self::Config, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        let _ = (config, route);
        Ok(())
    }

    /// Builds the plugin from the loaded configuration.
    fn build(&self, config: Self::Config) -> Result<BoxedPlugin, ConfigError>;
}

trait ErasedFactory: Send + Sync {
    fn name(&self) -> &'static str;
    fn pre_check(&self, route: &RouteMeta<'_>) -> Result<(), ConfigError>;
    fn load(&self, route: &RouteMeta<'_>) -> Result<BoxedPlugin, ConfigError>;
}

struct Bound<F: PluginFactory> {
    factory: F,
    config: F::Config,
}

impl<F: PluginFactory> ErasedFactory for Bound<F> {
    fn name(&self) -> &'static str {
        self.factory.name()
    }

    fn pre_check(&self, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        self.factory.pre_check_hook(&self.config, route)
    }

    fn load(&self, route: &RouteMeta<'_>) -> Result<BoxedPlugin, ConfigError> {
        let mut config = self.config.clone();
        self.factory.pre_load_hook(&mut config, route)?;
        self.factory.build(config)
    }
}

struct Prebuilt(BoxedPlugin);

impl ErasedFactory for Prebuilt {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn pre_check(&self, _route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        Ok(())
    }

    fn load(&self, _route: &RouteMeta<'_>) -> Result<BoxedPlugin, ConfigError> {
        Ok(Arc::clone(&self.0))
    }
}

/// A plugin factory bound to its configuration.
///
/// Managers are cheap to clone and may be shared between routes; the set of
/// routes already pre-checked is shared by the clones.
#[derive(Clone)]
pub struct PluginManager {
    factory: Arc<dyn ErasedFactory>,
    checked: Arc<Mutex<HashSet<RouteId>>>,
}

impl PluginManager {
    /// Binds `factory` to `config`.
    pub fn new<F: PluginFactory>(factory: F, config: F::Config) -> Self {
        Self::from_erased(Arc::new(Bound { factory, config }))
    }

    /// Wraps a ready plugin that needs no hooks.
    pub fn prebuilt(plugin: BoxedPlugin) -> Self {
        Self::from_erased(Arc::new(Prebuilt(plugin)))
    }

    fn from_erased(factory: Arc<dyn ErasedFactory>) -> Self {
        Self {
            factory,
            checked: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The plugin name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.factory.name()
    }

    /// Returns true if `route` already passed the pre-check.
    #[must_use]
    pub fn is_checked(&self, route: RouteId) -> bool {
        self.checked.lock().contains(&route)
    }

    /// Runs the factory's pre-check for `route`, once.
    ///
    /// A failed check is not remembered, so calling again reports the same
    /// error.
    pub fn pre_check_hook(&self, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        let mut checked = self.checked.lock();
        if checked.contains(&route.id()) {
            tracing::trace!(plugin = self.name(), route = %route.id(), "pre-check already done");
            return Ok(());
        }
        self.factory.pre_check(route)?;
        checked.insert(route.id());
        tracing::debug!(plugin = self.name(), route = %route.id(), "plugin pre-check passed");
        Ok(())
    }

    /// Pre-checks, loads and builds the plugin for `route`.
    pub fn build(&self, route: &RouteMeta<'_>) -> Result<BoxedPlugin, ConfigError> {
        self.pre_check_hook(route)?;
        let plugin = self.factory.load(route)?;
        tracing::debug!(
            plugin = plugin.name(),
            position = %plugin.position(),
            route = %route.id(),
            "plugin loaded"
        );
        Ok(plugin)
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin", &self.name())
            .field("checked_routes", &self.checked.lock().len())
            .finish()
    }
}
