use super::{check_declared, is_given};
use crate::chain::BoxedPlugin;
use crate::manager::{PluginFactory, RouteMeta};
use crate::plugin::{Next, Plugin, PluginCall, PluginPosition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use warden_core::{BoxFuture, CallArgs, ConfigError, WardenError, WardenResult};
use warden_field::ExtraParam;

const NAME: &str = "required";

/// Columns that become mandatory once a main column is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredConfig {
    /// Main column to the columns it requires
    pub columns: IndexMap<String, Vec<String>>,
}

impl RequiredConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `dependents` whenever `main` is given.
    pub fn require<I, S>(mut self, main: impl Into<String>, dependents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.columns.entry(main.into()).or_default();
        for dependent in dependents {
            push_unique(entry, dependent.into());
        }
        self
    }
}

fn push_unique(columns: &mut Vec<String>, column: String) {
    if !columns.contains(&column) {
        columns.push(column);
    }
}

/// Factory for [`RequiredPlugin`].
///
/// Columns come from the configuration and from `Required` tags on the
/// handler's parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFactory;

impl PluginFactory for RequiredFactory {
    type Config = RequiredConfig;

    fn name(&self) -> &'static str {
        NAME
    }

    fn pre_check_hook(&self, config: &RequiredConfig, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        check_declared(NAME, route, config.columns.keys())?;
        check_declared(NAME, route, config.columns.values().flatten())
    }

    fn pre_load_hook(&self, config: &mut RequiredConfig, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        for (param, extra) in route.extras() {
            if let ExtraParam::Required { main_column } = extra {
                check_declared(NAME, route, [main_column])?;
                let entry = config.columns.entry(main_column.clone()).or_default();
                push_unique(entry, param.to_string());
            }
        }
        Ok(())
    }

    fn build(&self, config: RequiredConfig) -> Result<BoxedPlugin, ConfigError> {
        Ok(Arc::new(RequiredPlugin {
            columns: config.columns,
        }))
    }
}

/// Rejects calls where a main column is given but a column it requires is
/// not.
#[derive(Debug, Clone)]
pub struct RequiredPlugin {
    columns: IndexMap<String, Vec<String>>,
}

impl RequiredPlugin {
    /// The loaded columns.
    #[must_use]
    pub fn columns(&self) -> &IndexMap<String, Vec<String>> {
        &self.columns
    }

    fn check(&self, args: &CallArgs) -> WardenResult<()> {
        for (main, dependents) in &self.columns {
            if !is_given(args, main) {
                continue;
            }
            let missing: Vec<&str> = dependents
                .iter()
                .filter(|dependent| !is_given(args, dependent))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(WardenError::plugin(
                    NAME,
                    format!("`{}` required when `{main}` is given", missing.join("`, `")),
                ));
            }
        }
        Ok(())
    }
}

impl Plugin for RequiredPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn position(&self) -> PluginPosition {
        PluginPosition::Post
    }

    fn process<'a>(&'a self, call: PluginCall<'a>, next: Next<'a>) -> BoxFuture<'a, WardenResult<Value>> {
        Box::pin(async move {
            self.check(call.resolved(NAME)?)?;
            next.run(call).await
        })
    }

    fn process_sync(&self, call: PluginCall<'_>, next: Next<'_>) -> WardenResult<Value> {
        self.check(call.resolved(NAME)?)?;
        next.run_sync(call)
    }
}
