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

const NAME: &str = "at_most_one_of";

/// Groups of mutually exclusive columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtMostOneOfConfig {
    /// Group name to its columns
    pub groups: IndexMap<String, Vec<String>>,
}

impl AtMostOneOfConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `columns` to group `name`.
    pub fn group<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group = self.groups.entry(name.into()).or_default();
        for column in columns {
            let column = column.into();
            if !group.contains(&column) {
                group.push(column);
            }
        }
        self
    }
}

/// Factory for [`AtMostOneOfPlugin`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AtMostOneOfFactory;

impl PluginFactory for AtMostOneOfFactory {
    type Config = AtMostOneOfConfig;

    fn name(&self) -> &'static str {
        NAME
    }

    fn pre_check_hook(&self, config: &AtMostOneOfConfig, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        check_declared(NAME, route, config.groups.values().flatten())
    }

    fn pre_load_hook(&self, config: &mut AtMostOneOfConfig, route: &RouteMeta<'_>) -> Result<(), ConfigError> {
        for (param, extra) in route.extras() {
            if let ExtraParam::AtMostOneOf { group } = extra {
                let columns = config.groups.entry(group.clone()).or_default();
                if !columns.iter().any(|column| column == param) {
                    columns.push(param.to_string());
                }
            }
        }
        Ok(())
    }

    fn build(&self, config: AtMostOneOfConfig) -> Result<BoxedPlugin, ConfigError> {
        Ok(Arc::new(AtMostOneOfPlugin {
            groups: config.groups,
        }))
    }
}

/// Rejects calls where more than one column of a group is given.
#[derive(Debug, Clone)]
pub struct AtMostOneOfPlugin {
    groups: IndexMap<String, Vec<String>>,
}

impl AtMostOneOfPlugin {
    /// The loaded groups.
    #[must_use]
    pub fn groups(&self) -> &IndexMap<String, Vec<String>> {
        &self.groups
    }

    fn check(&self, args: &CallArgs) -> WardenResult<()> {
        for (group, columns) in &self.groups {
            let given: Vec<&str> = columns
                .iter()
                .filter(|column| is_given(args, column))
                .map(String::as_str)
                .collect();
            if given.len() > 1 {
                return Err(WardenError::plugin(
                    NAME,
                    format!("at most one of `{}` may be given (group `{group}`)", given.join("`, `")),
                ));
            }
        }
        Ok(())
    }
}

impl Plugin for AtMostOneOfPlugin {
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

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Resolved;

    #[test]
    fn test_one_given_passes() {
        let plugin = AtMostOneOfPlugin {
            groups: AtMostOneOfConfig::new().group("contact", ["email", "phone"]).groups,
        };
        let args = CallArgs::new()
            .with("email", Resolved::json("a@b.c"))
            .with("phone", Resolved::json(Value::Null));
        assert!(plugin.check(&args).is_ok());
    }

    #[test]
    fn test_two_given_fails() {
        let plugin = AtMostOneOfPlugin {
            groups: AtMostOneOfConfig::new().group("contact", ["email", "phone"]).groups,
        };
        let args = CallArgs::new()
            .with("email", Resolved::json("a@b.c"))
            .with("phone", Resolved::json("555"));
        let err = plugin.check(&args).unwrap_err();
        assert!(err.to_string().contains("`email`, `phone`"));
        assert!(err.to_string().contains("group `contact`"));
    }
}
