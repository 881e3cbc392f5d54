//! Cross-field policy plugins.
//!
//! Both run after parameter resolution and read the resolved keyword
//! arguments. A parameter counts as given when it resolved to a value other
//! than JSON `null`.

mod at_most_one_of;
mod required;

pub use at_most_one_of::{AtMostOneOfConfig, AtMostOneOfFactory, AtMostOneOfPlugin};
pub use required::{RequiredConfig, RequiredFactory, RequiredPlugin};

use crate::manager::RouteMeta;
use warden_core::{CallArgs, ConfigError};

fn is_given(args: &CallArgs, name: &str) -> bool {
    args.get(name).is_some_and(|value| !value.is_null())
}

fn check_declared<'n>(
    plugin: &str,
    route: &RouteMeta<'_>,
    names: impl IntoIterator<Item = &'n String>,
) -> Result<(), ConfigError> {
    for name in names {
        if !route.declares(name) {
            return Err(ConfigError::Plugin {
                plugin: plugin.to_string(),
                message: format!(
                    "column `{name}` is not a parameter of `{}`",
                    route.rules().handler.qualname
                ),
            });
        }
    }
    Ok(())
}
