//! # Warden Plugin
//!
//! The plugin chain wrapping a route handler.
//!
//! A route's chain is `[pre plugins] -> engine -> [post plugins] -> handler`.
//! Pre plugins see the raw request; the engine resolves the handler's
//! arguments; post plugins see the resolved arguments and may reshape the
//! handler's return value.
//!
//! Plugins are given to a route through a [`PluginManager`], which binds a
//! [`PluginFactory`] to its configuration and runs its registration hooks.
//! Two policy plugins ship with the crate: [`RequiredPlugin`] and
//! [`AtMostOneOfPlugin`].

#![doc(html_root_url = "https://docs.rs/warden-plugin/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builtin;
mod chain;
mod handler;
mod manager;
mod plugin;

pub use builtin::{
    AtMostOneOfConfig, AtMostOneOfFactory, AtMostOneOfPlugin, RequiredConfig, RequiredFactory,
    RequiredPlugin,
};
pub use chain::{BoxedPlugin, Chain, ChainBuilder};
pub use handler::Handler;
pub use manager::{PluginFactory, PluginManager, RouteMeta};
pub use plugin::{Next, Plugin, PluginCall, PluginPosition};
