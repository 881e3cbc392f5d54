//! # Warden Param
//!
//! Parameter resolution for Warden: from declared signatures to call
//! arguments.
//!
//! - [`Signature`], [`Param`] and [`Dependency`] declare what a handler needs
//! - [`RuleCompiler`] turns declarations into a [`RuleSet`] at registration
//! - [`PreCheck`] validates the values a route carries before any request
//! - [`Engine`] runs a rule set against requests, sync or async, managing
//!   the resources dependencies hand out
//!
//! ## Example
//!
//! ```
//! use warden_core::{Access, Mapping, MaybeAsync, RequestAccessor, WardenResult};
//! use warden_field::{Annotation, Field, ModelRegistry};
//! use warden_param::{CompileOptions, Engine, EngineOptions, RuleCompiler, Signature};
//!
//! struct Query(Mapping);
//!
//! impl RequestAccessor for Query {
//!     fn query(&self) -> WardenResult<Mapping> { Ok(self.0.clone()) }
//!     fn header(&self) -> WardenResult<Mapping> { Ok(Mapping::new()) }
//!     fn cookie(&self) -> WardenResult<Mapping> { Ok(Mapping::new()) }
//!     fn path_params(&self) -> WardenResult<Mapping> { Ok(Mapping::new()) }
//!     fn body(&self) -> Access<'_, Mapping> { MaybeAsync::ready(Ok(Mapping::new())) }
//! }
//!
//! let signature = Signature::new("demo")
//!     .param("demo_value", Annotation::String, Field::query().default("123"));
//! let rules = RuleCompiler::new(&ModelRegistry::new(), CompileOptions::default())
//!     .compile_signature(&signature)?;
//! let engine = Engine::new(rules, EngineOptions::default())?;
//!
//! let value: String = engine.run_sync(&Query(Mapping::new()), |args| args.value("demo_value"))?;
//! assert_eq!(value, "123");
//! # Ok::<(), warden_core::WardenError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/warden-param/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod compiler;
pub mod context;
mod dependency;
mod engine;
pub mod precheck;
pub mod rule;
mod signature;

pub use compiler::{CompileOptions, RuleCompiler, DEFAULT_MAX_DEPTH};
pub use context::{EngineState, ResolutionContext};
pub use dependency::{Dependency, DependencyId};
pub use engine::{Engine, EngineOptions};
pub use precheck::{PreCheck, PrecheckFailure};
pub use rule::{
    CompiledDependency, DependencyDescription, ParamDescription, ParamRule, RouteDescription,
    RuleKind, RuleSet,
};
pub use signature::{Param, ParamDefault, Signature};
