//! # Warden Core
//!
//! Core types shared by every Warden crate.
//!
//! Warden resolves the arguments of a route handler from an incoming request:
//! each parameter declares where its value comes from (query string, header,
//! body, a nested dependency, ...) and the engine extracts, coerces, validates
//! and injects it before the handler runs. This crate holds the vocabulary
//! the other crates speak:
//!
//! - [`SourceKind`] - where a parameter value is read from
//! - [`Resolved`] / [`CallArgs`] - resolved values and assembled call arguments
//! - [`RequestAccessor`] - the capability a web-framework adapter provides
//! - [`Resource`] / [`AsyncResource`] - setup/teardown guards yielded by dependencies
//! - [`ClassView`] - class-based view instances receiving view-level fields
//! - [`WardenError`] / [`ConfigError`] - request-time and registration-time errors
//! - [`TipError`] - errors annotated with the declaration that caused them

#![doc(html_root_url = "https://docs.rs/warden-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod accessor;
mod error;
mod id;
mod resource;
mod source;
pub mod tip;
mod value;
mod view;

pub use accessor::{Access, BoxFuture, FileMap, Mapping, MaybeAsync, RequestAccessor, UploadedFile};
pub use error::{
    raise_multiple, ConfigError, ErrorCategory, ErrorDetails, MultiError, WardenError, WardenResult,
};
pub use id::RouteId;
pub use resource::{
    AsyncResource, AsyncScopedResource, ExitOutcome, Provided, Resource, ScopedResource,
};
pub use source::SourceKind;
pub use tip::{CallableInfo, CallableKind, ParamDeclaration, SourceLocation, TipError, TipStyle};
pub use value::{CallArgs, Resolved, TypeTag};
pub use view::{ClassView, ViewFields};
