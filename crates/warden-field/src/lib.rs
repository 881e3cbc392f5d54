//! # Warden Field
//!
//! Field descriptors: the declarative markers attached to a parameter that
//! say where its value comes from and which rules it must satisfy.
//!
//! ```
//! use warden_field::{Annotation, Field};
//!
//! let page = Field::query().default(1).ge(1).le(100);
//! assert_eq!(page.resolve_alias_or_name("page"), "page");
//!
//! let token = Field::header().alias("X-Token");
//! assert_eq!(token.resolve_alias_or_name("token"), "X-Token");
//!
//! let user_agent = Field::header();
//! assert_eq!(user_agent.resolve_alias_or_name("user_agent"), "user-agent");
//! # let _ = Annotation::Integer;
//! ```
//!
//! The crate also holds the type vocabulary descriptors are checked against
//! ([`Annotation`]), structured request models ([`ModelSchema`]) and the
//! closed set of plugin tags a field may carry ([`ExtraParam`]).

#![doc(html_root_url = "https://docs.rs/warden-field/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod annotation;
mod coerce;
mod constraint;
mod extra;
mod field;
mod model;

pub use annotation::Annotation;
pub use constraint::{Constraints, Violation};
pub use extra::ExtraParam;
pub use field::{DefaultFactory, Field, FieldDescription, NotFoundFactory};
pub use model::{ModelField, ModelRegistry, ModelSchema};
