//! # Warden Test
//!
//! Test utilities for Warden.
//!
//! [`TestRequest`] is a [`RequestAccessor`](warden_core::RequestAccessor)
//! backed by an in-memory `http::Request`. It lets routes be called
//! without a web framework, and doubles as a reference for adapter authors:
//! query strings and form bodies are decoded with `serde_urlencoded`, JSON
//! bodies with `serde_json`, and cookies are read from the `Cookie` header.
//!
//! ```
//! use serde_json::json;
//! use warden_core::RequestAccessor;
//! use warden_test::TestRequest;
//!
//! let request = TestRequest::post("/users")
//!     .json(&json!({ "name": "Alice" }))
//!     .async_body()
//!     .build()
//!     .unwrap();
//!
//! // Body-like sources are now pending futures.
//! assert!(!request.body().is_ready());
//! ```

#![doc(html_root_url = "https://docs.rs/warden-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod request;

pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
