//! Parameter source kinds.
//!
//! Every resolvable parameter reads its value from exactly one
//! [`SourceKind`]. The set is closed and matched exhaustively by the
//! resolution engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a parameter value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Query string parameters
    Query,
    /// HTTP headers (case-insensitive keys)
    Header,
    /// Cookies
    Cookie,
    /// Path parameters (e.g., `/users/{id}`)
    Path,
    /// Request body mapping
    Body,
    /// JSON request body, read through the body accessor
    Json,
    /// URL-encoded or multipart form fields
    Form,
    /// Multi-valued form fields
    MultiForm,
    /// Multi-valued query parameters
    MultiQuery,
    /// Uploaded files
    File,
    /// A nested dependency
    Depends,
}

impl SourceKind {
    /// All source kinds, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Query,
        Self::Header,
        Self::Cookie,
        Self::Path,
        Self::Body,
        Self::Json,
        Self::Form,
        Self::MultiForm,
        Self::MultiQuery,
        Self::File,
        Self::Depends,
    ];

    /// Returns the lowercase wire name (`"query"`, `"multiform"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Path => "path",
            Self::Body => "body",
            Self::Json => "json",
            Self::Form => "form",
            Self::MultiForm => "multiform",
            Self::MultiQuery => "multiquery",
            Self::File => "file",
            Self::Depends => "depends",
        }
    }

    /// Returns the descriptor name used when rendering declarations,
    /// e.g. `Query` in `uid: int = Query(...)`.
    #[must_use]
    pub const fn descriptor_name(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Header => "Header",
            Self::Cookie => "Cookie",
            Self::Path => "Path",
            Self::Body => "Body",
            Self::Json => "Json",
            Self::Form => "Form",
            Self::MultiForm => "MultiForm",
            Self::MultiQuery => "MultiQuery",
            Self::File => "File",
            Self::Depends => "Depends",
        }
    }

    /// Returns true for sources that yield a list per key.
    #[must_use]
    pub const fn is_multi(self) -> bool {
        matches!(self, Self::MultiForm | Self::MultiQuery)
    }

    /// Returns true if the source's accessor may be asynchronous.
    #[must_use]
    pub const fn may_suspend(self) -> bool {
        matches!(
            self,
            Self::Body | Self::Json | Self::Form | Self::MultiForm | Self::MultiQuery | Self::File
        )
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
