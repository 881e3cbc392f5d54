//! The request accessor capability.
//!
//! Web-framework adapters implement [`RequestAccessor`] to expose the parts
//! of a request the resolution engine reads. Sources that may require
//! reading the request body return [`MaybeAsync`], so one accessor serves
//! both the async engine (which awaits) and the sync engine (which blocks).

use crate::error::WardenError;
use crate::value::Resolved;
use crate::view::ClassView;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A raw source mapping, e.g. parsed query parameters.
pub type Mapping = IndexMap<String, Value>;

/// Uploaded files keyed by form field name.
pub type FileMap = IndexMap<String, UploadedFile>;

/// A value that is either available now or must be awaited.
pub enum MaybeAsync<'a, T> {
    /// The value is available immediately
    Ready(T),
    /// The value is produced by a future
    Pending(BoxFuture<'a, T>),
}

/// The result of an accessor call that may suspend.
pub type Access<'a, T> = MaybeAsync<'a, Result<T, WardenError>>;

impl<'a, T> MaybeAsync<'a, T> {
    /// Wraps an immediately available value.
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    /// Wraps a future.
    pub fn pending(future: impl Future<Output = T> + Send + 'a) -> Self {
        Self::Pending(Box::pin(future))
    }

    /// Returns true if no await is needed.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Produces the value, awaiting if necessary.
    pub async fn resolve(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }

    /// Produces the value, blocking the calling thread if necessary.
    ///
    /// Must not be called from inside an async runtime worker when the
    /// future depends on that runtime making progress.
    pub fn block(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => futures::executor::block_on(future),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MaybeAsync<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A file uploaded with a multipart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied file name
    pub filename: String,
    /// Declared content type, if any
    pub content_type: Option<String>,
    /// File contents
    #[serde(skip)]
    pub data: Bytes,
}

impl UploadedFile {
    /// Creates an uploaded file.
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the size of the contents in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-request access to request data, provided by a framework adapter.
///
/// Header mappings may use any key case; the engine looks header keys up
/// case-insensitively. Multi-valued sources map each key to a JSON array.
pub trait RequestAccessor: Send + Sync {
    /// Parsed query string parameters.
    fn query(&self) -> Result<Mapping, WardenError>;

    /// Request headers.
    fn header(&self) -> Result<Mapping, WardenError>;

    /// Request cookies.
    fn cookie(&self) -> Result<Mapping, WardenError>;

    /// Matched path parameters.
    fn path_params(&self) -> Result<Mapping, WardenError>;

    /// The decoded request body.
    fn body(&self) -> Access<'_, Mapping>;

    /// Form fields.
    fn form(&self) -> Access<'_, Mapping> {
        MaybeAsync::ready(Ok(Mapping::new()))
    }

    /// Multi-valued form fields.
    fn multiform(&self) -> Access<'_, Mapping> {
        MaybeAsync::ready(Ok(Mapping::new()))
    }

    /// Multi-valued query parameters.
    fn multiquery(&self) -> Access<'_, Mapping> {
        MaybeAsync::ready(Ok(Mapping::new()))
    }

    /// Uploaded files.
    fn files(&self) -> Access<'_, FileMap> {
        MaybeAsync::ready(Ok(FileMap::new()))
    }

    /// The framework's own request object, for handlers that declare it.
    fn raw_request(&self) -> Resolved {
        Resolved::null()
    }

    /// A fresh class-view instance, for class-based handlers.
    fn cbv_instance(&self) -> Option<Box<dyn ClassView>> {
        None
    }
}
