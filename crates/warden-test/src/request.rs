//! In-memory requests.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, Method};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use warden_core::{
    Access, ClassView, FileMap, Mapping, MaybeAsync, RequestAccessor, Resolved, SourceKind,
    UploadedFile, WardenError, WardenResult,
};

type ViewFactory = Arc<dyn Fn() -> Box<dyn ClassView> + Send + Sync>;

/// A request held in memory, readable by the resolution engine.
///
/// Wraps an `http::Request<Bytes>` plus the pieces a router would normally
/// provide: matched path parameters, parsed uploads and, for class-based
/// handlers, a view instance.
///
/// # Example
///
/// ```
/// use warden_core::RequestAccessor;
/// use warden_test::TestRequest;
///
/// let request = TestRequest::get("/users?page=2&tag=a&tag=b")
///     .header("X-Token", "secret")
///     .cookie("session", "abc")
///     .build()
///     .unwrap();
///
/// assert_eq!(request.query().unwrap()["page"], "2");
/// assert_eq!(request.header().unwrap()["x-token"], "secret");
/// assert_eq!(request.cookie().unwrap()["session"], "abc");
/// ```
#[derive(Clone)]
pub struct TestRequest {
    request: Arc<http::Request<Bytes>>,
    path: Mapping,
    files: FileMap,
    async_body: bool,
    view: Option<ViewFactory>,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Wraps an existing HTTP request.
    #[must_use]
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        Self {
            request: Arc::new(request),
            path: Mapping::new(),
            files: FileMap::new(),
            async_body: false,
            view: None,
        }
    }

    /// The underlying HTTP request.
    #[must_use]
    pub fn http(&self) -> &http::Request<Bytes> {
        &self.request
    }

    /// Returns true if body-like sources are served as pending futures.
    #[must_use]
    pub fn is_async_body(&self) -> bool {
        self.async_body
    }

    fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    fn content_type(&self) -> Option<&str> {
        self.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            let mime = ct.split(';').next().unwrap_or_default().trim();
            mime == "application/json" || mime.ends_with("+json")
        })
    }

    fn is_form(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }

    fn query_pairs(&self) -> WardenResult<Vec<(String, String)>> {
        let query = self.request.uri().query().unwrap_or_default();
        serde_urlencoded::from_str(query)
            .map_err(|e| WardenError::accessor(SourceKind::Query, e.to_string()))
    }

    fn form_pairs(&self) -> WardenResult<Vec<(String, String)>> {
        if !self.is_form() {
            return Ok(Vec::new());
        }
        serde_urlencoded::from_bytes(self.request.body())
            .map_err(|e| WardenError::accessor(SourceKind::Form, e.to_string()))
    }

    fn json_body(&self) -> WardenResult<Mapping> {
        let body = self.request.body();
        if body.is_empty() {
            return Ok(Mapping::new());
        }
        match serde_json::from_slice(body) {
            Ok(Value::Object(object)) => Ok(object.into_iter().collect()),
            Ok(other) => Err(WardenError::accessor(
                SourceKind::Body,
                format!("expected a JSON object, found {}", json_type(&other)),
            )),
            Err(e) => Err(WardenError::accessor(SourceKind::Body, e.to_string())),
        }
    }

    fn serve<T: Send + 'static>(&self, result: WardenResult<T>) -> Access<'_, T> {
        if self.async_body {
            MaybeAsync::pending(async move { result })
        } else {
            MaybeAsync::ready(result)
        }
    }
}

fn first_wins(pairs: Vec<(String, String)>) -> Mapping {
    let mut mapping = Mapping::new();
    for (key, value) in pairs {
        mapping.entry(key).or_insert(Value::String(value));
    }
    mapping
}

fn grouped(pairs: Vec<(String, String)>) -> Mapping {
    let mut mapping = Mapping::new();
    for (key, value) in pairs {
        if let Value::Array(values) = mapping
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            values.push(Value::String(value));
        }
    }
    mapping
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RequestAccessor for TestRequest {
    fn query(&self) -> WardenResult<Mapping> {
        self.query_pairs().map(first_wins)
    }

    fn header(&self) -> WardenResult<Mapping> {
        let headers = self.headers();
        let mut mapping = Mapping::new();
        for name in headers.keys() {
            let values = headers
                .get_all(name)
                .iter()
                .map(|value| {
                    value.to_str().map_err(|_| {
                        WardenError::accessor(
                            SourceKind::Header,
                            format!("header `{name}` is not valid text"),
                        )
                    })
                })
                .collect::<WardenResult<Vec<_>>>()?;
            mapping.insert(name.as_str().to_string(), Value::String(values.join(", ")));
        }
        Ok(mapping)
    }

    fn cookie(&self) -> WardenResult<Mapping> {
        let mut mapping = Mapping::new();
        for value in self.headers().get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                return Err(WardenError::accessor(SourceKind::Cookie, "cookie header is not valid text"));
            };
            for pair in value.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    mapping
                        .entry(name.trim().to_string())
                        .or_insert_with(|| Value::String(value.to_string()));
                }
            }
        }
        Ok(mapping)
    }

    fn path_params(&self) -> WardenResult<Mapping> {
        Ok(self.path.clone())
    }

    fn body(&self) -> Access<'_, Mapping> {
        let result = if self.is_form() {
            self.form_pairs().map(first_wins)
        } else if self.is_json() {
            self.json_body()
        } else {
            Ok(Mapping::new())
        };
        self.serve(result)
    }

    fn form(&self) -> Access<'_, Mapping> {
        self.serve(self.form_pairs().map(first_wins))
    }

    fn multiform(&self) -> Access<'_, Mapping> {
        self.serve(self.form_pairs().map(grouped))
    }

    fn multiquery(&self) -> Access<'_, Mapping> {
        self.serve(self.query_pairs().map(grouped))
    }

    fn files(&self) -> Access<'_, FileMap> {
        self.serve(Ok(self.files.clone()))
    }

    fn raw_request(&self) -> Resolved {
        Resolved::shared(Arc::clone(&self.request))
    }

    fn cbv_instance(&self) -> Option<Box<dyn ClassView>> {
        self.view.as_ref().map(|factory| factory())
    }
}

impl fmt::Debug for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRequest")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("path", &self.path)
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("async_body", &self.async_body)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TestRequest`].
///
/// Errors from individual steps are kept and reported by
/// [`build`](Self::build).
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Option<Bytes>,
    path: Mapping,
    files: FileMap,
    async_body: bool,
    view: Option<ViewFactory>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
            path: Mapping::new(),
            files: FileMap::new(),
            async_body: false,
            view: None,
            error: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and content type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.fail(TestError::Encode(e.to_string())),
        }
        self.content_type("application/json")
    }

    /// Sets a URL-encoded form body and content type.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => self.body = Some(Bytes::from(encoded)),
            Err(e) => self.fail(TestError::Encode(e.to_string())),
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Adds a matched path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Adds an uploaded file under form field `field`.
    pub fn file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }

    /// Serves body, form, multi-valued sources and files as pending futures.
    pub fn async_body(mut self) -> Self {
        self.async_body = true;
        self
    }

    /// Supplies a fresh `V` as the class-view instance of every call.
    pub fn view<V: ClassView + Default>(self) -> Self {
        self.view_with(|| Box::new(V::default()))
    }

    /// Supplies class-view instances from `factory`.
    pub fn view_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ClassView> + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(factory));
        self
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }

    /// Builds the request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut builder = http::Request::builder().method(self.method).uri(self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(self.body.unwrap_or_default())?;

        Ok(TestRequest {
            request: Arc::new(request),
            path: self.path,
            files: self.files,
            async_body: self.async_body,
            view: self.view,
        })
    }
}
