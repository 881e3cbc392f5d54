//! Resource guards yielded by dependencies.
//!
//! A dependency may hand back a guard instead of a plain value. The engine
//! enters the guard, injects the entered value, and exits the guard after
//! the handler (and every post-processing step) has finished. Guards are
//! exited in reverse acquisition order whether or not the request failed.

use crate::value::Resolved;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;

/// How the guarded scope ended, passed to [`Resource::exit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The request completed successfully
    Completed,
    /// The request failed with the given error message
    Failed(String),
    /// The request was dropped before completing
    Cancelled,
}

impl ExitOutcome {
    /// Returns true unless the scope completed successfully.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A synchronous setup/teardown guard.
pub trait Resource: Send {
    /// Acquires the resource and returns the value to inject.
    fn enter(&mut self) -> anyhow::Result<Resolved>;

    /// Releases the resource.
    fn exit(&mut self, outcome: &ExitOutcome) -> anyhow::Result<()>;
}

/// An asynchronous setup/teardown guard.
#[async_trait]
pub trait AsyncResource: Send {
    /// Acquires the resource and returns the value to inject.
    async fn enter(&mut self) -> anyhow::Result<Resolved>;

    /// Releases the resource.
    async fn exit(&mut self, outcome: ExitOutcome) -> anyhow::Result<()>;
}

/// A [`Resource`] built from an enter closure and an exit closure.
///
/// # Example
///
/// ```
/// use warden_core::{ExitOutcome, Resolved, Resource, ScopedResource};
///
/// let mut guard = ScopedResource::new(
///     || Ok(Resolved::json(42)),
///     |_outcome: &ExitOutcome| Ok(()),
/// );
/// assert_eq!(guard.enter().unwrap(), Resolved::json(42));
/// guard.exit(&ExitOutcome::Completed).unwrap();
/// ```
pub struct ScopedResource<E, X> {
    enter: Option<E>,
    exit: Option<X>,
}

impl<E, X> ScopedResource<E, X>
where
    E: FnOnce() -> anyhow::Result<Resolved> + Send,
    X: FnOnce(&ExitOutcome) -> anyhow::Result<()> + Send,
{
    /// Creates a guard from its two halves.
    pub fn new(enter: E, exit: X) -> Self {
        Self {
            enter: Some(enter),
            exit: Some(exit),
        }
    }
}

impl<E, X> Resource for ScopedResource<E, X>
where
    E: FnOnce() -> anyhow::Result<Resolved> + Send,
    X: FnOnce(&ExitOutcome) -> anyhow::Result<()> + Send,
{
    fn enter(&mut self) -> anyhow::Result<Resolved> {
        let enter = self
            .enter
            .take()
            .ok_or_else(|| anyhow::anyhow!("resource was already entered"))?;
        enter()
    }

    fn exit(&mut self, outcome: &ExitOutcome) -> anyhow::Result<()> {
        let exit = self
            .exit
            .take()
            .ok_or_else(|| anyhow::anyhow!("resource was already exited"))?;
        exit(outcome)
    }
}

/// An [`AsyncResource`] built from closures returning futures.
pub struct AsyncScopedResource<E, X> {
    enter: Option<E>,
    exit: Option<X>,
}

impl<E, EF, X, XF> AsyncScopedResource<E, X>
where
    E: FnOnce() -> EF + Send,
    EF: Future<Output = anyhow::Result<Resolved>> + Send,
    X: FnOnce(ExitOutcome) -> XF + Send,
    XF: Future<Output = anyhow::Result<()>> + Send,
{
    /// Creates a guard from its two halves.
    pub fn new(enter: E, exit: X) -> Self {
        Self {
            enter: Some(enter),
            exit: Some(exit),
        }
    }
}

#[async_trait]
impl<E, EF, X, XF> AsyncResource for AsyncScopedResource<E, X>
where
    E: FnOnce() -> EF + Send,
    EF: Future<Output = anyhow::Result<Resolved>> + Send,
    X: FnOnce(ExitOutcome) -> XF + Send,
    XF: Future<Output = anyhow::Result<()>> + Send,
{
    async fn enter(&mut self) -> anyhow::Result<Resolved> {
        let enter = self
            .enter
            .take()
            .ok_or_else(|| anyhow::anyhow!("resource was already entered"))?;
        enter().await
    }

    async fn exit(&mut self, outcome: ExitOutcome) -> anyhow::Result<()> {
        let exit = self
            .exit
            .take()
            .ok_or_else(|| anyhow::anyhow!("resource was already exited"))?;
        exit(outcome).await
    }
}

/// What a dependency callable hands back to the engine.
pub enum Provided {
    /// A plain value, injected as is
    Value(Resolved),
    /// A guard to enter now and exit after the request
    Resource(Box<dyn Resource>),
    /// An async guard to enter now and exit after the request
    AsyncResource(Box<dyn AsyncResource>),
}

impl Provided {
    /// Provides a JSON value.
    pub fn json(value: impl Into<Value>) -> Self {
        Self::Value(Resolved::json(value))
    }

    /// Provides a Rust object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Resolved::object(value))
    }

    /// Provides a synchronous guard.
    pub fn resource(resource: impl Resource + 'static) -> Self {
        Self::Resource(Box::new(resource))
    }

    /// Provides an asynchronous guard.
    pub fn async_resource(resource: impl AsyncResource + 'static) -> Self {
        Self::AsyncResource(Box::new(resource))
    }
}

impl From<Resolved> for Provided {
    fn from(value: Resolved) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Provided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Resource(_) => f.write_str("Resource(..)"),
            Self::AsyncResource(_) => f.write_str("AsyncResource(..)"),
        }
    }
}
