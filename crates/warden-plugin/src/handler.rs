//! The route handler at the end of a chain.

use futures::future::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use warden_core::{BoxFuture, CallArgs, WardenError, WardenResult};

type SyncFn = Arc<dyn Fn(CallArgs) -> anyhow::Result<Value> + Send + Sync>;
type AsyncFn = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A route handler, sync or async.
///
/// Errors returned by the handler that already are a [`WardenError`] pass
/// through unchanged; anything else becomes [`WardenError::Handler`].
#[derive(Clone)]
pub enum Handler {
    /// Runs on the calling thread
    Sync(SyncFn),
    /// Returns a future
    Async(AsyncFn),
}

impl Handler {
    /// Wraps a blocking handler.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(CallArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an async handler.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| f(args).boxed()))
    }

    /// Returns true for async handlers.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Calls the handler.
    pub fn call(&self, args: CallArgs) -> BoxFuture<'static, WardenResult<Value>> {
        match self {
            Self::Sync(f) => {
                let result = f(args).map_err(into_warden);
                Box::pin(futures::future::ready(result))
            }
            Self::Async(f) => {
                let future = f(args);
                Box::pin(async move { future.await.map_err(into_warden) })
            }
        }
    }

    /// Calls the handler on the calling thread, blocking on async handlers.
    pub fn call_blocking(&self, args: CallArgs) -> WardenResult<Value> {
        match self {
            Self::Sync(f) => f(args).map_err(into_warden),
            Self::Async(f) => futures::executor::block_on(f(args)).map_err(into_warden),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

fn into_warden(error: anyhow::Error) -> WardenError {
    match error.downcast::<WardenError>() {
        Ok(error) => error,
        Err(error) => WardenError::handler(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ErrorCategory, Resolved};

    #[test]
    fn test_sync_handler_receives_args() {
        let handler = Handler::sync(|args: CallArgs| {
            Ok(args
                .get("a")
                .and_then(Resolved::as_json)
                .cloned()
                .unwrap_or(Value::Null))
        });
        let args = CallArgs::new().with("a", Resolved::json(5));
        assert_eq!(handler.call_blocking(args).unwrap(), Value::from(5));
        assert!(!handler.is_async());
    }

    #[tokio::test]
    async fn test_async_handler() {
        let handler = Handler::asynchronous(|_args| async { Ok(Value::from("done")) });
        assert!(handler.is_async());
        assert_eq!(handler.call(CallArgs::new()).await.unwrap(), Value::from("done"));
    }

    #[test]
    fn test_error_mapping() {
        let plain = Handler::sync(|_| Err(anyhow::anyhow!("boom")));
        let err = plain.call_blocking(CallArgs::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Handler);

        let passthrough = Handler::sync(|_| Err(WardenError::plugin("x", "denied").into()));
        let err = passthrough.call_blocking(CallArgs::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Plugin);
    }
}
