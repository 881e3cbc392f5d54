//! Per-request resolution state.
//!
//! A [`ResolutionContext`] belongs to exactly one in-flight request. It
//! caches every source mapping it reads, so each accessor runs at most once
//! per request, and tracks the resource guards entered on behalf of
//! dependencies so they can be released in reverse acquisition order.
//!
//! If the context is dropped with guards still held (a cancelled request
//! future, for instance) the guards are released from `Drop` with
//! [`ExitOutcome::Cancelled`].

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};
use warden_core::{
    raise_multiple, Access, AsyncResource, ExitOutcome, FileMap, Mapping, MaybeAsync, Provided,
    RequestAccessor, Resolved, Resource, SourceKind, WardenError, WardenResult,
};

/// Metric counting failed resource releases.
pub const RELEASE_FAILURES_METRIC: &str = "warden_resource_release_failures_total";

/// Metric counting failed resolutions, labelled by error category.
pub const RESOLUTION_FAILURES_METRIC: &str = "warden_resolution_failures_total";

/// Where a request is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Nothing resolved yet
    NotStarted,
    /// Resolving route-wide pre-depends
    ResolvingPreDepends,
    /// Resolving the handler's parameters
    ResolvingParameters,
    /// Resolving class-view attributes
    ResolvingViewAttributes,
    /// Calling the handler (or the rest of the plugin chain)
    Invoking,
    /// Releasing resource guards
    ReleasingResources,
    /// Finished without error
    Succeeded,
    /// Finished with an error
    Failed,
}

impl EngineState {
    /// Returns the snake_case name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ResolvingPreDepends => "resolving_pre_depends",
            Self::ResolvingParameters => "resolving_parameters",
            Self::ResolvingViewAttributes => "resolving_view_attributes",
            Self::Invoking => "invoking",
            Self::ReleasingResources => "releasing_resources",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Returns true once the request has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Tracked {
    Sync {
        owner: String,
        guard: Box<dyn Resource>,
    },
    Async {
        owner: String,
        guard: Box<dyn AsyncResource>,
    },
}

impl Tracked {
    fn owner(&self) -> &str {
        match self {
            Self::Sync { owner, .. } | Self::Async { owner, .. } => owner,
        }
    }

    fn release_blocking(self, outcome: &ExitOutcome) -> WardenResult<()> {
        match self {
            Self::Sync { owner, mut guard } => guard
                .exit(outcome)
                .map_err(|e| release_failed(&owner, e)),
            Self::Async { owner, mut guard } => {
                futures::executor::block_on(guard.exit(outcome.clone()))
                    .map_err(|e| release_failed(&owner, e))
            }
        }
    }

    async fn release(self, outcome: &ExitOutcome) -> WardenResult<()> {
        match self {
            Self::Sync { owner, mut guard } => guard
                .exit(outcome)
                .map_err(|e| release_failed(&owner, e)),
            Self::Async { owner, mut guard } => guard
                .exit(outcome.clone())
                .await
                .map_err(|e| release_failed(&owner, e)),
        }
    }
}

fn release_failed(owner: &str, error: anyhow::Error) -> WardenError {
    warn!(dependency = %owner, error = %error, "resource release failed");
    metrics::counter!(RELEASE_FAILURES_METRIC).increment(1);
    WardenError::resource(owner, error)
}

fn cache_key(kind: SourceKind) -> SourceKind {
    match kind {
        SourceKind::Json => SourceKind::Body,
        other => other,
    }
}

/// Request-scoped state of one resolution.
pub struct ResolutionContext<'r> {
    accessor: &'r dyn RequestAccessor,
    cache: HashMap<SourceKind, Mapping>,
    files: Option<FileMap>,
    resources: Vec<Tracked>,
    state: EngineState,
}

impl<'r> ResolutionContext<'r> {
    /// Creates a context reading from `accessor`.
    #[must_use]
    pub fn new(accessor: &'r dyn RequestAccessor) -> Self {
        Self {
            accessor,
            cache: HashMap::new(),
            files: None,
            resources: Vec::new(),
            state: EngineState::NotStarted,
        }
    }

    /// The request accessor.
    #[must_use]
    pub fn accessor(&self) -> &'r dyn RequestAccessor {
        self.accessor
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: EngineState) {
        debug!(from = %self.state, to = %state, "resolution state");
        self.state = state;
    }

    /// Number of resource guards currently held.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Owners of the held guards, in acquisition order.
    #[must_use]
    pub fn resource_owners(&self) -> Vec<&str> {
        self.resources.iter().map(Tracked::owner).collect()
    }

    fn read(&self, kind: SourceKind) -> Access<'r, Mapping> {
        let accessor = self.accessor;
        match kind {
            SourceKind::Query => MaybeAsync::ready(accessor.query()),
            SourceKind::Header => MaybeAsync::ready(accessor.header()),
            SourceKind::Cookie => MaybeAsync::ready(accessor.cookie()),
            SourceKind::Path => MaybeAsync::ready(accessor.path_params()),
            SourceKind::Body | SourceKind::Json => accessor.body(),
            SourceKind::Form => accessor.form(),
            SourceKind::MultiForm => accessor.multiform(),
            SourceKind::MultiQuery => accessor.multiquery(),
            SourceKind::File | SourceKind::Depends => MaybeAsync::ready(Err(
                WardenError::accessor(kind, "not a mapping source"),
            )),
        }
    }

    /// Returns the mapping of a source, reading it on first use.
    pub async fn mapping(&mut self, kind: SourceKind) -> WardenResult<&Mapping> {
        let key = cache_key(kind);
        if !self.cache.contains_key(&key) {
            let loaded = self.read(key).resolve().await?;
            debug!(source = %key, keys = loaded.len(), "read request source");
            self.cache.insert(key, loaded);
        }
        Ok(&self.cache[&key])
    }

    /// Blocking variant of [`mapping`](Self::mapping).
    pub fn mapping_blocking(&mut self, kind: SourceKind) -> WardenResult<&Mapping> {
        let key = cache_key(kind);
        if !self.cache.contains_key(&key) {
            let loaded = self.read(key).block()?;
            debug!(source = %key, keys = loaded.len(), "read request source");
            self.cache.insert(key, loaded);
        }
        Ok(&self.cache[&key])
    }

    /// Returns the uploaded files, reading them on first use.
    pub async fn files(&mut self) -> WardenResult<&FileMap> {
        if self.files.is_none() {
            self.files = Some(self.accessor.files().resolve().await?);
        }
        Ok(self.files.get_or_insert_with(FileMap::new))
    }

    /// Blocking variant of [`files`](Self::files).
    pub fn files_blocking(&mut self) -> WardenResult<&FileMap> {
        if self.files.is_none() {
            self.files = Some(self.accessor.files().block()?);
        }
        Ok(self.files.get_or_insert_with(FileMap::new))
    }

    /// Turns what a dependency provided into the value to inject, entering
    /// and tracking resource guards.
    ///
    /// A guard whose `enter` fails is not tracked.
    pub async fn enter(&mut self, owner: &str, provided: Provided) -> WardenResult<Resolved> {
        match provided {
            Provided::Value(value) => Ok(value),
            Provided::Resource(mut guard) => {
                let value = guard
                    .enter()
                    .map_err(|e| WardenError::dependency(owner, e))?;
                self.track(Tracked::Sync {
                    owner: owner.to_string(),
                    guard,
                });
                Ok(value)
            }
            Provided::AsyncResource(mut guard) => {
                let value = guard
                    .enter()
                    .await
                    .map_err(|e| WardenError::dependency(owner, e))?;
                self.track(Tracked::Async {
                    owner: owner.to_string(),
                    guard,
                });
                Ok(value)
            }
        }
    }

    /// Blocking variant of [`enter`](Self::enter).
    pub fn enter_blocking(&mut self, owner: &str, provided: Provided) -> WardenResult<Resolved> {
        match provided {
            Provided::Value(value) => Ok(value),
            Provided::Resource(mut guard) => {
                let value = guard
                    .enter()
                    .map_err(|e| WardenError::dependency(owner, e))?;
                self.track(Tracked::Sync {
                    owner: owner.to_string(),
                    guard,
                });
                Ok(value)
            }
            Provided::AsyncResource(mut guard) => {
                let value = futures::executor::block_on(guard.enter())
                    .map_err(|e| WardenError::dependency(owner, e))?;
                self.track(Tracked::Async {
                    owner: owner.to_string(),
                    guard,
                });
                Ok(value)
            }
        }
    }

    fn track(&mut self, tracked: Tracked) {
        debug!(dependency = %tracked.owner(), depth = self.resources.len() + 1, "resource acquired");
        self.resources.push(tracked);
    }

    /// Releases every held guard, last acquired first, and returns the
    /// release failures.
    pub async fn release(&mut self, outcome: &ExitOutcome) -> Vec<WardenError> {
        self.set_state(EngineState::ReleasingResources);
        let mut errors = Vec::new();
        while let Some(tracked) = self.resources.pop() {
            if let Err(error) = tracked.release(outcome).await {
                errors.push(error);
            }
        }
        errors
    }

    /// Blocking variant of [`release`](Self::release).
    pub fn release_blocking(&mut self, outcome: &ExitOutcome) -> Vec<WardenError> {
        self.set_state(EngineState::ReleasingResources);
        let mut errors = Vec::new();
        while let Some(tracked) = self.resources.pop() {
            if let Err(error) = tracked.release_blocking(outcome) {
                errors.push(error);
            }
        }
        errors
    }

    /// Releases every held guard and merges release failures into `result`.
    pub async fn finish<T>(&mut self, result: WardenResult<T>) -> WardenResult<T> {
        let outcome = outcome_of(&result);
        let errors = self.release(&outcome).await;
        self.settle(result, errors)
    }

    /// Blocking variant of [`finish`](Self::finish).
    pub fn finish_blocking<T>(&mut self, result: WardenResult<T>) -> WardenResult<T> {
        let outcome = outcome_of(&result);
        let errors = self.release_blocking(&outcome);
        self.settle(result, errors)
    }

    fn settle<T>(&mut self, result: WardenResult<T>, errors: Vec<WardenError>) -> WardenResult<T> {
        let result = match result {
            Ok(value) => match raise_multiple(errors) {
                None => Ok(value),
                Some(error) => Err(error),
            },
            Err(error) => Err(error.with_secondary(errors)),
        };
        match &result {
            Ok(_) => self.set_state(EngineState::Succeeded),
            Err(error) => {
                self.set_state(EngineState::Failed);
                debug!(category = %error.category(), error = %error, "resolution failed");
                metrics::counter!(RESOLUTION_FAILURES_METRIC, "category" => error.category().as_str())
                    .increment(1);
            }
        }
        result
    }
}

fn outcome_of<T>(result: &WardenResult<T>) -> ExitOutcome {
    match result {
        Ok(_) => ExitOutcome::Completed,
        Err(error) => ExitOutcome::Failed(error.to_string()),
    }
}

impl fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("state", &self.state)
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .field("resources", &self.resource_owners())
            .finish_non_exhaustive()
    }
}

impl Drop for ResolutionContext<'_> {
    fn drop(&mut self) {
        if self.resources.is_empty() {
            return;
        }
        warn!(
            count = self.resources.len(),
            state = %self.state,
            "resolution context dropped with resources held, releasing them"
        );
        let outcome = ExitOutcome::Cancelled;
        let mut pending = std::mem::take(&mut self.resources);

        // Sync guards on top of the stack are released right here; from the
        // first async guard down, the rest goes into one task to keep the order.
        while matches!(pending.last(), Some(Tracked::Sync { .. })) {
            if let Some(tracked) = pending.pop() {
                let _ = tracked.release_blocking(&outcome);
            }
        }
        if pending.is_empty() {
            return;
        }
        let release = async move {
            while let Some(tracked) = pending.pop() {
                let _ = tracked.release(&outcome).await;
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release);
            }
            Err(_) => futures::executor::block_on(release),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use warden_core::{AsyncScopedResource, ScopedResource};

    struct Counting {
        query_reads: AtomicUsize,
    }

    impl RequestAccessor for Counting {
        fn query(&self) -> WardenResult<Mapping> {
            self.query_reads.fetch_add(1, Ordering::SeqCst);
            Ok(Mapping::from([("a".to_string(), serde_json::json!("1"))]))
        }
        fn header(&self) -> WardenResult<Mapping> {
            Ok(Mapping::new())
        }
        fn cookie(&self) -> WardenResult<Mapping> {
            Ok(Mapping::new())
        }
        fn path_params(&self) -> WardenResult<Mapping> {
            Ok(Mapping::new())
        }
        fn body(&self) -> Access<'_, Mapping> {
            MaybeAsync::pending(async { Ok(Mapping::from([("b".to_string(), serde_json::json!(2))])) })
        }
    }

    fn accessor() -> Counting {
        Counting {
            query_reads: AtomicUsize::new(0),
        }
    }

    fn logged(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Provided {
        let enter_log = Arc::clone(log);
        let exit_log = Arc::clone(log);
        Provided::resource(ScopedResource::new(
            move || {
                enter_log.lock().push(format!("enter {name}"));
                Ok(Resolved::json(name))
            },
            move |outcome: &ExitOutcome| {
                exit_log.lock().push(format!("exit {name} {outcome}"));
                Ok(())
            },
        ))
    }

    #[test]
    fn test_sources_are_read_once() {
        let accessor = accessor();
        let mut ctx = ResolutionContext::new(&accessor);
        assert_eq!(ctx.mapping_blocking(SourceKind::Query).unwrap().len(), 1);
        assert_eq!(ctx.mapping_blocking(SourceKind::Query).unwrap().len(), 1);
        assert_eq!(accessor.query_reads.load(Ordering::SeqCst), 1);

        let body = ctx.mapping_blocking(SourceKind::Json).unwrap();
        assert_eq!(body.get("b"), Some(&serde_json::json!(2)));
        assert!(ctx.mapping_blocking(SourceKind::File).is_err());
        assert!(ctx.files_blocking().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_reads_await_pending_sources() {
        let accessor = accessor();
        let mut ctx = ResolutionContext::new(&accessor);
        let body = ctx.mapping(SourceKind::Body).await.unwrap();
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_release_is_lifo_and_collects_failures() {
        let accessor = accessor();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = ResolutionContext::new(&accessor);
        ctx.enter_blocking("first", logged(&log, "first")).unwrap();
        ctx.enter_blocking(
            "broken",
            Provided::resource(ScopedResource::new(
                || Ok(Resolved::null()),
                |_: &ExitOutcome| anyhow::bail!("close failed"),
            )),
        )
        .unwrap();
        ctx.enter_blocking("second", logged(&log, "second")).unwrap();
        assert_eq!(ctx.resource_owners(), ["first", "broken", "second"]);

        let result: WardenResult<()> = ctx.finish_blocking(Ok(()));
        let err = result.unwrap_err();
        assert!(matches!(err, WardenError::Resource { ref dependency, .. } if dependency == "broken"));
        assert_eq!(ctx.state(), EngineState::Failed);
        assert_eq!(
            *log.lock(),
            [
                "enter first",
                "enter second",
                "exit second completed",
                "exit first completed"
            ]
        );
    }

    #[test]
    fn test_main_failure_keeps_release_failures() {
        let accessor = accessor();
        let mut ctx = ResolutionContext::new(&accessor);
        ctx.enter_blocking(
            "broken",
            Provided::resource(ScopedResource::new(
                || Ok(Resolved::null()),
                |_: &ExitOutcome| anyhow::bail!("close failed"),
            )),
        )
        .unwrap();
        let err = ctx
            .finish_blocking::<()>(Err(WardenError::handler(anyhow::anyhow!("boom"))))
            .unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(matches!(err.errors()[0], WardenError::Handler(_)));
        assert!(matches!(err.errors()[1], WardenError::Resource { .. }));
    }

    #[test]
    fn test_failed_enter_is_not_tracked() {
        let accessor = accessor();
        let mut ctx = ResolutionContext::new(&accessor);
        let failing = Provided::resource(ScopedResource::new(
            || anyhow::bail!("no connection"),
            |_: &ExitOutcome| Ok(()),
        ));
        let err = ctx.enter_blocking("db", failing).unwrap_err();
        assert!(matches!(err, WardenError::Dependency { .. }));
        assert_eq!(ctx.resource_count(), 0);
    }

    #[test]
    fn test_drop_releases_with_cancelled() {
        let accessor = accessor();
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut ctx = ResolutionContext::new(&accessor);
            ctx.enter_blocking("first", logged(&log, "first")).unwrap();
            let async_log = Arc::clone(&log);
            let guard = AsyncScopedResource::new(
                || async { Ok(Resolved::json("pool")) },
                move |outcome: ExitOutcome| {
                    let log = Arc::clone(&async_log);
                    async move {
                        log.lock().push(format!("exit pool {outcome}"));
                        Ok(())
                    }
                },
            );
            ctx.enter_blocking("pool", Provided::async_resource(guard)).unwrap();
            ctx.enter_blocking("last", logged(&log, "last")).unwrap();
        }
        let log = log.lock();
        assert_eq!(
            log[log.len() - 3..],
            ["exit last cancelled", "exit pool cancelled", "exit first cancelled"]
        );
    }
}
