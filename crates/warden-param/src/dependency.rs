//! `Depends` targets.
//!
//! A dependency is a callable whose result is injected into the parameter
//! that declares it. Its own parameters are resolved first, recursively.
//! Class dependencies additionally declare attributes: those are resolved
//! before anything else and passed to a constructor, and the constructed
//! instance is then called like a function.

use crate::signature::{Param, ParamDefault};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use warden_core::{
    BoxFuture, CallArgs, CallableInfo, CallableKind, Provided, Resolved, SourceLocation,
};
use warden_field::Annotation;

type SyncInvoke = Arc<dyn Fn(Option<Resolved>, CallArgs) -> anyhow::Result<Provided> + Send + Sync>;
type AsyncInvoke = Arc<
    dyn Fn(Option<Resolved>, CallArgs) -> BoxFuture<'static, anyhow::Result<Provided>> + Send + Sync,
>;
type Construct = Arc<dyn Fn(CallArgs) -> anyhow::Result<Resolved> + Send + Sync>;

#[derive(Clone)]
enum Invoke {
    Sync(SyncInvoke),
    Async(AsyncInvoke),
}

/// Identity of a dependency: its qualified name and declaration site.
///
/// Two `Dependency` values built by the same constructor call share an id,
/// which is what cycle detection keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyId {
    qualname: String,
    location: SourceLocation,
}

impl DependencyId {
    /// Qualified name.
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.qualname
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualname)
    }
}

fn missing_instance<T>() -> anyhow::Error {
    anyhow::anyhow!("`{}` was called without its instance", std::any::type_name::<T>())
}

/// A callable dependency.
///
/// # Example
///
/// ```
/// use warden_core::Provided;
/// use warden_field::{Annotation, Field};
/// use warden_param::Dependency;
///
/// let get_user = Dependency::function("get_user_by_token", |args| {
///     let token: String = args.value("token")?;
///     anyhow::ensure!(token == "u12345", "unknown token {token}");
///     Ok(Provided::json("so1n"))
/// })
/// .param("token", Annotation::String, Field::header())
/// .returns(Annotation::String);
///
/// assert_eq!(get_user.qualname(), "get_user_by_token");
/// assert!(!get_user.is_class());
/// ```
#[derive(Clone)]
pub struct Dependency {
    info: CallableInfo,
    returns: Option<Annotation>,
    attributes: Vec<Param>,
    params: Vec<Param>,
    construct: Option<Construct>,
    invoke: Invoke,
}

impl Dependency {
    fn build(
        qualname: String,
        location: SourceLocation,
        kind: CallableKind,
        construct: Option<Construct>,
        invoke: Invoke,
    ) -> Self {
        let is_async = matches!(invoke, Invoke::Async(_));
        Self {
            info: CallableInfo::new(qualname, location, is_async, kind),
            returns: None,
            attributes: Vec::new(),
            params: Vec::new(),
            construct,
            invoke,
        }
    }

    /// A synchronous function dependency.
    #[must_use]
    #[track_caller]
    pub fn function<F>(qualname: impl Into<String>, call: F) -> Self
    where
        F: Fn(CallArgs) -> anyhow::Result<Provided> + Send + Sync + 'static,
    {
        Self::build(
            qualname.into(),
            SourceLocation::caller(),
            CallableKind::Function,
            None,
            Invoke::Sync(Arc::new(move |_: Option<Resolved>, args: CallArgs| call(args))),
        )
    }

    /// An asynchronous function dependency.
    #[must_use]
    #[track_caller]
    pub fn function_async<F, Fut>(qualname: impl Into<String>, call: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Provided>> + Send + 'static,
    {
        Self::build(
            qualname.into(),
            SourceLocation::caller(),
            CallableKind::Function,
            None,
            Invoke::Async(Arc::new(
                move |_: Option<Resolved>, args: CallArgs| -> BoxFuture<'static, anyhow::Result<Provided>> {
                    Box::pin(call(args))
                },
            )),
        )
    }

    /// A class dependency: `construct` receives the resolved attributes, and
    /// the instance's `call` receives the resolved parameters.
    #[must_use]
    #[track_caller]
    pub fn class<T, C, M>(qualname: impl Into<String>, construct: C, call: M) -> Self
    where
        T: Any + Send + Sync,
        C: Fn(CallArgs) -> anyhow::Result<T> + Send + Sync + 'static,
        M: Fn(&T, CallArgs) -> anyhow::Result<Provided> + Send + Sync + 'static,
    {
        Self::build(
            qualname.into(),
            SourceLocation::caller(),
            CallableKind::Class,
            Some(Arc::new(move |attrs: CallArgs| construct(attrs).map(Resolved::object))),
            Invoke::Sync(Arc::new(move |instance: Option<Resolved>, args: CallArgs| {
                let instance = instance
                    .and_then(|i| i.downcast::<T>())
                    .ok_or_else(missing_instance::<T>)?;
                call(&instance, args)
            })),
        )
    }

    /// A class dependency whose instance call is asynchronous.
    #[must_use]
    #[track_caller]
    pub fn class_async<T, C, M, Fut>(qualname: impl Into<String>, construct: C, call: M) -> Self
    where
        T: Any + Send + Sync,
        C: Fn(CallArgs) -> anyhow::Result<T> + Send + Sync + 'static,
        M: Fn(Arc<T>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Provided>> + Send + 'static,
    {
        let call = Arc::new(call);
        Self::build(
            qualname.into(),
            SourceLocation::caller(),
            CallableKind::Class,
            Some(Arc::new(move |attrs: CallArgs| construct(attrs).map(Resolved::object))),
            Invoke::Async(Arc::new(
                move |instance: Option<Resolved>, args: CallArgs| -> BoxFuture<'static, anyhow::Result<Provided>> {
                    let call = Arc::clone(&call);
                    Box::pin(async move {
                        let instance = instance
                            .and_then(|i| i.downcast::<T>())
                            .ok_or_else(missing_instance::<T>)?;
                        (*call)(instance, args).await
                    })
                },
            )),
        )
    }

    /// Adds a parameter of the (instance) call.
    #[must_use]
    pub fn param(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        default: impl Into<ParamDefault>,
    ) -> Self {
        self.params.push(Param::new(name, annotation, default));
        self
    }

    /// Adds a parameter receiving the framework's raw request.
    #[must_use]
    pub fn request(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::bare(name, Annotation::Request));
        self
    }

    /// Adds a class attribute, resolved before construction.
    #[must_use]
    pub fn attribute(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        default: impl Into<ParamDefault>,
    ) -> Self {
        self.attributes.push(Param::new(name, annotation, default));
        self
    }

    /// Declares the return type, checked against consuming parameters.
    #[must_use]
    pub fn returns(mut self, annotation: Annotation) -> Self {
        self.returns = Some(annotation);
        self
    }

    /// Callable identity and location.
    #[must_use]
    pub fn info(&self) -> &CallableInfo {
        &self.info
    }

    /// Qualified name.
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.info.qualname
    }

    /// Identity used for cycle detection.
    #[must_use]
    pub fn id(&self) -> DependencyId {
        DependencyId {
            qualname: self.info.qualname.clone(),
            location: self.info.location,
        }
    }

    /// Declared return type, if any.
    #[must_use]
    pub fn return_annotation(&self) -> Option<&Annotation> {
        self.returns.as_ref()
    }

    /// Call parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Class attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Param] {
        &self.attributes
    }

    /// Returns true for class dependencies.
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.construct.is_some()
    }

    /// Returns true if the (instance) call is asynchronous.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.info.is_async
    }

    /// Constructs the instance of a class dependency.
    pub(crate) fn construct(&self, attributes: CallArgs) -> anyhow::Result<Option<Resolved>> {
        self.construct
            .as_ref()
            .map(|construct| construct(attributes))
            .transpose()
    }

    /// Calls the dependency, producing a future for either flavour.
    pub(crate) fn call(
        &self,
        instance: Option<Resolved>,
        args: CallArgs,
    ) -> BoxFuture<'static, anyhow::Result<Provided>> {
        match &self.invoke {
            Invoke::Sync(call) => {
                let result = call(instance, args);
                Box::pin(std::future::ready(result))
            }
            Invoke::Async(call) => call(instance, args),
        }
    }

    /// Calls the dependency on the current thread, blocking on async calls.
    pub(crate) fn call_blocking(
        &self,
        instance: Option<Resolved>,
        args: CallArgs,
    ) -> anyhow::Result<Provided> {
        match &self.invoke {
            Invoke::Sync(call) => call(instance, args),
            Invoke::Async(call) => futures::executor::block_on(call(instance, args)),
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("qualname", &self.info.qualname)
            .field("location", &self.info.location)
            .field("is_async", &self.info.is_async)
            .field("is_class", &self.is_class())
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserService {
        prefix: String,
    }

    fn service() -> Dependency {
        Dependency::class(
            "UserService",
            |attrs: CallArgs| {
                Ok(UserService {
                    prefix: attrs.value("prefix")?,
                })
            },
            |svc: &UserService, args: CallArgs| {
                let name: String = args.value("name")?;
                Ok(Provided::json(format!("{}{name}", svc.prefix)))
            },
        )
    }

    #[test]
    fn test_function_call() {
        let dep = Dependency::function("answer", |_| Ok(Provided::json(42)));
        let provided = dep.call_blocking(None, CallArgs::new()).unwrap();
        assert!(matches!(provided, Provided::Value(v) if v == Resolved::json(42)));
        assert!(!dep.is_async());
        assert!(dep.construct(CallArgs::new()).unwrap().is_none());
    }

    #[test]
    fn test_class_construct_then_call() {
        let dep = service();
        assert!(dep.is_class());
        let instance = dep
            .construct(CallArgs::new().with("prefix", Resolved::json("mr. ")))
            .unwrap();
        let provided = dep
            .call_blocking(instance, CallArgs::new().with("name", Resolved::json("so1n")))
            .unwrap();
        assert!(matches!(provided, Provided::Value(v) if v == Resolved::json("mr. so1n")));
    }

    #[test]
    fn test_class_without_instance_fails() {
        let err = service()
            .call_blocking(None, CallArgs::new())
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("without its instance"));
    }

    #[tokio::test]
    async fn test_async_call_and_blocking_flavours() {
        let dep = Dependency::function_async("later", |_| async { Ok(Provided::json("done")) });
        assert!(dep.is_async());
        let provided = dep.call(None, CallArgs::new()).await.unwrap();
        assert!(matches!(provided, Provided::Value(v) if v == Resolved::json("done")));

        let sync = Dependency::function("now", |_| Ok(Provided::json(1)));
        assert!(sync.call(None, CallArgs::new()).await.is_ok());
    }

    #[test]
    fn test_blocking_async_call() {
        let dep = Dependency::function_async("later", |_| async { Ok(Provided::json(2)) });
        assert!(dep.call_blocking(None, CallArgs::new()).is_ok());
    }

    #[test]
    fn test_ids_follow_declaration_site() {
        fn make() -> Dependency {
            Dependency::function("same", |_| Ok(Provided::json(1)))
        }
        assert_eq!(make().id(), make().id());
        let elsewhere = Dependency::function("same", |_| Ok(Provided::json(1)));
        assert_ne!(make().id(), elsewhere.id());
        assert_eq!(elsewhere.id().to_string(), "same");
    }
}
