//! Request scenarios run through registered routes.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warden::core::AsyncScopedResource;
use warden::prelude::*;
use warden_test::TestRequest;

fn get_user_by_token() -> Dependency {
    let users = [("u12345", "so1n")];
    Dependency::function("get_user_by_token", move |args| {
        let token: String = args.value("token")?;
        users
            .iter()
            .find(|(known, _)| *known == token)
            .map(|(_, user)| Provided::json(*user))
            .ok_or_else(|| anyhow::anyhow!(UnknownToken(token)))
    })
    .param("token", Annotation::String, Field::header())
    .returns(Annotation::String)
}

#[derive(Debug, thiserror::Error)]
#[error("unknown token {0}")]
struct UnknownToken(String);

fn echo_param(name: &'static str) -> Handler {
    Handler::sync(move |args: CallArgs| Ok(args.value::<Value>(name)?))
}

#[test]
fn test_user_from_header_token() {
    let signature = Signature::new("demo").param("user", Annotation::String, get_user_by_token());
    let route = RouteBuilder::new(signature, echo_param("user"))
        .build(&WardenConfig::default())
        .unwrap();

    let ok = TestRequest::get("/").header("token", "u12345").build().unwrap();
    assert_eq!(route.call_sync(&ok).unwrap(), json!("so1n"));

    let bad = TestRequest::get("/").header("token", "bad").build().unwrap();
    let err = route.call_sync(&bad).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Dependency);
    assert_eq!(err.downcast_ref::<UnknownToken>().unwrap().0, "bad");
    let tip = err.as_tip().unwrap();
    assert_eq!(tip.qualname(), "demo");
    assert_eq!(tip.param_name(), Some("user"));
}

#[tokio::test]
async fn test_user_from_header_token_async() {
    let signature =
        Signature::new_async("demo").param("user", Annotation::String, get_user_by_token());
    let handler = Handler::asynchronous(|args: CallArgs| async move {
        let user: String = args.value("user")?;
        Ok(json!({ "user": user }))
    });
    let route = RouteBuilder::new(signature, handler)
        .build(&WardenConfig::default())
        .unwrap();

    let request = TestRequest::get("/")
        .header("token", "u12345")
        .async_body()
        .build()
        .unwrap();
    assert_eq!(route.call(&request).await.unwrap(), json!({ "user": "so1n" }));
}

fn session(closes: &Arc<AtomicUsize>) -> Dependency {
    let closes = Arc::clone(closes);
    Dependency::function("context_manager_dependency", move |_| {
        let closes = Arc::clone(&closes);
        Ok(Provided::resource(ScopedResource::new(
            || Ok(Resolved::json(1)),
            move |_: &ExitOutcome| {
                closes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )))
    })
    .returns(Annotation::Integer)
}

#[test]
fn test_resource_closed_once_on_success_and_on_handler_error() {
    let closes = Arc::new(AtomicUsize::new(0));
    let signature = Signature::new("demo")
        .param("uid", Annotation::Integer, session(&closes))
        .param("fail", Annotation::Boolean, Field::query().default(false));
    let handler = Handler::sync(|args: CallArgs| {
        anyhow::ensure!(!args.value::<bool>("fail")?, "handler failed");
        Ok(json!(args.value::<i64>("uid")?))
    });
    let route = RouteBuilder::new(signature, handler)
        .build(&WardenConfig::default())
        .unwrap();

    let ok = TestRequest::get("/").build().unwrap();
    assert_eq!(route.call_sync(&ok).unwrap(), json!(1));
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let failing = TestRequest::get("/?fail=true").build().unwrap();
    let err = route.call_sync(&failing).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Handler);
    assert!(err.to_string().contains("handler failed"));
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

fn async_session(outcomes: &Arc<Mutex<Vec<ExitOutcome>>>) -> Dependency {
    let outcomes = Arc::clone(outcomes);
    Dependency::function_async("async_session", move |_| {
        let outcomes = Arc::clone(&outcomes);
        async move {
            Ok(Provided::async_resource(AsyncScopedResource::new(
                || async { Ok(Resolved::json(1)) },
                move |outcome: ExitOutcome| async move {
                    outcomes.lock().push(outcome);
                    Ok(())
                },
            )))
        }
    })
    .returns(Annotation::Integer)
}

#[tokio::test]
async fn test_timed_out_request_releases_async_resource_as_cancelled() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let signature =
        Signature::new_async("demo").param("session", Annotation::Integer, async_session(&outcomes));
    let handler = Handler::asynchronous(|args: CallArgs| async move {
        let session: i64 = args.value("session")?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!(session))
    });
    let route = RouteBuilder::new(signature, handler)
        .build(&WardenConfig::default())
        .unwrap();

    let request = TestRequest::get("/").async_body().build().unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(50), route.call(&request)).await;
    assert!(timed_out.is_err());

    // The release runs on a spawned task once the call future is dropped.
    for _ in 0..100 {
        if !outcomes.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*outcomes.lock(), [ExitOutcome::Cancelled]);
}

#[test]
fn test_query_default_and_not_found() {
    let with_default = RouteBuilder::new(
        Signature::new("demo").param("demo_value", Annotation::String, Field::query().default("123")),
        echo_param("demo_value"),
    )
    .build(&WardenConfig::default())
    .unwrap();
    let empty = TestRequest::get("/").build().unwrap();
    assert_eq!(with_default.call_sync(&empty).unwrap(), json!("123"));

    let required = RouteBuilder::new(
        Signature::new("demo").param("demo_value", Annotation::String, Field::query()),
        echo_param("demo_value"),
    )
    .build(&WardenConfig::default())
    .unwrap();
    let err = required.call_sync(&empty).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(err.param(), Some("demo_value"));
    assert!(err.to_string().contains("demo_value"));
}

#[test]
fn test_numeric_bounds() {
    let route = RouteBuilder::new(
        Signature::new("demo").param("num", Annotation::Integer, Field::query().gt(1).lt(10)),
        echo_param("num"),
    )
    .build(&WardenConfig::default())
    .unwrap();

    let inside = TestRequest::get("/?num=2").build().unwrap();
    assert_eq!(route.call_sync(&inside).unwrap(), json!(2));

    let outside = TestRequest::get("/?num=11").build().unwrap();
    let err = route.call_sync(&outside).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.param(), Some("num"));
    assert_eq!(err.constraint(), Some("lt"));
}

#[test]
fn test_describe_lists_stages_and_params() {
    let route = RouteBuilder::new(
        Signature::new("demo").param("user", Annotation::String, get_user_by_token()),
        echo_param("user"),
    )
    .build(&WardenConfig::default())
    .unwrap();

    let doc = serde_json::to_value(route.describe()).unwrap();
    assert_eq!(doc["route"], json!(route.id().to_string()));
    assert_eq!(doc["stages"], json!(["engine"]));
    assert_eq!(doc["params"][0]["name"], "user");
    assert_eq!(doc["params"][0]["dependency"]["params"][0]["name"], "token");
}
