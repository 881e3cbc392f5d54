//! Resolving real parameter rules against in-memory requests.

use bytes::Bytes;
use serde_json::json;
use warden_core::{CallArgs, ErrorCategory, UploadedFile, WardenResult};
use warden_field::{Annotation, Field, ModelRegistry};
use warden_param::{CompileOptions, Engine, EngineOptions, RuleCompiler, Signature};
use warden_test::TestRequest;

fn engine(signature: &Signature) -> Engine {
    let rules = RuleCompiler::new(&ModelRegistry::new(), CompileOptions::default())
        .compile(signature, &[], &[])
        .unwrap();
    Engine::new(rules, EngineOptions::default()).unwrap()
}

fn echo(args: CallArgs) -> WardenResult<CallArgs> {
    Ok(args)
}

#[test]
fn test_every_source_resolves() {
    let signature = Signature::new("upload")
        .param("page", Annotation::Integer, Field::query().ge(1))
        .param("x_token", Annotation::String, Field::header())
        .param("session", Annotation::String, Field::cookie())
        .param("item_id", Annotation::Integer, Field::path())
        .param("tags", Annotation::list(Annotation::String), Field::multiquery())
        .param("avatar", Annotation::of::<UploadedFile>(), Field::file())
        .request("req");

    let request = TestRequest::post("/items/9?page=2&tags=a&tags=b")
        .header("X-Token", "secret")
        .cookie("session", "abc")
        .path_param("item_id", "9")
        .file("avatar", UploadedFile::new("me.png", Bytes::from_static(b"\x89PNG")))
        .build()
        .unwrap();

    let args = engine(&signature).run_sync(&request, echo).unwrap();
    assert_eq!(args.value::<i64>("page").unwrap(), 2);
    assert_eq!(args.value::<String>("x_token").unwrap(), "secret");
    assert_eq!(args.value::<String>("session").unwrap(), "abc");
    assert_eq!(args.value::<i64>("item_id").unwrap(), 9);
    assert_eq!(args.value::<Vec<String>>("tags").unwrap(), vec!["a", "b"]);
    assert_eq!(args.object::<UploadedFile>("avatar").unwrap().filename, "me.png");
    let raw = args.raw::<http::Request<Bytes>>().unwrap();
    assert_eq!(raw.uri().path(), "/items/9");
}

#[test]
fn test_json_and_form_bodies() {
    let signature = Signature::new("create")
        .param("name", Annotation::String, Field::body().min_length(1))
        .param("age", Annotation::Integer, Field::json().default(0));

    let request = TestRequest::post("/users")
        .json(&json!({ "name": "ada" }))
        .build()
        .unwrap();
    let args = engine(&signature).run_sync(&request, echo).unwrap();
    assert_eq!(args.value::<String>("name").unwrap(), "ada");
    assert_eq!(args.value::<i64>("age").unwrap(), 0);

    let form = Signature::new("search")
        .param("color", Annotation::String, Field::form())
        .param("sizes", Annotation::list(Annotation::String), Field::multiform());
    let request = TestRequest::post("/search")
        .form(&vec![("color", "red"), ("sizes", "s"), ("sizes", "m")])
        .build()
        .unwrap();
    let args = engine(&form).run_sync(&request, echo).unwrap();
    assert_eq!(args.value::<String>("color").unwrap(), "red");
    assert_eq!(args.value::<Vec<String>>("sizes").unwrap(), vec!["s", "m"]);
}

#[tokio::test]
async fn test_async_body_mode_through_async_engine() {
    let signature = Signature::new_async("create").param("name", Annotation::String, Field::body());
    let request = TestRequest::post("/users")
        .json(&json!({ "name": "grace" }))
        .async_body()
        .build()
        .unwrap();

    let engine = engine(&signature);
    let args = engine.run(&request, |args| async move { Ok(args) }).await.unwrap();
    assert_eq!(args.value::<String>("name").unwrap(), "grace");

    // The blocking engine drives the same pending future itself.
    let args = engine.run_sync(&request, echo).unwrap();
    assert_eq!(args.value::<String>("name").unwrap(), "grace");
}

#[test]
fn test_malformed_body_is_an_internal_error() {
    let signature = Signature::new("create").param("name", Annotation::String, Field::body());
    let request = TestRequest::post("/users")
        .content_type("application/json")
        .body("{not json")
        .build()
        .unwrap();
    let err = engine(&signature).run_sync(&request, echo).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Internal);
}
