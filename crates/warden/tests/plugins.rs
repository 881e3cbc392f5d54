//! Built-in plugins attached at route registration.

use serde_json::{json, Value};
use warden::prelude::*;
use warden_test::TestRequest;

fn optional_query(tag: ExtraParam) -> Field {
    Field::query().default(Value::Null).extra(tag)
}

fn update_account() -> Signature {
    let text = || Annotation::optional(Annotation::String);
    Signature::new("update_account")
        .param("user_id", Annotation::optional(Annotation::Integer), Field::query().default(Value::Null))
        .param("token", text(), optional_query(ExtraParam::required("user_id")))
        .param("email", text(), optional_query(ExtraParam::at_most_one_of("contact")))
        .param("phone", text(), optional_query(ExtraParam::at_most_one_of("contact")))
}

fn route() -> Route {
    RouteBuilder::new(update_account(), Handler::sync(|_| Ok(json!("ok"))))
        .plugin(PluginManager::new(RequiredFactory, RequiredConfig::new()))
        .plugin(PluginManager::new(AtMostOneOfFactory, AtMostOneOfConfig::new()))
        .build(&WardenConfig::default())
        .unwrap()
}

fn get(uri: &str) -> warden_test::TestRequest {
    TestRequest::get(uri).build().unwrap()
}

#[test]
fn test_tagged_params_are_enforced() {
    let route = route();
    assert_eq!(route.stage_names(), ["engine", "required", "at_most_one_of"]);

    assert_eq!(route.call_sync(&get("/?user_id=7&token=t")).unwrap(), json!("ok"));

    let err = route.call_sync(&get("/?user_id=7")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Plugin);
    assert!(err.to_string().contains("`token` required when `user_id` is given"));

    let err = route.call_sync(&get("/?email=a@b.c&phone=555")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Plugin);
}

#[tokio::test]
async fn test_tagged_params_are_enforced_async() {
    let route = route();
    let request = TestRequest::get("/?phone=555").async_body().build().unwrap();
    assert_eq!(route.call(&request).await.unwrap(), json!("ok"));
}

#[test]
fn test_undeclared_column_fails_registration() {
    let err = RouteBuilder::new(update_account(), Handler::sync(|_| Ok(json!("ok"))))
        .plugin(PluginManager::new(
            RequiredFactory,
            RequiredConfig::new().require("user_id", ["nickname"]),
        ))
        .build(&WardenConfig::default())
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.to_string().contains("nickname"));
}

#[test]
fn test_tags_on_dependency_fields_are_not_collected() {
    let lookup = Dependency::function("lookup", |args| {
        Ok(Provided::json(args.value::<Option<String>>("nickname")?))
    })
    .param(
        "nickname",
        Annotation::optional(Annotation::String),
        optional_query(ExtraParam::required("user_id")),
    )
    .returns(Annotation::optional(Annotation::String));
    let signature =
        update_account().param("alias", Annotation::optional(Annotation::String), lookup);
    let route = RouteBuilder::new(signature, Handler::sync(|_| Ok(json!("ok"))))
        .plugin(PluginManager::new(RequiredFactory, RequiredConfig::new()))
        .build(&WardenConfig::default())
        .unwrap();

    let meta = warden::plugin::RouteMeta::new(route.id(), route.rules());
    let tagged: Vec<&str> = meta.extras().map(|(param, _)| param).collect();
    assert_eq!(tagged, ["token", "email", "phone"]);
    let nested = route.rules().all_rules();
    let nickname = nested.iter().find(|rule| rule.name == "nickname").unwrap();
    assert_eq!(nickname.extras(), [ExtraParam::required("user_id")]);

    assert_eq!(route.call_sync(&get("/?user_id=7&token=t")).unwrap(), json!("ok"));
}
