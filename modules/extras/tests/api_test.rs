use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use tower::ServiceExt;

use extras::Extras;
use modkit::viewset::Paging;
use modkit::{DbModule, RestfulModule};

async fn create_test_app() -> (Router, DatabaseConnection) {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to test database");
    Extras.migrate(&db).await.expect("Failed to run migrations");
    let env = Arc::new(extras::api_env(db.clone(), Paging::default(), ""));
    let router = Extras
        .register_rest(Router::new(), &env)
        .expect("Failed to register routes");
    (router, db)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = router
        .clone()
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(router, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn pointers(problem: &Value) -> Vec<String> {
    problem["errors"]
        .as_array()
        .map(|errs| {
            errs.iter()
                .map(|e| e["pointer"].as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn tag_create_applies_defaults_and_brief_lists_subset() {
    let (app, _db) = create_test_app().await;

    let (status, tag) = call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!({"name": "Alpha", "slug": "alpha"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["color"], "9e9e9e");
    assert_eq!(tag["tagged_items"], 0);
    assert_eq!(tag["url"], format!("/api/extras/tags/{}/", tag["id"]));

    let (status, page) = call(&app, Method::GET, "/api/extras/tags/?brief=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    let brief = page["results"][0].as_object().unwrap();
    let mut keys: Vec<&str> = brief.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["color", "id", "name", "slug", "url"]);
}

#[tokio::test]
async fn duplicate_slug_and_bad_color_are_field_errors() {
    let (app, _db) = create_test_app().await;
    call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!({"name": "Alpha", "slug": "alpha"})),
    )
    .await;

    let (status, problem) = call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!({"name": "Beta", "slug": "alpha", "color": "GREEN"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let ptrs = pointers(&problem);
    assert!(ptrs.contains(&"/slug".to_string()), "{problem}");
    assert!(ptrs.contains(&"/color".to_string()), "{problem}");
}

#[tokio::test]
async fn array_create_rolls_back_on_any_failure() {
    let (app, _db) = create_test_app().await;
    let (status, problem) = call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!([
            {"name": "One", "slug": "one"},
            {"name": "Two", "slug": "bad slug"}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(pointers(&problem), vec!["/1/slug".to_string()]);

    let (_, page) = call(&app, Method::GET, "/api/extras/tags/", None).await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn select_custom_field_requires_choices() {
    let (app, _db) = create_test_app().await;
    let (status, problem) = call(
        &app,
        Method::POST,
        "/api/extras/custom-fields/",
        Some(json!({
            "content_types": ["tenancy.tenant"],
            "type": "select",
            "name": "tier"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(pointers(&problem), vec!["/choices".to_string()]);

    let (status, field) = call(
        &app,
        Method::POST,
        "/api/extras/custom-fields/",
        Some(json!({
            "content_types": ["tenancy.tenant", "tenancy.tenantgroup"],
            "type": "select",
            "name": "tier",
            "choices": ["gold", "silver"],
            "default": "silver"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field["content_types"], json!(["tenancy.tenant", "tenancy.tenantgroup"]));

    let (_, page) = call(
        &app,
        Method::GET,
        "/api/extras/custom-fields/?content_type=tenancy.tenantgroup",
        None,
    )
    .await;
    assert_eq!(page["count"], 1);
    let (_, page) = call(
        &app,
        Method::GET,
        "/api/extras/custom-fields/?content_type=tenancy.tenants",
        None,
    )
    .await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn custom_field_default_must_match_type() {
    let (app, _db) = create_test_app().await;
    let (status, problem) = call(
        &app,
        Method::POST,
        "/api/extras/custom-fields/",
        Some(json!({
            "content_types": ["tenancy.tenant"],
            "type": "integer",
            "name": "seats",
            "default": "many"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(pointers(&problem), vec!["/default".to_string()]);
}

#[tokio::test]
async fn export_template_syntax_is_checked_and_renders_tags() {
    let (app, _db) = create_test_app().await;

    let (status, problem) = call(
        &app,
        Method::POST,
        "/api/extras/export-templates/",
        Some(json!({
            "content_type": "extras.tag",
            "name": "broken",
            "template_code": "{% for t in queryset %}"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(pointers(&problem), vec!["/template_code".to_string()]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/extras/export-templates/",
        Some(json!({
            "content_type": "extras.tag",
            "name": "csv",
            "template_code": "{% for t in queryset %}{{ t.slug }};{% endfor %}",
            "mime_type": "text/csv",
            "file_extension": "csv"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!([{"name": "B", "slug": "b"}, {"name": "A", "slug": "a"}])),
    )
    .await;

    let (status, headers, body) =
        send(&app, Method::GET, "/api/extras/tags/?export=csv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"tags.csv\""
    );
    assert_eq!(String::from_utf8(body).unwrap(), "a;b;");

    let (status, problem) = call(&app, Method::GET, "/api/extras/tags/?export=nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["code"], "NOT_FOUND");
}

#[tokio::test]
async fn changes_are_logged_with_snapshots() {
    let (app, _db) = create_test_app().await;
    let (_, tag) = call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!({"name": "Alpha", "slug": "alpha"})),
    )
    .await;
    let id = tag["id"].as_i64().unwrap();

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/extras/tags/{id}/"),
        Some(json!({"description": "first"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::DELETE, &format!("/api/extras/tags/{id}/"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = call(
        &app,
        Method::GET,
        &format!("/api/extras/object-changes/?changed_object_type=extras.tag&changed_object_id={id}"),
        None,
    )
    .await;
    assert_eq!(page["count"], 3);
    let results = page["results"].as_array().unwrap();
    let actions: Vec<&str> = results.iter().map(|c| c["action"].as_str().unwrap()).collect();
    assert_eq!(actions, vec!["delete", "update", "create"]);

    let update = &results[1];
    assert_eq!(update["prechange_data"]["description"], "");
    assert_eq!(update["postchange_data"]["description"], "first");
    assert_eq!(update["user_name"], "");
    assert!(results[0]["postchange_data"].is_null());

    let change_id = update["id"].as_i64().unwrap();
    let (status, single) = call(
        &app,
        Method::GET,
        &format!("/api/extras/object-changes/{change_id}/"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single["object_repr"], "Alpha");
}

#[tokio::test]
async fn bulk_destroy_removes_only_listed_tags() {
    let (app, _db) = create_test_app().await;
    let (_, created) = call(
        &app,
        Method::POST,
        "/api/extras/tags/",
        Some(json!([
            {"name": "A", "slug": "a"},
            {"name": "B", "slug": "b"},
            {"name": "C", "slug": "c"}
        ])),
    )
    .await;
    let ids: Vec<i64> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/api/extras/tags/",
        Some(json!([{"id": ids[0]}, {"id": ids[2]}])),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = call(&app, Method::GET, "/api/extras/tags/", None).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["slug"], "b");
}
