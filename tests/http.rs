mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::users_config;
use crud_engine::config::{resolve, FullConfig};
use crud_engine::{common_routes, entity_routes, AppState, EntityRegistry, MemoryStore, Store};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let config = FullConfig {
        entities: vec![serde_json::from_value(users_config(json!({
            "softDelete": { "field": "deletedAt" },
            "scope": [{ "key": "tenantId", "column": "tenant_id" }],
            "validation": { "email": { "format": "email" } }
        })))
        .unwrap()],
    };
    let model = resolve(&config).unwrap();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let registry = EntityRegistry::from_model(&model, store.clone()).unwrap();
    let state = AppState::new(registry, store);
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", entity_routes(state))
}

async fn send(app: &Router, method: &str, uri: &str, tenant: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = tenant {
        req = req.header("X-Tenant-ID", t);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_ready() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entities"], json!(["users"]));
}

#[tokio::test]
async fn crud_over_http() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/users",
        Some("A"),
        Some(json!({ "tenant_id": "A", "name": "Ada", "email": "ada@a.io" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].clone();
    assert_eq!(id, json!(1));

    let (status, body) = send(&app, "GET", "/api/users/1", Some("A"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada");

    let (status, _) = send(&app, "GET", "/api/users/1", Some("B"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "PATCH", "/api/users/1", Some("A"), Some(json!({ "name": "Ada L" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada L");

    let (status, body) = send(&app, "DELETE", "/api/users/1", Some("A"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": { "success": true, "count": 1 } }));

    let (status, _) = send(&app, "GET", "/api/users/1", Some("A"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/api/users/1?includeDeleted=true", Some("A"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/users/1/restore", Some("A"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "DELETE", "/api/users/1/permanent", Some("A"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    let (status, body) = send(&app, "DELETE", "/api/users/1/permanent", Some("A"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn list_with_query_parameters() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/users/bulk",
        None,
        Some(json!([
            { "tenant_id": "A", "name": "a1", "role": "admin" },
            { "tenant_id": "A", "name": "a2" },
            { "tenant_id": "B", "name": "b1", "role": "admin" }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["count"], 3);

    let filters = "%7B%22role%22%3A%22admin%22%7D";
    let uri = format!("/api/users?filters={}&orderBy=name:desc&perPage=1", filters);
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalItems"], 2);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["hasNextPage"], true);
    assert_eq!(body["data"]["results"][0]["name"], "b1");

    let (_, body) = send(&app, "GET", "/api/users", Some("A"), None).await;
    assert_eq!(body["data"]["totalItems"], 2);

    let (status, body) = send(&app, "POST", "/api/users/bulk/delete", Some("A"), Some(json!({ "ids": [1, 2, 3] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);

    let (status, body) = send(&app, "POST", "/api/users/bulk/restore", None, Some(json!({ "ids": ["1"] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn errors_use_the_envelope() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/users", None, Some(json!({ "email": "nope" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"][0]["field"], "email");

    let (status, body) = send(&app, "GET", "/api/ghosts", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, "GET", "/api/users?filters=%5B1%5D", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "PATCH", "/api/users/abc", None, Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"][0]["field"], "id");
}
