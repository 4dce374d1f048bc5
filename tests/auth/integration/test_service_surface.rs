use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::support::{read_json, send_request, setup_test_app};

#[tokio::test]
async fn healthz_reports_database_state() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");

    app.pool.close().await;

    let response = send_request(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = read_json(response).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/definitely/not/here", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = setup_test_app().await;

    let response = send_request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": 42 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn openapi_document_lists_auth_routes() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = read_json(response).await;
    let paths = doc["paths"].as_object().expect("paths object");
    for path in ["/auth/login", "/auth/reset-password", "/me", "/admin/users/{id}/revoke"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
    assert!(doc["components"]["securitySchemes"]["bearerAuth"].is_object());
}
