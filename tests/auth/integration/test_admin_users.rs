use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use sessionward::auth::Role;
use tracing_test::traced_test;

use crate::support::{assert_unauthorized, login, read_json, send_request, setup_test_app};

#[tokio::test]
async fn admin_routes_require_authentication_first() {
    let app = setup_test_app().await;

    let response = send_request(
        &app,
        Method::POST,
        "/admin/users",
        None,
        Some(json!({ "name": "Nope", "email": "nope@example.com", "password": "nope-pass" })),
    )
    .await;
    assert_unauthorized(response).await;

    let response = send_request(&app, Method::GET, "/admin/users/1", Some("garbage"), None).await;
    assert_unauthorized(response).await;
}

#[tokio::test]
async fn regular_users_are_forbidden() {
    let app = setup_test_app().await;
    app.create_user("quinn@example.com", "quinn-pass", Role::User).await;
    let token = login(&app, "quinn@example.com", "quinn-pass").await;

    let response = send_request(&app, Method::GET, "/admin/users/1", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn admin_creates_and_fetches_users() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;

    let response = send_request(
        &app,
        Method::POST,
        "/admin/users",
        Some(&admin),
        Some(json!({
            "name": "Rita",
            "email": "rita@example.com",
            "password": "rita-pass",
            "role": "admin"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = read_json(response).await;
    assert_eq!(created["role"], "admin");
    let id = created["id"].as_i64().unwrap();

    let response = send_request(
        &app,
        Method::POST,
        "/admin/users",
        Some(&admin),
        Some(json!({ "name": "Rita Two", "email": "rita@example.com", "password": "rita-pass" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        send_request(&app, Method::GET, &format!("/admin/users/{id}"), Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = read_json(response).await;
    assert_eq!(fetched["email"], "rita@example.com");

    let response =
        send_request(&app, Method::GET, "/admin/users/424242", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "user_not_found");

    let response =
        send_request(&app, Method::GET, "/admin/users/not-a-number", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn promoted_user_gains_admin_access() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let user = app.create_user("sam@example.com", "sam-pass", Role::User).await;
    let token = login(&app, "sam@example.com", "sam-pass").await;

    let path = format!("/admin/users/{}", user.id);
    let response = send_request(&app, Method::GET, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send_request(
        &app,
        Method::PUT,
        &format!("/admin/users/{}/role", user.id),
        Some(&admin),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = read_json(response).await;
    assert_eq!(updated["role"], "admin");

    // Roles are read from the directory on every request, not from the token.
    let response = send_request(&app, Method::GET, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_revocation_logs_the_user_out_everywhere() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let user = app.create_user("tess@example.com", "tess-pass", Role::User).await;
    let token = login(&app, "tess@example.com", "tess-pass").await;

    let response = send_request(
        &app,
        Method::POST,
        &format!("/admin/users/{}/revoke", user.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["userId"], user.id.get());
    assert_eq!(body["revocationCounter"], 1);

    let response = send_request(&app, Method::GET, "/me", Some(&token), None).await;
    assert_unauthorized(response).await;

    // The admin's own session is untouched.
    let response = send_request(&app, Method::GET, "/me", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        send_request(&app, Method::POST, "/admin/users/424242/revoke", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[traced_test]
#[tokio::test]
async fn deleted_user_token_stops_validating() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let user = app.create_user("uma@example.com", "uma-pass", Role::User).await;
    let token = login(&app, "uma@example.com", "uma-pass").await;

    let response = send_request(&app, Method::GET, "/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let path = format!("/admin/users/{}", user.id);
    let response = send_request(&app, Method::DELETE, &path, Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Signature and expiry are still fine; only the principal is gone.
    let response = send_request(&app, Method::GET, "/me", Some(&token), None).await;
    assert_unauthorized(response).await;
    assert!(logs_contain("unknown_principal"));

    let response = send_request(&app, Method::DELETE, &path, Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send_request(&app, Method::GET, &path, Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_reach_bearer_routes() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;

    // Bearer-only routes do not apply a role check, so admins still reach them.
    let response = send_request(&app, Method::GET, "/me", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["role"], "admin");
}
