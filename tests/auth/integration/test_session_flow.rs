use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{
    assert_unauthorized, login, read_json, register, send_request, setup_test_app,
};

#[tokio::test]
async fn register_login_and_fetch_profile() {
    let app = setup_test_app().await;

    let created = register(&app, "Alice", "alice@example.com", "wonderland").await;
    assert_eq!(created["email"], "alice@example.com");
    assert_eq!(created["role"], "user");
    assert!(created.get("passwordHash").is_none());
    assert!(created.get("revocationCounter").is_none());

    let response = send_request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wonderland" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["expiresIn"], 3600);
    assert!(body["expiresAt"].is_string());
    let token = body["token"].as_str().unwrap();

    let response = send_request(&app, Method::GET, "/me", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = read_json(response).await;
    assert_eq!(me["id"], created["id"]);
    assert_eq!(me["name"], "Alice");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = setup_test_app().await;
    register(&app, "Bob", "bob@example.com", "builder1").await;

    let response = send_request(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "name": "Bobby", "email": "bob@example.com", "password": "builder2" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "duplicate_email");
}

#[tokio::test]
async fn registration_validates_input() {
    let app = setup_test_app().await;

    for payload in [
        json!({ "name": "C", "email": "c@example.com", "password": "long-enough" }),
        json!({ "name": "Carol", "email": "not-an-email", "password": "long-enough" }),
        json!({ "name": "Carol", "email": "c@example.com", "password": "short" }),
        json!({ "name": "Carol", "email": "c@example.com" }),
    ] {
        let response =
            send_request(&app, Method::POST, "/auth/register", None, Some(payload.clone())).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "payload {payload}");
        let body: Value = read_json(response).await;
        assert_eq!(body["error"], "validation_error");
    }
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let app = setup_test_app().await;
    register(&app, "Dave", "dave@example.com", "correct-horse").await;

    let mut bodies = Vec::new();
    for (email, password) in
        [("dave@example.com", "battery-staple"), ("nobody@example.com", "correct-horse")]
    {
        let response = send_request(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(read_json::<Value>(response).await);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["error"], "invalid_credentials");
}

#[tokio::test]
async fn logout_revokes_every_session() {
    let app = setup_test_app().await;
    register(&app, "Erin", "erin@example.com", "erin-pass").await;
    let first = login(&app, "erin@example.com", "erin-pass").await;
    let second = login(&app, "erin@example.com", "erin-pass").await;

    let response = send_request(&app, Method::POST, "/auth/logout", Some(&first), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for token in [&first, &second] {
        let response = send_request(&app, Method::GET, "/me", Some(token), None).await;
        assert_unauthorized(response).await;
    }

    let fresh = login(&app, "erin@example.com", "erin-pass").await;
    let response = send_request(&app, Method::GET, "/me", Some(&fresh), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn change_password_returns_fresh_token_and_revokes_old_ones() {
    let app = setup_test_app().await;
    register(&app, "Frank", "frank@example.com", "old-secret").await;
    let old_token = login(&app, "frank@example.com", "old-secret").await;

    let response = send_request(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&old_token),
        Some(json!({ "currentPassword": "old-secret", "newPassword": "new-secret" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    let new_token = body["token"].as_str().unwrap().to_string();

    let response = send_request(&app, Method::GET, "/me", Some(&new_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_request(&app, Method::GET, "/me", Some(&old_token), None).await;
    assert_unauthorized(response).await;

    login(&app, "frank@example.com", "new-secret").await;
}

#[tokio::test]
async fn change_password_with_wrong_current_password_fails() {
    let app = setup_test_app().await;
    register(&app, "Gina", "gina@example.com", "gina-pass").await;
    let token = login(&app, "gina@example.com", "gina-pass").await;

    let response = send_request(
        &app,
        Method::POST,
        "/auth/change-password",
        Some(&token),
        Some(json!({ "currentPassword": "guess", "newPassword": "new-secret" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nothing was rotated.
    let response = send_request(&app, Method::GET, "/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
