use std::sync::Arc;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use sessionward::auth::{Role, SigningConfig, TokenIssuer};
use tracing_test::traced_test;

use crate::support::{
    assert_unauthorized, login, send_request, send_with_header, setup_test_app, TEST_SECRET,
};

#[tokio::test]
async fn missing_and_malformed_headers_are_rejected() {
    let app = setup_test_app().await;
    app.create_user("hal@example.com", "hal-9000", Role::User).await;
    let token = login(&app, "hal@example.com", "hal-9000").await;

    let response = send_with_header(&app, Method::GET, "/me", None, None).await;
    assert_unauthorized(response).await;

    for header in [
        String::new(),
        "Bearer".to_string(),
        "Bearer ".to_string(),
        format!("Basic {token}"),
        format!("Bearer  {token}"),
        format!("Bearer {token} extra"),
        format!("Token {token}"),
    ] {
        let response = send_with_header(&app, Method::GET, "/me", Some(&header), None).await;
        assert_unauthorized(response).await;
    }

    let lowercase = format!("bearer {token}");
    let response = send_with_header(&app, Method::GET, "/me", Some(&lowercase), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forged_and_garbage_tokens_are_rejected() {
    let app = setup_test_app().await;
    let user = app.create_user("ivy@example.com", "ivy-pass", Role::User).await;

    let foreign = SigningConfig::new(b"a-completely-different-secret-value!!", 3600).unwrap();
    let forged = TokenIssuer::new(Arc::new(foreign)).issue_default(user.id, 0).unwrap();

    for token in ["not-a-jwt", "a.b.c", forged.token.as_str()] {
        let response = send_request(&app, Method::GET, "/me", Some(token), None).await;
        assert_unauthorized(response).await;
    }
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = setup_test_app().await;
    let user = app.create_user("jay@example.com", "jay-pass", Role::User).await;

    let signing = Arc::new(SigningConfig::new(TEST_SECRET.as_bytes(), 3600).unwrap());
    let issuer = TokenIssuer::new(signing);
    let expired = issuer.issue_at(Utc::now() - Duration::hours(2), user.id, 0, 3600).unwrap();
    let valid = issuer.issue_default(user.id, 0).unwrap();

    let response = send_request(&app, Method::GET, "/me", Some(&expired.token), None).await;
    assert_unauthorized(response).await;

    let response = send_request(&app, Method::GET, "/me", Some(&valid.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mismatched_counter_or_unknown_user_is_rejected() {
    let app = setup_test_app().await;
    let user = app.create_user("kim@example.com", "kim-pass", Role::User).await;

    let signing = Arc::new(SigningConfig::new(TEST_SECRET.as_bytes(), 3600).unwrap());
    let issuer = TokenIssuer::new(signing);

    // A counter ahead of the stored one is as invalid as one behind it.
    let ahead = issuer.issue_default(user.id, 5).unwrap();
    let response = send_request(&app, Method::GET, "/me", Some(&ahead.token), None).await;
    assert_unauthorized(response).await;

    let unknown = issuer.issue_default(sessionward::domain::UserId::new(99_999), 0).unwrap();
    let response = send_request(&app, Method::GET, "/me", Some(&unknown.token), None).await;
    assert_unauthorized(response).await;
}

#[traced_test]
#[tokio::test]
async fn rejection_reason_is_logged_but_not_returned() {
    let app = setup_test_app().await;
    app.create_user("lou@example.com", "lou-pass", Role::User).await;
    let token = login(&app, "lou@example.com", "lou-pass").await;

    let response = send_request(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send_request(&app, Method::GET, "/me", Some(&token), None).await;
    assert_unauthorized(response).await;

    assert!(logs_contain("session token rejected"));
    assert!(logs_contain("revoked"));
}
