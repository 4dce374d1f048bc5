use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sessionward::auth::{IssuedResetTicket, ResetTicketDelivery, Role, User};
use sessionward::Result;
use tokio::sync::Notify;

use crate::support::{
    assert_unauthorized, login, read_json, send_request, setup_test_app, setup_test_app_with,
};

#[derive(Default)]
struct RecordingDelivery {
    tokens: Mutex<Vec<String>>,
}

impl RecordingDelivery {
    fn last(&self) -> Option<String> {
        self.tokens.lock().unwrap().last().cloned()
    }

    /// Delivery runs in the background in production mode.
    async fn wait_for_token(&self) -> String {
        for _ in 0..200 {
            if let Some(token) = self.last() {
                return token;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("no reset ticket delivered");
    }
}

#[async_trait]
impl ResetTicketDelivery for RecordingDelivery {
    async fn deliver(&self, _user: &User, ticket: &IssuedResetTicket) -> Result<()> {
        self.tokens.lock().unwrap().push(ticket.token.clone());
        Ok(())
    }
}

async fn forgot(app: &crate::support::TestApp, email: &str) -> axum::response::Response {
    send_request(app, Method::POST, "/auth/forgot-password", None, Some(json!({ "email": email })))
        .await
}

async fn reset(
    app: &crate::support::TestApp,
    token: &str,
    new_password: &str,
) -> axum::response::Response {
    send_request(
        app,
        Method::POST,
        "/auth/reset-password",
        None,
        Some(json!({ "token": token, "newPassword": new_password })),
    )
    .await
}

async fn assert_invalid_ticket(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_or_expired");
}

#[tokio::test]
async fn full_reset_flow_rotates_password_and_revokes_sessions() {
    let app = setup_test_app().await;
    app.create_user("lena@example.com", "forgotten", Role::User).await;
    let old_session = login(&app, "lena@example.com", "forgotten").await;

    let response = forgot(&app, "lena@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    let ticket = body["resetToken"].as_str().expect("test mode echoes the token").to_string();

    let response = reset(&app, &ticket, "remembered").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["message"], "password updated");

    let response = send_request(&app, Method::GET, "/me", Some(&old_session), None).await;
    assert_unauthorized(response).await;

    let response = send_request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "lena@example.com", "password": "forgotten" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    login(&app, "lena@example.com", "remembered").await;

    // Single use.
    assert_invalid_ticket(reset(&app, &ticket, "third-password").await).await;
}

#[tokio::test]
async fn unknown_and_expired_tickets_are_rejected() {
    let app = setup_test_app().await;
    app.create_user("mo@example.com", "mo-password", Role::User).await;

    assert_invalid_ticket(reset(&app, "no-such-ticket", "whatever1").await).await;

    let stale = app
        .state
        .reset_flow
        .request_at(Utc::now() - Duration::minutes(31), "mo@example.com")
        .await
        .unwrap();
    assert_invalid_ticket(reset(&app, &stale.token, "whatever1").await).await;

    login(&app, "mo@example.com", "mo-password").await;
}

#[tokio::test]
async fn reset_enforces_password_policy() {
    let app = setup_test_app().await;
    app.create_user("ned@example.com", "ned-password", Role::User).await;
    let body: Value = read_json(forgot(&app, "ned@example.com").await).await;
    let ticket = body["resetToken"].as_str().unwrap().to_string();

    let response = reset(&app, &ticket, "123").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The ticket survives a rejected password.
    let response = reset(&app, &ticket, "123456").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_is_not_found_in_test_mode() {
    let app = setup_test_app().await;

    let response = forgot(&app, "ghost@example.com").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn production_mode_hides_token_and_account_existence() {
    let delivery = Arc::new(RecordingDelivery::default());
    let app = setup_test_app_with(|config| config.auth.expose_reset_token = false, delivery.clone())
        .await;
    app.create_user("opal@example.com", "opal-pass", Role::User).await;

    let known = forgot(&app, "opal@example.com").await;
    assert_eq!(known.status(), StatusCode::ACCEPTED);
    let known: Value = read_json(known).await;
    assert!(known.get("resetToken").is_none());

    let unknown = forgot(&app, "ghost@example.com").await;
    assert_eq!(unknown.status(), StatusCode::ACCEPTED);
    let unknown: Value = read_json(unknown).await;
    assert_eq!(known, unknown);

    let ticket = delivery.wait_for_token().await;
    let response = reset(&app, &ticket, "opal-new-pass").await;
    assert_eq!(response.status(), StatusCode::OK);
    login(&app, "opal@example.com", "opal-new-pass").await;
}

#[tokio::test]
async fn concurrent_redemptions_have_one_winner() {
    let app = Arc::new(setup_test_app().await);
    app.create_user("pia@example.com", "pia-pass", Role::User).await;
    let body: Value = read_json(forgot(&app, "pia@example.com").await).await;
    let ticket = body["resetToken"].as_str().unwrap().to_string();

    let mut set = tokio::task::JoinSet::new();
    for i in 0..4 {
        let app = app.clone();
        let ticket = ticket.clone();
        set.spawn(async move { reset(&app, &ticket, &format!("racer-password-{i}")).await.status() });
    }

    let mut statuses = Vec::new();
    while let Some(status) = set.join_next().await {
        statuses.push(status.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 3);

    let winners: Vec<_> = (0..4).map(|i| format!("racer-password-{i}")).collect();
    let mut logged_in = 0;
    for password in &winners {
        let response = send_request(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "pia@example.com", "password": password })),
        )
        .await;
        if response.status() == StatusCode::OK {
            logged_in += 1;
        }
    }
    assert_eq!(logged_in, 1);
}

/// Holds every delivery until released.
#[derive(Default)]
struct GatedDelivery {
    release: Notify,
    inner: RecordingDelivery,
}

#[async_trait]
impl ResetTicketDelivery for GatedDelivery {
    async fn deliver(&self, user: &User, ticket: &IssuedResetTicket) -> Result<()> {
        self.release.notified().await;
        self.inner.deliver(user, ticket).await
    }
}

#[tokio::test]
async fn production_mode_answers_before_issuing() {
    let delivery = Arc::new(GatedDelivery::default());
    let app = setup_test_app_with(|config| config.auth.expose_reset_token = false, delivery.clone())
        .await;
    app.create_user("rue@example.com", "rue-pass", Role::User).await;

    // A known address must not wait on ticket storage or delivery.
    let response = tokio::time::timeout(StdDuration::from_secs(2), forgot(&app, "rue@example.com"))
        .await
        .expect("answered without waiting for delivery");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(delivery.inner.last().is_none());

    delivery.release.notify_one();
    let ticket = delivery.inner.wait_for_token().await;
    assert_eq!(reset(&app, &ticket, "rue-new-pass").await.status(), StatusCode::OK);
}
