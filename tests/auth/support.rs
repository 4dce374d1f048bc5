use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sessionward::{
    api::{build_router, ApiState},
    auth::{Registration, ResetTicketDelivery, Role, TracingResetDelivery, User},
    config::{AppConfig, HashingConfig},
    domain::UserId,
    storage::{create_pool, DbPool},
};
use tempfile::TempDir;
use tower::ServiceExt;
use zeroize::Zeroizing;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    _dir: TempDir,
    pub pool: DbPool,
    pub state: ApiState,
    pub config: AppConfig,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Create an admin directly through the service layer and log it in.
    pub async fn admin_token(&self) -> String {
        self.state
            .login_service
            .ensure_bootstrap_admin(ADMIN_EMAIL, Zeroizing::new(ADMIN_PASSWORD.to_string()))
            .await
            .expect("bootstrap admin");
        login(self, ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn create_user(&self, email: &str, password: &str, role: Role) -> User {
        self.state
            .user_service
            .create_user(
                Registration {
                    name: "Test User".to_string(),
                    email: email.to_string(),
                    password: Zeroizing::new(password.to_string()),
                    role,
                },
                UserId::new(0),
            )
            .await
            .expect("create user")
    }
}

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.path().join("sessionward.db").display());
    config.database.max_connections = 5;
    config.database.auto_migrate = true;
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.auth.expose_reset_token = true;
    config.auth.hashing = HashingConfig { memory_kib: 256, iterations: 1, parallelism: 1 };
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}, Arc::new(TracingResetDelivery)).await
}

pub async fn setup_test_app_with(
    customize: impl FnOnce(&mut AppConfig),
    delivery: Arc<dyn ResetTicketDelivery>,
) -> TestApp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = test_config(&dir);
    customize(&mut config);
    config.validate().expect("valid test config");

    let pool = create_pool(&config.database).await.expect("create sqlite pool");
    let state = ApiState::with_delivery(pool.clone(), &config, delivery).expect("build state");

    TestApp { _dir: dir, pool, state, config }
}

/// Send a request with an optional raw `Authorization` header value.
pub async fn send_with_header(
    app: &TestApp,
    method: Method,
    path: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let header = token.map(|token| format!("Bearer {}", token));
    send_with_header(app, method, path, header.as_deref(), body).await
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

pub async fn register(app: &TestApp, name: &str, email: &str, password: &str) -> Value {
    let response = send_request(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": password })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
    read_json(response).await
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> String {
    let response = send_request(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "login {email}");
    let body: Value = read_json(response).await;
    body["token"].as_str().expect("token in login response").to_string()
}

pub async fn assert_unauthorized(response: Response) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "invalid or expired credentials");
}
