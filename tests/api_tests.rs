// tests/api_tests.rs

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use imgsuch_backend::{
    config::Config,
    error::AppError,
    routes,
    state::AppState,
    utils::email::{LogMailer, Mailer},
};
use sqlx::postgres::PgPoolOptions;

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        jwt_cookie_expires_in: 1,
        rust_log: "error".to_string(),
        port: 0,
        cors_origin: "http://127.0.0.1:5173".to_string(),
        public_url: "http://localhost:3000".to_string(),
        cookie_secure: false,
        admin_name: None,
        admin_email: None,
        admin_password: None,
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app_with_mailer(mailer: Arc<dyn Mailer>) -> String {
    // Note: requires a running Postgres, read from DATABASE_URL.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let state = AppState {
        pool,
        config: test_config(&database_url),
        mailer,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn spawn_app() -> String {
    spawn_app_with_mailer(Arc::new(LogMailer)).await
}

fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

async fn signup(
    client: &reqwest::Client,
    address: &str,
    email: &str,
    password: &str,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/v1/users/signup", address))
        .json(&serde_json::json!({
            "name": "Test User",
            "email": email,
            "password": password,
            "password_confirm": password,
        }))
        .send()
        .await
        .expect("Failed to execute signup request");

    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("Failed to parse signup json")
}

#[tokio::test]
async fn unknown_route_produces_not_found_envelope() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn signup_works_and_sets_cookie() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    let response = client
        .post(format!("{}/api/v1/users/signup", address))
        .json(&serde_json::json!({
            "name": "Ada Lovelace",
            "email": email,
            "password": "password123",
            "password_confirm": "password123",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);

    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("signup should set the jwt cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["user"]["email"], email);
    // The password hash must never be serialized.
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
async fn signup_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Mismatched confirmation
    let response = client
        .post(format!("{}/api/v1/users/signup", address))
        .json(&serde_json::json!({
            "name": "A",
            "email": unique_email(),
            "password": "password123",
            "password_confirm": "password456",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Invalid email
    let response = client
        .post(format!("{}/api/v1/users/signup", address))
        .json(&serde_json::json!({
            "name": "A",
            "email": "not-an-email",
            "password": "password123",
            "password_confirm": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    signup(&client, &address, &email, "password123").await;

    let response = client
        .post(format!("{}/api/v1/users/signup", address))
        .json(&serde_json::json!({
            "name": "B",
            "email": email,
            "password": "password123",
            "password_confirm": "password123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn login_verifies_credentials() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    signup(&client, &address, &email, "password123").await;

    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["token"].is_string());

    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({ "email": email, "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_credential() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/users/getMyStories", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn cookie_credential_authenticates() {
    let address = spawn_app().await;
    // Cookie-store client: the jwt cookie set by login is sent back
    // automatically, no Authorization header involved.
    let client = reqwest::Client::builder().cookie_store(true).build().unwrap();
    let email = unique_email();

    signup(&client, &address, &email, "password123").await;

    let response = client
        .get(format!("{}/api/v1/users/getMyStories", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn update_password_invalidates_old_tokens() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    let signup_body = signup(&client, &address, &email, "password123").await;
    let old_token = signup_body["token"].as_str().unwrap().to_string();

    // Wrong current password
    let response = client
        .patch(format!("{}/api/v1/users/updatePassword", address))
        .header("Authorization", format!("Bearer {}", old_token))
        .json(&serde_json::json!({
            "password_current": "not the password",
            "password": "newpassword123",
            "password_confirm": "newpassword123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // The password-change stamp is second-granular; make sure the old
    // token's issued-at is strictly in the past.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let response = client
        .patch(format!("{}/api/v1/users/updatePassword", address))
        .header("Authorization", format!("Bearer {}", old_token))
        .json(&serde_json::json!({
            "password_current": "password123",
            "password": "newpassword123",
            "password_confirm": "newpassword123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let new_token = body["token"].as_str().unwrap().to_string();

    // Old token was issued before the change and must be rejected now.
    let response = client
        .get(format!("{}/api/v1/users/getMyStories", address))
        .header("Authorization", format!("Bearer {}", old_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // The fresh token works, and so does the new password.
    let response = client
        .get(format!("{}/api/v1/users/getMyStories", address))
        .header("Authorization", format!("Bearer {}", new_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({ "email": email, "password": "newpassword123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

/// Mailer that records every message, used to capture the reset link.
struct CapturingMailer {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, _to: &str, _subject: &str, body: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

/// Mailer whose transport is down.
struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), AppError> {
        Err(AppError::Internal("smtp transport is down".to_string()))
    }
}

#[tokio::test]
async fn forgot_and_reset_password_flow() {
    let mailer = Arc::new(CapturingMailer {
        sent: Mutex::new(Vec::new()),
    });
    let address = spawn_app_with_mailer(mailer.clone()).await;
    let client = reqwest::Client::new();
    let email = unique_email();

    signup(&client, &address, &email, "password123").await;

    let response = client
        .post(format!("{}/api/v1/users/forgotPassword", address))
        .json(&serde_json::json!({ "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Fish the plain token out of the captured reset link.
    let token = {
        let sent = mailer.sent.lock().unwrap();
        let body = sent.last().expect("reset email should have been sent");
        let marker = "resetPassword/";
        let start = body.find(marker).unwrap() + marker.len();
        body[start..]
            .split_whitespace()
            .next()
            .unwrap()
            .to_string()
    };

    let response = client
        .patch(format!("{}/api/v1/users/resetPassword/{}", address, token))
        .json(&serde_json::json!({
            "password": "resetpassword1",
            "password_confirm": "resetpassword1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Token is single-use.
    let response = client
        .patch(format!("{}/api/v1/users/resetPassword/{}", address, token))
        .json(&serde_json::json!({
            "password": "resetpassword2",
            "password_confirm": "resetpassword2",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({ "email": email, "password": "resetpassword1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn reset_password_rejects_unknown_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .patch(format!(
            "{}/api/v1/users/resetPassword/deadbeefdeadbeef",
            address
        ))
        .json(&serde_json::json!({
            "password": "whatever12345",
            "password_confirm": "whatever12345",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn forgot_password_rolls_back_token_when_email_fails() {
    // Two app instances over the same database: signup goes through a
    // healthy mailer, the forgot-password call through a dead one.
    let healthy_address = spawn_app().await;
    let address = spawn_app_with_mailer(Arc::new(FailingMailer)).await;
    let client = reqwest::Client::new();
    let email = unique_email();

    signup(&client, &healthy_address, &email, "password123").await;

    let response = client
        .post(format!("{}/api/v1/users/forgotPassword", address))
        .json(&serde_json::json!({ "email": email }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");

    // The issued token must have been rolled back, not left dangling.
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let token: Option<String> = sqlx::query_scalar(
        "SELECT password_reset_token FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert!(token.is_none());
}

#[tokio::test]
async fn logout_overwrites_the_cookie() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/users/logout", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("logout should overwrite the jwt cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("jwt=loggedout"));
}
