// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Lifetime of the `jwt` cookie, in days.
    pub jwt_cookie_expires_in: i64,
    pub rust_log: String,
    pub port: u16,
    /// Origin allowed by CORS (the frontend).
    pub cors_origin: String,
    /// Base URL used when composing links sent by email.
    pub public_url: String,
    /// Mark the auth cookie `Secure`. Enable behind HTTPS or a trusted proxy.
    pub cookie_secure: bool,
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let jwt_cookie_expires_in = env::var("JWT_COOKIE_EXPIRES_IN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://127.0.0.1:5173".to_string());

        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            jwt_cookie_expires_in,
            rust_log,
            port,
            cors_origin,
            public_url,
            cookie_secure,
            admin_name: env::var("ADMIN_NAME").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }
}
