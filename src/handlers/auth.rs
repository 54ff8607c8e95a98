// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{
        ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
        UpdatePasswordRequest, User,
    },
    state::AppState,
    utils::{
        guard::AUTH_COOKIE,
        hash::{generate_reset_token, hash_password, hash_reset_token, verify_password},
        jwt::sign_jwt,
    },
};

/// Signs a token for the user and attaches it both to the response body
/// and to the httpOnly `jwt` cookie.
fn send_token(
    user: User,
    status: StatusCode,
    jar: CookieJar,
    config: &Config,
) -> Result<(StatusCode, CookieJar, Json<serde_json::Value>), AppError> {
    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    let cookie = Cookie::build((AUTH_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(config.jwt_cookie_expires_in))
        .build();

    Ok((
        status,
        jar.add(cookie),
        Json(json!({
            "status": "success",
            "token": token,
            "data": { "user": user },
        })),
    ))
}

/// Registers a new user and logs them in immediately.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created, the token and the user object (excluding password).
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.to_lowercase();
    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&email)
    .bind(&hashed_password)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("a user with email '{}' already exists", email))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    state.mailer.send_welcome(&user.email, &user.name).await?;

    send_token(user, StatusCode::CREATED, jar, &state.config)
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.to_lowercase())
        .fetch_optional(&state.pool)
        .await?;

    // Same error for unknown email, wrong password and deactivated account.
    let invalid = || AppError::Authentication("incorrect email or password".to_string());

    let user = user.ok_or_else(invalid)?;
    if !user.active || !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    send_token(user, StatusCode::OK, jar, &state.config)
}

/// Clears the session by overwriting the cookie with a short-lived dummy.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((AUTH_COOKIE, "loggedout"))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(10))
        .build();

    (jar.add(cookie), Json(json!({ "status": "success" })))
}

/// Issues a password-reset token and emails it to the user.
///
/// The only handler with local recovery: when the email cannot be sent the
/// stored token is rolled back before surfacing the failure, so no orphaned
/// reset token stays valid.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.to_lowercase())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("there is no user with that email".to_string()))?;

    let reset_token = generate_reset_token();

    sqlx::query(
        r#"
        UPDATE users
        SET password_reset_token = $1,
            password_reset_expires = NOW() + INTERVAL '10 minutes'
        WHERE id = $2
        "#,
    )
    .bind(hash_reset_token(&reset_token))
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.public_url, reset_token
    );

    if let Err(e) = state
        .mailer
        .send_password_reset(&user.email, &user.name, &reset_url)
        .await
    {
        tracing::error!("Failed to send password reset email: {:?}", e);

        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = NULL,
                password_reset_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .execute(&state.pool)
        .await?;

        return Err(AppError::Internal(
            "there was an error sending the email".to_string(),
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "token sent to email",
    })))
}

/// Consumes an unexpired reset token, sets the new password and logs the
/// user in.
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE password_reset_token = $1 AND password_reset_expires > NOW()
        "#,
    )
    .bind(hash_reset_token(&token))
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::Validation("invalid or expired token".to_string()))?;

    let user = set_password(&state.pool, user.id, &payload.password).await?;

    send_token(user, StatusCode::OK, jar, &state.config)
}

/// Changes the password of the authenticated user after verifying the
/// current one, then re-issues the token.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    jar: CookieJar,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !verify_password(&payload.password_current, &actor.password)? {
        return Err(AppError::Authentication("wrong password".to_string()));
    }

    let user = set_password(&state.pool, actor.id, &payload.password).await?;

    send_token(user, StatusCode::OK, jar, &state.config)
}

/// Stores a new password hash and stamps `password_changed_at`.
///
/// The stamp is backdated by one second so the token signed for this very
/// response, in the same second, is not rejected as pre-change.
async fn set_password(pool: &sqlx::PgPool, user_id: i64, password: &str) -> Result<User, AppError> {
    let hashed = hash_password(password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET password = $1,
            password_changed_at = NOW() - INTERVAL '1 second',
            password_reset_token = NULL,
            password_reset_expires = NULL
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(&hashed)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}
