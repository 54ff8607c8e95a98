// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::user::User,
    state::AppState,
    utils::guard::{self, AUTH_COOKIE},
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Issued-at as Unix timestamp. Compared against the user's
    /// password-change time to force re-login after a password change.
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

fn unix_now() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs() as usize)
}

/// Signs a new JWT for the user.
pub fn sign_jwt(id: i64, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    let iat = unix_now()?;

    let claims = Claims {
        sub: id.to_string(),
        iat,
        exp: iat + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Authentication("invalid or expired token".to_string()))?;

    Ok(token_data.claims)
}

/// Pulls the bearer credential out of the `Authorization` header,
/// falling back to the `jwt` cookie.
fn extract_token(req: &Request<Body>) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    from_header.or_else(|| {
        CookieJar::from_headers(req.headers())
            .get(AUTH_COOKIE)
            .map(|c| c.value().to_string())
    })
}

/// Axum Middleware: Authentication.
///
/// Validates the credential, resolves it to a live user record and injects
/// that `User` into the request extensions for handlers and later guards.
/// Rejects when the token is missing/invalid/expired, when the subject no
/// longer exists or is deactivated, or when the password was changed after
/// the token was issued.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req)
        .ok_or_else(|| AppError::Authentication("you are not logged in".to_string()))?;

    let claims = verify_jwt(&token, &state.config.jwt_secret)?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Authentication("invalid token subject".to_string()))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| {
            AppError::Authentication(
                "the user belonging to this token no longer exists".to_string(),
            )
        })?;

    if !user.active {
        return Err(AppError::Authentication(
            "this account has been deactivated".to_string(),
        ));
    }

    if user.changed_password_after(claims.iat) {
        return Err(AppError::Authentication(
            "user has changed the password after the token has been issued".to_string(),
        ));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks the injected user's role.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::Authentication("you are not logged in".to_string()))?;

    guard::check_role(user, &["admin"])?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let token = sign_jwt(42, "secret", 600).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(42, "secret", 600).unwrap();
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = sign_jwt(42, "secret", 600).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(verify_jwt(&tampered, "secret").is_err());
    }
}
