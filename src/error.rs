// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error (downstream store/email failure)
    Internal(String),

    // 400 Bad Request (missing/invalid required field)
    Validation(String),

    // 400 Bad Request (duplicate friend request, self-target, already-friends)
    Conflict(String),

    // 401 Unauthorized (missing/invalid/expired credential)
    Authentication(String),

    // 403 Forbidden (insufficient role/ownership/friendship)
    Authorization(String),

    // 404 Not Found (unknown id or unmatched route)
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into the `{status, message}` JSON envelope with the
/// appropriate HTTP status code. 4xx failures report `"fail"`, 5xx `"error"`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, envelope, message) = match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    // Internal detail stays in the logs.
                    "something went very wrong".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "fail", msg),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, "fail", msg),
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, "fail", msg),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, "fail", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "fail", msg),
        };
        let body = Json(json!({
            "status": envelope,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Internal`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        let cases = [
            (AppError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("c".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Authentication("a".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Authorization("a".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (
                AppError::Internal("i".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
