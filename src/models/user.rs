// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    pub name: String,

    /// Unique, stored lowercased.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user', 'moderator' or 'admin'.
    pub role: String,

    /// Reference to the profile photo (served by the static pipeline).
    pub photo: String,

    /// Aggregate reputation, mirrored from ratings on the user's comments.
    pub rating: i64,

    /// Deactivated accounts cannot authenticate.
    #[serde(skip)]
    pub active: bool,

    #[serde(skip)]
    pub password_changed_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(skip)]
    pub password_reset_token: Option<String>,

    #[serde(skip)]
    pub password_reset_expires: Option<chrono::DateTime<chrono::Utc>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Whether the password was changed after a token with the given
    /// issued-at timestamp was signed. Such tokens must be rejected.
    pub fn changed_password_after(&self, token_iat: usize) -> bool {
        match self.password_changed_at {
            Some(changed_at) => (token_iat as i64) < changed_at.timestamp(),
            None => false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// The subset of user fields exposed to other users
/// (friend lists, comment authors).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub photo: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,

    #[validate(email(message = "please provide a valid email"))]
    pub email: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "password must be between 8 and 128 characters"
    ))]
    pub password: String,

    #[validate(must_match(other = "password", message = "please confirm your password correctly"))]
    pub password_confirm: String,
}

/// DTO for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "please provide a valid email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(
        min = 8,
        max = 128,
        message = "password must be between 8 and 128 characters"
    ))]
    pub password: String,
    #[validate(must_match(other = "password", message = "please confirm your password correctly"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, max = 128, message = "current password is required"))]
    pub password_current: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "password must be between 8 and 128 characters"
    ))]
    pub password: String,
    #[validate(must_match(other = "password", message = "please confirm your password correctly"))]
    pub password_confirm: String,
}

/// DTO for profile updates. Fields are optional; the photo is a reference
/// produced by the upload pipeline, not raw image data.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 500, message = "invalid photo reference"))]
    pub photo: Option<String>,
}
