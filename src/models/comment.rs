use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub story_id: i64,
    pub author_id: i64,
    pub comment: String,
    pub rating: i64,
    pub private: bool,
    pub disabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating or updating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "comment must be between 1 and 1000 characters"
    ))]
    pub comment: String,
}

/// DTO for displaying a comment. Author info is limited to the fields
/// other users are allowed to see.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub story_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_photo: String,
    pub author_since: chrono::DateTime<chrono::Utc>,
    pub comment: String,
    pub rating: i64,
    pub disabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
