use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::Validate;

/// Represents the 'stories' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub text: Option<String>,

    /// List of image references.
    /// Stored as a JSON array in the database.
    /// `sqlx::types::Json` handles automatic serialization/deserialization.
    pub images: Json<Vec<String>>,

    /// Private stories are visible to the author and their friends only.
    pub private: bool,

    /// Soft-deleted (Disabled) stories stay in storage until an admin purges them.
    pub disabled: bool,

    pub rating: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a story.
///
/// A story must have a title and at least one of {image, text};
/// that cross-field rule is checked by [`validate_story_content`]
/// after the per-field validation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoryRequest {
    #[validate(length(min = 1, max = 200, message = "a title is required"))]
    pub title: String,

    #[validate(length(max = 10000, message = "story text is limited to 10000 characters"))]
    pub text: Option<String>,

    #[validate(custom(function = validate_image_refs))]
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub private: bool,
}

/// DTO for updating a story. Same content rule as creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStoryRequest {
    #[validate(length(min = 1, max = 200, message = "a title is required"))]
    pub title: String,

    #[validate(length(max = 10000, message = "story text is limited to 10000 characters"))]
    pub text: Option<String>,

    #[validate(custom(function = validate_image_refs))]
    #[serde(default)]
    pub images: Vec<String>,

    pub private: Option<bool>,
}

/// A story must have at least one of {image, text}.
pub fn validate_story_content(text: Option<&str>, images: &[String]) -> bool {
    let has_text = text.map(|t| !t.trim().is_empty()).unwrap_or(false);
    has_text || !images.is_empty()
}

/// Validates a collection of image references: either full URLs or bare
/// file names produced by the upload pipeline.
fn validate_image_refs(images: &[String]) -> Result<(), validator::ValidationError> {
    for img in images {
        if img.is_empty() || img.len() > 500 {
            return Err(validator::ValidationError::new("invalid_image_ref"));
        }
        let is_url = Url::parse(img).is_ok();
        let is_file_name = !img.contains('/') && !img.contains(char::is_whitespace);
        if !is_url && !is_file_name {
            return Err(validator::ValidationError::new("invalid_image_ref"));
        }
    }
    Ok(())
}
