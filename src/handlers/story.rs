// src/handlers/story.rs
//
// Story CRUD plus the story side of the toggle-vote rating engine. Every
// handler loads its target once, runs the authorization checks against the
// loaded row, and only then mutates.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CommentRequest, CommentResponse},
        story::{Story, UpdateStoryRequest, validate_story_content},
        user::User,
    },
    utils::{guard, html::clean_html},
};

pub(crate) async fn load_story(pool: &PgPool, id: i64) -> Result<Story, AppError> {
    sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("no story with that ID".to_string()))
}

/// Disabled stories stay in storage but read as missing for everyone
/// except the author and admins.
pub(crate) fn ensure_not_disabled(actor: &User, story: &Story) -> Result<(), AppError> {
    if story.disabled && story.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::NotFound("no story with that ID".to_string()));
    }
    Ok(())
}

/// Comments of a story, with the author info whitelisted to
/// {id, name, photo, creation date}. Non-admin viewers never see
/// disabled comments.
pub(crate) async fn fetch_story_comments(
    pool: &PgPool,
    story_id: i64,
    include_disabled: bool,
) -> Result<Vec<CommentResponse>, AppError> {
    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT
            c.id, c.story_id, c.author_id,
            u.name AS author_name, u.photo AS author_photo, u.created_at AS author_since,
            c.comment, c.rating, c.disabled, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.story_id = $1 AND ($2 OR NOT c.disabled)
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(story_id)
    .bind(include_disabled)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

/// Fetches a single story with its comments, visibility rules applied.
pub async fn get_story(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let story = load_story(&pool, id).await?;
    ensure_not_disabled(&actor, &story)?;
    guard::check_story_visibility(&pool, &actor, &story).await?;

    let comments = fetch_story_comments(&pool, story.id, actor.is_admin()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "story": story, "comments": comments },
    })))
}

/// Toggle-vote on a story: first call casts the actor's vote, the second
/// withdraws it. The voted set and the rating counter move together in
/// one transaction.
pub async fn toggle_rate_story(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let story = load_story(&pool, id).await?;
    ensure_not_disabled(&actor, &story)?;
    guard::check_story_visibility(&pool, &actor, &story).await?;

    let mut tx = pool.begin().await?;

    let already_rated = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM rated_stories WHERE user_id = $1 AND story_id = $2)",
    )
    .bind(actor.id)
    .bind(story.id)
    .fetch_one(&mut *tx)
    .await?;

    let rate: i64 = if already_rated {
        sqlx::query("DELETE FROM rated_stories WHERE user_id = $1 AND story_id = $2")
            .bind(actor.id)
            .bind(story.id)
            .execute(&mut *tx)
            .await?;
        -1
    } else {
        sqlx::query("INSERT INTO rated_stories (user_id, story_id) VALUES ($1, $2)")
            .bind(actor.id)
            .bind(story.id)
            .execute(&mut *tx)
            .await?;
        1
    };

    let updated = sqlx::query_as::<_, Story>(
        "UPDATE stories SET rating = rating + $1 WHERE id = $2 RETURNING *",
    )
    .bind(rate)
    .bind(story.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "story": updated, "rated": !already_rated },
    })))
}

/// Adds a comment to a story the actor can see.
pub async fn add_comment(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let story = load_story(&pool, id).await?;
    ensure_not_disabled(&actor, &story)?;
    guard::check_story_visibility(&pool, &actor, &story).await?;

    let text = clean_html(&payload.comment);
    if text.trim().is_empty() {
        return Err(AppError::Validation("comment cannot be empty".to_string()));
    }

    let comment_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (story_id, author_id, comment, private)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(story.id)
    .bind(actor.id)
    .bind(&text)
    .bind(story.private)
    .fetch_one(&pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "id": comment_id },
        })),
    ))
}

/// Lists the comments of a story the actor can see.
pub async fn get_comments(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let story = load_story(&pool, id).await?;
    ensure_not_disabled(&actor, &story)?;
    guard::check_story_visibility(&pool, &actor, &story).await?;

    let comments = fetch_story_comments(&pool, story.id, actor.is_admin()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "comments": comments },
    })))
}

/// Updates a story. Author only; same content rule as creation.
pub async fn update_story(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !validate_story_content(payload.text.as_deref(), &payload.images) {
        return Err(AppError::Validation(
            "a story must have at least a title and an image or some text".to_string(),
        ));
    }

    let story = load_story(&pool, id).await?;
    guard::check_ownership(&actor, &story)?;

    let title = clean_html(&payload.title);
    let text = payload.text.as_deref().map(clean_html);

    let updated = sqlx::query_as::<_, Story>(
        r#"
        UPDATE stories
        SET title = $1,
            text = $2,
            images = $3,
            private = COALESCE($4, private),
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&text)
    .bind(sqlx::types::Json(&payload.images))
    .bind(payload.private)
    .bind(story.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "story": updated },
    })))
}

/// Soft-deletes a story (Active -> Disabled). Author only.
pub async fn disable_story(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let story = load_story(&pool, id).await?;
    guard::check_ownership(&actor, &story)?;

    let updated = sqlx::query_as::<_, Story>(
        "UPDATE stories SET disabled = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(story.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "story": updated },
    })))
}

/// Lists every story, disabled ones included.
/// Admin only.
pub async fn list_stories(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let stories =
        sqlx::query_as::<_, Story>("SELECT * FROM stories ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "stories": stories },
    })))
}

/// Hard-deletes a story (Disabled -> Purged). Admin only.
/// Comments and vote rows go with it; the author's story list is the
/// reverse index on `author_id`, so nothing else needs detaching.
pub async fn remove_story(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = sqlx::query("DELETE FROM stories WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("no story with that ID".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
