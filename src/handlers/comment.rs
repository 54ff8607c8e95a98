// src/handlers/comment.rs
//
// Comment mutation and the comment side of the rating engine. Visibility
// is inherited from the parent story, so each handler resolves the parent
// before the gate checks run.

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
    handlers::story::{ensure_not_disabled, load_story},
    models::{
        comment::{Comment, CommentRequest},
        user::User,
    },
    utils::{guard, html::clean_html},
};

async fn load_comment(pool: &PgPool, id: i64) -> Result<Comment, AppError> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("no comment with that ID".to_string()))
}

/// Loads a comment and applies the inherited gate checks: the parent story
/// must be readable by the actor, and a disabled comment reads as missing
/// for everyone but its author and admins.
async fn load_visible_comment(
    pool: &PgPool,
    actor: &User,
    id: i64,
) -> Result<Comment, AppError> {
    let comment = load_comment(pool, id).await?;

    let story = load_story(pool, comment.story_id).await?;
    ensure_not_disabled(actor, &story)?;
    guard::check_story_visibility(pool, actor, &story).await?;

    if comment.disabled && comment.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::NotFound("no comment with that ID".to_string()));
    }

    Ok(comment)
}

/// Toggle-vote on a comment.
///
/// Beyond the comment's own counter, the delta is mirrored onto the
/// comment author's aggregate rating (author reputation). All three
/// documents move in one transaction.
pub async fn toggle_rate_comment(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = load_visible_comment(&pool, &actor, id).await?;

    let mut tx = pool.begin().await?;

    let already_rated = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM rated_comments WHERE user_id = $1 AND comment_id = $2)",
    )
    .bind(actor.id)
    .bind(comment.id)
    .fetch_one(&mut *tx)
    .await?;

    let rate: i64 = if already_rated {
        sqlx::query("DELETE FROM rated_comments WHERE user_id = $1 AND comment_id = $2")
            .bind(actor.id)
            .bind(comment.id)
            .execute(&mut *tx)
            .await?;
        -1
    } else {
        sqlx::query("INSERT INTO rated_comments (user_id, comment_id) VALUES ($1, $2)")
            .bind(actor.id)
            .bind(comment.id)
            .execute(&mut *tx)
            .await?;
        1
    };

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET rating = rating + $1 WHERE id = $2 RETURNING *",
    )
    .bind(rate)
    .bind(comment.id)
    .fetch_one(&mut *tx)
    .await?;

    let author_rating = sqlx::query_scalar::<_, i64>(
        "UPDATE users SET rating = rating + $1 WHERE id = $2 RETURNING rating",
    )
    .bind(rate)
    .bind(comment.author_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "comment": updated,
            "rated": !already_rated,
            "author_rating": author_rating,
        },
    })))
}

/// Updates a comment's text. Author only.
pub async fn update_comment(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = load_comment(&pool, id).await?;
    guard::check_ownership(&actor, &comment)?;

    let text = clean_html(&payload.comment);
    if text.trim().is_empty() {
        return Err(AppError::Validation("comment cannot be empty".to_string()));
    }

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET comment = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(&text)
    .bind(comment.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": updated },
    })))
}

/// Soft-deletes a comment. Author only.
pub async fn disable_comment(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = load_comment(&pool, id).await?;
    guard::check_ownership(&actor, &comment)?;

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET disabled = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(comment.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": updated },
    })))
}

/// Hard-deletes a comment. Admin only.
pub async fn remove_comment(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("no comment with that ID".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
