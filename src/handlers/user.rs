// src/handlers/user.rs
//
// Friend-request state machine, story listings scoped to users, profile
// updates and the admin user surface.
//
// States per ordered pair (A, B): none, A->B pending, B->A pending,
// friends. Every transition mutates both participants inside a single
// transaction, so the symmetric-friendship invariant cannot be observed
// half-applied.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        story::{CreateStoryRequest, Story, validate_story_content},
        user::{PublicUser, UpdateProfileRequest, User},
    },
    utils::{guard, html::clean_html},
};

async fn fetch_public_user(pool: &PgPool, id: i64) -> Result<PublicUser, AppError> {
    sqlx::query_as::<_, PublicUser>(
        "SELECT id, name, photo, created_at FROM users WHERE id = $1 AND active",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("no user with that ID".to_string()))
}

async fn friends_of(pool: &PgPool, user_id: i64) -> Result<Vec<PublicUser>, AppError> {
    let friends = sqlx::query_as::<_, PublicUser>(
        r#"
        SELECT u.id, u.name, u.photo, u.created_at
        FROM friends f
        JOIN users u ON u.id = f.friend_id
        WHERE f.user_id = $1
        ORDER BY u.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(friends)
}

/// Sends a friend request to the user in the path.
/// Allowed only when no relationship exists in either direction.
pub async fn send_friend_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(receiver_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if receiver_id == actor.id {
        return Err(AppError::Conflict(
            "you cannot send a friend request to yourself".to_string(),
        ));
    }

    let receiver = fetch_public_user(&pool, receiver_id).await?;

    let mut tx = pool.begin().await?;

    let already_friends = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM friends WHERE user_id = $1 AND friend_id = $2)",
    )
    .bind(actor.id)
    .bind(receiver_id)
    .fetch_one(&mut *tx)
    .await?;

    if already_friends {
        return Err(AppError::Conflict(
            "you are already friends with that user".to_string(),
        ));
    }

    let pending = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM friend_requests
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
        )
        "#,
    )
    .bind(actor.id)
    .bind(receiver_id)
    .fetch_one(&mut *tx)
    .await?;

    if pending {
        return Err(AppError::Conflict(
            "a friend request between you two is already pending".to_string(),
        ));
    }

    sqlx::query("INSERT INTO friend_requests (sender_id, receiver_id) VALUES ($1, $2)")
        .bind(actor.id)
        .bind(receiver_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") {
                // Concurrent duplicate handled gracefully
                AppError::Conflict("a friend request between you two is already pending".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    tx.commit().await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "requested": receiver },
    })))
}

/// Cancels a friend request previously sent by the actor.
pub async fn cancel_friend_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(receiver_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted =
        sqlx::query("DELETE FROM friend_requests WHERE sender_id = $1 AND receiver_id = $2")
            .bind(actor.id)
            .bind(receiver_id)
            .execute(&pool)
            .await?
            .rows_affected();

    if deleted == 0 {
        return Err(AppError::Conflict(
            "there is no pending friend request to that user".to_string(),
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "data": { "message": "friend request cancelled" },
    })))
}

/// Accepts a pending friend request sent by the user in the path.
/// Clears pending edges in both directions and inserts both friendship
/// rows, so the relationship is symmetric at commit.
pub async fn accept_friend_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(sender_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let deleted =
        sqlx::query("DELETE FROM friend_requests WHERE sender_id = $1 AND receiver_id = $2")
            .bind(sender_id)
            .bind(actor.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

    if deleted == 0 {
        return Err(AppError::Conflict(
            "there is no pending friend request from that user".to_string(),
        ));
    }

    // A crossed request in the other direction is resolved by the same accept.
    sqlx::query("DELETE FROM friend_requests WHERE sender_id = $1 AND receiver_id = $2")
        .bind(actor.id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO friends (user_id, friend_id)
        VALUES ($1, $2), ($2, $1)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(actor.id)
    .bind(sender_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let friends = friends_of(&pool, actor.id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "friends": friends },
    })))
}

/// Lists the actor's accepted friends.
pub async fn get_friends(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let friends = friends_of(&pool, actor.id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "friends": friends },
    })))
}

/// Dissolves an accepted friendship. Both directions are removed together.
pub async fn remove_friend(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(friend_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query(
        r#"
        DELETE FROM friends
        WHERE (user_id = $1 AND friend_id = $2)
           OR (user_id = $2 AND friend_id = $1)
        "#,
    )
    .bind(actor.id)
    .bind(friend_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if deleted == 0 {
        return Err(AppError::Conflict(
            "that user is not in your friends".to_string(),
        ));
    }

    tx.commit().await?;

    let friends = friends_of(&pool, actor.id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "friends": friends },
    })))
}

/// Creates a story owned by the actor.
///
/// A story must have a title and at least one of {image, text}; the author
/// always comes from the authenticated user, never from the payload.
pub async fn create_story(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Json(payload): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !validate_story_content(payload.text.as_deref(), &payload.images) {
        return Err(AppError::Validation(
            "a story must have at least a title and an image or some text".to_string(),
        ));
    }

    let title = clean_html(&payload.title);
    let text = payload.text.as_deref().map(clean_html);

    let story = sqlx::query_as::<_, Story>(
        r#"
        INSERT INTO stories (author_id, title, text, images, private)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(actor.id)
    .bind(&title)
    .bind(&text)
    .bind(sqlx::types::Json(&payload.images))
    .bind(payload.private)
    .fetch_one(&pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "story": story },
        })),
    ))
}

/// Lists the actor's own stories, disabled ones included.
pub async fn get_my_stories(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let stories = sqlx::query_as::<_, Story>(
        "SELECT * FROM stories WHERE author_id = $1 ORDER BY created_at DESC",
    )
    .bind(actor.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "stories": stories },
    })))
}

/// Lists another user's stories with the visibility rules applied:
/// private stories appear only for the author's friends.
pub async fn get_user_stories(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let is_self = user_id == actor.id;
    let is_friend = if is_self {
        true
    } else {
        fetch_public_user(&pool, user_id).await?;
        guard::are_friends(&pool, actor.id, user_id).await?
    };

    let stories = sqlx::query_as::<_, Story>(
        r#"
        SELECT * FROM stories
        WHERE author_id = $1
          AND ($2 OR NOT disabled)
          AND (NOT private OR $3)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(is_self)
    .bind(is_friend)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "stories": stories },
    })))
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// The actor's feed: stories authored by their friends, newest first.
/// Private stories are included, friendship grants visibility.
pub async fn get_friends_stories(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100);

    let stories = sqlx::query_as::<_, Story>(
        r#"
        SELECT s.* FROM stories s
        JOIN friends f ON f.friend_id = s.author_id
        WHERE f.user_id = $1 AND NOT s.disabled
        ORDER BY s.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(actor.id)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "stories": stories },
    })))
}

/// Updates the actor's name and/or photo reference.
pub async fn update_profile(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.as_deref().map(clean_html);

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = COALESCE($1, name),
            photo = COALESCE($2, photo)
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&payload.photo)
    .bind(actor.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": user },
    })))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "users": users },
    })))
}

/// Deactivates an account. Admin only; deactivated users cannot log in and
/// their tokens stop authenticating, but their content stays in place.
pub async fn disable_user(
    State(pool): State<PgPool>,
    Extension(actor): Extension<User>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if user_id == actor.id {
        return Err(AppError::Validation(
            "you cannot deactivate yourself".to_string(),
        ));
    }

    let updated = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("no user with that ID".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
