// src/utils/guard.rs
//
// The authorization checks composed per protected route: role, ownership
// and friendship/visibility. Authentication itself lives in utils::jwt.

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{comment::Comment, story::Story, user::User},
};

/// Name of the cookie carrying the auth token.
pub const AUTH_COOKIE: &str = "jwt";

/// Capability interface for anything owned by a user.
/// Lets ownership checks treat stories and comments uniformly.
pub trait Ownable {
    fn author_id(&self) -> i64;
    fn kind(&self) -> &'static str;
}

impl Ownable for Story {
    fn author_id(&self) -> i64 {
        self.author_id
    }
    fn kind(&self) -> &'static str {
        "story"
    }
}

impl Ownable for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
    fn kind(&self) -> &'static str {
        "comment"
    }
}

/// Permits only the author of the target.
pub fn check_ownership(actor: &User, target: &impl Ownable) -> Result<(), AppError> {
    if target.author_id() != actor.id {
        return Err(AppError::Authorization(format!(
            "you are not the author of this {}",
            target.kind()
        )));
    }
    Ok(())
}

/// Permits only actors whose role is in the allowed set.
pub fn check_role(actor: &User, allowed: &[&str]) -> Result<(), AppError> {
    if !allowed.contains(&actor.role.as_str()) {
        return Err(AppError::Authorization(
            "you do not have permission to do this".to_string(),
        ));
    }
    Ok(())
}

/// Whether an accepted friendship exists between the two users.
/// Friendships are stored symmetrically, so one direction suffices.
pub async fn are_friends(pool: &PgPool, user_id: i64, other_id: i64) -> Result<bool, AppError> {
    let friends = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM friends WHERE user_id = $1 AND friend_id = $2)",
    )
    .bind(user_id)
    .bind(other_id)
    .fetch_one(pool)
    .await?;

    Ok(friends)
}

/// Visibility gate for a story: public stories are readable by anyone,
/// private ones only by the author or a friend of the author.
pub async fn check_story_visibility(
    pool: &PgPool,
    actor: &User,
    story: &Story,
) -> Result<(), AppError> {
    if !story.private || story.author_id == actor.id {
        return Ok(());
    }

    if are_friends(pool, actor.id, story.author_id).await? {
        return Ok(());
    }

    Err(AppError::Authorization(
        "this story is only shared with friends of the author".to_string(),
    ))
}
