// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, Uri},
    middleware,
    routing::{delete, get, patch, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{auth, comment, story, user},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Unknown routes uniformly produce the NotFound envelope.
async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound(format!("can't find {} on this server", uri))
}

/// Assembles the main application router.
///
/// * Nests the users/stories/comments sub-routers under /api/v1.
/// * Applies global middleware (Trace, CORS, compression, body limit,
///   rate limit).
/// * Injects global state (pool, config, mailer).
pub fn create_router(state: AppState) -> Router {
    let origins = [state
        .config
        .cors_origin
        .parse()
        .expect("invalid CORS_ORIGIN")];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Generous quota: brute-force protection, not traffic shaping.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(50)
            .burst_size(100)
            .finish()
            .unwrap(),
    );

    let public_user_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/{token}", patch(auth::reset_password));

    let protected_user_routes = Router::new()
        .route("/updatePassword", patch(auth::update_password))
        .route("/updateProfile", patch(user::update_profile))
        .route("/{id}/addFriend", post(user::send_friend_request))
        .route("/{id}/cancelFriendRequest", post(user::cancel_friend_request))
        .route("/{id}/acceptFriendRequest", post(user::accept_friend_request))
        .route("/getFriends", get(user::get_friends))
        .route("/{id}/removeFriend", delete(user::remove_friend))
        .route("/createStory", post(user::create_story))
        .route("/getMyStories", get(user::get_my_stories))
        .route("/{id}/getUserStories", get(user::get_user_stories))
        .route("/getFriendsStories", get(user::get_friends_stories))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_user_routes = Router::new()
        .route("/", get(user::list_users))
        .route("/{id}/disableUser", delete(user::disable_user))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let story_routes = Router::new()
        .route("/{id}/getStory", get(story::get_story))
        .route("/{id}/toggleRateStory", patch(story::toggle_rate_story))
        .route("/{id}/addComment", post(story::add_comment))
        .route("/{id}/getComments", get(story::get_comments))
        .route("/{id}/updateStory", patch(story::update_story))
        .route("/{id}/disableStory", delete(story::disable_story))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_story_routes = Router::new()
        .route("/", get(story::list_stories))
        .route("/{id}/removeStory", delete(story::remove_story))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let comment_routes = Router::new()
        .route("/{id}/toggleRateComment", patch(comment::toggle_rate_comment))
        .route("/{id}/updateComment", patch(comment::update_comment))
        .route("/{id}/disableComment", delete(comment::disable_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_comment_routes = Router::new()
        .route("/{id}/removeComment", delete(comment::remove_comment))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The admin listing index is specified as `GET /` under each prefix,
    // i.e. the trailing-slash URL (`/api/v1/users/`, `/api/v1/stories/`).
    // axum 0.8 serves a nested router's `/` route only at the no-slash form,
    // so the trailing-slash index is registered at the top level here with
    // the same auth-then-admin middleware stack.
    let admin_index_routes = Router::new()
        .route("/api/v1/users/", get(user::list_users))
        .route("/api/v1/stories/", get(story::list_stories))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(admin_index_routes)
        .nest(
            "/api/v1/users",
            public_user_routes
                .merge(protected_user_routes)
                .merge(admin_user_routes),
        )
        .nest("/api/v1/stories", story_routes.merge(admin_story_routes))
        .nest(
            "/api/v1/comments",
            comment_routes.merge(admin_comment_routes),
        )
        .fallback(fallback)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(10 * 1024))
        .layer(GovernorLayer::new(governor_conf))
        .with_state(state)
}
