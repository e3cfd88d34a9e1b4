use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::middleware::require_session;
use crate::{AppState, auth, comments, likes, posts, profile};

/// All application routes. Everything except register/login requires a
/// live session.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/profile",
            get(profile::get_profile)
                .patch(profile::update_profile)
                .delete(profile::delete_profile),
        )
        .route("/profile/archive", post(profile::archive_profile))
        .route("/profile/unarchive", post(profile::unarchive_profile))
        .route("/users/{username}", get(profile::get_public_profile))
        .route("/users/{username}/posts", get(posts::list_user_posts))
        .route("/users/{username}/comments", get(comments::list_user_comments))
        .route("/feed", get(posts::feed))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{post_id}/archive", post(posts::archive_post))
        .route("/posts/{post_id}/unarchive", post(posts::unarchive_post))
        .route(
            "/posts/{post_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/posts/{post_id}/likes",
            get(likes::list_likes)
                .post(likes::like_post)
                .delete(likes::unlike_post),
        )
        .route("/comments/{comment_id}", delete(comments::delete_comment))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
