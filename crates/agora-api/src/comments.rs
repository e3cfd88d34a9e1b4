use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::{PAGE_SIZE, StoreError};
use agora_types::api::CreateCommentRequest;
use agora_types::models::PageResponse;

use crate::extract::{Json, Path, Query};
use crate::middleware::Identity;
use crate::posts::{require_active, visible_post};
use crate::{ApiError, ApiResult, AppState, PageQuery, convert, run_db};

/// POST /posts/{post_id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    require_active(&identity)?;

    let pid = post_id.to_string();
    let owner_id = identity.id();
    let comment = run_db(&state, move |db| db.create_comment(&pid, &owner_id, &req.content)).await?;

    info!("Comment {} on post {} by {}", comment.id, post_id, identity.username);
    Ok((StatusCode::CREATED, Json(convert::comment(comment))))
}

/// GET /posts/{post_id}/comments?page=N
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page()?;
    visible_post(&state, post_id, &identity).await?;

    let pid = post_id.to_string();
    let rows = run_db(&state, move |db| db.post_comments_page(&pid, page)).await?;

    Ok(Json(PageResponse {
        page: page.number(),
        page_size: PAGE_SIZE,
        items: rows.into_iter().map(convert::comment).collect(),
    }))
}

/// GET /users/{username}/comments?page=N
pub async fn list_user_comments(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page()?;
    let viewer = identity.id();

    let rows = run_db(&state, move |db| {
        let owner = db
            .get_user_by_username(&username)?
            .filter(|u| !u.profile_is_archived || u.id == viewer)
            .ok_or(StoreError::NotFound("user"))?;
        db.user_comments_page(&owner.id, page)
    })
    .await?;

    Ok(Json(PageResponse {
        page: page.number(),
        page_size: PAGE_SIZE,
        items: rows.into_iter().map(convert::comment).collect(),
    }))
}

/// DELETE /comments/{comment_id}: by the comment's author or the post's owner.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let cid = comment_id.to_string();
    let (comment, post) = run_db(&state, move |db| {
        let comment = db.get_comment(&cid)?.ok_or(StoreError::NotFound("comment"))?;
        let post = db.get_post(&comment.post_id)?;
        Ok((comment, post))
    })
    .await?;

    let caller = identity.id();
    let owns_post = post.is_some_and(|p| p.owner_id == caller);
    if comment.owner_id != caller && !owns_post {
        warn!("{} tried to delete comment {}", identity.username, comment_id);
        return Err(ApiError::Forbidden);
    }

    let cid = comment_id.to_string();
    run_db(&state, move |db| db.delete_comment(&cid)).await?;
    Ok(StatusCode::NO_CONTENT)
}
