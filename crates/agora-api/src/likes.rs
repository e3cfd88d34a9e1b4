use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::debug;
use uuid::Uuid;

use agora_db::PAGE_SIZE;
use agora_db::counters::{LikeOutcome, UnlikeOutcome};
use agora_types::api::LikeResponse;
use agora_types::models::PageResponse;

use crate::extract::{Json, Path, Query};
use crate::middleware::Identity;
use crate::posts::{require_active, visible_post};
use crate::{ApiError, ApiResult, AppState, PageQuery, convert, run_db};

/// POST /posts/{post_id}/likes: 201 for a new like, 200 if the caller had
/// already liked the post.
pub async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    require_active(&identity)?;

    let pid = post_id.to_string();
    let owner_id = identity.id();
    let (outcome, count) = run_db(&state, move |db| {
        let outcome = db.create_like(&pid, &owner_id)?;
        let count = db.get_post(&pid)?.map(|p| p.post_like_count).unwrap_or(0);
        Ok((outcome, count))
    })
    .await?;

    let created = matches!(outcome, LikeOutcome::Created(_));
    debug!("Like on {} by {}: created={}", post_id, identity.username, created);

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(LikeResponse {
            created,
            post_like_count: count,
        }),
    ))
}

/// DELETE /posts/{post_id}/likes
pub async fn unlike_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let pid = post_id.to_string();
    let owner_id = identity.id();
    match run_db(&state, move |db| db.delete_like(&pid, &owner_id)).await? {
        UnlikeOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        UnlikeOutcome::NotFound => Err(ApiError::NotFound("like")),
    }
}

/// GET /posts/{post_id}/likes?page=N
pub async fn list_likes(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page()?;
    visible_post(&state, post_id, &identity).await?;

    let pid = post_id.to_string();
    let rows = run_db(&state, move |db| db.post_likes_page(&pid, page)).await?;

    Ok(Json(PageResponse {
        page: page.number(),
        page_size: PAGE_SIZE,
        items: rows.into_iter().map(convert::like).collect(),
    }))
}
