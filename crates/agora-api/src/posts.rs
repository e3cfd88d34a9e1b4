use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::PAGE_SIZE;
use agora_db::models::PostRow;
use agora_types::api::{CreatePostRequest, UpdatePostRequest};
use agora_types::models::PageResponse;

use crate::extract::{Json, Path, Query};
use crate::middleware::Identity;
use crate::{ApiError, ApiResult, AppState, PageQuery, convert, run_db};

/// Loads a post the caller may see. Archived posts, and every post of an
/// archived profile, are visible to their owner only; everyone else gets
/// `NotFound`.
pub(crate) async fn visible_post(state: &AppState, post_id: Uuid, identity: &Identity) -> ApiResult<PostRow> {
    let id = post_id.to_string();
    let viewer = identity.id();
    run_db(state, move |db| {
        let Some(post) = db.get_post(&id)? else {
            return Ok(None);
        };
        if post.owner_id == viewer {
            return Ok(Some(post));
        }
        let owner_archived = db
            .get_user_by_id(&post.owner_id)?
            .is_none_or(|owner| owner.profile_is_archived);
        Ok((!post.post_is_archived && !owner_archived).then_some(post))
    })
    .await?
    .ok_or(ApiError::NotFound("post"))
}

async fn owned_post(state: &AppState, post_id: Uuid, identity: &Identity) -> ApiResult<PostRow> {
    let post = visible_post(state, post_id, identity).await?;
    if post.owner_id != identity.id() {
        warn!("{} tried to modify post {} they do not own", identity.username, post_id);
        return Err(ApiError::Forbidden);
    }
    Ok(post)
}

/// Archived profiles can read and manage their account but not publish.
pub(crate) fn require_active(identity: &Identity) -> ApiResult<()> {
    if identity.archived {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    require_active(&identity)?;

    let owner_id = identity.id();
    let post = run_db(&state, move |db| db.create_post(&owner_id, &req.content)).await?;

    info!("Post {} created by {}", post.id, identity.username);
    Ok((StatusCode::CREATED, Json(convert::post(post))))
}

/// GET /posts/{post_id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let post = visible_post(&state, post_id, &identity).await?;
    Ok(Json(convert::post(post)))
}

/// PATCH /posts/{post_id}
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    owned_post(&state, post_id, &identity).await?;

    let id = post_id.to_string();
    let post = run_db(&state, move |db| db.update_post_content(&id, &req.content)).await?;
    Ok(Json(convert::post(post)))
}

/// DELETE /posts/{post_id}: cascades to the post's comments and likes.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    owned_post(&state, post_id, &identity).await?;

    let id = post_id.to_string();
    let deleted = run_db(&state, move |db| db.delete_post(&id)).await?;
    Ok(Json(convert::delete_summary(deleted)))
}

/// POST /posts/{post_id}/archive
pub async fn archive_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    set_archived(&state, post_id, &identity, true).await
}

/// POST /posts/{post_id}/unarchive
pub async fn unarchive_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    set_archived(&state, post_id, &identity, false).await
}

async fn set_archived(state: &AppState, post_id: Uuid, identity: &Identity, archived: bool) -> ApiResult<StatusCode> {
    owned_post(state, post_id, identity).await?;

    let id = post_id.to_string();
    run_db(state, move |db| db.set_post_archived(&id, archived)).await?;

    info!("Post {} archived={}", post_id, archived);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{username}/posts?page=N: the owner also sees archived posts.
pub async fn list_user_posts(
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
            .ok_or(agora_db::StoreError::NotFound("user"))?;
        db.user_posts_page(&owner.id, owner.id == viewer, page)
    })
    .await?;

    Ok(Json(PageResponse {
        page: page.number(),
        page_size: PAGE_SIZE,
        items: rows.into_iter().map(convert::post).collect(),
    }))
}

/// GET /feed?page=N: newest first across all active profiles.
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(_identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page()?;
    let rows = run_db(&state, move |db| db.feed_page(page)).await?;

    Ok(Json(PageResponse {
        page: page.number(),
        page_size: PAGE_SIZE,
        items: rows.into_iter().map(convert::feed_item).collect(),
    }))
}
