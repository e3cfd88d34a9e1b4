use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::info;

use agora_db::models::ProfileUpdate;
use agora_types::api::UpdateProfileRequest;

use crate::auth::clear_session_cookie;
use crate::extract::{Json, Path};
use crate::middleware::Identity;
use crate::{ApiError, ApiResult, AppState, convert, run_db};

/// 1 MiB limit on decoded profile images
const MAX_PROFILE_IMAGE: usize = 1024 * 1024;

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let user_id = identity.id();
    let user = run_db(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::profile(&user)))
}

/// GET /users/{username}. Archived profiles are hidden.
pub async fn get_public_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_identity): Extension<Identity>,
) -> ApiResult<impl IntoResponse> {
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .filter(|u| !u.profile_is_archived)
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::public_profile(&user)))
}

/// PATCH /profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let profile_image = match req.profile_image.as_deref() {
        None => None,
        Some("") => Some(None),
        Some(encoded) => {
            let bytes = B64
                .decode(encoded)
                .map_err(|_| ApiError::BadRequest("profile_image must be base64".into()))?;
            if bytes.len() > MAX_PROFILE_IMAGE {
                return Err(ApiError::BadRequest("profile_image exceeds 1 MiB".into()));
            }
            Some(Some(bytes))
        }
    };

    let update = ProfileUpdate {
        display_name: req.display_name.map(non_empty),
        bio: req.bio.map(non_empty),
        profile_image,
    };

    let user_id = identity.id();
    let user = run_db(&state, move |db| db.update_profile(&user_id, &update)).await?;

    Ok(Json(convert::profile(&user)))
}

/// POST /profile/archive
pub async fn archive_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    set_archived(&state, &identity, true).await
}

/// POST /profile/unarchive
pub async fn unarchive_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    set_archived(&state, &identity, false).await
}

/// DELETE /profile: only allowed once the profile is archived. Removes the
/// user's posts, everything attached to them, and the user's own comments
/// and likes elsewhere.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let user_id = identity.id();
    let deleted = run_db(&state, move |db| db.delete_user(&user_id)).await?;

    info!("Profile {} deleted", identity.username);
    Ok((
        clear_session_cookie(jar),
        Json(convert::delete_summary(deleted)),
    ))
}

async fn set_archived(state: &AppState, identity: &Identity, archived: bool) -> ApiResult<StatusCode> {
    let user_id = identity.id();
    run_db(state, move |db| db.set_profile_archived(&user_id, archived)).await?;

    info!("Profile {} archived={}", identity.username, archived);
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
