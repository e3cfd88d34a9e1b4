use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;
use uuid::Uuid;

use agora_types::api::Claims;

use crate::auth::SESSION_COOKIE;
use crate::{ApiError, AppState, run_db};

/// The authenticated caller, resolved from a live session.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub archived: bool,
}

impl Identity {
    pub fn id(&self) -> String {
        self.user_id.to_string()
    }
}

/// Validate the session JWT from the Authorization header or the session
/// cookie, and check it against the user's current session token.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = bearer
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?
    .claims;

    let user_id = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if user.session_token.as_deref() != Some(claims.sid.as_str()) {
        warn!("Rejected stale session for {}", user.username);
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(Identity {
        user_id: claims.sub,
        username: user.username,
        archived: user.profile_is_archived,
    });
    Ok(next.run(req).await)
}
