use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use agora_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::extract::Json;
use crate::middleware::Identity;
use crate::{ApiError, ApiResult, AppState, run_db};

pub const SESSION_COOKIE: &str = "session";

const SESSION_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }

    let password_hash = hash_password(&req.password)?;

    let username = req.username.clone();
    let email = req.email.clone();
    let user = run_db(&state, move |db| db.create_user(&username, &email, &password_hash)).await?;

    let user_id: Uuid = user.id.parse().map_err(|_| ApiError::Internal("bad user id".into()))?;
    let token = start_session(&state, user_id, &user.username).await?;

    info!("Registered user {}", user.username);
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&state, token.clone())),
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Failed login for {}", user.username);
        return Err(ApiError::Unauthorized);
    }

    let user_id: Uuid = user.id.parse().map_err(|_| ApiError::Internal("bad user id".into()))?;
    let token = start_session(&state, user_id, &user.username).await?;

    Ok((
        jar.add(session_cookie(&state, token.clone())),
        Json(LoginResponse {
            user_id,
            username: user.username,
            token,
        }),
    ))
}

/// Drops the stored session token, revoking every JWT issued for it.
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let user_id = identity.id();
    run_db(&state, move |db| db.clear_session_token(&user_id)).await?;

    Ok((StatusCode::NO_CONTENT, clear_session_cookie(jar)))
}

/// Argon2id PHC string. The salt is embedded in it.
fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Rotates the user's session token and signs a JWT bound to it.
async fn start_session(state: &AppState, user_id: Uuid, username: &str) -> ApiResult<String> {
    let sid = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());

    let id = user_id.to_string();
    let stored = sid.clone();
    run_db(state, move |db| db.set_session_token(&id, &stored)).await?;

    create_token(&state.jwt_secret, user_id, username, sid)
}

fn create_token(secret: &str, user_id: Uuid, username: &str, sid: String) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        sid,
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure)
        .build()
}

fn validate_username(username: &str) -> ApiResult<()> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if username.len() < 3 || username.len() > 32 || !valid_chars {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters of letters, digits or '_'".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(ApiError::BadRequest("invalid email address".into())),
    }
}
