pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod extract;
pub mod likes;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod routes;

use std::sync::Arc;

use serde::Deserialize;
use tracing::error;

use agora_db::{Database, Page};

pub use error::{ApiError, ApiResult};
pub use routes::router;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Sets the `Secure` attribute on the session cookie.
    pub cookie_secure: bool,
}

/// Runs a blocking DB call off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> agora_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

/// `?page=N` query string. A missing page means page 1.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> ApiResult<Page> {
        match &self.page {
            None => Ok(Page::FIRST),
            Some(raw) => raw.parse::<Page>().map_err(ApiError::from),
        }
    }
}
