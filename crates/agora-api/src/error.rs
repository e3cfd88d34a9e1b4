use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use agora_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyContent(_) | StoreError::InvalidPage(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(_) | StoreError::NotArchived => ApiError::Conflict(err.to_string()),
            StoreError::Storage(_) | StoreError::LockPoisoned => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn validation_errors_are_400() {
        assert_eq!(
            response_status(StoreError::EmptyContent("post content")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            response_status(StoreError::InvalidPage("1.5".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(response_status(StoreError::NotFound("post")), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflicts_and_preconditions_are_409() {
        assert_eq!(response_status(StoreError::Conflict("email")), StatusCode::CONFLICT);
        assert_eq!(response_status(StoreError::NotArchived), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_failures_are_500() {
        assert_eq!(
            response_status(StoreError::LockPoisoned),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(response_status(ApiError::Forbidden), StatusCode::FORBIDDEN);
    }
}
