//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quill_core::QuillError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] QuillError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Domain(e) => match e {
                QuillError::NotFound(_) => StatusCode::NOT_FOUND,
                QuillError::Conflict(_) => StatusCode::CONFLICT,
                QuillError::Validation(_) => StatusCode::BAD_REQUEST,
                QuillError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
                QuillError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
                QuillError::Database(_) | QuillError::Config(_) | QuillError::Unknown(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(QuillError::not_found("post", 3)), StatusCode::NOT_FOUND),
            (QuillError::Conflict("slug".into()).into(), StatusCode::CONFLICT),
            (QuillError::Validation("title".into()).into(), StatusCode::BAD_REQUEST),
            (
                QuillError::AuthenticationFailed("nope".into()).into(),
                StatusCode::UNAUTHORIZED,
            ),
            (QuillError::Database("disk".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Forbidden("not yours".into()), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = ApiError::from(QuillError::Database("secret path".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
