use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::cms::CmsError;

/// Errors of the non-page endpoints. Page handlers render their own error
/// templates instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Cms(#[from] CmsError),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Cms(err) => {
                error!("cms request failed: {}", err);
                (StatusCode::BAD_GATEWAY, "content backend unavailable".to_string())
            }
        };

        (status, msg).into_response()
    }
}
