use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::PictorError;

/// API错误类型
pub struct AppError(pub PictorError);

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PictorError::Validation(_) => StatusCode::BAD_REQUEST,
            PictorError::NotFound { .. } => StatusCode::NOT_FOUND,
            PictorError::ResourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<PictorError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
