use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_derive::Serialize;

use cleaner_common::error::CleanerError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A [`CleanerError`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub CleanerError);

impl From<CleanerError> for ApiError {
    fn from(error: CleanerError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CleanerError::Unauthorized => StatusCode::UNAUTHORIZED,
            CleanerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CleanerError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CleanerError::QueryFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            error: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
