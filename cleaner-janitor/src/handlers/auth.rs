use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use cleaner_common::error::CleanerError;

use super::error::ApiError;

/// The bearer token operators authenticate with.
#[derive(Clone)]
pub struct AdminToken(Arc<str>);

impl AdminToken {
    pub fn new(token: &str) -> Self {
        AdminToken(Arc::from(token))
    }

    /// Compare in time independent of where the first mismatch is. An empty token matches nothing.
    fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        if expected.is_empty() || expected.len() != presented.len() {
            return false;
        }

        expected
            .iter()
            .zip(presented)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

/// Reject requests without `Authorization: Bearer <token>` before any handler or body
/// extractor runs.
pub async fn require_admin(
    State(token): State<AdminToken>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(presented) if token.matches(presented.trim()) => next.run(req).await,
        _ => {
            tracing::warn!(path = req.uri().path(), "rejected unauthorized request");
            ApiError(CleanerError::Unauthorized).into_response()
        }
    }
}
