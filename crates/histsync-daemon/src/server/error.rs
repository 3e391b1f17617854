use axum::{Json, http::StatusCode, response::IntoResponse};
use histsync_client::Error;

use super::Envelope;

/// A sync or store failure, rendered as an error envelope.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            Error::SyncInProgress => (StatusCode::CONFLICT, "a sync is already in progress"),
            Error::FileIo { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to access the history file",
            ),
            Error::StoreOpen(_)
            | Error::StoreQuery(_)
            | Error::StoreTransaction(_)
            | Error::Migrate(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to access the history database",
            ),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }

        (status, Json(Envelope::<()>::failure(message))).into_response()
    }
}
