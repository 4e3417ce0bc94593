//! Error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::push::PushError;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Status code a push error maps to.
pub fn status_for(err: &PushError) -> StatusCode {
    match err {
        PushError::NotStarted
        | PushError::ConnectionClosed
        | PushError::RegistryDestroyed
        | PushError::Initialization(_) => StatusCode::SERVICE_UNAVAILABLE,
        PushError::UnknownSession(_) | PushError::UnknownTopic(_) => StatusCode::NOT_FOUND,
        PushError::SessionClosed(_) => StatusCode::GONE,
        PushError::InvalidTopicKey(_) => StatusCode::BAD_REQUEST,
        PushError::SubscriptionRejected(_) => StatusCode::FORBIDDEN,
        PushError::AlreadyStarted => StatusCode::CONFLICT,
        PushError::Broker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for PushError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Push request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Push request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
