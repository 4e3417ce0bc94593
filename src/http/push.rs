//! Long-poll session endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::push::{PushError, PushMessage, SessionId, TopicKey};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    /// topic key → reason, for subscriptions that failed
    pub failures: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    pub timeout_ms: Option<u64>,
}

/// `POST {prefix}/sessions`
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, PushError> {
    let keys = request
        .topics
        .iter()
        .map(|raw| raw.parse::<TopicKey>())
        .collect::<Result<Vec<_>, _>>()?;

    let created = state.context.push_handler()?.create_session(&keys)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: created.session.id(),
            failures: created.failures,
        }),
    ))
}

/// `GET {prefix}/sessions/{id}/messages`
///
/// Waits until at least one message is queued or the timeout elapses.
pub async fn poll_messages(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(query): Query<PollQuery>,
) -> Result<Json<Vec<PushMessage>>, PushError> {
    let session = state.context.push_handler()?.session(id)?;
    let messages = session.poll(state.poll_timeout(query.timeout_ms)).await?;
    Ok(Json(messages))
}

/// `DELETE {prefix}/sessions/{id}`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, PushError> {
    state.context.push_handler()?.disconnect(id)?;
    Ok(StatusCode::NO_CONTENT)
}
