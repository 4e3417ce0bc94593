use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::push::{PushError, SessionId, Topic, TopicKey};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub application: Option<String>,
    pub sessions: usize,
    pub topics: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicStatus {
    pub name: String,
    pub allow_subtopics: bool,
}

impl From<&Topic> for TopicStatus {
    fn from(topic: &Topic) -> Self {
        Self {
            name: topic.name().to_string(),
            allow_subtopics: topic.allows_subtopics(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
    #[serde(default)]
    pub allow_subtopics: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResult {
    pub topic: String,
    pub delivered: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: SessionId,
    pub subscriptions: Vec<String>,
    pub pending: usize,
    pub idle_secs: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let context = &state.context;
    let sessions = context.session_registry().map(|s| s.len()).unwrap_or(0);
    let topics = context
        .topics_registry()
        .and_then(|t| t.topics())
        .map(|t| t.len())
        .unwrap_or(0);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if context.is_started() { "started" } else { "stopped" }.to_string(),
        application: context.application_name(),
        sessions,
        topics,
    })
}

pub async fn get_topics(
    State(state): State<AdminState>,
) -> Result<Json<Vec<TopicStatus>>, PushError> {
    let topics = state.context.topics_registry()?.topics()?;
    Ok(Json(
        topics.iter().map(|t| TopicStatus::from(t.as_ref())).collect(),
    ))
}

pub async fn create_topic(
    State(state): State<AdminState>,
    Json(request): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, PushError> {
    let key = TopicKey::new(&request.name, None)?;
    let topic = state.context.topics_registry()?.get_or_create_topic(&key)?;
    topic.set_allow_subtopics(request.allow_subtopics);
    tracing::info!(topic = %key, allow_subtopics = request.allow_subtopics, "Topic created via admin API");
    Ok((StatusCode::CREATED, Json(TopicStatus::from(topic.as_ref()))))
}

pub async fn publish(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Json(data): Json<serde_json::Value>,
) -> Result<Json<PublishResult>, PushError> {
    let key: TopicKey = key.parse()?;
    let delivered = state.context.topics_registry()?.publish(&key, data)?;
    Ok(Json(PublishResult {
        topic: key.to_string(),
        delivered,
    }))
}

pub async fn get_sessions(
    State(state): State<AdminState>,
) -> Result<Json<Vec<SessionStatus>>, PushError> {
    let now = Instant::now();
    let sessions = state.context.session_registry()?;
    Ok(Json(
        sessions
            .sessions()
            .iter()
            .map(|s| SessionStatus {
                id: s.id(),
                subscriptions: s.subscriptions().iter().map(ToString::to_string).collect(),
                pending: s.pending(),
                idle_secs: s.idle_for(now).as_secs(),
            })
            .collect(),
    ))
}
