//! WebSocket delivery.
//!
//! After the upgrade every queued message is sent as one JSON text frame.
//! The socket ends when the client closes it or the session is closed.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::http::server::AppState;
use crate::push::{PushError, Session, SessionId};

/// `GET {prefix}/sessions/{id}/ws`
pub async fn session_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Response, PushError> {
    let session = state.context.push_handler()?.session(id)?;
    let wait = state.poll_timeout(None);
    tracing::debug!(session = %id, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| stream_session(socket, session, wait)))
}

async fn stream_session(socket: WebSocket, session: Arc<Session>, wait: Duration) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            batch = session.poll(wait) => {
                let messages = match batch {
                    Ok(messages) => messages,
                    Err(e) => {
                        tracing::debug!(session = %session.id(), error = %e, "Closing WebSocket");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                };
                for message in messages {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(session = %session.id(), error = %e, "Failed to encode push message");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => session.touch(),
                }
            }
        }
    }

    tracing::debug!(session = %session.id(), "WebSocket closed");
}
