//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the push endpoints under the configured prefix
//! - Wire up middleware (request ID, timeout, tracing, metrics)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::{push, websocket};
use crate::observability::metrics;
use crate::push::PushContext;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<PushContext>,
    /// Upper bound (and default) for a long poll.
    pub max_poll: Duration,
}

impl AppState {
    /// Long-poll wait for a requested timeout, capped at `max_poll`.
    pub fn poll_timeout(&self, requested_ms: Option<u64>) -> Duration {
        match requested_ms {
            Some(ms) => Duration::from_millis(ms).min(self.max_poll),
            None => self.max_poll,
        }
    }
}

/// HTTP server for push clients.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, context: Arc<PushContext>) -> Self {
        let state = AppState {
            context,
            max_poll: Duration::from_secs(config.sessions.poll_timeout_secs),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let prefix = config.push.path.trim_end_matches('/');

        Router::new()
            .route(&format!("{prefix}/sessions"), post(push::create_session))
            .route(&format!("{prefix}/sessions/{{id}}"), delete(push::delete_session))
            .route(
                &format!("{prefix}/sessions/{{id}}/messages"),
                get(push::poll_messages),
            )
            .route(
                &format!("{prefix}/sessions/{{id}}/ws"),
                get(websocket::session_socket),
            )
            .route_layer(middleware::from_fn(record_request))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn record_request(request: Request<Body>, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_default();
    let response = next.run(request).await;
    metrics::record_request(route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(max_poll_secs: u64) -> AppState {
        use crate::lifecycle::events::ApplicationEvents;
        use crate::naming::InMemoryNamingContext;
        use crate::push::SessionOptions;

        AppState {
            context: Arc::new(PushContext::new(
                Arc::new(InMemoryNamingContext::new()),
                Arc::new(ApplicationEvents::new("test")),
                SessionOptions::default(),
            )),
            max_poll: Duration::from_secs(max_poll_secs),
        }
    }

    #[tokio::test]
    async fn test_stopped_context_returns_503_with_request_id() {
        use axum::http::StatusCode;
        use tower::ServiceExt;

        let server = HttpServer::new(&AppConfig::default(), state(25).context);
        let request = Request::builder()
            .method("POST")
            .uri("/__push/sessions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"topics":["news"]}"#))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_routes_follow_configured_prefix() {
        use axum::http::StatusCode;
        use tower::ServiceExt;

        let mut config = AppConfig::default();
        config.push.path = "/push/".into();
        let server = HttpServer::new(&config, state(25).context);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/push/sessions/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/__push/sessions/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_poll_timeout_is_capped() {
        let state = state(25);
        assert_eq!(state.poll_timeout(None), Duration::from_secs(25));
        assert_eq!(state.poll_timeout(Some(500)), Duration::from_millis(500));
        assert_eq!(state.poll_timeout(Some(120_000)), Duration::from_secs(25));
    }
}
