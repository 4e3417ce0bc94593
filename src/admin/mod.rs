//! Admin API.
//!
//! Served on its own listener and protected by a bearer API key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::push::PushContext;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub context: Arc<PushContext>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/topics", get(get_topics).post(create_topic))
        .route("/admin/topics/{key}/publish", post(publish))
        .route("/admin/sessions", get(get_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
