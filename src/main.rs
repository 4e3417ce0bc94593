//! Push gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                   PUSH GATEWAY                   │
//!                      │                                                  │
//!   Browser client     │  ┌─────────┐    ┌─────────────┐    ┌──────────┐  │
//!   ───────────────────┼─▶│  http   │───▶│ PushHandler │───▶│ sessions │  │
//!   poll / ws          │  │ server  │    │             │    │ + queues │  │
//!                      │  └─────────┘    └──────┬──────┘    └────▲─────┘  │
//!                      │                        │ subscribe      │ deliver│
//!                      │                        ▼                │        │
//!   Admin / push-cli   │  ┌─────────┐    ┌─────────────┐    ┌────┴─────┐  │
//!   ───────────────────┼─▶│  admin  │───▶│TopicsContext│───▶│  broker  │  │
//!   publish            │  └─────────┘    └─────────────┘    └────▲─────┘  │
//!                      │                                         │ lookup │
//!                      │  ┌───────────────────────────┐    ┌─────┴─────┐  │
//!                      │  │ PushContext start / stop  │───▶│  naming   │  │
//!                      │  └───────────────────────────┘    └───────────┘  │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use push_gateway::admin::{serve_admin, AdminState};
use push_gateway::config::{load_config, AppConfig};
use push_gateway::http::HttpServer;
use push_gateway::lifecycle::{bootstrap, shutdown_signal, Shutdown, SystemEvent};
use push_gateway::observability::{logging, metrics};
use push_gateway::push::SessionReaper;

#[derive(Parser)]
#[command(name = "push-gateway")]
#[command(about = "Push messaging gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "push-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        context_path = %config.application.context_path,
        push_path = %config.push.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = bootstrap(&config)?;
    let shutdown = Shutdown::new();

    let reaper = SessionReaper::new(
        gateway.context.clone(),
        Duration::from_secs(config.sessions.reap_interval_secs),
        Duration::from_secs(config.sessions.max_inactive_secs),
    );
    let reaper_task = tokio::spawn(reaper.run(shutdown.subscribe()));

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            context: gateway.context.clone(),
            api_key: config.admin.api_key.as_str().into(),
        };
        Some(tokio::spawn(serve_admin(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, gateway.context.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;

    // Stop the context first so pending long polls return before the
    // listeners drain.
    for error in gateway.events.publish(&SystemEvent::PreDestroyApplication) {
        tracing::error!(error = %error, "PreDestroyApplication listener failed");
    }
    shutdown.trigger();

    if let Err(e) = server_task.await? {
        tracing::error!(error = %e, "HTTP server failed");
    }
    if let Some(task) = admin_task {
        if let Err(e) = task.await? {
            tracing::error!(error = %e, "Admin API failed");
        }
    }
    reaper_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
