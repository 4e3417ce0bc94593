//! Push gateway library.
//!
//! Manages the lifecycle of a push messaging context: resolves its settings
//! from layered configuration, connects to a message broker found through a
//! naming service, and serves browser clients over HTTP long-polling and
//! WebSocket.

pub mod admin;
pub mod broker;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod naming;
pub mod observability;
pub mod push;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use push::PushContext;
