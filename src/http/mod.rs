//! HTTP bridge between browser clients and the push context.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace, metrics)
//!     → push.rs (session create / long poll / disconnect)
//!     → websocket.rs (streamed delivery)
//!     → response.rs (PushError → status + JSON body)
//! ```

pub mod push;
pub mod response;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
