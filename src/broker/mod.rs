//! Message-oriented-middleware abstraction.
//!
//! # Data Flow
//! ```text
//! ConnectionFactory (looked up by name)
//!     → Connection (credentials, client id)
//!     → start() → publish / subscribe on destinations
//!     → close() removes every subscription the connection owns
//! ```
//!
//! # Design Decisions
//! - Traits are synchronous; delivery invokes listeners inline
//! - A subscription carries an optional subtopic selector
//! - `local.rs` is an in-process broker, used by the binary and tests

pub mod connection;
pub mod local;
pub mod types;

pub use connection::{Connection, ConnectionFactory, MessageListener};
pub use local::LocalBroker;
pub use types::{BrokerError, BrokerResult, Credentials, Message};
