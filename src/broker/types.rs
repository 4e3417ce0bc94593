//! Broker message and error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A message travelling through a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Subtopic the message was published to, matched against selectors.
    pub subtopic: Option<String>,
    /// Payload.
    pub body: serde_json::Value,
}

impl Message {
    pub fn new(subtopic: Option<String>, body: serde_json::Value) -> Self {
        Self { subtopic, body }
    }

    /// Whether a subscription with `selector` receives this message.
    ///
    /// Matching is exact: a subscription without a selector only sees
    /// messages published without a subtopic.
    pub fn matches(&self, selector: Option<&str>) -> bool {
        self.subtopic.as_deref() == selector
    }
}

/// Username/password pair presented when opening a connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Errors that can occur talking to the broker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker refused the supplied credentials.
    #[error("authentication failed for user '{0}'")]
    Authentication(String),

    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A subscription with this name already exists on the destination.
    #[error("subscription '{subscription}' already exists on '{destination}'")]
    DuplicateSubscription {
        destination: String,
        subscription: String,
    },

    /// No subscription with this name exists on the destination.
    #[error("no subscription '{subscription}' on '{destination}'")]
    UnknownSubscription {
        destination: String,
        subscription: String,
    },

    /// Broker-side failure not covered above.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
