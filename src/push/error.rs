//! Push subsystem errors.

use thiserror::Error;

use crate::broker::BrokerError;
use crate::naming::NamingError;
use crate::push::session::SessionId;
use crate::push::topics::{SubscriptionFailure, TopicKeyError};

/// Why `PushContext::start` could not complete.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("naming lookup failed: {0}")]
    Naming(#[from] NamingError),

    #[error("broker connection failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Errors surfaced by the push context and its registries.
#[derive(Debug, Error)]
pub enum PushError {
    /// `start` failed; the context stays stopped.
    #[error("push context initialization failed: {0}")]
    Initialization(#[from] StartupError),

    #[error("push context is already started")]
    AlreadyStarted,

    /// Registry lookup outside the started window.
    #[error("push context is not started")]
    NotStarted,

    /// Operation through a handle whose connection has been closed.
    #[error("messaging connection is closed")]
    ConnectionClosed,

    #[error("invalid topic key: {0}")]
    InvalidTopicKey(#[from] TopicKeyError),

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("subscription rejected: {0}")]
    SubscriptionRejected(#[from] SubscriptionFailure),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    /// The session registry has been destroyed and accepts no new sessions.
    #[error("session registry is shut down")]
    RegistryDestroyed,

    #[error("broker error: {0}")]
    Broker(BrokerError),
}

impl From<BrokerError> for PushError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ConnectionClosed => PushError::ConnectionClosed,
            other => PushError::Broker(other),
        }
    }
}

/// Result type alias for push operations.
pub type PushResult<T> = Result<T, PushError>;
