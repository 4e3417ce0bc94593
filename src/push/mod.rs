//! Push subsystem.
//!
//! # Data Flow
//! ```text
//! PushContext::start
//!     → messaging.rs (naming lookups, broker connection)
//!     → topics.rs (topic registry, publish)
//!     → handler.rs (session factory, subscribe/unsubscribe)
//!     → session_manager.rs / session.rs (per-client queues)
//!
//! PushContext::stop (or PreDestroyApplication)
//!     → handler.destroy → messaging.stop
//! ```
//!
//! # Design Decisions
//! - Registries exist only while started; stale handles fail with
//!   `ConnectionClosed` once the connection is gone
//! - Idle sessions are expired by a background reaper, not by `start`

pub mod context;
pub mod error;
pub mod handler;
pub mod messaging;
pub mod reaper;
pub mod session;
pub mod session_manager;
pub mod topics;

pub use context::PushContext;
pub use error::{PushError, PushResult, StartupError};
pub use handler::{CreatedSession, PushHandler, SessionOptions};
pub use messaging::MessagingContext;
pub use reaper::SessionReaper;
pub use session::{PushMessage, Session, SessionId};
pub use session_manager::SessionManager;
pub use topics::{SubscriptionFailure, Topic, TopicKey, TopicKeyError, TopicListener, TopicsContext};
