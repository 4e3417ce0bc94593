//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Bind naming → Resolve settings → Start push context
//!     → Create configured topics → Start listeners
//!
//! Events (events.rs):
//!     Host publishes PostConstruct / PreDestroy → subscribed components
//!
//! Shutdown (shutdown.rs):
//!     Signal received → PreDestroyApplication → Stop background tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then push context, then listeners
//! - Fail fast: a push context that cannot start aborts startup

pub mod events;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use events::{ApplicationEvents, EventError, SystemEvent, SystemEventKind, SystemEventListener};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{bootstrap, Gateway, StartupFailure};
