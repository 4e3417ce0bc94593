//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! push / http / admin produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates are no-ops until a recorder is installed
//! - Request ID flows through HTTP spans

pub mod logging;
pub mod metrics;
