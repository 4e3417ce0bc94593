//! Naming/directory service.
//!
//! # Data Flow
//! ```text
//! "java:/ConnectionFactory"
//!     → name.rs (parse into components)
//!     → context.rs (lookup in directory)
//!     → Binding (connection factory or topic namespace)
//! ```
//!
//! # Design Decisions
//! - Names are hierarchical, `/`-separated, empty components ignored
//! - The directory is injected into the push context, never global
//! - Lookups return typed bindings; callers assert the kind they expect

pub mod context;
pub mod name;

pub use context::{Binding, InMemoryNamingContext, NamingContext};
pub use name::{Name, NameParser};

use thiserror::Error;

/// Errors raised by the naming service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The name string could not be parsed.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// Nothing is bound under the name.
    #[error("name not bound: {0}")]
    NameNotFound(Name),

    /// `bind` was called for a name that already has a binding.
    #[error("name already bound: {0}")]
    AlreadyBound(Name),

    /// The binding exists but is not of the requested kind.
    #[error("{name} is bound to a {actual}, expected a {expected}")]
    UnexpectedBinding {
        name: Name,
        expected: &'static str,
        actual: &'static str,
    },
}
