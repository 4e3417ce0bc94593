//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!
//! push settings:
//!     deployment properties / env reference / [push] table
//!     → resolve.rs (first non-empty value per setting)
//!     → PushSettings snapshot handed to PushContext::start
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Settings resolution is a pure function of its sources

pub mod loader;
pub mod resolve;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_deployment_properties, ConfigError};
pub use resolve::{
    first_non_empty, ConfigSource, ConfigurationService, DeploymentProperties,
    LayeredConfiguration, PushSettings, Setting, DEFAULT_PRECEDENCE,
};
pub use schema::{
    AdminConfig, AppConfig, ApplicationConfig, BrokerConfig, EnvRefConfig, ListenerConfig,
    ObservabilityConfig, PushConfig, SessionConfig, TimeoutConfig, TopicConfig,
};
