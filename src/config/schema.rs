//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the push gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment identity.
    pub application: ApplicationConfig,

    /// Push listener configuration.
    pub listener: ListenerConfig,

    /// Direct push settings (lowest-priority configuration source).
    pub push: PushConfig,

    /// Session lifetime and queueing.
    pub sessions: SessionConfig,

    /// In-process broker and its directory bindings.
    pub broker: BrokerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Deployment identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Context path the application is deployed under (e.g. "/chat").
    pub context_path: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            context_path: "/".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Push settings given directly in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// Name of the connection factory in the naming service.
    pub connection_factory: String,

    /// Name of the topic namespace in the naming service.
    pub topics_namespace: String,

    pub username: String,

    pub password: String,

    /// Optional deployment properties file (highest-priority source).
    pub properties_file: Option<String>,

    /// Environment variables holding settings (middle-priority source).
    pub env_ref: EnvRefConfig,

    /// URL prefix for the push endpoints.
    pub path: String,

    /// Topics created at startup.
    pub topics: Vec<TopicConfig>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            connection_factory: "/ConnectionFactory".to_string(),
            topics_namespace: "/topic".to_string(),
            username: String::new(),
            password: String::new(),
            properties_file: None,
            env_ref: EnvRefConfig::default(),
            path: "/__push".to_string(),
            topics: Vec::new(),
        }
    }
}

/// Names of environment variables that carry push settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnvRefConfig {
    pub connection_factory: Option<String>,
    pub topics_namespace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A topic created when the gateway starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicConfig {
    /// Topic name (no subtopic part).
    pub name: String,

    /// Whether clients may subscribe to `subtopic@name`.
    #[serde(default)]
    pub allow_subtopics: bool,
}

/// Session lifetime and queueing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is destroyed, in seconds.
    pub max_inactive_secs: u64,

    /// How often idle sessions are reaped, in seconds.
    pub reap_interval_secs: u64,

    /// Messages kept per session; the oldest is dropped beyond this.
    pub max_queued_messages: usize,

    /// Default long-poll wait, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactive_secs: 300,
            reap_interval_secs: 30,
            max_queued_messages: 256,
            poll_timeout_secs: 25,
        }
    }
}

/// In-process broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Name the connection factory is bound under.
    pub connection_factory_binding: String,

    /// Name the topic namespace is bound under.
    pub topics_binding: String,

    /// Destination prefix for topics.
    pub topics_prefix: String,

    /// Credentials the broker accepts. Unset means any.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            connection_factory_binding: "/ConnectionFactory".to_string(),
            topics_binding: "/topic".to_string(),
            topics_prefix: "topic".to_string(),
            username: None,
            password: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds. Must exceed the long-poll wait.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
