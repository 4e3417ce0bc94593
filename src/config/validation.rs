//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, value ranges and topic names
//! - Check that long-polls fit inside the request timeout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::push::TopicKey;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("sessions.poll_timeout_secs ({poll}) must be below timeouts.request_secs ({request})")]
    PollExceedsRequestTimeout { poll: u64, request: u64 },

    #[error("push.path must start with '/', got '{0}'")]
    InvalidPath(String),

    #[error("invalid topic name '{name}': {reason}")]
    InvalidTopic { name: String, reason: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    for (field, value) in [
        ("sessions.max_inactive_secs", config.sessions.max_inactive_secs),
        ("sessions.reap_interval_secs", config.sessions.reap_interval_secs),
        ("sessions.poll_timeout_secs", config.sessions.poll_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.sessions.max_queued_messages == 0 {
        errors.push(ValidationError::Zero {
            field: "sessions.max_queued_messages",
        });
    }

    if config.sessions.poll_timeout_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::PollExceedsRequestTimeout {
            poll: config.sessions.poll_timeout_secs,
            request: config.timeouts.request_secs,
        });
    }

    if !config.push.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.push.path.clone()));
    }

    for topic in &config.push.topics {
        match topic.name.parse::<TopicKey>() {
            Ok(key) if key.subtopic().is_none() => {}
            Ok(_) => errors.push(ValidationError::InvalidTopic {
                name: topic.name.clone(),
                reason: "configured topics may not carry a subtopic".to_string(),
            }),
            Err(e) => errors.push(ValidationError::InvalidTopic {
                name: topic.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TopicConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.push.path = "push".into();
        config.sessions.poll_timeout_secs = 90;
        config.admin.enabled = true;
        config.push.topics.push(TopicConfig {
            name: "room@chat".into(),
            allow_subtopics: false,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::MissingApiKey));
        assert!(errors.contains(&ValidationError::PollExceedsRequestTimeout {
            poll: 90,
            request: 60
        }));
    }

    #[test]
    fn test_blank_topic_rejected() {
        let mut config = AppConfig::default();
        config.push.topics.push(TopicConfig {
            name: String::new(),
            allow_subtopics: false,
        });
        assert!(matches!(
            validate_config(&config).unwrap_err()[0],
            ValidationError::InvalidTopic { .. }
        ));
    }
}
