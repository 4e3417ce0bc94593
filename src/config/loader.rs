//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::resolve::DeploymentProperties;
use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = read(path)?;
    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load a deployment properties file.
pub fn load_deployment_properties(path: &Path) -> Result<DeploymentProperties, ConfigError> {
    let content = read(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[application]
context_path = "/chat"

[push]
username = "guest"

[[push.topics]]
name = "chat"
allow_subtopics = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.application.context_path, "/chat");
        assert_eq!(config.push.username, "guest");
        assert_eq!(config.push.connection_factory, "/ConnectionFactory");
        assert_eq!(config.push.topics.len(), 1);
        assert!(config.push.topics[0].allow_subtopics);
        assert_eq!(config.sessions.max_queued_messages, 256);
    }

    #[test]
    fn test_invalid_config_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[sessions]
max_queued_messages = 0
"#
        )
        .unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errs) if errs.len() == 1));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_deployment_properties() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection_factory = \"/jms/RemoteCF\"").unwrap();

        let props = load_deployment_properties(file.path()).unwrap();
        assert_eq!(props.connection_factory.as_deref(), Some("/jms/RemoteCF"));
        assert!(props.password.is_none());
    }
}
