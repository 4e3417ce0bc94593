//! Push settings resolution.
//!
//! Each push setting can come from three sources. They are consulted in a
//! fixed order and the first non-empty value wins:
//!
//! ```text
//! deployment properties file  →  environment variable reference  →  [push] table
//! ```
//!
//! Resolution never fails. A setting no source provides resolves to `""`,
//! and it is up to whoever consumes the value to reject it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::broker::Credentials;
use crate::config::schema::PushConfig;

/// Where a setting value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSource {
    /// Deployment properties file shipped with the application.
    DeploymentProperties,
    /// An environment variable named by the configuration.
    EnvironmentReference,
    /// The value written directly in the configuration file.
    Direct,
}

/// Settings resolved through the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    ConnectionFactory,
    TopicsNamespace,
    Username,
    Password,
}

/// Source order used by [`PushSettings::resolve`].
pub const DEFAULT_PRECEDENCE: [ConfigSource; 3] = [
    ConfigSource::DeploymentProperties,
    ConfigSource::EnvironmentReference,
    ConfigSource::Direct,
];

/// String-valued settings keyed by source and setting.
pub trait ConfigurationService {
    fn string_value(&self, source: ConfigSource, setting: Setting) -> Option<String>;
}

/// Return the first non-empty value for `setting`, walking `precedence` in order.
pub fn first_non_empty(
    service: &dyn ConfigurationService,
    setting: Setting,
    precedence: &[ConfigSource],
) -> String {
    precedence
        .iter()
        .filter_map(|source| service.string_value(*source, setting))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Contents of a deployment properties file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentProperties {
    pub connection_factory: Option<String>,
    pub topics_namespace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DeploymentProperties {
    fn get(&self, setting: Setting) -> Option<&String> {
        match setting {
            Setting::ConnectionFactory => self.connection_factory.as_ref(),
            Setting::TopicsNamespace => self.topics_namespace.as_ref(),
            Setting::Username => self.username.as_ref(),
            Setting::Password => self.password.as_ref(),
        }
    }
}

/// The three sources layered over each other.
///
/// The environment is captured once at construction so that resolution is a
/// pure function of this value.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfiguration {
    properties: DeploymentProperties,
    environment: HashMap<String, String>,
    direct: PushConfig,
}

impl LayeredConfiguration {
    pub fn new(
        properties: DeploymentProperties,
        environment: HashMap<String, String>,
        direct: PushConfig,
    ) -> Self {
        Self {
            properties,
            environment,
            direct,
        }
    }

    /// Build from the current process environment.
    pub fn from_process_env(properties: DeploymentProperties, direct: PushConfig) -> Self {
        Self::new(properties, std::env::vars().collect(), direct)
    }

    fn env_ref(&self, setting: Setting) -> Option<&String> {
        let refs = &self.direct.env_ref;
        match setting {
            Setting::ConnectionFactory => refs.connection_factory.as_ref(),
            Setting::TopicsNamespace => refs.topics_namespace.as_ref(),
            Setting::Username => refs.username.as_ref(),
            Setting::Password => refs.password.as_ref(),
        }
    }

    fn direct(&self, setting: Setting) -> &String {
        match setting {
            Setting::ConnectionFactory => &self.direct.connection_factory,
            Setting::TopicsNamespace => &self.direct.topics_namespace,
            Setting::Username => &self.direct.username,
            Setting::Password => &self.direct.password,
        }
    }
}

impl ConfigurationService for LayeredConfiguration {
    fn string_value(&self, source: ConfigSource, setting: Setting) -> Option<String> {
        match source {
            ConfigSource::DeploymentProperties => self.properties.get(setting).cloned(),
            ConfigSource::EnvironmentReference => self
                .env_ref(setting)
                .and_then(|var| self.environment.get(var))
                .cloned(),
            ConfigSource::Direct => Some(self.direct(setting).clone()),
        }
    }
}

/// Snapshot of everything the push context needs to start.
#[derive(Clone, PartialEq, Eq)]
pub struct PushSettings {
    pub connection_factory: String,
    pub topics_namespace: String,
    pub username: String,
    pub password: String,
    /// Derived from the deployment context path.
    pub application_name: String,
}

impl PushSettings {
    /// Resolve all settings with [`DEFAULT_PRECEDENCE`].
    pub fn resolve(service: &dyn ConfigurationService, context_path: &str) -> Self {
        let get = |setting| first_non_empty(service, setting, &DEFAULT_PRECEDENCE);
        Self {
            connection_factory: get(Setting::ConnectionFactory),
            topics_namespace: get(Setting::TopicsNamespace),
            username: get(Setting::Username),
            password: get(Setting::Password),
            application_name: application_name(context_path),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for PushSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSettings")
            .field("connection_factory", &self.connection_factory)
            .field("topics_namespace", &self.topics_namespace)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// The root context path maps to an empty application name.
fn application_name(context_path: &str) -> String {
    context_path.trim().trim_end_matches('/').to_string()
}
