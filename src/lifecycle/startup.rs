//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the in-process broker into the naming service
//! - Layer the configuration sources and resolve push settings
//! - Start the push context and create the configured topics
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready), see `main`

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::broker::{Credentials, LocalBroker};
use crate::config::{
    load_deployment_properties, AppConfig, BrokerConfig, ConfigError, DeploymentProperties,
    LayeredConfiguration, PushConfig, PushSettings, TopicConfig,
};
use crate::lifecycle::events::{ApplicationEvents, SystemEvent};
use crate::naming::{Binding, InMemoryNamingContext, NameParser, NamingError};
use crate::push::{PushContext, PushError, PushResult, SessionOptions, TopicKey};

#[derive(Debug, Error)]
pub enum StartupFailure {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("naming setup failed: {0}")]
    Naming(#[from] NamingError),

    #[error("push context failed: {0}")]
    Push(#[from] PushError),
}

/// Everything `main` needs after a successful startup.
pub struct Gateway {
    pub broker: LocalBroker,
    pub naming: Arc<InMemoryNamingContext>,
    pub events: Arc<ApplicationEvents>,
    pub context: Arc<PushContext>,
    pub settings: PushSettings,
}

/// Create the broker and bind it under the configured names.
pub fn bind_broker(config: &BrokerConfig) -> Result<(LocalBroker, InMemoryNamingContext), NamingError> {
    let broker = match (&config.username, &config.password) {
        (None, None) => LocalBroker::new(),
        (username, password) => LocalBroker::with_credentials(Credentials::new(
            username.clone().unwrap_or_default(),
            password.clone().unwrap_or_default(),
        )),
    };

    let parser = NameParser;
    let naming = InMemoryNamingContext::new();
    naming.bind(
        parser.parse(&config.connection_factory_binding)?,
        Binding::ConnectionFactory(broker.connection_factory()),
    )?;
    naming.bind(
        parser.parse(&config.topics_binding)?,
        Binding::TopicNamespace(config.topics_prefix.clone()),
    )?;

    tracing::debug!(
        connection_factory = %config.connection_factory_binding,
        topics = %config.topics_binding,
        "Broker bound into naming service"
    );
    Ok((broker, naming))
}

/// Layer deployment properties, environment references and the `[push]` table.
pub fn configuration_service(push: &PushConfig) -> Result<LayeredConfiguration, ConfigError> {
    let properties = match &push.properties_file {
        Some(path) => load_deployment_properties(Path::new(path))?,
        None => DeploymentProperties::default(),
    };
    Ok(LayeredConfiguration::from_process_env(properties, push.clone()))
}

/// Create the topics listed in configuration.
pub fn create_topics(context: &PushContext, topics: &[TopicConfig]) -> PushResult<()> {
    let registry = context.topics_registry()?;
    for topic in topics {
        let key = TopicKey::new(&topic.name, None)?;
        registry
            .get_or_create_topic(&key)?
            .set_allow_subtopics(topic.allow_subtopics);
        tracing::info!(topic = %key, allow_subtopics = topic.allow_subtopics, "Topic created");
    }
    Ok(())
}

/// Bring up the push subsystem from a validated configuration.
pub fn bootstrap(config: &AppConfig) -> Result<Gateway, StartupFailure> {
    let (broker, naming) = bind_broker(&config.broker)?;
    let naming = Arc::new(naming);

    let service = configuration_service(&config.push)?;
    let settings = PushSettings::resolve(&service, &config.application.context_path);
    tracing::info!(settings = ?settings, "Push settings resolved");

    let events = Arc::new(ApplicationEvents::new(settings.application_name.clone()));
    let context = Arc::new(PushContext::new(
        naming.clone(),
        events.clone(),
        SessionOptions {
            max_queued_messages: config.sessions.max_queued_messages,
        },
    ));

    context.start(&settings)?;
    if let Err(e) = create_topics(&context, &config.push.topics) {
        context.stop();
        return Err(e.into());
    }

    events.publish(&SystemEvent::PostConstructApplication);

    Ok(Gateway {
        broker,
        naming,
        events,
        context,
        settings,
    })
}
