//! Push context: lifecycle owner of the push subsystem.
//!
//! # States
//! ```text
//!            start (ok)
//! Stopped ───────────────▶ Started
//!    ▲                        │
//!    └────────── stop ────────┘
//! ```
//! A failed `start` leaves the context in `Stopped` with nothing retained.
//! `stop` in `Stopped` does nothing.
//!
//! # Design Decisions
//! - The running state is built completely, then published in one atomic swap
//! - Readers load the running state lock-free; transitions are serialized
//! - Shutdown steps are isolated: a failing step is logged and the next runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwapOption;

use crate::config::PushSettings;
use crate::lifecycle::events::{
    ApplicationEvents, EventError, SystemEvent, SystemEventKind, SystemEventListener,
};
use crate::naming::NamingContext;
use crate::observability::metrics;
use crate::push::error::{PushError, PushResult, StartupError};
use crate::push::handler::{PushHandler, SessionOptions};
use crate::push::messaging::MessagingContext;
use crate::push::session_manager::SessionManager;
use crate::push::topics::TopicsContext;

/// Everything that exists only between `start` and `stop`.
struct Running {
    messaging: Arc<MessagingContext>,
    topics: Arc<TopicsContext>,
    handler: Arc<PushHandler>,
}

/// Owns the broker connection and the registries built on it.
pub struct PushContext {
    naming: Arc<dyn NamingContext>,
    events: Arc<ApplicationEvents>,
    options: SessionOptions,
    running: ArcSwapOption<Running>,
    transition: Mutex<()>,
    registered: AtomicBool,
}

impl PushContext {
    pub fn new(
        naming: Arc<dyn NamingContext>,
        events: Arc<ApplicationEvents>,
        options: SessionOptions,
    ) -> Self {
        Self {
            naming,
            events,
            options,
            running: ArcSwapOption::empty(),
            transition: Mutex::new(()),
            registered: AtomicBool::new(false),
        }
    }

    /// Connect to the broker and build the registries.
    pub fn start(self: &Arc<Self>, settings: &PushSettings) -> PushResult<()> {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.running.load().is_some() {
            return Err(PushError::AlreadyStarted);
        }

        tracing::info!(
            connection_factory = %settings.connection_factory,
            topics_namespace = %settings.topics_namespace,
            application = %settings.application_name,
            "Starting push context"
        );

        let messaging = match MessagingContext::connect(self.naming.as_ref(), settings) {
            Ok(messaging) => Arc::new(messaging),
            Err(e) => {
                tracing::error!(error = %e, "Push context failed to start");
                metrics::record_lifecycle("start_failed");
                return Err(PushError::Initialization(e));
            }
        };

        if let Err(e) = messaging.start() {
            tracing::error!(error = %e, "Push context failed to start messaging connection");
            if let Err(close_err) = messaging.stop() {
                tracing::warn!(error = %close_err, "Failed to close connection after failed start");
            }
            metrics::record_lifecycle("start_failed");
            return Err(PushError::Initialization(StartupError::Broker(e)));
        }

        let topics = Arc::new(TopicsContext::new(messaging.clone()));
        let handler = Arc::new(PushHandler::new(messaging.clone(), topics.clone(), self.options));

        self.running.store(Some(Arc::new(Running {
            messaging,
            topics,
            handler,
        })));

        if !self.registered.swap(true, Ordering::AcqRel) {
            let weak: Weak<Self> = Arc::downgrade(self);
            let listener: Weak<dyn SystemEventListener> = weak;
            self.events
                .subscribe(SystemEventKind::PreDestroyApplication, listener);
        }

        metrics::record_lifecycle("started");
        tracing::info!("Push context started");
        Ok(())
    }

    /// Release everything acquired by `start`. Safe to call at any time.
    pub fn stop(&self) {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(running) = self.running.swap(None) else {
            tracing::debug!("Push context already stopped");
            return;
        };

        tracing::info!("Stopping push context");

        if let Err(e) = running.handler.destroy() {
            tracing::error!(error = %e, "Failed to destroy push handler");
        }

        if let Err(e) = running.messaging.stop() {
            tracing::error!(error = %e, "Failed to stop messaging connection");
        }

        metrics::record_lifecycle("stopped");
        tracing::info!("Push context stopped");
    }

    pub fn is_started(&self) -> bool {
        self.running.load().is_some()
    }

    fn running(&self) -> PushResult<Arc<Running>> {
        self.running.load_full().ok_or(PushError::NotStarted)
    }

    /// The topic registry, while started.
    pub fn topics_registry(&self) -> PushResult<Arc<TopicsContext>> {
        Ok(self.running()?.topics.clone())
    }

    /// The session registry, while started.
    pub fn session_registry(&self) -> PushResult<Arc<SessionManager>> {
        Ok(self.running()?.handler.session_manager())
    }

    /// The session factory / client bridge, while started.
    pub fn push_handler(&self) -> PushResult<Arc<PushHandler>> {
        Ok(self.running()?.handler.clone())
    }

    /// Application name the context was started with.
    pub fn application_name(&self) -> Option<String> {
        self.running
            .load_full()
            .map(|running| running.messaging.application_name().to_string())
    }
}

impl SystemEventListener for PushContext {
    fn process_event(&self, event: &SystemEvent) -> Result<(), EventError> {
        match event {
            SystemEvent::PreDestroyApplication => {
                self.stop();
                Ok(())
            }
            other => Err(EventError::InvalidArgument(other.name())),
        }
    }

    fn is_listener_for_source(&self, _source: &str) -> bool {
        true
    }
}
