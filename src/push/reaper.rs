//! Idle session expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::push::context::PushContext;

/// Periodically destroys sessions nobody has polled for a while.
pub struct SessionReaper {
    context: Arc<PushContext>,
    interval: Duration,
    max_inactive: Duration,
}

impl SessionReaper {
    pub fn new(context: Arc<PushContext>, interval: Duration, max_inactive: Duration) -> Self {
        Self {
            context,
            interval,
            max_inactive,
        }
    }

    /// One sweep. Does nothing while the context is stopped.
    pub fn sweep(&self) -> usize {
        match self.context.push_handler() {
            Ok(handler) => handler.expire_idle(self.max_inactive),
            Err(_) => 0,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_inactive_secs = self.max_inactive.as_secs(),
            "Session reaper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = self.sweep();
                    if expired > 0 {
                        tracing::debug!(expired, "Expired idle sessions");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalBroker;
    use crate::lifecycle::events::ApplicationEvents;
    use crate::push::handler::SessionOptions;
    use crate::push::messaging::tests::{naming_with, settings};

    #[test]
    fn test_sweep_skips_stopped_context() {
        let broker = LocalBroker::new();
        let context = Arc::new(PushContext::new(
            Arc::new(naming_with(&broker)),
            Arc::new(ApplicationEvents::new("test")),
            SessionOptions::default(),
        ));
        let reaper = SessionReaper::new(context.clone(), Duration::from_secs(1), Duration::ZERO);
        assert_eq!(reaper.sweep(), 0);

        context.start(&settings("/ConnectionFactory", "/topic")).unwrap();
        context.push_handler().unwrap().create_session(&[]).unwrap();
        assert_eq!(reaper.sweep(), 1);
        context.stop();
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let broker = LocalBroker::new();
        let context = Arc::new(PushContext::new(
            Arc::new(naming_with(&broker)),
            Arc::new(ApplicationEvents::new("test")),
            SessionOptions::default(),
        ));
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(
            SessionReaper::new(context, Duration::from_millis(10), Duration::from_secs(60)).run(rx),
        );
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
