//! Push handler.
//!
//! # Responsibilities
//! - Create sessions and subscribe them to the requested topics
//! - Subscribe/unsubscribe under the session's subscription lock
//! - Disconnect, expire and finally destroy every session
//!
//! # Design Decisions
//! - A session is created even if some subscriptions fail; the failures are
//!   reported per topic key so the client can show them
//! - Closing a session attempts every unsubscribe and reports the first error
//! - The closed flag is set under the subscription lock, so a subscribe
//!   either lands before the close and is released by it, or sees the close

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;
use crate::push::error::{PushError, PushResult};
use crate::push::messaging::MessagingContext;
use crate::push::session::{Session, SessionId};
use crate::push::session_manager::SessionManager;
use crate::push::topics::{TopicKey, TopicsContext};

/// Per-session tuning passed down from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub max_queued_messages: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_queued_messages: 256,
        }
    }
}

/// A freshly created session and the subscriptions that did not go through.
#[derive(Debug)]
pub struct CreatedSession {
    pub session: Arc<Session>,
    /// topic key → reason
    pub failures: BTreeMap<String, String>,
}

/// Bridges clients to the topic registry.
pub struct PushHandler {
    messaging: Arc<MessagingContext>,
    topics: Arc<TopicsContext>,
    sessions: Arc<SessionManager>,
    options: SessionOptions,
}

impl PushHandler {
    pub fn new(
        messaging: Arc<MessagingContext>,
        topics: Arc<TopicsContext>,
        options: SessionOptions,
    ) -> Self {
        Self {
            messaging,
            topics,
            sessions: Arc::new(SessionManager::new()),
            options,
        }
    }

    pub fn session_manager(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    /// Look up a live session.
    pub fn session(&self, id: SessionId) -> PushResult<Arc<Session>> {
        self.sessions.get(id)
    }

    /// Create a session subscribed to `keys`.
    pub fn create_session(&self, keys: &[TopicKey]) -> PushResult<CreatedSession> {
        if !self.messaging.is_open() {
            return Err(PushError::ConnectionClosed);
        }

        let session = Arc::new(Session::new(self.options.max_queued_messages));
        self.sessions.insert(session.clone())?;

        let mut failures = BTreeMap::new();
        for key in keys {
            match self.subscribe(&session, key) {
                Ok(()) => {}
                Err(PushError::SessionClosed(id)) => return Err(PushError::SessionClosed(id)),
                Err(e) => {
                        tracing::info!(session = %session.id(), topic = %key, error = %e, "Subscription failed");
                    metrics::record_subscription_failure();
                    failures.insert(key.to_string(), e.to_string());
                }
            }
        }

        tracing::info!(
            session = %session.id(),
            subscribed = session.subscriptions().len(),
            failed = failures.len(),
            "Push session created"
        );
        Ok(CreatedSession { session, failures })
    }

    /// Subscribe a session to a topic key. Subscribing twice is a no-op.
    pub fn subscribe(&self, session: &Arc<Session>, key: &TopicKey) -> PushResult<()> {
        if session.is_closed() {
            return Err(PushError::SessionClosed(session.id()));
        }

        let topic = self.topics.get_topic(key)?;
        topic.check_subscription(key, session.id())?;

        {
            let mut subscriptions = session.lock_subscriptions();
            if session.is_closed() {
                return Err(PushError::SessionClosed(session.id()));
            }
            if subscriptions.contains(key) {
                return Ok(());
            }
            self.messaging.subscribe(session, key)?;
            subscriptions.insert(key.clone());
        }

        topic.notify_subscribed(key, session.id());
        Ok(())
    }

    /// Remove one subscription. Returns false if the session was not subscribed.
    pub fn unsubscribe(&self, session: &Session, key: &TopicKey) -> PushResult<bool> {
        {
            let mut subscriptions = session.lock_subscriptions();
            if !subscriptions.contains(key) {
                return Ok(false);
            }
            self.messaging.unsubscribe(session.id(), key)?;
            subscriptions.remove(key);
        }

        if let Ok(topic) = self.topics.get_topic(key) {
            topic.notify_unsubscribed(key, session.id());
        }
        Ok(true)
    }

    /// Close a session that is no longer in the registry.
    fn close_session(&self, session: &Session) -> PushResult<()> {
        let keys = {
            let mut subscriptions = session.lock_subscriptions();
            if !session.close() {
                return Ok(());
            }
            std::mem::take(&mut *subscriptions)
        };

        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.messaging.unsubscribe(session.id(), &key) {
                tracing::warn!(session = %session.id(), topic = %key, error = %e, "Unsubscribe failed");
                first_error.get_or_insert(e);
                continue;
            }
            if let Ok(topic) = self.topics.get_topic(&key) {
                topic.notify_unsubscribed(&key, session.id());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Client-initiated disconnect.
    pub fn disconnect(&self, id: SessionId) -> PushResult<()> {
        let session = self.sessions.remove(id).ok_or(PushError::UnknownSession(id))?;
        tracing::info!(session = %id, "Push session disconnected");
        self.close_session(&session)
    }

    /// Destroy sessions idle for `max_inactive` or longer. Returns how many.
    pub fn expire_idle(&self, max_inactive: Duration) -> usize {
        let expired = self.sessions.remove_idle(max_inactive, Instant::now());
        for session in &expired {
            tracing::info!(session = %session.id(), "Push session expired");
            if let Err(e) = self.close_session(session) {
                tracing::warn!(session = %session.id(), error = %e, "Failed to clean up expired session");
            }
        }
        expired.len()
    }

    /// Close every session and refuse new ones.
    ///
    /// All sessions are closed even if some fail; the first failure is returned.
    pub fn destroy(&self) -> PushResult<()> {
        let sessions = self.sessions.drain();
        let mut first_error = None;
        for session in &sessions {
            if let Err(e) = self.close_session(session) {
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(sessions = sessions.len(), "Push handler destroyed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::messaging::tests::started_messaging;
    use crate::push::topics::{SubscriptionFailure, TopicListener};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Mutex;

    fn key(raw: &str) -> TopicKey {
        raw.parse().unwrap()
    }

    fn handler() -> (crate::broker::LocalBroker, Arc<TopicsContext>, PushHandler) {
        let (broker, messaging) = started_messaging();
        let topics = Arc::new(TopicsContext::new(messaging.clone()));
        topics.get_or_create_topic(&key("chat")).unwrap().set_allow_subtopics(true);
        topics.get_or_create_topic(&key("news")).unwrap();
        let handler = PushHandler::new(messaging, topics.clone(), SessionOptions::default());
        (broker, topics, handler)
    }

    #[derive(Default)]
    struct Counting {
        subscribed: AtomicUsize,
        unsubscribed: AtomicUsize,
    }

    impl TopicListener for Counting {
        fn subscribed(&self, _key: &TopicKey, _session: SessionId) {
            self.subscribed.fetch_add(1, Ordering::SeqCst);
        }

        fn unsubscribed(&self, _key: &TopicKey, _session: SessionId) {
            self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_create_session_reports_failures() {
        let (_broker, _topics, handler) = handler();
        let created = handler
            .create_session(&[key("room@chat"), key("missing"), key("x@news")])
            .unwrap();

        assert_eq!(created.session.subscriptions(), vec![key("room@chat")]);
        assert_eq!(created.failures.len(), 2);
        assert!(created.failures["missing"].contains("unknown topic"));
        assert!(created.failures["x@news"].contains("subtopics are not allowed"));
    }

    #[test]
    fn test_messages_flow_to_subscribed_sessions() {
        let (_broker, topics, handler) = handler();
        let a = handler.create_session(&[key("room@chat")]).unwrap().session;
        let b = handler.create_session(&[key("news")]).unwrap().session;

        assert_eq!(topics.publish(&key("room@chat"), json!("hello")).unwrap(), 1);
        assert_eq!(a.drain()[0].data, json!("hello"));
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_subscribe_twice_is_noop_and_listeners_fire() {
        let (broker, topics, handler) = handler();
        let counting = Arc::new(Counting::default());
        topics.add_topic_listener(counting.clone()).unwrap();

        let session = handler.create_session(&[]).unwrap().session;
        handler.subscribe(&session, &key("news")).unwrap();
        handler.subscribe(&session, &key("news")).unwrap();
        assert_eq!(broker.subscription_count("topic/news"), 1);
        assert_eq!(counting.subscribed.load(Ordering::SeqCst), 1);

        assert!(handler.unsubscribe(&session, &key("news")).unwrap());
        assert!(!handler.unsubscribe(&session, &key("news")).unwrap());
        assert_eq!(counting.unsubscribed.load(Ordering::SeqCst), 1);
    }

    struct Veto;

    impl TopicListener for Veto {
        fn pre_subscribe(&self, _key: &TopicKey, _session: SessionId) -> Result<(), SubscriptionFailure> {
            Err(SubscriptionFailure::new("closed for maintenance"))
        }
    }

    #[test]
    fn test_listener_veto() {
        let (broker, topics, handler) = handler();
        topics.add_topic_listener(Arc::new(Veto)).unwrap();
        let created = handler.create_session(&[key("news")]).unwrap();
        assert_eq!(created.failures["news"], "subscription rejected: closed for maintenance");
        assert_eq!(broker.subscription_count("topic/news"), 0);
    }

    #[test]
    fn test_disconnect_releases_subscriptions() {
        let (broker, _topics, handler) = handler();
        let session = handler
            .create_session(&[key("news"), key("a@chat")])
            .unwrap()
            .session;

        handler.disconnect(session.id()).unwrap();
        assert!(session.is_closed());
        assert_eq!(broker.subscription_count("topic/news"), 0);
        assert_eq!(broker.subscription_count("topic/chat"), 0);
        assert!(matches!(
            handler.disconnect(session.id()),
            Err(PushError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_expire_idle() {
        let (broker, _topics, handler) = handler();
        handler.create_session(&[key("news")]).unwrap();
        assert_eq!(handler.expire_idle(Duration::from_secs(300)), 0);
        assert_eq!(handler.expire_idle(Duration::ZERO), 1);
        assert_eq!(broker.subscription_count("topic/news"), 0);
    }

    #[test]
    fn test_destroy_closes_everything() {
        let (broker, _topics, handler) = handler();
        let session = handler.create_session(&[key("news")]).unwrap().session;

        handler.destroy().unwrap();
        assert!(session.is_closed());
        assert_eq!(broker.subscription_count("topic/news"), 0);
        assert!(matches!(
            handler.create_session(&[]),
            Err(PushError::RegistryDestroyed)
        ));
    }

    /// Holds a subscribe inside `pre_subscribe` until released, reporting
    /// which session it is holding.
    struct Gate {
        entered: Mutex<mpsc::Sender<SessionId>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Gate {
        fn new() -> (Arc<Self>, mpsc::Receiver<SessionId>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let gate = Arc::new(Self {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            });
            (gate, entered_rx, release_tx)
        }
    }

    impl TopicListener for Gate {
        fn pre_subscribe(&self, _key: &TopicKey, session: SessionId) -> Result<(), SubscriptionFailure> {
            self.entered.lock().unwrap().send(session).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_subscribe_racing_disconnect_leaves_no_broker_subscription() {
        let (broker, topics, handler) = handler();
        let (gate, entered, release) = Gate::new();
        topics.add_topic_listener(gate).unwrap();
        let session = handler.create_session(&[]).unwrap().session;

        let result = std::thread::scope(|scope| {
            let subscriber = scope.spawn(|| handler.subscribe(&session, &key("news")));
            entered.recv().unwrap();
            handler.disconnect(session.id()).unwrap();
            release.send(()).unwrap();
            subscriber.join().unwrap()
        });

        assert!(matches!(result, Err(PushError::SessionClosed(_))));
        assert!(session.is_closed());
        assert!(session.subscriptions().is_empty());
        assert_eq!(broker.subscription_count("topic/news"), 0);
    }

    #[test]
    fn test_create_session_closed_during_setup_fails() {
        let (broker, topics, handler) = handler();
        let (gate, entered, release) = Gate::new();
        topics.add_topic_listener(gate).unwrap();

        let result = std::thread::scope(|scope| {
            let creator = scope.spawn(|| handler.create_session(&[key("news"), key("a@chat")]));
            let id = entered.recv().unwrap();
            handler.disconnect(id).unwrap();
            release.send(()).unwrap();
            creator.join().unwrap()
        });

        assert!(matches!(result, Err(PushError::SessionClosed(_))));
        assert_eq!(broker.subscription_count("topic/news"), 0);
        assert_eq!(broker.subscription_count("topic/chat"), 0);
        assert!(handler.session_manager().is_empty());
    }

    #[test]
    fn test_concurrent_subscribe_and_expire() {
        let (broker, _topics, handler) = handler();
        for _ in 0..20 {
            let session = handler.create_session(&[]).unwrap().session;
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    let _ = handler.subscribe(&session, &key("news"));
                    let _ = handler.subscribe(&session, &key("a@chat"));
                });
                scope.spawn(|| handler.expire_idle(Duration::ZERO));
            });
            handler.expire_idle(Duration::ZERO);
            assert!(session.is_closed());
        }
        assert_eq!(broker.subscription_count("topic/news"), 0);
        assert_eq!(broker.subscription_count("topic/chat"), 0);
    }
}
