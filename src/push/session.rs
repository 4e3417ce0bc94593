//! Push sessions.
//!
//! A session is the server side of one browser client: the topics it listens
//! to and the messages waiting to be picked up by its next poll.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::observability::metrics;
use crate::push::error::{PushError, PushResult};
use crate::push::topics::TopicKey;

/// Opaque session identifier handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

/// A message queued for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Per-session sequence number, starting at 1.
    pub number: u64,
    /// Topic key the message was published to.
    pub topic: String,
    pub data: serde_json::Value,
}

/// Server-side state of one push client.
pub struct Session {
    id: SessionId,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
    subscriptions: Mutex<BTreeSet<TopicKey>>,
    queue: Mutex<VecDeque<PushMessage>>,
    max_queued: usize,
    next_number: AtomicU64,
    notify: Notify,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    /// Create a session keeping at most `max_queued` undelivered messages.
    pub fn new(max_queued: usize) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::new(),
            created_at: now,
            last_accessed: Mutex::new(now),
            subscriptions: Mutex::new(BTreeSet::new()),
            queue: Mutex::new(VecDeque::new()),
            max_queued: max_queued.max(1),
            next_number: AtomicU64::new(1),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Record client activity.
    pub fn touch(&self) {
        *lock(&self.last_accessed) = Instant::now();
    }

    /// Time since the last client activity, measured at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*lock(&self.last_accessed))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Topic keys this session is subscribed to.
    pub fn subscriptions(&self) -> Vec<TopicKey> {
        lock(&self.subscriptions).iter().cloned().collect()
    }

    /// Exclusive access to the subscription set, held across broker calls
    /// so that concurrent subscribe/unsubscribe requests serialize.
    pub(crate) fn lock_subscriptions(&self) -> MutexGuard<'_, BTreeSet<TopicKey>> {
        lock(&self.subscriptions)
    }

    /// Number of messages waiting.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Queue a message and wake a waiting poll.
    pub fn enqueue(&self, key: &TopicKey, data: serde_json::Value) {
        if self.is_closed() {
            return;
        }

        let message = PushMessage {
            number: self.next_number.fetch_add(1, Ordering::Relaxed),
            topic: key.to_string(),
            data,
        };

        {
            let mut queue = lock(&self.queue);
            if queue.len() >= self.max_queued {
                queue.pop_front();
                metrics::record_message_dropped();
                tracing::warn!(session = %self.id, limit = self.max_queued, "Session queue full, dropped oldest message");
            }
            queue.push_back(message);
        }

        metrics::record_delivery();
        self.notify.notify_one();
    }

    /// Take every queued message.
    pub fn drain(&self) -> Vec<PushMessage> {
        lock(&self.queue).drain(..).collect()
    }

    /// Wait up to `timeout` for messages.
    ///
    /// Returns as soon as at least one message is queued, or an empty batch
    /// when the timeout elapses. Fails once the session is closed.
    pub async fn poll(&self, timeout: Duration) -> PushResult<Vec<PushMessage>> {
        self.touch();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.is_closed() {
                return Err(PushError::SessionClosed(self.id));
            }

            let batch = self.drain();
            if !batch.is_empty() {
                self.touch();
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                self.touch();
                return Ok(Vec::new());
            }
        }
    }

    /// Mark the session closed and release any waiting poll.
    ///
    /// Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        lock(&self.queue).clear();
        self.notify.notify_waiters();
        self.notify.notify_one();
        true
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn key(raw: &str) -> TopicKey {
        raw.parse().unwrap()
    }

    #[test]
    fn test_numbers_are_sequential() {
        let session = Session::new(10);
        session.enqueue(&key("chat"), json!("a"));
        session.enqueue(&key("room@chat"), json!("b"));

        let batch = session.drain();
        assert_eq!(batch.iter().map(|m| m.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(batch[1].topic, "room@chat");
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let session = Session::new(2);
        for i in 0..3 {
            session.enqueue(&key("chat"), json!(i));
        }
        let batch = session.drain();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].data, json!(1));
        assert_eq!(batch[0].number, 2);
    }

    #[tokio::test]
    async fn test_poll_returns_queued_immediately() {
        let session = Session::new(4);
        session.enqueue(&key("chat"), json!("ready"));
        let batch = session.poll(Duration::from_secs(5)).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let session = Session::new(4);
        let batch = session.poll(Duration::from_millis(20)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_poll_wakes_on_enqueue() {
        let session = Arc::new(Session::new(4));
        let poller = {
            let session = session.clone();
            tokio::spawn(async move { session.poll(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        session.enqueue(&key("chat"), json!("late"));

        let batch = poller.await.unwrap().unwrap();
        assert_eq!(batch[0].data, json!("late"));
    }

    #[tokio::test]
    async fn test_close_releases_poll() {
        let session = Arc::new(Session::new(4));
        let poller = {
            let session = session.clone();
            tokio::spawn(async move { session.poll(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.close());
        assert!(!session.close());

        assert!(matches!(
            poller.await.unwrap(),
            Err(PushError::SessionClosed(_))
        ));
        session.enqueue(&key("chat"), json!("ignored"));
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_idle_tracking() {
        let session = Session::new(1);
        let later = Instant::now() + Duration::from_secs(10);
        assert!(session.idle_for(later) >= Duration::from_secs(10));
        session.touch();
        assert!(session.idle_for(Instant::now()) < Duration::from_secs(1));
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!("nope".parse::<SessionId>().is_err());
    }
}
