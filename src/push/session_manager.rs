//! Session registry.
//!
//! # Responsibilities
//! - Map session ids to live sessions
//! - Pick out sessions idle for longer than the allowed interval
//! - Refuse new sessions once destroyed
//!
//! Broker subscriptions are not handled here; the push handler owns them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::observability::metrics;
use crate::push::error::{PushError, PushResult};
use crate::push::session::{Session, SessionId};

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    destroyed: AtomicBool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session.
    pub fn insert(&self, session: Arc<Session>) -> PushResult<()> {
        if self.is_destroyed() {
            return Err(PushError::RegistryDestroyed);
        }
        let id = session.id();
        self.sessions.insert(id, session);
        // lost a race with drain()
        if self.is_destroyed() {
            self.sessions.remove(&id);
            return Err(PushError::RegistryDestroyed);
        }
        metrics::record_active_sessions(self.sessions.len());
        Ok(())
    }

    /// Look up a session and mark it as accessed.
    pub fn get(&self, id: SessionId) -> PushResult<Arc<Session>> {
        let session = self
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(PushError::UnknownSession(id))?;
        session.touch();
        Ok(session)
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(&id).map(|(_, session)| session);
        metrics::record_active_sessions(self.sessions.len());
        removed
    }

    /// Remove and return sessions idle for at least `max_inactive` as of `now`.
    pub fn remove_idle(&self, max_inactive: Duration, now: Instant) -> Vec<Arc<Session>> {
        let mut expired = Vec::new();
        self.sessions.retain(|_, session| {
            if session.idle_for(now) >= max_inactive {
                expired.push(session.clone());
                false
            } else {
                true
            }
        });
        if !expired.is_empty() {
            metrics::record_active_sessions(self.sessions.len());
        }
        expired
    }

    /// Mark the registry destroyed and hand back every session it held.
    pub fn drain(&self) -> Vec<Arc<Session>> {
        self.destroyed.store(true, Ordering::Release);
        let drained: Vec<Arc<Session>> = self
            .ids()
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|(_, s)| s))
            .collect();
        metrics::record_active_sessions(0);
        drained
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }

    /// Snapshot of all sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let manager = SessionManager::new();
        let session = Arc::new(Session::new(4));
        let id = session.id();

        manager.insert(session).unwrap();
        assert_eq!(manager.get(id).unwrap().id(), id);
        assert_eq!(manager.len(), 1);

        assert!(manager.remove(id).is_some());
        assert!(matches!(manager.get(id), Err(PushError::UnknownSession(_))));
    }

    #[test]
    fn test_remove_idle() {
        let manager = SessionManager::new();
        let a = Arc::new(Session::new(4));
        let b = Arc::new(Session::new(4));
        manager.insert(a.clone()).unwrap();
        manager.insert(b.clone()).unwrap();

        let later = Instant::now() + Duration::from_secs(120);
        assert!(manager.remove_idle(Duration::from_secs(300), later).is_empty());

        let expired = manager.remove_idle(Duration::from_secs(60), later);
        assert_eq!(expired.len(), 2);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_drain_rejects_new_sessions() {
        let manager = SessionManager::new();
        manager.insert(Arc::new(Session::new(4))).unwrap();

        assert_eq!(manager.drain().len(), 1);
        assert!(manager.is_destroyed());
        assert!(matches!(
            manager.insert(Arc::new(Session::new(4))),
            Err(PushError::RegistryDestroyed)
        ));
        assert!(manager.drain().is_empty());
    }
}
