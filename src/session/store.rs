//! # Session Store
//!
//! Holds every active session in memory, keyed by a server-generated identifier.
//! Nothing is persisted: a restart forgets every session, and sessions that are
//! never stopped stay until the process exits.
//!
//! ## Thread Safety:
//! All maps live behind one `Mutex`, so the id map and the token index can never
//! disagree. The store is shared through `Arc` (via `web::Data`) by every
//! request handler.

use crate::session::models::Quality;
use crate::session::token::SessionToken;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Lifecycle status of a stored session.
///
/// Only `Active` exists: a session is active while it is in the store and gone
/// once removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
        }
    }
}

/// Caller-supplied data recorded for a new session.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub avatar_id: String,
    pub quality: Quality,
    pub token: SessionToken,
}

/// One active session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub created_at: DateTime<Utc>,
    pub avatar_id: String,
    pub quality: Quality,
    pub status: SessionStatus,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    /// token → session_id
    by_token: HashMap<String, String>,
}

/// In-memory map of active sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while holding the lock leaves the maps consistent (every mutation
    /// is a single insert/remove pair), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new session and return its freshly generated identifier.
    ///
    /// ## Returns:
    /// A UUID v4 string that is not currently in the store. A collision is
    /// practically impossible, but one would simply draw another id.
    pub fn create(&self, metadata: SessionMetadata) -> String {
        let mut inner = self.lock();

        let session_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !inner.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        inner
            .by_token
            .insert(metadata.token.as_str().to_string(), session_id.clone());
        inner.sessions.insert(
            session_id.clone(),
            Session {
                session_id: session_id.clone(),
                token: metadata.token,
                created_at: Utc::now(),
                avatar_id: metadata.avatar_id,
                quality: metadata.quality,
                status: SessionStatus::Active,
            },
        );

        session_id
    }

    /// Remove a session; returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut inner = self.lock();
        match inner.sessions.remove(session_id) {
            Some(session) => {
                inner.by_token.remove(session.token.as_str());
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.lock().sessions.contains_key(session_id)
    }

    /// Resolve a token back to the session it was issued with.
    pub fn id_for_token(&self, token: &str) -> Option<String> {
        self.lock().by_token.get(token).cloned()
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metadata(token: &str) -> SessionMetadata {
        SessionMetadata {
            avatar_id: "a1".to_string(),
            quality: Quality::High,
            token: SessionToken::new(token),
        }
    }

    #[test]
    fn test_create_then_remove() {
        let store = SessionStore::new();
        let id = store.create(metadata("tok-1"));

        assert!(store.exists(&id));
        assert_eq!(store.len(), 1);
        let session = store.get(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.avatar_id, "a1");

        assert!(store.remove(&id));
        assert!(!store.exists(&id));
        assert!(!store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_token_index_follows_removal() {
        let store = SessionStore::new();
        let id = store.create(metadata("tok-2"));

        assert_eq!(store.id_for_token("tok-2"), Some(id.clone()));
        store.remove(&id);
        assert_eq!(store.id_for_token("tok-2"), None);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::new();
        let a = store.create(metadata("a"));
        let b = store.create(metadata("b"));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_creates() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.create(metadata(&format!("tok-{}-{}", i, j)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
