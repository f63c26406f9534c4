//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of live browser sessions.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use report_interpreter_core::session::{SessionController, SessionState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// How long a login stays valid; also the session cookie's `Max-Age`.
pub const SESSION_TTL_DAYS: i64 = 30;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}

//=========================================================================================
// SessionRegistry (One Entry per Logged-in Browser)
//=========================================================================================

/// A single session's state. The mutex makes each of the session's actions
/// run to completion before the next one starts.
pub type SessionHandle = Arc<Mutex<SessionState>>;

struct SessionEntry {
    handle: SessionHandle,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory map from session cookie value to session state.
///
/// Entries expire after the configured lifetime. Expired entries are dropped
/// when looked up and swept on every new login.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(Duration::days(SESSION_TTL_DAYS))
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores a session under a new random id and returns the id.
    pub async fn insert(&self, state: SessionState) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now));
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "Swept expired sessions");
        }

        sessions.insert(
            id.clone(),
            SessionEntry {
                handle: Arc::new(Mutex::new(state)),
                expires_at: now + self.ttl,
            },
        );
        id
    }

    /// Returns the live session for `id`; an expired one is removed instead.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.handle.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|entry| entry.is_expired(now)) {
            sessions.remove(id);
            debug!("Dropped expired session");
        }
        None
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id).map(|entry| entry.handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
