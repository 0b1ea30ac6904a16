//! Keyed session store with per-session serialisation.
//!
//! The outer map is guarded by a short-lived `std::sync::Mutex`; each
//! session sits behind its own `tokio::sync::Mutex` so one turn can hold
//! it across the narrator stream while other sessions proceed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use augur_core::types::{ConversationMode, Session};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ChatError;

/// Shared handle to one session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Lightweight listing entry for `GET /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub turn_count: u64,
    pub probe_count: usize,
    pub last_mode: Option<ConversationMode>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            turn_count: session.turn_count,
            probe_count: session.probes.len(),
            last_mode: session.last_mode,
            updated_at: session.updated_at,
        }
    }
}

/// Process-wide session map.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionHandle>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::StorageError(format!("session lock poisoned: {}", e)))
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Result<Option<SessionHandle>, ChatError> {
        Ok(self.map()?.get(id).cloned())
    }

    /// Insert a session under its own id, replacing any previous entry.
    pub fn create(&self, session: Session) -> Result<SessionHandle, ChatError> {
        let id = session.id.clone();
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        self.map()?.insert(id.clone(), Arc::clone(&handle));
        info!(session_id = %id, "Session created");
        Ok(handle)
    }

    /// Return the requested session, creating it when absent.
    ///
    /// A missing id gets a fresh v4 uuid. The boolean is true when the
    /// session was created by this call.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<(SessionHandle, bool), ChatError> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut map = self.map()?;
        if let Some(handle) = map.get(&id) {
            return Ok((Arc::clone(handle), false));
        }
        let handle = Arc::new(tokio::sync::Mutex::new(Session::new(id.clone())));
        map.insert(id.clone(), Arc::clone(&handle));
        info!(session_id = %id, "Session created");
        Ok((handle, true))
    }

    /// Apply `mutator` to the stored session in place.
    ///
    /// Returns false (and does nothing) when the id is unknown.
    pub async fn update<F>(&self, id: &str, mutator: F) -> Result<bool, ChatError>
    where
        F: FnOnce(&mut Session),
    {
        let Some(handle) = self.get(id)? else {
            return Ok(false);
        };
        let mut session = handle.lock().await;
        mutator(&mut session);
        session.updated_at = Utc::now();
        Ok(true)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, ChatError> {
        let removed = self.map()?.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session deleted");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.map().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handles(&self) -> Result<Vec<SessionHandle>, ChatError> {
        Ok(self.map()?.values().cloned().collect())
    }

    /// Summaries of every session, most recently updated first.
    pub async fn summaries(&self) -> Result<Vec<SessionSummary>, ChatError> {
        let mut out = Vec::new();
        for handle in self.handles()? {
            let session = handle.lock().await;
            out.push(SessionSummary::from(&*session));
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    /// Delete sessions idle for longer than `idle`.
    ///
    /// A session whose handle is held anywhere besides the map belongs to
    /// a turn (possibly still waiting for the lock) and is never swept.
    /// New handles are only cloned under the map lock, so the count is
    /// stable while this runs.
    pub fn purge_expired(&self, idle: Duration) -> Result<usize, ChatError> {
        let cutoff = Utc::now() - idle;
        let mut map = self.map()?;
        let expired: Vec<String> = map
            .iter()
            .filter_map(|(id, handle)| {
                if Arc::strong_count(handle) > 1 {
                    return None;
                }
                let session = handle.try_lock().ok()?;
                (session.updated_at < cutoff).then(|| id.clone())
            })
            .collect();
        for id in &expired {
            map.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired idle sessions");
        }
        Ok(expired.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
