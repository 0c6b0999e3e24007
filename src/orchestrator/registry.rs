//! Session registry: session id to per-session configuration.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::session::SessionConfig;

/// Lazily populated map of sessions to their configuration.
///
/// Entries are created from the configured defaults on first use and live
/// until [`forget`](Self::forget) or [`clear`](Self::clear).
#[derive(Debug)]
pub struct SessionRegistry {
    defaults: SessionConfig,
    sessions: Mutex<HashMap<String, SessionConfig>>,
}

impl SessionRegistry {
    /// Create a registry handing out `defaults` to new sessions.
    #[must_use]
    pub fn new(defaults: SessionConfig) -> Self {
        Self {
            defaults,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a session, creating it with default configuration if needed.
    ///
    /// Without an id a fresh UUID session is created.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> (String, SessionConfig) {
        let id = session_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        let mut sessions = self.sessions.lock().await;
        let config = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "registering session");
                self.defaults.clone()
            })
            .clone();
        (id, config)
    }

    /// Drop one session. Unknown ids are ignored.
    pub async fn forget(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    /// Drop every session.
    pub async fn clear(&self) {
        self.sessions.lock().await.clear();
    }

    /// Number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
