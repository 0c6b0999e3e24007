//! Per-session in-flight tracking.
//!
//! At most one start/resume step may run for a session at a time. A second
//! caller fails fast instead of queueing, so no caller observes a checkpoint
//! that another step is about to overwrite.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{AppError, Result};

/// Set of session ids with a step currently executing.
#[derive(Debug, Default, Clone)]
pub struct InFlight {
    sessions: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `session_id` busy until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionBusy` if a step is already running for the
    /// session.
    pub fn acquire(&self, session_id: &str) -> Result<InFlightGuard> {
        let inserted = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_owned());
        if !inserted {
            return Err(AppError::SessionBusy(format!(
                "a request for session {session_id} is already in progress"
            )));
        }
        Ok(InFlightGuard {
            sessions: Arc::clone(&self.sessions),
            session_id: session_id.to_owned(),
        })
    }

    /// Whether a step is currently running for `session_id`.
    #[must_use]
    pub fn is_busy(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(session_id)
    }
}

/// Releases the session's in-flight marker on drop, including when the
/// owning request future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    sessions: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}
