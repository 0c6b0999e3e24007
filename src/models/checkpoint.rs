//! Checkpoint model: the suspended execution state of one session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{SessionConfig, WorkflowStage};

/// Snapshot of a session sufficient to resume after its last suspend point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Checkpoint {
    /// Owning session identifier.
    pub session_id: String,
    /// Research topic the session was started with.
    pub topic: String,
    /// Current workflow position.
    pub stage: WorkflowStage,
    /// Latest report plan produced by a stage, if any.
    pub plan: Option<String>,
    /// Prompt shown to the reviewer at the last interrupt.
    pub prompt: Option<String>,
    /// Every piece of reviewer feedback received, oldest first.
    pub feedback_history: Vec<String>,
    /// Number of completed revise steps.
    pub revision: u32,
    /// Monotonic write counter, bumped on every persisted step.
    pub version: u64,
    /// Session configuration captured at start.
    pub config: SessionConfig,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Construct the initial checkpoint for a freshly started session.
    #[must_use]
    pub fn new(session_id: String, topic: String, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            topic,
            stage: WorkflowStage::PlanPendingReview,
            plan: None,
            prompt: None,
            feedback_history: Vec::new(),
            revision: 0,
            version: 0,
            config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session has produced its final report.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.stage == WorkflowStage::Finalized
    }

    /// Bump the write counter and timestamp ahead of a store write.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
