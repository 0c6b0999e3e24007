//! Per-session configuration and workflow stage markers.

use serde::{Deserialize, Serialize};

/// Position of a session in the research workflow.
///
/// `NOT_STARTED` is represented by the absence of a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// A plan has been presented and the reviewer has not yet approved it.
    PlanPendingReview,
    /// The final report was produced; the session accepts no more resumes.
    Finalized,
}

impl WorkflowStage {
    /// Determine whether a stage transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PlanPendingReview, Self::PlanPendingReview | Self::Finalized)
        )
    }

    /// Stable lowercase name used in logs and storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlanPendingReview => "plan_pending_review",
            Self::Finalized => "finalized",
        }
    }
}

/// Thread-level configuration handed to stage executors unchanged.
///
/// The orchestrator never interprets these values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct SessionConfig {
    /// Web search provider identifier (e.g. `tavily`).
    pub search_api: String,
    /// Provider for the planning model.
    pub planner_provider: String,
    /// Model used to draft and revise plans.
    pub planner_model: String,
    /// Provider for the writing model.
    pub writer_provider: String,
    /// Model used to write report sections.
    pub writer_model: String,
    /// Maximum search/reflection iterations per section.
    pub max_search_depth: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_api: "tavily".into(),
            planner_provider: "openai".into(),
            planner_model: "gpt-4o".into(),
            writer_provider: "openai".into(),
            writer_model: "gpt-4o-mini".into(),
            max_search_depth: 1,
        }
    }
}
