//! Values exchanged between callers and the workflow orchestrator.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Outcome of every start/resume step.
///
/// `awaiting_decision` is `true` exactly when the workflow is paused for
/// reviewer input; `false` only accompanies the final report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowResult {
    /// Reviewer prompt, fallback text, or the final report.
    pub message: String,
    /// Whether the session now waits for feedback or approval.
    pub awaiting_decision: bool,
    /// Session the step was applied to.
    pub session_id: String,
}

impl WorkflowResult {
    /// Result for a step that paused awaiting a reviewer decision.
    #[must_use]
    pub fn awaiting(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            awaiting_decision: true,
            session_id: session_id.into(),
        }
    }

    /// Result carrying the terminal report.
    #[must_use]
    pub fn finished(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            awaiting_decision: false,
            session_id: session_id.into(),
        }
    }
}

/// Canonical reviewer decision applied by a resume call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Accept the current plan and produce the final report.
    Approve,
    /// Reject the plan and revise it using this instruction.
    Revise(String),
}

impl ResumeDecision {
    /// Translate the wire-level `approved`/`feedback` pair into a decision.
    ///
    /// With `approved` set, it decides; feedback is then only required for a
    /// rejection. Without it, the legacy text convention applies: `yes` or
    /// `true` (any case) approve, any other non-empty text is a revision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` when neither field carries a decision,
    /// or when a rejection has no feedback text.
    pub fn from_parts(approved: Option<bool>, feedback: Option<&str>) -> Result<Self> {
        let feedback = feedback.map(str::trim).filter(|text| !text.is_empty());

        match (approved, feedback) {
            (Some(true), _) => Ok(Self::Approve),
            (Some(false), Some(text)) => Ok(Self::Revise(text.to_owned())),
            (Some(false), None) => Err(AppError::InvalidInput(
                "feedback is required when the plan is not approved".into(),
            )),
            (None, Some(text)) if is_legacy_approval(text) => Ok(Self::Approve),
            (None, Some(text)) => Ok(Self::Revise(text.to_owned())),
            (None, None) => Err(AppError::InvalidInput(
                "either approved or feedback is required".into(),
            )),
        }
    }

    /// Whether this decision finalizes the workflow.
    #[must_use]
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

fn is_legacy_approval(text: &str) -> bool {
    text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("true")
}
