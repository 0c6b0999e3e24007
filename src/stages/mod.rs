//! Stage executor abstraction.
//!
//! A [`StageExecutor`] performs one workflow stage and reports what happened
//! as a lazily-read stream of tagged [`StageEvent`]s. The orchestrator decides
//! what to do with each event; executors never touch checkpoint state.
//!
//! The [`StageGraph`] bundles the executor wired to each stage and is rebuilt
//! from a [`GraphBuilder`] whenever the workflow is reset.

pub mod openai;
pub mod outline;

use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::config::{GlobalConfig, StageBackend};
use crate::models::checkpoint::Checkpoint;
use crate::models::session::SessionConfig;
use crate::{AppError, Result};

pub use openai::OpenAiStages;
pub use outline::OutlineStages;

/// Workflow stage an executor is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Draft the initial report plan for a topic.
    GeneratePlan,
    /// Rework the current plan using reviewer feedback.
    RevisePlan,
    /// Write the final report from the approved plan.
    Finalize,
}

impl Stage {
    /// Stable lowercase name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneratePlan => "generate_plan",
            Self::RevisePlan => "revise_plan",
            Self::Finalize => "finalize",
        }
    }
}

/// Payload that triggered the current stage run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTrigger {
    /// Initial run for the session topic.
    Topic,
    /// Resume carrying reviewer feedback.
    Feedback(String),
    /// Resume carrying the reviewer's approval.
    Approved,
}

/// Everything an executor may read for one stage run.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Stage to perform.
    pub stage: Stage,
    /// Session the run belongs to.
    pub session_id: String,
    /// Research topic.
    pub topic: String,
    /// Plan produced by the previous stage, if any.
    pub plan: Option<String>,
    /// What resumed the workflow.
    pub trigger: StageTrigger,
    /// All reviewer feedback so far, oldest first, including this trigger's.
    pub feedback_history: Vec<String>,
    /// Session configuration, passed through untouched.
    pub config: SessionConfig,
}

impl StageContext {
    /// Build a context from the session checkpoint.
    #[must_use]
    pub fn from_checkpoint(stage: Stage, trigger: StageTrigger, checkpoint: &Checkpoint) -> Self {
        Self {
            stage,
            session_id: checkpoint.session_id.clone(),
            topic: checkpoint.topic.clone(),
            plan: checkpoint.plan.clone(),
            trigger,
            feedback_history: checkpoint.feedback_history.clone(),
            config: checkpoint.config.clone(),
        }
    }
}

/// Request to pause the workflow for a reviewer decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptSignal {
    /// Human-readable prompt surfaced to the reviewer.
    pub prompt: String,
    /// Plan the reviewer is being asked about.
    pub plan: Option<String>,
}

/// Name of a result carried by [`StageEvent::Completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultKey {
    /// A complete report plan.
    Plan,
    /// One written report section, keyed by title.
    Section(String),
    /// The final report.
    FinalReport,
}

/// One event emitted by a stage executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// Intermediate progress text.
    Progress(String),
    /// Pause for reviewer input; no further events are read.
    Interrupt(InterruptSignal),
    /// A named result.
    Completion {
        /// Which result this is.
        key: ResultKey,
        /// Result body.
        payload: String,
    },
}

/// Stream of events produced by one stage run.
pub type StageStream = BoxStream<'static, Result<StageEvent>>;

/// Pluggable unit of work for one or more workflow stages.
pub trait StageExecutor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start a stage run. The returned stream must do no work until polled.
    fn run(&self, context: StageContext) -> StageStream;
}

/// Executors wired to each stage; rebuilt on reset.
#[derive(Clone)]
pub struct StageGraph {
    generate: Arc<dyn StageExecutor>,
    revise: Arc<dyn StageExecutor>,
    finalize: Arc<dyn StageExecutor>,
    generation: u64,
}

impl StageGraph {
    /// Wire a distinct executor to each stage.
    #[must_use]
    pub fn new(
        generate: Arc<dyn StageExecutor>,
        revise: Arc<dyn StageExecutor>,
        finalize: Arc<dyn StageExecutor>,
    ) -> Self {
        Self {
            generate,
            revise,
            finalize,
            generation: 0,
        }
    }

    /// Wire one executor to every stage.
    #[must_use]
    pub fn uniform(executor: Arc<dyn StageExecutor>) -> Self {
        Self::new(Arc::clone(&executor), Arc::clone(&executor), executor)
    }

    /// Executor responsible for `stage`.
    #[must_use]
    pub fn executor(&self, stage: Stage) -> &Arc<dyn StageExecutor> {
        match stage {
            Stage::GeneratePlan => &self.generate,
            Stage::RevisePlan => &self.revise,
            Stage::Finalize => &self.finalize,
        }
    }

    /// How many times the graph has been recompiled since startup.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// Factory producing a fresh [`StageGraph`].
pub type GraphBuilder = Arc<dyn Fn() -> Result<StageGraph> + Send + Sync>;

/// Build the graph factory for the configured backend.
///
/// # Errors
///
/// Returns `AppError::Config` if the `openai` backend is selected without an
/// API key.
pub fn builder_from_config(config: &GlobalConfig) -> Result<GraphBuilder> {
    match config.stages.backend {
        StageBackend::Outline => Ok(Arc::new(|| {
            Ok(StageGraph::uniform(Arc::new(OutlineStages::new())))
        })),
        StageBackend::Openai => {
            let api_key = config.stages.openai_api_key.clone().ok_or_else(|| {
                AppError::Config("openai stage backend requires OPENAI_API_KEY".into())
            })?;
            let stages = config.stages.clone();
            Ok(Arc::new(move || {
                let executor = OpenAiStages::new(&stages, api_key.clone())?;
                Ok(StageGraph::uniform(Arc::new(executor)))
            }))
        }
    }
}

/// Reviewer prompt wrapping a plan.
#[must_use]
pub fn review_prompt(plan: &str) -> String {
    format!(
        "Please provide feedback on the following report plan.\n\n{plan}\n\n\
         Does the report plan meet your needs?\n\
         Reply 'yes' to approve the plan, or describe what should change."
    )
}

/// Extract numbered section titles (`1. Title — note`) from a plan.
#[must_use]
pub fn plan_sections(plan: &str) -> Vec<String> {
    plan.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (number, rest) = line.split_once(". ")?;
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let title = rest.split(" — ").next().unwrap_or(rest).trim();
            (!title.is_empty()).then(|| title.to_owned())
        })
        .collect()
}
