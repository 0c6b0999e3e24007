//! Resumable research workflow.
//!
//! Each session moves `NOT_STARTED → PLAN_PENDING_REVIEW → FINALIZED`, with
//! any number of revise loops while pending review. A step loads the
//! session checkpoint, runs one stage, reads its events until the first
//! decisive one, and writes the updated checkpoint exactly once. A step
//! that fails or whose future is dropped leaves the stored checkpoint as it
//! was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};

use super::guard::InFlight;
use super::registry::SessionRegistry;
use crate::models::checkpoint::Checkpoint;
use crate::models::session::{SessionConfig, WorkflowStage};
use crate::models::workflow::{ResumeDecision, WorkflowResult};
use crate::persistence::CheckpointStore;
use crate::stages::{
    GraphBuilder, InterruptSignal, ResultKey, Stage, StageContext, StageEvent, StageExecutor,
    StageGraph, StageTrigger,
};
use crate::{AppError, Result};

/// Message returned when plan generation yields neither a prompt nor progress.
pub const NO_PLAN_MESSAGE: &str = "No report plan generated.";
/// Message returned when a revision yields no new prompt.
pub const NO_UPDATED_PLAN_MESSAGE: &str = "No updated report plan generated.";
/// Message returned when finalization yields no report.
pub const NO_REPORT_MESSAGE: &str = "No final report generated.";
/// Acknowledgement returned by [`Workflow::reset`].
pub const RESET_MESSAGE: &str = "Agent memory cleared.";

/// Read-only view of one session for operators.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: String,
    /// Research topic.
    pub topic: String,
    /// Current workflow position.
    pub stage: WorkflowStage,
    /// Whether the session waits for a reviewer decision.
    pub awaiting_decision: bool,
    /// Completed revise steps.
    pub revision: u32,
    /// Latest plan, if any.
    pub plan: Option<String>,
    /// Reviewer feedback received so far.
    pub feedback_history: Vec<String>,
    /// Checkpoint write counter.
    pub version: u64,
    /// Last checkpoint write.
    pub updated_at: DateTime<Utc>,
}

impl From<Checkpoint> for SessionSnapshot {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            awaiting_decision: !checkpoint.is_finalized(),
            session_id: checkpoint.session_id,
            topic: checkpoint.topic,
            stage: checkpoint.stage,
            revision: checkpoint.revision,
            plan: checkpoint.plan,
            feedback_history: checkpoint.feedback_history,
            version: checkpoint.version,
            updated_at: checkpoint.updated_at,
        }
    }
}

/// First event that ends a stage run from the orchestrator's point of view.
#[derive(Debug)]
enum Decisive {
    Interrupt(InterruptSignal),
    Report(String),
    Exhausted,
}

/// What was read from one stage run.
#[derive(Debug)]
struct StepOutcome {
    decisive: Decisive,
    progress: Vec<String>,
    plan: Option<String>,
}

/// The workflow orchestrator.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Workflow {
    store: Arc<dyn CheckpointStore>,
    registry: SessionRegistry,
    builder: GraphBuilder,
    graph: RwLock<StageGraph>,
    in_flight: InFlight,
}

impl Workflow {
    /// Compile the initial stage graph and create the orchestrator.
    ///
    /// # Errors
    ///
    /// Propagates any error from `builder`.
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        defaults: SessionConfig,
        builder: GraphBuilder,
    ) -> Result<Self> {
        let graph = builder()?;
        Ok(Self {
            store,
            registry: SessionRegistry::new(defaults),
            builder,
            graph: RwLock::new(graph),
            in_flight: InFlight::new(),
        })
    }

    /// Start a session for `topic` and run plan generation.
    ///
    /// Any existing checkpoint under the same session key is replaced.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if the topic is blank.
    /// - `AppError::SessionBusy` if a step is already running for the session.
    /// - `AppError::Stage` or `AppError::Upstream` if the executor fails.
    /// - `AppError::Db` if the checkpoint cannot be written.
    pub async fn start(&self, topic: &str, session_id: Option<&str>) -> Result<WorkflowResult> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::InvalidInput("topic must not be empty".into()));
        }
        let key = session_key(session_id, topic)?;

        let span = info_span!("start", session_id = %key);
        async {
            let _busy = self.in_flight.acquire(&key)?;
            let graph = self.graph.read().await;

            let (id, config) = self.registry.get_or_create(Some(&key)).await;
            let mut checkpoint = Checkpoint::new(id, topic.to_owned(), config);

            let context =
                StageContext::from_checkpoint(Stage::GeneratePlan, StageTrigger::Topic, &checkpoint);
            let outcome = drive(graph.executor(Stage::GeneratePlan), context, false).await?;

            let message = match outcome.decisive {
                Decisive::Interrupt(signal) => {
                    checkpoint.plan = signal.plan.or(outcome.plan);
                    checkpoint.prompt = Some(signal.prompt.clone());
                    signal.prompt
                }
                Decisive::Report(_) | Decisive::Exhausted => {
                    warn!("plan generation ended without a review prompt");
                    checkpoint.plan = outcome.plan;
                    if outcome.progress.is_empty() {
                        NO_PLAN_MESSAGE.to_owned()
                    } else {
                        outcome.progress.join("\n")
                    }
                }
            };

            checkpoint.touch();
            let session_id = checkpoint.session_id.clone();
            self.store.put(checkpoint).await?;
            info!("plan ready for review");
            Ok(WorkflowResult::awaiting(session_id, message))
        }
        .instrument(span)
        .await
    }

    /// Resume a paused session with reviewer input.
    ///
    /// `approved` and `feedback` are validated before any state is read.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if the input carries no decision or no
    ///   session can be addressed.
    /// - `AppError::NoActiveSession` if the session has no checkpoint.
    /// - `AppError::WorkflowAlreadyComplete` if the session is finalized.
    /// - `AppError::SessionBusy` if a step is already running for the session.
    /// - `AppError::Stage`, `AppError::Upstream`, or `AppError::Db` on failure
    ///   of the stage or the checkpoint write.
    pub async fn resume(
        &self,
        topic: &str,
        session_id: Option<&str>,
        approved: Option<bool>,
        feedback: Option<&str>,
    ) -> Result<WorkflowResult> {
        let decision = ResumeDecision::from_parts(approved, feedback)?;
        let key = session_key(session_id, topic)?;
        self.resume_with(&key, decision).await
    }

    /// Apply an already validated decision to session `key`.
    ///
    /// # Errors
    ///
    /// Same as [`resume`](Self::resume), minus input validation.
    pub async fn resume_with(&self, key: &str, decision: ResumeDecision) -> Result<WorkflowResult> {
        let span = info_span!("resume", session_id = %key, approve = decision.is_approval());
        async {
            let _busy = self.in_flight.acquire(key)?;
            let graph = self.graph.read().await;

            let Some(mut checkpoint) = self.store.get(key).await? else {
                return Err(AppError::NoActiveSession(format!(
                    "no workflow has been started for session {key}"
                )));
            };
            if checkpoint.is_finalized() {
                return Err(AppError::WorkflowAlreadyComplete(format!(
                    "session {key} already produced its final report"
                )));
            }

            let result = match decision {
                ResumeDecision::Approve => finalize(&graph, &mut checkpoint).await?,
                ResumeDecision::Revise(text) => revise(&graph, &mut checkpoint, text).await?,
            };

            checkpoint.touch();
            self.store.put(checkpoint).await?;
            info!(awaiting = result.awaiting_decision, "resume step complete");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Clear every session and recompile the stage graph.
    ///
    /// Waits for in-flight steps to finish. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store cannot be cleared, or any error
    /// from rebuilding the graph. The previous graph stays in place when
    /// the rebuild fails.
    pub async fn reset(&self) -> Result<String> {
        let span = info_span!("reset");
        async {
            let mut graph = self.graph.write().await;
            let cleared = self.store.count().await?;
            self.store.clear_all().await?;
            self.registry.clear().await;

            let generation = graph.generation() + 1;
            *graph = (self.builder)()?.with_generation(generation);
            info!(generation, cleared, "workflow state cleared and stage graph rebuilt");
            Ok(RESET_MESSAGE.to_owned())
        }
        .instrument(span)
        .await
    }

    /// Drop one session's checkpoint and registry entry.
    ///
    /// # Errors
    ///
    /// - `AppError::NoActiveSession` if the session has no checkpoint.
    /// - `AppError::SessionBusy` if a step is running for the session.
    /// - `AppError::Db` if the store cannot be updated.
    pub async fn discard(&self, session_id: &str) -> Result<String> {
        let span = info_span!("discard", session_id = %session_id);
        async {
            let _busy = self.in_flight.acquire(session_id)?;
            let _graph = self.graph.read().await;

            if self.store.get(session_id).await?.is_none() {
                return Err(AppError::NoActiveSession(format!(
                    "unknown session {session_id}"
                )));
            }
            self.store.delete(session_id).await?;
            self.registry.forget(session_id).await;
            info!("session discarded");
            Ok(format!("Session {session_id} discarded."))
        }
        .instrument(span)
        .await
    }

    /// Read-only view of a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoActiveSession` if the session has no checkpoint,
    /// or `AppError::Db` if the store cannot be read.
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.store
            .get(session_id)
            .await?
            .map(SessionSnapshot::from)
            .ok_or_else(|| AppError::NoActiveSession(format!("unknown session {session_id}")))
    }

    /// How many times the stage graph has been rebuilt.
    pub async fn graph_generation(&self) -> u64 {
        self.graph.read().await.generation()
    }

    /// Whether a step is currently running for `session_id`.
    #[must_use]
    pub fn is_busy(&self, session_id: &str) -> bool {
        self.in_flight.is_busy(session_id)
    }

    /// Number of sessions known to the registry.
    pub async fn session_count(&self) -> usize {
        self.registry.count().await
    }
}

/// Resolve the session key from an explicit id or, failing that, the topic.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if both are blank.
pub fn session_key(session_id: Option<&str>, topic: &str) -> Result<String> {
    if let Some(id) = session_id.map(str::trim).filter(|id| !id.is_empty()) {
        return Ok(id.to_owned());
    }
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AppError::InvalidInput(
            "either session_id or topic is required".into(),
        ));
    }
    Ok(format!("topic:{topic}"))
}

async fn revise(
    graph: &StageGraph,
    checkpoint: &mut Checkpoint,
    feedback: String,
) -> Result<WorkflowResult> {
    let mut next = checkpoint.clone();
    next.feedback_history.push(feedback.clone());

    let context =
        StageContext::from_checkpoint(Stage::RevisePlan, StageTrigger::Feedback(feedback), &next);
    let outcome = drive(graph.executor(Stage::RevisePlan), context, false).await?;

    next.revision += 1;
    let message = match outcome.decisive {
        Decisive::Interrupt(signal) => {
            next.plan = signal.plan.or(outcome.plan).or(next.plan);
            next.prompt = Some(signal.prompt.clone());
            signal.prompt
        }
        Decisive::Report(_) | Decisive::Exhausted => {
            warn!("revision ended without a review prompt");
            next.plan = outcome.plan.or(next.plan);
            NO_UPDATED_PLAN_MESSAGE.to_owned()
        }
    };

    debug_assert!(checkpoint.stage.can_transition_to(next.stage));
    *checkpoint = next;
    Ok(WorkflowResult::awaiting(&checkpoint.session_id, message))
}

async fn finalize(graph: &StageGraph, checkpoint: &mut Checkpoint) -> Result<WorkflowResult> {
    let context = StageContext::from_checkpoint(Stage::Finalize, StageTrigger::Approved, checkpoint);
    let outcome = drive(graph.executor(Stage::Finalize), context, true).await?;

    match outcome.decisive {
        Decisive::Interrupt(signal) => {
            info!("finalize stage asked for another review");
            if let Some(plan) = signal.plan.or(outcome.plan) {
                checkpoint.plan = Some(plan);
            }
            checkpoint.prompt = Some(signal.prompt.clone());
            Ok(WorkflowResult::awaiting(&checkpoint.session_id, signal.prompt))
        }
        Decisive::Report(report) => {
            checkpoint.stage = WorkflowStage::Finalized;
            Ok(WorkflowResult::finished(&checkpoint.session_id, report))
        }
        Decisive::Exhausted => {
            warn!("finalize stage ended without a report");
            checkpoint.stage = WorkflowStage::Finalized;
            Ok(WorkflowResult::finished(
                &checkpoint.session_id,
                NO_REPORT_MESSAGE,
            ))
        }
    }
}

/// Read a stage's events until the first decisive one.
///
/// Interrupts are always decisive; a `FinalReport` completion is decisive
/// only when `want_report` is set. Nothing after the decisive event is
/// polled.
async fn drive(
    executor: &Arc<dyn StageExecutor>,
    context: StageContext,
    want_report: bool,
) -> Result<StepOutcome> {
    let stage = context.stage;
    debug!(stage = stage.as_str(), executor = executor.name(), "running stage");

    let mut events = executor.run(context);
    let mut progress = Vec::new();
    let mut plan = None;

    while let Some(event) = events.try_next().await? {
        match event {
            StageEvent::Progress(text) => {
                debug!(stage = stage.as_str(), %text, "stage progress");
                progress.push(text);
            }
            StageEvent::Interrupt(signal) => {
                return Ok(StepOutcome {
                    decisive: Decisive::Interrupt(signal),
                    progress,
                    plan,
                });
            }
            StageEvent::Completion {
                key: ResultKey::FinalReport,
                payload,
            } if want_report => {
                return Ok(StepOutcome {
                    decisive: Decisive::Report(payload),
                    progress,
                    plan,
                });
            }
            StageEvent::Completion {
                key: ResultKey::Plan,
                payload,
            } => plan = Some(payload),
            StageEvent::Completion { key, .. } => {
                debug!(stage = stage.as_str(), ?key, "stage result");
            }
        }
    }

    Ok(StepOutcome {
        decisive: Decisive::Exhausted,
        progress,
        plan,
    })
}
