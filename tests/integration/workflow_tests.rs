//! Orchestrator state machine behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nexus_research::models::session::{SessionConfig, WorkflowStage};
use nexus_research::orchestrator::workflow::{
    session_key, NO_PLAN_MESSAGE, NO_REPORT_MESSAGE, NO_UPDATED_PLAN_MESSAGE, RESET_MESSAGE,
};
use nexus_research::orchestrator::Workflow;
use nexus_research::persistence::MemoryCheckpointStore;
use nexus_research::stages::{ResultKey, StageGraph, StageTrigger};
use nexus_research::AppError;

use super::test_helpers::{
    completion, interrupt, outline, outline_workflow, progress, workflow_with, ScriptedStages,
    Step,
};

const TOPIC: &str = "renewable energy trends";

#[tokio::test]
async fn blank_topic_is_rejected() {
    let workflow = outline_workflow();
    for topic in ["", "   ", "\n\t"] {
        let err = workflow.start(topic, None).await.expect_err("blank topic");
        assert!(matches!(err, AppError::InvalidInput(_)), "{topic:?}");
    }
    assert_eq!(workflow.session_count().await, 0);
}

#[tokio::test]
async fn start_awaits_decision_under_topic_key() {
    let workflow = outline_workflow();
    let result = workflow.start(TOPIC, None).await.expect("start");

    assert!(result.awaiting_decision);
    assert_eq!(result.session_id, "topic:renewable energy trends");
    assert!(result.message.contains(TOPIC));

    let snapshot = workflow.snapshot(&result.session_id).await.expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::PlanPendingReview);
    assert!(snapshot.plan.is_some());
    assert_eq!(snapshot.version, 1);
}

#[tokio::test]
async fn topic_is_trimmed_for_key() {
    let workflow = outline_workflow();
    let result = workflow.start("  tidal power  ", None).await.expect("start");
    assert_eq!(result.session_id, "topic:tidal power");
    workflow
        .resume("tidal power", None, Some(true), None)
        .await
        .expect("resume under trimmed topic");
}

#[tokio::test]
async fn resume_without_start_has_no_session() {
    let workflow = outline_workflow();
    let err = workflow
        .resume(TOPIC, None, None, Some("more detail"))
        .await
        .expect_err("never started");
    assert!(matches!(err, AppError::NoActiveSession(_)));
}

#[tokio::test]
async fn input_is_validated_before_state_lookup() {
    let workflow = outline_workflow();
    // No session exists, yet the input error wins.
    let err = workflow
        .resume(TOPIC, None, None, Some("  "))
        .await
        .expect_err("empty feedback");
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = workflow
        .resume(TOPIC, None, Some(false), None)
        .await
        .expect_err("rejection without feedback");
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn resume_needs_an_address() {
    let workflow = outline_workflow();
    let err = workflow
        .resume("", None, Some(true), None)
        .await
        .expect_err("no topic and no id");
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn revision_changes_the_prompt() {
    let workflow = outline_workflow();
    let first = workflow.start(TOPIC, None).await.expect("start");
    let revised = workflow
        .resume(TOPIC, None, Some(false), Some("add more detail"))
        .await
        .expect("revise");

    assert!(revised.awaiting_decision);
    assert_ne!(revised.message, first.message);

    let snapshot = workflow.snapshot(&first.session_id).await.expect("snapshot");
    assert_eq!(snapshot.revision, 1);
    assert_eq!(snapshot.feedback_history, vec!["add more detail"]);
    assert_eq!(snapshot.version, 2);
}

#[tokio::test]
async fn repeated_revisions_stay_pending() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    for note in ["cover costs", "add case studies", "shorter intro"] {
        let result = workflow
            .resume(TOPIC, None, None, Some(note))
            .await
            .expect("revise");
        assert!(result.awaiting_decision);
    }
    let snapshot = workflow
        .snapshot("topic:renewable energy trends")
        .await
        .expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::PlanPendingReview);
    assert_eq!(snapshot.revision, 3);
}

#[tokio::test]
async fn approval_finishes_and_later_resumes_are_rejected() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");

    let done = workflow
        .resume(TOPIC, None, Some(true), None)
        .await
        .expect("approve");
    assert!(!done.awaiting_decision);
    assert!(done.message.starts_with("# renewable energy trends"));

    for (approved, feedback) in [(Some(true), None), (None, Some("one more thing"))] {
        let err = workflow
            .resume(TOPIC, None, approved, feedback)
            .await
            .expect_err("already finalized");
        assert!(matches!(err, AppError::WorkflowAlreadyComplete(_)));
    }

    let snapshot = workflow
        .snapshot(&done.session_id)
        .await
        .expect("finalized sessions are retained");
    assert_eq!(snapshot.stage, WorkflowStage::Finalized);
    assert!(!snapshot.awaiting_decision);
}

#[tokio::test]
async fn legacy_yes_approves() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    let done = workflow
        .resume(TOPIC, None, None, Some(" YES "))
        .await
        .expect("legacy approval");
    assert!(!done.awaiting_decision);
}

#[tokio::test]
async fn explicit_approval_ignores_feedback_text() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    let done = workflow
        .resume(TOPIC, None, Some(true), Some("add a cost section"))
        .await
        .expect("approve");
    assert!(!done.awaiting_decision);
    let snapshot = workflow.snapshot(&done.session_id).await.expect("snapshot");
    assert!(snapshot.feedback_history.is_empty());
}

#[tokio::test]
async fn explicit_ids_isolate_sessions_with_same_topic() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, Some("alice")).await.expect("alice");
    workflow.start(TOPIC, Some("bob")).await.expect("bob");

    workflow
        .resume(TOPIC, Some("alice"), Some(true), None)
        .await
        .expect("alice approves");

    let bob = workflow
        .resume(TOPIC, Some("bob"), Some(false), Some("more data"))
        .await
        .expect("bob still in review");
    assert!(bob.awaiting_decision);
    assert_eq!(bob.session_id, "bob");
}

#[tokio::test]
async fn restart_replaces_checkpoint() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    workflow
        .resume(TOPIC, None, None, Some("cover costs"))
        .await
        .expect("revise");
    workflow.resume(TOPIC, None, Some(true), None).await.expect("approve");

    let again = workflow.start(TOPIC, None).await.expect("restart");
    assert!(again.awaiting_decision);
    let snapshot = workflow.snapshot(&again.session_id).await.expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::PlanPendingReview);
    assert!(snapshot.feedback_history.is_empty());
    assert_eq!(snapshot.revision, 0);
}

#[tokio::test]
async fn reset_clears_sessions_and_rebuilds_graph() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    workflow.start("tidal power", Some("t1")).await.expect("start t1");
    assert_eq!(workflow.graph_generation().await, 0);

    let ack = workflow.reset().await.expect("reset");
    assert_eq!(ack, RESET_MESSAGE);
    assert_eq!(workflow.graph_generation().await, 1);
    assert_eq!(workflow.session_count().await, 0);

    let err = workflow
        .resume(TOPIC, None, Some(true), None)
        .await
        .expect_err("cleared");
    assert!(matches!(err, AppError::NoActiveSession(_)));
    let err = workflow.snapshot("t1").await.expect_err("cleared");
    assert!(matches!(err, AppError::NoActiveSession(_)));
}

#[tokio::test]
async fn discard_drops_one_session_only() {
    let workflow = outline_workflow();
    workflow.start(TOPIC, None).await.expect("start");
    workflow.start("tidal power", Some("t1")).await.expect("start t1");
    assert_eq!(workflow.session_count().await, 2);

    let ack = workflow.discard("t1").await.expect("discard");
    assert_eq!(ack, "Session t1 discarded.");
    assert_eq!(workflow.session_count().await, 1);

    let err = workflow.snapshot("t1").await.expect_err("gone");
    assert!(matches!(err, AppError::NoActiveSession(_)));
    let err = workflow
        .resume("tidal power", Some("t1"), Some(true), None)
        .await
        .expect_err("gone");
    assert!(matches!(err, AppError::NoActiveSession(_)));

    workflow
        .resume(TOPIC, None, Some(true), None)
        .await
        .expect("other session untouched");
}

#[tokio::test]
async fn discard_unknown_session_is_not_found() {
    let workflow = outline_workflow();
    let err = workflow.discard("ghost").await.expect_err("unknown");
    assert!(matches!(err, AppError::NoActiveSession(_)));
}

#[tokio::test]
async fn discarded_session_can_start_again() {
    let workflow = outline_workflow();
    let first = workflow.start(TOPIC, None).await.expect("start");
    workflow.resume(TOPIC, None, Some(true), None).await.expect("finalize");
    workflow.discard(&first.session_id).await.expect("discard");

    let again = workflow.start(TOPIC, None).await.expect("restart");
    assert!(again.awaiting_decision);
    let snapshot = workflow.snapshot(&again.session_id).await.expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::PlanPendingReview);
}

#[tokio::test]
async fn reset_is_idempotent() {
    let workflow = outline_workflow();
    workflow.reset().await.expect("first reset");
    workflow.reset().await.expect("second reset");
    assert_eq!(workflow.graph_generation().await, 2);
    workflow.start(TOPIC, None).await.expect("usable after reset");
}

#[tokio::test]
async fn failed_rebuild_keeps_previous_graph() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let workflow = Workflow::new(
        Arc::new(MemoryCheckpointStore::default()),
        SessionConfig::default(),
        Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(StageGraph::uniform(outline()))
            } else {
                Err(AppError::Config("model endpoint unreachable".into()))
            }
        }),
    )
    .expect("initial build");

    let err = workflow.reset().await.expect_err("rebuild fails");
    assert!(matches!(err, AppError::Config(_)));
    assert_eq!(workflow.graph_generation().await, 0);
    workflow.start(TOPIC, None).await.expect("old graph still serves");
}

#[tokio::test]
async fn stream_is_not_drained_past_interrupt() {
    let scripted = ScriptedStages::new(vec![
        progress("searching"),
        interrupt("review this", Some("1. Intro")),
        progress("should never be read"),
        completion(ResultKey::FinalReport, "should never be read"),
    ]);
    let workflow = workflow_with(StageGraph::uniform(scripted.clone()));

    let result = workflow.start(TOPIC, None).await.expect("start");
    assert_eq!(result.message, "review this");
    assert_eq!(scripted.polled(), 2);
}

#[tokio::test]
async fn finalize_stops_at_report() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("1. Intro"))]);
    let finalize = ScriptedStages::new(vec![
        completion(ResultKey::Section("Intro".into()), "## Intro"),
        completion(ResultKey::FinalReport, "# Report"),
        completion(ResultKey::FinalReport, "# Second report"),
    ]);
    let workflow = workflow_with(StageGraph::new(generate.clone(), generate, finalize.clone()));

    workflow.start(TOPIC, None).await.expect("start");
    let done = workflow.resume(TOPIC, None, Some(true), None).await.expect("approve");
    assert_eq!(done.message, "# Report");
    assert_eq!(finalize.polled(), 2);
}

#[tokio::test]
async fn start_without_interrupt_returns_progress() {
    let scripted = ScriptedStages::new(vec![progress("searching"), progress("drafting")]);
    let workflow = workflow_with(StageGraph::uniform(scripted));

    let result = workflow.start(TOPIC, None).await.expect("start");
    assert!(result.awaiting_decision);
    assert_eq!(result.message, "searching\ndrafting");
}

#[tokio::test]
async fn start_with_empty_stream_uses_fallback() {
    let workflow = workflow_with(StageGraph::uniform(ScriptedStages::new(Vec::new())));
    let result = workflow.start(TOPIC, None).await.expect("start");
    assert!(result.awaiting_decision);
    assert_eq!(result.message, NO_PLAN_MESSAGE);
}

#[tokio::test]
async fn revision_without_interrupt_uses_fallback() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("1. Intro"))]);
    let revise = ScriptedStages::new(vec![progress("thinking")]);
    let workflow = workflow_with(StageGraph::new(generate.clone(), revise, generate));

    workflow.start(TOPIC, None).await.expect("start");
    let result = workflow
        .resume(TOPIC, None, None, Some("more"))
        .await
        .expect("revise");
    assert!(result.awaiting_decision);
    assert_eq!(result.message, NO_UPDATED_PLAN_MESSAGE);
}

#[tokio::test]
async fn finalize_without_report_uses_fallback_and_finishes() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("1. Intro"))]);
    let finalize = ScriptedStages::new(vec![progress("writing")]);
    let workflow = workflow_with(StageGraph::new(generate.clone(), generate, finalize));

    workflow.start(TOPIC, None).await.expect("start");
    let done = workflow.resume(TOPIC, None, Some(true), None).await.expect("approve");
    assert!(!done.awaiting_decision);
    assert_eq!(done.message, NO_REPORT_MESSAGE);

    let snapshot = workflow.snapshot(&done.session_id).await.expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::Finalized);
}

#[tokio::test]
async fn finalize_interrupt_keeps_session_in_review() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("1. Intro"))]);
    let finalize = ScriptedStages::new(vec![interrupt("sources are thin, continue?", None)]);
    let workflow = workflow_with(StageGraph::new(generate.clone(), generate, finalize));

    workflow.start(TOPIC, None).await.expect("start");
    let paused = workflow.resume(TOPIC, None, Some(true), None).await.expect("approve");
    assert!(paused.awaiting_decision);
    assert_eq!(paused.message, "sources are thin, continue?");

    let snapshot = workflow.snapshot(&paused.session_id).await.expect("snapshot");
    assert_eq!(snapshot.stage, WorkflowStage::PlanPendingReview);
    assert_eq!(snapshot.plan.as_deref(), Some("1. Intro"));
}

#[tokio::test]
async fn executors_receive_full_context() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("plan v0"))]);
    let revise = ScriptedStages::new(vec![interrupt("review again", Some("plan v1"))]);
    let finalize = ScriptedStages::new(vec![completion(ResultKey::FinalReport, "done")]);
    let workflow = workflow_with(StageGraph::new(
        generate.clone(),
        revise.clone(),
        finalize.clone(),
    ));

    workflow.start(TOPIC, None).await.expect("start");
    workflow.resume(TOPIC, None, None, Some("first")).await.expect("revise 1");
    workflow.resume(TOPIC, None, None, Some("second")).await.expect("revise 2");
    workflow.resume(TOPIC, None, Some(true), None).await.expect("approve");

    let started = &generate.contexts()[0];
    assert_eq!(started.trigger, StageTrigger::Topic);
    assert_eq!(started.topic, TOPIC);
    assert!(started.plan.is_none());
    assert_eq!(started.config, SessionConfig::default());

    let revisions = revise.contexts();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].plan.as_deref(), Some("plan v0"));
    assert_eq!(revisions[1].feedback_history, vec!["first", "second"]);
    assert_eq!(revisions[1].trigger, StageTrigger::Feedback("second".into()));

    let finalized = &finalize.contexts()[0];
    assert_eq!(finalized.trigger, StageTrigger::Approved);
    assert_eq!(finalized.plan.as_deref(), Some("plan v1"));
}

#[tokio::test]
async fn stage_error_leaves_checkpoint_untouched() {
    let generate = ScriptedStages::new(vec![interrupt("review", Some("1. Intro"))]);
    let revise = ScriptedStages::new(vec![
        progress("calling model"),
        Step::Fail("model timed out".into()),
    ]);
    let workflow = workflow_with(StageGraph::new(generate.clone(), revise, generate));

    let started = workflow.start(TOPIC, None).await.expect("start");
    let before = workflow.snapshot(&started.session_id).await.expect("snapshot");

    let err = workflow
        .resume(TOPIC, None, None, Some("more"))
        .await
        .expect_err("stage fails");
    assert!(matches!(err, AppError::Stage(_)));

    let after = workflow.snapshot(&started.session_id).await.expect("snapshot");
    assert_eq!(after, before);
    assert!(!workflow.is_busy(&started.session_id));
}

#[test]
fn session_key_prefers_explicit_id() {
    assert_eq!(session_key(Some(" abc "), TOPIC).expect("key"), "abc");
    assert_eq!(
        session_key(Some(""), TOPIC).expect("key"),
        "topic:renewable energy trends"
    );
    assert!(session_key(None, " ").is_err());
}
