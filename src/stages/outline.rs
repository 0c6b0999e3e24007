//! Offline stage executor producing deterministic outlines and reports.
//!
//! Used when no language-model backend is configured, and by the test
//! suite. Reviewer feedback is folded into the plan as guidance lines and a
//! dedicated focus section, so revisions visibly change the plan.

use futures_util::stream::{self, StreamExt};

use super::{
    plan_sections, review_prompt, InterruptSignal, ResultKey, Stage, StageContext, StageEvent,
    StageExecutor, StageStream, StageTrigger,
};

/// Sections every outline starts from, as `(title, note)` pairs.
const BASE_SECTIONS: [(&str, &str); 5] = [
    ("Introduction", "scope of the topic and why it matters now"),
    ("Background", "how the field developed"),
    ("Current landscape", "key players, data, and recent developments"),
    ("Challenges and open questions", "risks, constraints, and unknowns"),
    ("Outlook", "where the field is heading"),
];

/// Deterministic executor serving all three stages.
#[derive(Debug, Default, Clone)]
pub struct OutlineStages;

impl OutlineStages {
    /// Create the executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn draft_plan(topic: &str, feedback: &[String]) -> String {
        let mut plan = format!("# Report plan: {topic}\n");
        if !feedback.is_empty() {
            plan.push_str(&format!("\nRevision {}\n", feedback.len()));
            for note in feedback {
                plan.push_str(&format!("Reviewer guidance: {note}\n"));
            }
        }
        plan.push('\n');

        let mut number = 1;
        for (title, note) in BASE_SECTIONS {
            plan.push_str(&format!("{number}. {title} — {note}\n"));
            number += 1;
        }
        for note in feedback {
            plan.push_str(&format!(
                "{number}. Focus: {note} — dedicated analysis requested by the reviewer\n"
            ));
            number += 1;
        }
        plan.push_str(&format!("{number}. Conclusion — summary of findings\n"));
        plan
    }

    fn write_section(topic: &str, title: &str, feedback: &[String]) -> String {
        let mut body = format!("## {title}\n\nThis section examines {topic} from the angle of {title}.");
        if let Some(focus) = title.strip_prefix("Focus: ") {
            body.push_str(&format!(" As requested by the reviewer, it concentrates on: {focus}."));
        } else if let Some(latest) = feedback.last() {
            body.push_str(&format!(" It follows the reviewer guidance to {latest}."));
        }
        body.push('\n');
        body
    }

    fn generate(context: &StageContext) -> Vec<StageEvent> {
        let plan = Self::draft_plan(&context.topic, &context.feedback_history);
        vec![
            StageEvent::Progress(format!(
                "Planning report structure for \"{}\"",
                context.topic
            )),
            StageEvent::Progress(format!(
                "Search provider {} with depth {}",
                context.config.search_api, context.config.max_search_depth
            )),
            StageEvent::Completion {
                key: ResultKey::Plan,
                payload: plan.clone(),
            },
            StageEvent::Interrupt(InterruptSignal {
                prompt: review_prompt(&plan),
                plan: Some(plan),
            }),
        ]
    }

    fn revise(context: &StageContext) -> Vec<StageEvent> {
        let instruction = match context.trigger {
            StageTrigger::Feedback(ref text) => text.clone(),
            _ => context.feedback_history.last().cloned().unwrap_or_default(),
        };
        let plan = Self::draft_plan(&context.topic, &context.feedback_history);
        vec![
            StageEvent::Progress(format!("Incorporating feedback: {instruction}")),
            StageEvent::Completion {
                key: ResultKey::Plan,
                payload: plan.clone(),
            },
            StageEvent::Interrupt(InterruptSignal {
                prompt: review_prompt(&plan),
                plan: Some(plan),
            }),
        ]
    }

    fn finalize(context: &StageContext) -> Vec<StageEvent> {
        let plan = context
            .plan
            .clone()
            .unwrap_or_else(|| Self::draft_plan(&context.topic, &context.feedback_history));

        let mut events = Vec::new();
        let mut report = format!("# {}\n\n", context.topic);
        for title in plan_sections(&plan) {
            let section = Self::write_section(&context.topic, &title, &context.feedback_history);
            events.push(StageEvent::Progress(format!("Writing section: {title}")));
            events.push(StageEvent::Completion {
                key: ResultKey::Section(title),
                payload: section.clone(),
            });
            report.push_str(&section);
            report.push('\n');
        }
        events.push(StageEvent::Progress("Compiling final report".into()));
        events.push(StageEvent::Completion {
            key: ResultKey::FinalReport,
            payload: report.trim_end().to_owned(),
        });
        events
    }
}

impl StageExecutor for OutlineStages {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn run(&self, context: StageContext) -> StageStream {
        // Deferred so nothing is computed until the orchestrator polls.
        stream::once(async move {
            match context.stage {
                Stage::GeneratePlan => Self::generate(&context),
                Stage::RevisePlan => Self::revise(&context),
                Stage::Finalize => Self::finalize(&context),
            }
        })
        .flat_map(|events| stream::iter(events.into_iter().map(Ok)))
        .boxed()
    }
}
