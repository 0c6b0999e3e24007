//! Stage executor backed by an OpenAI-compatible chat-completions API.
//!
//! The planner model drafts and revises plans; the writer model produces the
//! final report. Model ids come from the session config untouched.

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, info_span, Instrument};

use super::{
    review_prompt, InterruptSignal, ResultKey, Stage, StageContext, StageEvent, StageExecutor,
    StageStream,
};
use crate::config::StagesConfig;
use crate::{AppError, Result};

const PLANNER_SYSTEM_PROMPT: &str = "You plan research reports. Reply with a Markdown report \
plan: a '# Report plan: <topic>' heading followed by numbered sections in the form \
'1. Title — one-line description'. Do not write the report itself.";

const WRITER_SYSTEM_PROMPT: &str = "You write thorough, well-structured research reports in \
Markdown. Follow the approved plan section by section, use '##' headings for sections, and \
finish with a short conclusion.";

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat-completions client serving all three stages.
#[derive(Clone)]
pub struct OpenAiStages {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiStages {
    /// Build the executor from stage settings and an API key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be constructed.
    pub fn new(config: &StagesConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.openai_base_url.trim_end_matches('/')
            ),
            api_key,
        })
    }

    async fn complete(&self, model: &str, system: &str, user: String) -> Result<String> {
        let payload = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "model API returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::Upstream("model API returned no content".into()))
    }

    async fn plan(&self, context: &StageContext) -> Result<Vec<StageEvent>> {
        let mut request = format!(
            "Topic: {}\nSearch provider: {}\nMaximum search depth: {}\n",
            context.topic, context.config.search_api, context.config.max_search_depth
        );
        if let Some(ref plan) = context.plan {
            request.push_str(&format!("\nCurrent plan:\n{plan}\n"));
        }
        if !context.feedback_history.is_empty() {
            request.push_str("\nReviewer feedback, oldest first:\n");
            for note in &context.feedback_history {
                request.push_str(&format!("- {note}\n"));
            }
            request.push_str("\nRevise the plan so it addresses all of the feedback.\n");
        }

        let plan = self
            .complete(&context.config.planner_model, PLANNER_SYSTEM_PROMPT, request)
            .await?;
        Ok(vec![
            StageEvent::Completion {
                key: ResultKey::Plan,
                payload: plan.clone(),
            },
            StageEvent::Interrupt(InterruptSignal {
                prompt: review_prompt(&plan),
                plan: Some(plan),
            }),
        ])
    }

    async fn report(&self, context: &StageContext) -> Result<Vec<StageEvent>> {
        let plan = context
            .plan
            .as_deref()
            .ok_or_else(|| AppError::Stage("cannot finalize without an approved plan".into()))?;
        let request = format!(
            "Topic: {}\n\nApproved plan:\n{plan}\n\nWrite the full report.",
            context.topic
        );
        let report = self
            .complete(&context.config.writer_model, WRITER_SYSTEM_PROMPT, request)
            .await?;
        Ok(vec![StageEvent::Completion {
            key: ResultKey::FinalReport,
            payload: report,
        }])
    }

    async fn execute(self, context: StageContext) -> Vec<Result<StageEvent>> {
        let span = info_span!(
            "openai_stage",
            stage = context.stage.as_str(),
            session_id = %context.session_id,
        );
        let outcome = async {
            let events = match context.stage {
                Stage::GeneratePlan | Stage::RevisePlan => self.plan(&context).await,
                Stage::Finalize => self.report(&context).await,
            };
            info!(ok = events.is_ok(), "model call finished");
            events
        }
        .instrument(span)
        .await;

        match outcome {
            Ok(events) => events.into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        }
    }
}

impl StageExecutor for OpenAiStages {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn run(&self, context: StageContext) -> StageStream {
        let model = match context.stage {
            Stage::Finalize => context.config.writer_model.clone(),
            Stage::GeneratePlan | Stage::RevisePlan => context.config.planner_model.clone(),
        };
        let executor = self.clone();
        stream::iter([Ok(StageEvent::Progress(format!(
            "Requesting {} from {model}",
            context.stage.as_str()
        )))])
        .chain(stream::once(executor.execute(context)).flat_map(stream::iter))
        .boxed()
    }
}
