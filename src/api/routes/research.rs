//! Workflow endpoints: start, resume, reset, session status and discard.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::api::dto::{MessageResponse, ResumeRequest, StartRequest};
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::models::workflow::WorkflowResult;
use crate::orchestrator::SessionSnapshot;

/// `POST /api/start_research`
pub async fn start_research(
    State(state): State<Arc<AppState>>,
    request: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<WorkflowResult>, ApiError> {
    let Json(request) = request?;
    let result = state
        .workflow
        .start(&request.topic, request.session_id.as_deref())
        .await?;
    Ok(Json(result))
}

/// `POST /api/resume`
pub async fn resume(
    State(state): State<Arc<AppState>>,
    request: Result<Json<ResumeRequest>, JsonRejection>,
) -> Result<Json<WorkflowResult>, ApiError> {
    let Json(request) = request?;
    let result = state
        .workflow
        .resume(
            &request.topic,
            request.session_id.as_deref(),
            request.approved,
            request.feedback.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

/// `POST /api/reset`
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.workflow.reset().await?;
    Ok(Json(MessageResponse { message }))
}

/// `GET /api/sessions/{id}`
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.workflow.snapshot(&session_id).await?;
    Ok(Json(snapshot))
}

/// `DELETE /api/sessions/{id}`
pub async fn discard_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.workflow.discard(&session_id).await?;
    Ok(Json(MessageResponse { message }))
}
