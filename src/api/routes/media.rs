//! Transcription and PDF endpoints. Neither touches workflow state.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use tracing::info;

use crate::api::dto::{PdfRequest, TranscriptResponse};
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::render::report_to_pdf;
use crate::AppError;

/// `POST /api/transcribe`
///
/// Expects multipart fields `file` (audio bytes) and `session_id`.
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut audio: Option<Bytes> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::InvalidInput(format!("malformed multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::InvalidInput(format!("unreadable audio: {err}")))?;
                audio = Some(bytes);
            }
            Some("session_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::InvalidInput(format!("unreadable session_id: {err}")))?;
                session_id = Some(text);
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| AppError::InvalidInput("missing `file` field".into()))?;
    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("missing `session_id` field".into()))?;

    info!(%session_id, bytes = audio.len(), "transcription requested");
    let transcript = state.transcriber.transcribe(audio).await?;
    Ok(Json(TranscriptResponse { transcript }))
}

/// `POST /api/generate_pdf`
pub async fn generate_pdf(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = request?;
    if request.final_report.trim().is_empty() {
        return Err(AppError::InvalidInput("final_report must not be empty".into()).into());
    }
    let pdf = report_to_pdf(state.renderer.as_ref(), &request.final_report).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "inline; filename=\"final_report.pdf\"",
            ),
        ],
        pdf,
    ))
}
