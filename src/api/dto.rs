//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/start_research`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Research topic.
    #[serde(default)]
    pub topic: String,
    /// Explicit session id; derived from the topic when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /api/resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    /// Topic the session was started with.
    #[serde(default)]
    pub topic: String,
    /// Explicit reviewer decision.
    #[serde(default)]
    pub approved: Option<bool>,
    /// Revision instruction, or legacy `yes`/`true` approval text.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Explicit session id; derived from the topic when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /api/generate_pdf`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfRequest {
    /// Markdown report to render.
    #[serde(default)]
    pub final_report: String,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    /// Human-readable text.
    pub message: String,
}

/// Result of `POST /api/transcribe`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptResponse {
    /// Recognised text; empty when no speech was found.
    pub transcript: String,
}
