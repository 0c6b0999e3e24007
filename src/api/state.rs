//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::orchestrator::Workflow;
use crate::render::PdfRenderer;
use crate::transcribe::Transcriber;

/// Collaborators the HTTP layer dispatches to.
pub struct AppState {
    /// Loaded configuration, including credentials.
    pub config: GlobalConfig,
    /// Research workflow orchestrator.
    pub workflow: Arc<Workflow>,
    /// Speech-to-text client.
    pub transcriber: Transcriber,
    /// HTML-to-PDF converter.
    pub renderer: Arc<dyn PdfRenderer>,
}
