//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use axum::http::HeaderValue;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::session::SessionConfig;
use crate::{AppError, Result};

/// Keychain service under which API keys are looked up.
const KEYRING_SERVICE: &str = "nexus-research";

/// Which stage executor implementation drives the workflow.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageBackend {
    /// Deterministic offline outline generator.
    #[default]
    Outline,
    /// OpenAI-compatible chat-completions API.
    Openai,
}

/// Stage executor selection and language-model endpoint settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct StagesConfig {
    /// Executor backend.
    pub backend: StageBackend,
    /// Base URL of the chat-completions API (without `/chat/completions`).
    pub openai_base_url: String,
    /// Request timeout for a single model call.
    pub request_timeout_seconds: u64,
    /// API key for the model provider (populated at runtime).
    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            backend: StageBackend::default(),
            openai_base_url: "https://api.openai.com/v1".into(),
            request_timeout_seconds: 300,
            openai_api_key: None,
        }
    }
}

/// Speech-to-text provider settings.
///
/// The API key is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct TranscriptionConfig {
    /// Full URL of the Deepgram `listen` endpoint.
    pub endpoint: String,
    /// Recognition model name.
    pub model: String,
    /// Whether to request punctuated output.
    pub punctuate: bool,
    /// Deepgram API key (populated at runtime).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepgram.com/v1/listen".into(),
            model: "nova".into(),
            punctuate: true,
            api_key: None,
        }
    }
}

/// PDF conversion settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct PdfConfig {
    /// HTML-to-PDF converter binary, invoked as `<converter> --quiet - -`.
    pub converter: String,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            converter: "wkhtmltopdf".into(),
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Interface the HTTP server binds to.
    pub http_host: String,
    /// HTTP port for the API server.
    pub http_port: u16,
    /// Origins permitted by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// `SQLite` file for durable checkpoints; in-memory store when absent.
    pub checkpoint_db: Option<PathBuf>,
    /// Defaults applied to every new session.
    pub workflow: SessionConfig,
    /// Stage executor settings.
    pub stages: StagesConfig,
    /// Speech-to-text settings.
    pub transcription: TranscriptionConfig,
    /// PDF rendering settings.
    pub pdf: PdfConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_host: "127.0.0.1".into(),
            http_port: 8000,
            allowed_origins: vec!["http://localhost:3000".into()],
            checkpoint_db: None,
            workflow: SessionConfig::default(),
            stages: StagesConfig::default(),
            transcription: TranscriptionConfig::default(),
            pdf: PdfConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load API keys from OS keychain with env-var fallback.
    ///
    /// A missing Deepgram key only disables transcription and is logged.
    /// A missing model key is fatal when the `openai` stage backend is
    /// selected, since no workflow could run.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the `openai` backend is selected and no
    /// key is available.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.transcription.api_key =
            load_credential("deepgram_api_key", "DEEPGRAM_API_KEY").await;
        if self.transcription.api_key.is_none() {
            warn!("DEEPGRAM_API_KEY is not set; /api/transcribe will fail when called");
        }

        if self.stages.backend == StageBackend::Openai {
            self.stages.openai_api_key =
                load_credential("openai_api_key", "OPENAI_API_KEY").await;
            if self.stages.openai_api_key.is_none() {
                return Err(AppError::Config(
                    "stages.backend is \"openai\" but OPENAI_API_KEY was not found in keychain or env"
                        .into(),
                ));
            }
        }

        info!(
            transcription = self.transcription.api_key.is_some(),
            backend = ?self.stages.backend,
            "credentials loaded"
        );
        Ok(())
    }

    /// Socket address string the HTTP server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    fn validate(&self) -> Result<()> {
        if self.http_host.trim().is_empty() {
            return Err(AppError::Config("http_host must not be empty".into()));
        }

        if self.allowed_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(AppError::Config(
                "allowed_origins must not contain empty entries".into(),
            ));
        }

        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(AppError::Config(format!(
                "allowed_origins entry {origin:?} is not a valid header value"
            )));
        }

        if self.workflow.max_search_depth == 0 {
            return Err(AppError::Config(
                "workflow.max_search_depth must be greater than zero".into(),
            ));
        }

        if self.stages.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "stages.request_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.pdf.converter.trim().is_empty() {
            return Err(AppError::Config("pdf.converter must not be empty".into()));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
///
/// Returns `None` when neither source has a non-empty value.
async fn load_credential(keyring_key: &str, env_key: &str) -> Option<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return Some(value),
        Ok(Ok(_)) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Ok(Err(err)) => {
            tracing::debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(key = keyring_key, %err, "keychain task panicked, trying env var");
        }
    }

    env::var(env_key).ok().filter(|value| !value.trim().is_empty())
}
