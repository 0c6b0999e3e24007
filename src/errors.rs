//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing, validation, or credential failure.
    Config(String),
    /// Persistence failure when interacting with the checkpoint database.
    Db(String),
    /// Missing or empty required input; correctable by the caller.
    InvalidInput(String),
    /// Resume was requested for a session that has no checkpoint.
    NoActiveSession(String),
    /// Another start/resume call is already in flight for the session.
    SessionBusy(String),
    /// The session already produced its final report.
    WorkflowAlreadyComplete(String),
    /// A stage executor failed while producing events.
    Stage(String),
    /// A third-party service (transcription, language model) failed.
    Upstream(String),
    /// Markdown or PDF rendering failure.
    Render(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NoActiveSession(msg) => write!(f, "no active session: {msg}"),
            Self::SessionBusy(msg) => write!(f, "session busy: {msg}"),
            Self::WorkflowAlreadyComplete(msg) => write!(f, "workflow already complete: {msg}"),
            Self::Stage(msg) => write!(f, "stage: {msg}"),
            Self::Upstream(msg) => write!(f, "upstream: {msg}"),
            Self::Render(msg) => write!(f, "render: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Db(format!("checkpoint serialization: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
