//! Speech-to-text via the Deepgram `listen` API.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::TranscriptionConfig;
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

/// Single-attempt client for pre-recorded audio transcription.
#[derive(Debug, Clone)]
pub struct Transcriber {
    client: Client,
    config: TranscriptionConfig,
}

impl Transcriber {
    /// Create a transcriber for the configured endpoint.
    #[must_use]
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Whether an API key is available.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Transcribe raw audio bytes to text.
    ///
    /// Returns an empty string when the provider recognised no speech.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if `audio` is empty.
    /// - `AppError::Config` if no API key is configured.
    /// - `AppError::Upstream` if the provider call fails or returns non-200.
    pub async fn transcribe(&self, audio: Bytes) -> Result<String> {
        if audio.is_empty() {
            return Err(AppError::InvalidInput("audio payload is empty".into()));
        }
        let Some(ref api_key) = self.config.api_key else {
            return Err(AppError::Config(
                "Deepgram API key is missing on the server".into(),
            ));
        };

        let size = audio.len();
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Token {api_key}"))
            .header(CONTENT_TYPE, "application/octet-stream")
            .query(&[
                ("model", self.config.model.as_str()),
                ("punctuate", if self.config.punctuate { "true" } else { "false" }),
            ])
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "transcription request rejected");
            return Err(AppError::Upstream(format!("Deepgram API error: {body}")));
        }

        let parsed: ListenResponse = response.json().await?;
        let transcript = parsed
            .results
            .and_then(|results| results.channels.into_iter().next())
            .and_then(|channel| channel.alternatives.into_iter().next())
            .map(|alternative| alternative.transcript)
            .unwrap_or_default();

        info!(bytes = size, chars = transcript.len(), "audio transcribed");
        Ok(transcript)
    }
}
