//! # Transcription Engine
//!
//! Speech-to-text boundary. The coordinator only sees the [`Transcriber`] trait:
//! raw audio bytes in, recognized text out, or an [`AdapterError`].
//!
//! ## Provider:
//! [`HttpTranscriber`] posts each audio submission as a multipart upload to an
//! OpenAI-compatible `/audio/transcriptions` endpoint. The upload is the raw
//! frame exactly as the browser recorded it; no decoding happens here.

use crate::config::TranscriptionConfig;
use crate::provider::{self, AdapterError};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

const PROVIDER: &str = "transcription provider";

/// Turns one audio submission into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, AdapterError>;
}

/// Transcriber backed by an OpenAI-compatible HTTP API.
pub struct HttpTranscriber {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    mime_type: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpTranscriber {
    /// Build from configuration. A missing API key is not an error here; every
    /// call reports `NotConfigured` instead so the service can still start.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            client: provider::build_client(
                PROVIDER,
                Duration::from_secs(config.request_timeout_secs),
            )?,
            endpoint: provider::endpoint(&config.base_url, "audio/transcriptions"),
            model: config.model.clone(),
            api_key: config.api_key(),
            mime_type: config.audio_mime_type.clone(),
            language: config.language.clone().filter(|lang| !lang.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_form(&self, audio: Vec<u8>) -> Result<Form, AdapterError> {
        let file_name = format!("audio.{}", file_extension(&self.mime_type));
        let part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str(&self.mime_type)
            .map_err(|err| AdapterError::NotConfigured {
                provider: PROVIDER,
                reason: format!("invalid audio MIME type '{}': {}", self.mime_type, err),
            })?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, AdapterError> {
        let api_key = self.api_key.as_deref().ok_or(AdapterError::NotConfigured {
            provider: PROVIDER,
            reason: "no API key in the environment".to_string(),
        })?;

        let start_time = Instant::now();
        let audio_bytes = audio.len();
        let form = self.build_form(audio)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| provider::request_error(PROVIDER, err))?;

        if !response.status().is_success() {
            return Err(provider::status_error(PROVIDER, response).await);
        }

        let parsed: TranscriptionResponse =
            response
                .json()
                .await
                .map_err(|err| AdapterError::InvalidResponse {
                    provider: PROVIDER,
                    message: err.to_string(),
                })?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(AdapterError::EmptyResult { provider: PROVIDER });
        }

        tracing::debug!(
            audio_bytes,
            chars = text.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Transcription completed"
        );
        Ok(text)
    }
}

/// File extension the provider uses to sniff the container format.
fn file_extension(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/webm" | "video/webm" => "webm",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/flac" => "flac",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_file_extension_follows_mime_type() {
        assert_eq!(file_extension("audio/webm;codecs=opus"), "webm");
        assert_eq!(file_extension("audio/wav"), "wav");
        assert_eq!(file_extension("application/octet-stream"), "bin");
    }

    #[tokio::test]
    async fn test_missing_key_reports_not_configured() {
        let mut config = AppConfig::default().transcription;
        config.api_key_env = "MOCK_INTERVIEW_TEST_NO_STT_KEY".to_string();
        let transcriber = HttpTranscriber::from_config(&config).unwrap();
        assert!(!transcriber.is_configured());

        let err = transcriber.transcribe(vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured { .. }));
    }
}
