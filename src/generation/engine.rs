//! # Response Generation Engine
//!
//! Produces the interviewer's next utterance from the full conversation
//! context. The coordinator depends only on [`ResponseGenerator`].
//!
//! ## Provider:
//! [`ChatCompletionsGenerator`] calls an OpenAI-compatible `/chat/completions`
//! endpoint and returns the first choice's text.

use super::prompt::{Prompt, PromptMessage};
use crate::config::GenerationConfig;
use crate::provider::{self, AdapterError};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const PROVIDER: &str = "response provider";

/// Turns a prompt into the next interviewer utterance.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AdapterError>;
}

pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsGenerator {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            client: provider::build_client(
                PROVIDER,
                Duration::from_secs(config.request_timeout_secs),
            )?,
            endpoint: provider::endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            api_key: config.api_key(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ResponseGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AdapterError> {
        let api_key = self.api_key.as_deref().ok_or(AdapterError::NotConfigured {
            provider: PROVIDER,
            reason: "no API key in the environment".to_string(),
        })?;

        let start_time = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: &prompt.messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| provider::request_error(PROVIDER, err))?;

        if !response.status().is_success() {
            return Err(provider::status_error(PROVIDER, response).await);
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|err| AdapterError::InvalidResponse {
                    provider: PROVIDER,
                    message: err.to_string(),
                })?;

        let text = extract_text(parsed)?;
        tracing::debug!(
            turns = prompt.turns(),
            chars = text.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Response generated"
        );
        Ok(text)
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, AdapterError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::InvalidResponse {
            provider: PROVIDER,
            message: "response contained no choices".to_string(),
        })?
        .message
        .content
        .unwrap_or_default();

    let text = content.trim();
    if text.is_empty() {
        return Err(AdapterError::EmptyResult { provider: PROVIDER });
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::generation::build_prompt;
    use crate::store::InterviewTitle;

    fn parse(body: &str) -> ChatCompletionResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_extract_first_choice() {
        let response = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Tell me about joins. "}},
                           {"message":{"role":"assistant","content":"ignored"}}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "Tell me about joins.");
    }

    #[test]
    fn test_extract_rejects_missing_or_blank_content() {
        let no_choices = parse(r#"{"choices":[]}"#);
        assert!(matches!(
            extract_text(no_choices),
            Err(AdapterError::InvalidResponse { .. })
        ));

        let blank = parse(r#"{"choices":[{"message":{"content":"   "}}]}"#);
        assert!(matches!(extract_text(blank), Err(AdapterError::EmptyResult { .. })));

        let null_content = parse(r#"{"choices":[{"message":{"content":null}}]}"#);
        assert!(matches!(
            extract_text(null_content),
            Err(AdapterError::EmptyResult { .. })
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let prompt = build_prompt(InterviewTitle::QAEngineer, &["Testing".to_string()], &[]);
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &prompt.messages,
            max_tokens: 256,
            temperature: 0.5,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 256);
    }

    #[tokio::test]
    async fn test_missing_key_reports_not_configured() {
        let mut config = AppConfig::default().generation;
        config.api_key_env = "MOCK_INTERVIEW_TEST_NO_LLM_KEY".to_string();
        let generator = ChatCompletionsGenerator::from_config(&config).unwrap();
        assert!(!generator.is_configured());

        let prompt = build_prompt(InterviewTitle::QAEngineer, &["Testing".to_string()], &[]);
        let err = generator.generate(&prompt).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured { .. }));
    }
}
