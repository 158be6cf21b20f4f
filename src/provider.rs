//! Shared plumbing for the two external AI providers (speech-to-text and
//! response generation): the error type both adapters report and the HTTP
//! helpers they build on.

use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a provider adapter. Always local to one pipeline run.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{provider} is not configured: {reason}")]
    NotConfigured {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unreadable response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned no text")]
    EmptyResult { provider: &'static str },

    #[error("request cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Whether resubmitting the same input could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Request { retryable, .. } => *retryable,
            AdapterError::Status { status, .. } => *status == 429 || *status >= 500,
            AdapterError::EmptyResult { .. } | AdapterError::Cancelled => true,
            AdapterError::NotConfigured { .. } | AdapterError::InvalidResponse { .. } => false,
        }
    }
}

pub(crate) fn build_client(provider: &'static str, timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AdapterError::NotConfigured {
            provider,
            reason: format!("failed to build HTTP client: {}", err),
        })
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn request_error(provider: &'static str, err: reqwest::Error) -> AdapterError {
    AdapterError::Request {
        provider,
        retryable: err.is_connect() || err.is_timeout(),
        message: err.to_string(),
    }
}

/// Turn a non-2xx response into an error, keeping the provider's message body.
pub(crate) async fn status_error(provider: &'static str, response: Response) -> AdapterError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| format!("failed to read {} error body", provider));
    AdapterError::Status {
        provider,
        status,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://localhost:9000", "audio/transcriptions"),
            "http://localhost:9000/audio/transcriptions"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let throttled = AdapterError::Status {
            provider: "test",
            status: 429,
            body: String::new(),
        };
        let rejected = AdapterError::Status {
            provider: "test",
            status: 400,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!AdapterError::NotConfigured {
            provider: "test",
            reason: "no key".to_string()
        }
        .is_retryable());
    }
}
