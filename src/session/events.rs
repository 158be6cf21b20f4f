//! Wire payloads exchanged over the real-time channel.
//!
//! ## Server → client:
//! - `{"type":"interview_details","data":{...}}` once after attach
//! - `{"type":"message","status":"processing","role","messageId","interviewId"}`
//!   when a pipeline stage starts
//! - `{"messageId","interviewId","role","content","timestamp","type":"message"}`
//!   when a stage's message is persisted
//! - `{"type":"error","message"}` for failures
//! - `{"type":"pong"}` acknowledging a keep-alive
//!
//! ## Client → server:
//! Binary frames carry audio. Text frames are keep-alives (`ping` or
//! `{"type":"ping"}`); anything else is rejected.

use crate::store::{InterviewWithMessages, Message, MessageRole};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event pushed from the server to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    InterviewDetails { data: InterviewWithMessages },
    Message(MessageEvent),
    Error { message: String },
    Pong,
}

/// The two shapes a `message` event takes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageEvent {
    Processing(ProcessingMessage),
    Completed(CompletedMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Processing,
}

/// Placeholder for a message whose content is still being produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMessage {
    pub status: MessageStatus,
    pub role: MessageRole,
    pub message_id: String,
    pub interview_id: String,
}

/// A persisted message. Carries the same id as its placeholder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedMessage {
    pub message_id: String,
    pub interview_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ServerEvent {
    pub fn details(data: InterviewWithMessages) -> Self {
        ServerEvent::InterviewDetails { data }
    }

    pub fn processing(interview_id: &str, message_id: &str, role: MessageRole) -> Self {
        ServerEvent::Message(MessageEvent::Processing(ProcessingMessage {
            status: MessageStatus::Processing,
            role,
            message_id: message_id.to_string(),
            interview_id: interview_id.to_string(),
        }))
    }

    pub fn completed(message: &Message) -> Self {
        ServerEvent::Message(MessageEvent::Completed(CompletedMessage {
            message_id: message.id.clone(),
            interview_id: message.interview_id.clone(),
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
        }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::InterviewDetails { .. } => "interview_details",
            ServerEvent::Message(MessageEvent::Processing(_)) => "message_processing",
            ServerEvent::Message(MessageEvent::Completed(_)) => "message_completed",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Pong => "pong",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Ping,
}

/// Whether a text frame is a keep-alive.
pub fn is_keep_alive(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("ping")
        || matches!(serde_json::from_str::<ClientFrame>(text), Ok(ClientFrame::Ping))
}
