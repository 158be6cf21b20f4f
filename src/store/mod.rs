//! # Persistence Store
//!
//! Embedded SQLite storage for interviews and their ordered messages.
//!
//! ## Key Components:
//! - **models**: Typed `Interview` / `Message` records and their enums
//! - **sqlite**: Pooled SQLite handle with idempotent schema bootstrap
//!
//! ## Failure model:
//! Unknown ids are reported as explicit absence (`Ok(None)`) on reads and as
//! `StoreError::UnknownInterview` on writes. Rows that fail required-field
//! validation surface as `StoreError::DataIntegrity` and are never patched up.

pub mod models;
pub mod sqlite;

pub use models::{
    normalize_skills, Interview, InterviewStatus, InterviewTitle, InterviewWithMessages, Message,
    MessageRole,
};
pub use sqlite::{DatabasePath, InterviewStore, StoreConfig};

use thiserror::Error;

/// Everything that can go wrong inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("interview {0} not found")]
    UnknownInterview(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("interview {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: InterviewStatus,
        to: InterviewStatus,
    },

    #[error("message {0} already exists")]
    DuplicateMessage(String),

    #[error("stored {record} failed validation: {reason}")]
    DataIntegrity { record: String, reason: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn integrity(record: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::DataIntegrity {
            record: record.into(),
            reason: reason.into(),
        }
    }
}
