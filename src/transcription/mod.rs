//! # Transcription Module
//!
//! Speech-to-text for candidate audio. The provider is opaque to the rest of the
//! service: anything implementing [`Transcriber`] can be plugged into the
//! coordinator.

pub mod engine;

pub use engine::{HttpTranscriber, Transcriber};
