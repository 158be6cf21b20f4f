//! # Generation Module
//!
//! The interviewer side of the conversation.
//!
//! ## Key Components:
//! - **prompt**: Pure, deterministic prompt construction from interview context
//! - **engine**: The [`ResponseGenerator`] boundary and its HTTP implementation

pub mod engine;
pub mod prompt;

pub use engine::{ChatCompletionsGenerator, ResponseGenerator};
pub use prompt::{build_prompt, prompt_for, Prompt, PromptMessage};
