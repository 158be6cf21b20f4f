//! # Session Module
//!
//! Live connection bookkeeping for the real-time channel.
//!
//! ## Key Components:
//! - **registry**: Connection-to-interview pairings and scoped broadcast
//! - **events**: JSON payloads pushed to clients and keep-alive parsing

pub mod events;
pub mod registry;

pub use events::{is_keep_alive, ServerEvent};
pub use registry::{ConnectionHandle, SessionRegistry};
