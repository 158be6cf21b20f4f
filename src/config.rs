//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_DATABASE__PATH`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Provider API keys never live in the configuration itself. Each provider
//! section names the environment variable holding its key.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub transcription: TranscriptionConfig,
    pub generation: GenerationConfig,
    pub session: SessionConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP worker threads; 0 lets actix pick one per core
    pub workers: usize,
}

/// Embedded database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// File path of the SQLite database, or `:memory:`
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

/// Speech-to-text provider (OpenAI-compatible `/audio/transcriptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// MIME type attached to uploaded audio frames
    pub audio_mime_type: String,
    /// ISO 639-1 hint passed to the provider
    pub language: Option<String>,
    pub request_timeout_secs: u64,
}

/// Language model provider (OpenAI-compatible `/chat/completions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

/// Real-time session tuning.
///
/// ## Tuning guidelines:
/// - Larger send buffers tolerate slower readers before events are dropped
/// - `client_timeout_secs` must exceed `heartbeat_interval_secs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Outbound events buffered per connection before new ones are dropped
    pub send_buffer_capacity: usize,
    /// Largest accepted audio submission (bytes)
    pub max_audio_bytes: usize,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: 0,
            },
            database: DatabaseConfig {
                path: "data/interviews.sqlite3".to_string(),
                pool_size: 4,
                busy_timeout_ms: 250,
            },
            transcription: TranscriptionConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "whisper-1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                audio_mime_type: "audio/webm".to_string(),
                language: Some("en".to_string()),
                request_timeout_secs: 60,
            },
            generation: GenerationConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                max_tokens: 512,
                temperature: 0.7,
                request_timeout_secs: 60,
            },
            session: SessionConfig {
                send_buffer_capacity: 64,
                max_audio_bytes: 8 * 1024 * 1024,
                heartbeat_interval_secs: 15,
                client_timeout_secs: 45,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml`, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_DATABASE__PATH=/var/lib/interviews.sqlite3`: Move the database
    /// - `APP_GENERATION__MODEL=gpt-4o`: Pick another language model
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.database.path.trim().is_empty() {
            return Err(anyhow::anyhow!("Database path cannot be empty"));
        }

        if self.database.pool_size == 0 {
            return Err(anyhow::anyhow!("Database pool size must be greater than 0"));
        }

        if self.transcription.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Transcription model cannot be empty"));
        }

        if self.generation.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Generation model cannot be empty"));
        }

        if self.session.send_buffer_capacity == 0 {
            return Err(anyhow::anyhow!("Send buffer capacity must be greater than 0"));
        }

        if self.session.max_audio_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum audio size must be greater than 0"));
        }

        if self.session.heartbeat_interval_secs == 0
            || self.session.client_timeout_secs <= self.session.heartbeat_interval_secs
        {
            return Err(anyhow::anyhow!(
                "Client timeout ({}s) must be longer than the heartbeat interval ({}s)",
                self.session.client_timeout_secs,
                self.session.heartbeat_interval_secs
            ));
        }

        Ok(())
    }
}

impl TranscriptionConfig {
    pub fn api_key(&self) -> Option<String> {
        read_api_key(&self.api_key_env)
    }
}

impl GenerationConfig {
    pub fn api_key(&self) -> Option<String> {
        read_api_key(&self.api_key_env)
    }
}

fn read_api_key(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}
