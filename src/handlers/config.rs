use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Effective configuration with secrets reduced to "is a key set".
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port,
                "workers": config.server.workers
            },
            "database": {
                "path": config.database.path,
                "pool_size": config.database.pool_size,
                "busy_timeout_ms": config.database.busy_timeout_ms
            },
            "transcription": {
                "base_url": config.transcription.base_url,
                "model": config.transcription.model,
                "api_key_env": config.transcription.api_key_env,
                "api_key_set": config.transcription.api_key().is_some(),
                "audio_mime_type": config.transcription.audio_mime_type,
                "language": config.transcription.language,
                "request_timeout_secs": config.transcription.request_timeout_secs
            },
            "generation": {
                "base_url": config.generation.base_url,
                "model": config.generation.model,
                "api_key_env": config.generation.api_key_env,
                "api_key_set": config.generation.api_key().is_some(),
                "max_tokens": config.generation.max_tokens,
                "temperature": config.generation.temperature,
                "request_timeout_secs": config.generation.request_timeout_secs
            },
            "session": {
                "send_buffer_capacity": config.session.send_buffer_capacity,
                "max_audio_bytes": config.session.max_audio_bytes,
                "heartbeat_interval_secs": config.session.heartbeat_interval_secs,
                "client_timeout_secs": config.session.client_timeout_secs
            }
        }
    })))
}
