//! # Health and Metrics Endpoints
//!
//! - `GET /health`, `GET /api/v1/health`: liveness plus database reachability
//! - `GET /api/v1/metrics`: request counters per route and live session counts

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();

    let database = match state.store.blocking(|store| store.ping()).await {
        Ok(()) => json!({ "status": "reachable" }),
        Err(err) => {
            tracing::warn!("Health check could not reach the database: {}", err);
            json!({ "status": "unreachable", "error": err.to_string() })
        }
    };
    let database_ok = database["status"] == "reachable";

    let body = json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "database": database,
        "sessions": {
            "coordinators": state.directory.coordinator_count().await,
            "connections": state.directory.connection_count().await
        },
        "providers": {
            "transcription": {
                "model": config.transcription.model,
                "configured": config.transcription.api_key().is_some()
            },
            "generation": {
                "model": config.generation.model,
                "configured": config.generation.api_key().is_some()
            }
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate()
        }
    });

    if database_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "sessions": {
            "coordinators": state.directory.coordinator_count().await,
            "connections": state.directory.connection_count().await,
            "shutting_down": state.directory.is_shutting_down()
        },
        "endpoints": endpoint_stats
    }))
}
