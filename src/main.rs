//! # Mock Interview Backend - Main Application Entry Point
//!
//! Actix-web server hosting AI voice mock interviews.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **store**: SQLite persistence for interviews and their messages
//! - **transcription** / **generation**: Speech-to-text and interviewer adapters
//! - **session**: Live connection registry and wire events
//! - **coordinator**: One coordinator per interview driving the audio pipeline
//! - **websocket**: Real-time channel at `/ws/interviews/{id}`
//! - **handlers**: REST endpoints under `/api/v1`
//! - **health** / **middleware** / **state**: Operational endpoints and shared state
//! - **error**: HTTP error responses

mod config;
mod coordinator;
mod error;
mod generation;
mod handlers;
mod health;
mod middleware;
mod provider;
mod session;
mod state;
mod store;
mod transcription;
mod websocket;

use crate::config::AppConfig;
use crate::coordinator::{Adapters, CoordinatorDirectory, CoordinatorSettings};
use crate::generation::ChatCompletionsGenerator;
use crate::state::AppState;
use crate::store::{InterviewStore, StoreConfig};
use crate::transcription::HttpTranscriber;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let store_config = StoreConfig::from(&config.database);
    let store = tokio::task::spawn_blocking(move || InterviewStore::bootstrap(store_config))
        .await
        .context("Database bootstrap task failed")?
        .context("Failed to initialise the interview database")?;

    info!(path = ?store.database_path(), "Interview database ready");

    let adapters = build_adapters(&config)?;
    let directory = Arc::new(CoordinatorDirectory::new(
        store.clone(),
        adapters,
        CoordinatorSettings {
            max_audio_bytes: config.session.max_audio_bytes,
        },
    ));

    let app_state = AppState::new(config.clone(), store, Arc::clone(&directory));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let workers = config.server.workers;

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/titles", web::get().to(handlers::list_titles))
                    .route("/interviews", web::post().to(handlers::create_interview))
                    .route("/interviews", web::get().to(handlers::list_interviews))
                    .route("/interviews/{id}", web::get().to(handlers::get_interview))
                    .route(
                        "/interviews/{id}/status",
                        web::patch().to(handlers::update_status),
                    ),
            )
            .route(
                "/ws/interviews/{interview_id}",
                web::get().to(websocket::interview_websocket),
            )
            .route("/health", web::get().to(health::health_check))
    });
    if workers > 0 {
        server = server.workers(workers);
    }
    let server = server.bind(&bind_addr)?.run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            directory.shutdown();
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` overrides the default filter.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_interview_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Build the provider adapters. Missing API keys only produce a warning; the
/// pipeline reports them per submission.
fn build_adapters(config: &AppConfig) -> Result<Adapters> {
    let transcriber = HttpTranscriber::from_config(&config.transcription)?;
    if !transcriber.is_configured() {
        warn!(
            "{} is not set; audio transcription will fail until it is",
            config.transcription.api_key_env
        );
    }

    let generator = ChatCompletionsGenerator::from_config(&config.generation)?;
    if !generator.is_configured() {
        warn!(
            "{} is not set; interviewer responses will fail until it is",
            config.generation.api_key_env
        );
    }

    Ok(Adapters {
        transcriber: Arc::new(transcriber),
        generator: Arc::new(generator),
    })
}

/// Resolves on SIGTERM or SIGINT.
async fn wait_for_shutdown() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("Failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}
