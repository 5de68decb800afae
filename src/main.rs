//! # RunWhisper
//!
//! An OpenAI compatible transcription server that keeps a single Whisper
//! model loaded on demand. The model is fetched and initialized on the
//! first request, shared by concurrent callers, and evicted again after a
//! configurable idle period.

mod backend;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod manager;
mod state;
mod whisper;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::config::AppConfig;
use crate::manager::ModelManager;
use crate::state::AppState;
use crate::whisper::WhisperBackend;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runwhisper=debug,actix_web=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    let device = device::device_from_config(&config.model.device);
    info!(
        model = %config.model.name,
        device = device::describe_device(&device),
        idle_unload_seconds = config.model.idle_unload_seconds,
        "starting RunWhisper"
    );

    let backend = Arc::new(WhisperBackend::new(device));
    let manager = ModelManager::new(
        config.model.name.clone(),
        config.model.idle_unload_seconds,
        config.model.serialize_inference,
        backend,
    );

    let bind_addr = (config.server.host.clone(), config.server.port);
    let state = AppState::new(config, manager.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(state.clone()))
            .route("/", web::get().to(handlers::landing::index))
            .route("/healthz", web::get().to(health::healthz))
            .route("/v1/models", web::get().to(handlers::models::list_models))
            .route(
                "/v1/audio/transcriptions",
                web::post().to(handlers::transcriptions::create_transcription),
            )
    })
    .bind(&bind_addr)?
    .run();

    info!(host = %bind_addr.0, port = bind_addr.1, "server listening");
    server.await?;

    // actix has already drained in-flight requests at this point; release
    // the model before the process exits.
    info!("server stopped, releasing model");
    manager.unload().await;

    Ok(())
}
