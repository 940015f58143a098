// src/main.rs
mod api;
mod camera;
mod client;
mod color;
mod config;
mod engine;
mod events;
mod highlight;
mod model;
mod panel;
mod picking;
mod retrieval;
mod scene;
mod selection;
mod session;
mod types;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use client::ContainerClient;
use config::AppConfig;
use engine::SceneEngine;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("⚠️ Konnte .env nicht laden: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    tracing::info!("🚀 Scene service startet...");
    tracing::info!("🔗 Backend: {}", app_config.backend.base_url());

    let client = match ContainerClient::new(&app_config.backend) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("❌ Konnte HTTP-Client nicht erstellen: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let engine = Arc::new(SceneEngine::new(client, app_config.viewer));

    if let Err(err) = api::start_api_server(app_config.api, engine).await {
        tracing::error!("❌ API server terminated with an error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
