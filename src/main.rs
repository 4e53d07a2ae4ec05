use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info, warn};

mod api;
mod config;
mod db;
mod generation;
mod llm;
mod media;
mod state;
mod utils;

use config::CONFIG;
use db::Database;
use state::AppState;
use utils::logging::init_logging;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level, &CONFIG.log_dir);
    info!("Starting Brand Content Studio v{}", env!("CARGO_PKG_VERSION"));
    CONFIG.log_summary();

    let db = Database::init(&CONFIG.database_url).await?;
    let state = AppState::from_config(db, &CONFIG);
    state.uploads.ensure_dirs().await?;

    if state.generator.registry().available().is_empty() {
        warn!("No AI providers available; generation endpoints will answer 503");
    }

    let app = api::build_router(state, &CONFIG.allowed_origins);
    let listener = tokio::net::TcpListener::bind(CONFIG.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", CONFIG.bind_addr))?;
    info!("Listening on http://{}", CONFIG.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
