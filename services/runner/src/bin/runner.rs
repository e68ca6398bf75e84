//! services/runner/src/bin/runner.rs

use runner_lib::{
    adapters::{FileRestStateStore, HttpSessionApi, SystemClock},
    config::Config,
    error::RunnerError,
    web::{build_router, state::AppState, tick_task},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_session_core::SessionEngine;

#[tokio::main]
async fn main() -> Result<(), RunnerError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting runner...");

    // --- 2. Initialize Service Adapters ---
    let api = Arc::new(HttpSessionApi::new(
        config.session_api_url.clone(),
        config.session_api_token.clone(),
        config.request_timeout,
    )?);
    let rest_store = Arc::new(FileRestStateStore::new(config.rest_state_path.clone()));
    info!(
        api = %config.session_api_url,
        rest_state = %config.rest_state_path.display(),
        "Adapters ready."
    );

    // --- 3. Build the Shared AppState ---
    let engine = SessionEngine::new(api, rest_store, Arc::new(SystemClock));
    let app_state = Arc::new(AppState::new(engine, config.clone()));

    if let Some(session_id) = config.resume_session_id {
        let mut engine = app_state.engine.lock().await;
        let resumed = engine.load_session(session_id).await;
        match resumed {
            Ok(()) => {
                app_state.publish(&engine);
                drop(engine);
                tick_task::ensure_running(&app_state).await;
            }
            Err(e) => warn!(%session_id, "Could not resume session at startup: {}", e),
        }
    }

    // --- 4. Create the Web Router ---
    let app = build_router(app_state.clone())?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let shutdown = app_state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down.");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
