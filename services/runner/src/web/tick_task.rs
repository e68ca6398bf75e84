//! services/runner/src/web/tick_task.rs
//!
//! The periodic driver of the rest countdown. One task runs while a session is
//! in progress; it stops itself once none is.

use crate::web::state::AppState;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use workout_session_core::{SessionStatus, TickOutcome};

/// Spawns the tick task unless one is already running.
pub async fn ensure_running(app_state: &Arc<AppState>) {
    let mut slot = app_state.tick_token.lock().await;
    if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
        return;
    }
    let token = app_state.shutdown.child_token();
    *slot = Some(token.clone());

    let app_state = app_state.clone();
    tokio::spawn(async move {
        tick_process(app_state, token).await;
    });
}

/// Stops the running tick task, if any.
pub async fn stop(app_state: &AppState) {
    if let Some(token) = app_state.tick_token.lock().await.take() {
        token.cancel();
    }
}

async fn tick_process(app_state: Arc<AppState>, token: CancellationToken) {
    let mut interval = tokio::time::interval(app_state.config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = app_state.config.tick_interval.as_millis() as u64, "Tick task started.");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let mut engine = app_state.engine.lock().await;
        let in_progress = engine
            .session()
            .is_some_and(|s| s.status == SessionStatus::InProgress);
        if !in_progress {
            token.cancel();
            break;
        }

        let outcome = engine.tick();
        if outcome == TickOutcome::Expired {
            debug!(screen = %engine.screen(), "Countdown expired on tick.");
        }
        // Elapsed time moves every tick, so the UI always gets a fresh snapshot.
        app_state.publish(&engine);
    }

    info!("Tick task stopped.");
}
