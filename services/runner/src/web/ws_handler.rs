//! services/runner/src/web/ws_handler.rs
//!
//! The WebSocket the UI renders from. Every published snapshot is forwarded to
//! the socket; quick actions (set completion, rest controls) can be sent back
//! on the same connection.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    rest::error_parts,
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use workout_session_core::EngineResult;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("UI WebSocket connected.");
    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = app_state.subscribe();

    let initial = snapshots.borrow_and_update().clone();
    if send_message(&mut sender, &ServerMessage::Snapshot { snapshot: initial })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if send_message(&mut sender, &ServerMessage::Snapshot { snapshot }).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(reply) = handle_text_message(text.as_str(), &app_state).await {
                            if send_message(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
            _ = app_state.shutdown.cancelled() => break,
        }
    }

    info!("UI WebSocket disconnected.");
}

/// Runs one client action. The resulting snapshot reaches the socket through
/// the watch channel; only failures are answered directly.
async fn handle_text_message(text: &str, app_state: &AppState) -> Result<(), ServerMessage> {
    let message = serde_json::from_str::<ClientMessage>(text).map_err(|e| {
        warn!("Unreadable client message: {}", e);
        ServerMessage::Error {
            code: "BAD_MESSAGE".to_string(),
            message: e.to_string(),
        }
    })?;
    debug!(?message, "Client action received.");

    let mut engine = app_state.engine.lock().await;
    let result: EngineResult<()> = match message {
        ClientMessage::StartWorkout => engine.start_workout(),
        ClientMessage::SetPending {
            exercise_id,
            reps,
            weight,
        } => engine.set_pending_result(exercise_id, reps, weight),
        ClientMessage::CompleteSet { rpe } => {
            let _busy = app_state.begin_submit();
            engine.complete_set(rpe).await
        }
        ClientMessage::SkipRest => engine.skip_rest(),
        ClientMessage::AdjustRest { delta } => engine.adjust_rest_time(delta),
        ClientMessage::PauseTimer => {
            engine.pause_timer();
            Ok(())
        }
        ClientMessage::ResumeTimer => {
            engine.resume_timer();
            Ok(())
        }
    };
    app_state.publish(&engine);

    result.map_err(|e| {
        let (_, body) = error_parts(&e);
        warn!(code = %body.code, "Client action failed: {}", e);
        ServerMessage::Error {
            code: body.code,
            message: body.message,
        }
    })
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Err(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|e| {
        debug!("Failed to send to the UI: {}", e);
    })
}
