//! services/runner/src/web/rest.rs
//!
//! Contains the Axum handlers that expose engine actions to the local UI, and
//! the master definition for the OpenAPI specification.
//!
//! Every mutating handler locks the engine, runs one action, publishes the new
//! snapshot and returns it.

use crate::web::protocol::{
    ExerciseView, LastPerformanceView, PendingView, ProgressView, RestView, SessionSnapshot,
    SetView,
};
use crate::web::state::AppState;
use crate::web::tick_task;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use workout_session_core::{EngineError, EngineResult, PortError, SessionEngine, SetEdit};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_state_handler,
        start_session_handler,
        load_session_handler,
        begin_workout_handler,
        complete_set_handler,
        set_pending_handler,
        skip_rest_handler,
        adjust_rest_handler,
        pause_rest_handler,
        resume_rest_handler,
        skip_exercise_handler,
        substitute_exercise_handler,
        postpone_exercise_handler,
        reorder_exercises_handler,
        update_sets_handler,
        delete_set_handler,
        complete_session_handler,
        abandon_session_handler,
        discard_session_handler,
        last_performance_handler,
    ),
    components(
        schemas(
            SessionSnapshot, ExerciseView, SetView, PendingView, RestView, ProgressView,
            LastPerformanceView, ErrorResponse, ErrorBody, FieldErrorView,
            StartSessionRequest, LoadSessionRequest, CompleteSetRequest, SetPendingRequest,
            AdjustRestRequest, TargetRequest, SubstituteRequest, ReorderRequest,
            SetEditRequest, UpdateSetsRequest, CompleteSessionRequest, FinishedSessionResponse,
        )
    ),
    tags(
        (name = "Workout Session Runner", description = "Local endpoints driving one training session.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub workout_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
    pub session_id: Uuid,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CompleteSetRequest {
    #[serde(default)]
    pub rpe: Option<f32>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPendingRequest {
    pub exercise_id: Uuid,
    pub reps: u32,
    pub weight: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustRestRequest {
    /// Seconds to add; negative values shorten the countdown.
    pub delta: i64,
}

/// Selects the upcoming exercise (default) or, from the overview, the first one.
#[derive(Deserialize, ToSchema, Default)]
pub struct TargetRequest {
    #[serde(default)]
    pub first: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubstituteRequest {
    pub new_exercise_id: Uuid,
    #[serde(default)]
    pub first: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub exercise_ids: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetEditRequest {
    pub set_id: Uuid,
    #[serde(default)]
    pub actual_reps: Option<u32>,
    #[serde(default)]
    pub actual_weight: Option<f64>,
    #[serde(default)]
    pub rpe: Option<f32>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSetsRequest {
    pub edits: Vec<SetEditRequest>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CompleteSessionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// The final record of a completed or abandoned session.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishedSessionResponse {
    pub session_id: Uuid,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub completed_sets: usize,
}

//=========================================================================================
// Error Responses
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Present on `SESSION_ALREADY_ACTIVE`: the session to load instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorView>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct FieldErrorView {
    pub field: String,
    pub message: String,
}

pub type HandlerError = (StatusCode, Json<ErrorResponse>);
pub type HandlerResult<T = SessionSnapshot> = Result<Json<T>, HandlerError>;

/// Maps an engine failure onto a status code and the error body the UI shows.
pub fn error_parts(err: &EngineError) -> (StatusCode, ErrorBody) {
    let mut body = ErrorBody {
        code: String::new(),
        message: err.to_string(),
        active_session_id: None,
        fields: Vec::new(),
    };
    let status = match err {
        EngineError::NoSession => {
            body.code = "NO_SESSION".to_string();
            StatusCode::CONFLICT
        }
        EngineError::InvalidState { .. } => {
            body.code = "INVALID_STATE".to_string();
            StatusCode::CONFLICT
        }
        EngineError::InvalidReorder(_) => {
            body.code = "VALIDATION_ERROR".to_string();
            StatusCode::BAD_REQUEST
        }
        EngineError::UnknownExercise(_) | EngineError::UnknownSet(_) => {
            body.code = "NOT_FOUND".to_string();
            StatusCode::NOT_FOUND
        }
        EngineError::Batch { .. } => {
            body.code = "PARTIAL_FAILURE".to_string();
            StatusCode::BAD_GATEWAY
        }
        EngineError::Port(port) => {
            body.code = port.code().to_string();
            match port {
                PortError::Validation { fields, .. } => {
                    body.fields = fields
                        .iter()
                        .map(|f| FieldErrorView {
                            field: f.field.clone(),
                            message: f.message.clone(),
                        })
                        .collect();
                    StatusCode::BAD_REQUEST
                }
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::Conflict(_) | PortError::SessionNotActive(_) => StatusCode::CONFLICT,
                PortError::SessionAlreadyActive { active_session_id } => {
                    body.active_session_id = Some(*active_session_id);
                    StatusCode::CONFLICT
                }
                PortError::Unauthorized => StatusCode::UNAUTHORIZED,
                PortError::Unexpected(_) => StatusCode::BAD_GATEWAY,
            }
        }
    };
    (status, body)
}

fn error_response(err: &EngineError) -> HandlerError {
    let (status, body) = error_parts(err);
    warn!(code = %body.code, status = status.as_u16(), "Action failed: {}", err);
    (status, Json(ErrorResponse { error: body }))
}

/// Publishes the engine state and turns the action result into a response.
fn respond<T>(app_state: &AppState, engine: &SessionEngine, result: EngineResult<T>) -> HandlerResult {
    let snapshot = app_state.publish(engine);
    match result {
        Ok(_) => Ok(Json(snapshot)),
        Err(e) => Err(error_response(&e)),
    }
}

//=========================================================================================
// Session Lifecycle Handlers
//=========================================================================================

/// The current engine snapshot.
#[utoipa::path(
    get,
    path = "/state",
    responses((status = 200, description = "Current snapshot", body = SessionSnapshot))
)]
pub async fn get_state_handler(State(app_state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(app_state.latest())
}

/// Start a new session of a workout.
#[utoipa::path(
    post,
    path = "/session/start",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionSnapshot),
        (status = 409, description = "Another session is active; see activeSessionId", body = ErrorResponse)
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<StartSessionRequest>,
) -> HandlerResult {
    let response = {
        let mut engine = app_state.engine.lock().await;
        let result = {
            let _busy = app_state.begin_submit();
            engine.start_session(body.workout_id).await
        };
        respond(&app_state, &engine, result)
    };
    if response.is_ok() {
        tick_task::ensure_running(&app_state).await;
    }
    response
}

/// Load (resume) an existing session.
#[utoipa::path(
    post,
    path = "/session/load",
    request_body = LoadSessionRequest,
    responses(
        (status = 200, description = "Session loaded", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn load_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<LoadSessionRequest>,
) -> HandlerResult {
    let response = {
        let mut engine = app_state.engine.lock().await;
        let result = {
            let _busy = app_state.begin_submit();
            engine.load_session(body.session_id).await
        };
        respond(&app_state, &engine, result)
    };
    if response.is_ok() {
        tick_task::ensure_running(&app_state).await;
    }
    response
}

/// Leave the overview for the first exercise.
#[utoipa::path(
    post,
    path = "/session/begin",
    responses(
        (status = 200, description = "Workout started", body = SessionSnapshot),
        (status = 409, description = "Not on the overview", body = ErrorResponse)
    )
)]
pub async fn begin_workout_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = engine.start_workout();
    respond(&app_state, &engine, result)
}

/// Mark the session completed.
#[utoipa::path(
    post,
    path = "/session/complete",
    request_body = CompleteSessionRequest,
    responses(
        (status = 200, description = "Session completed", body = FinishedSessionResponse),
        (status = 409, description = "No session loaded", body = ErrorResponse)
    )
)]
pub async fn complete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CompleteSessionRequest>,
) -> HandlerResult<FinishedSessionResponse> {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.complete_session(body.notes).await
    };
    finish_response(&app_state, &engine, result).await
}

/// Mark the session abandoned.
#[utoipa::path(
    post,
    path = "/session/abandon",
    responses(
        (status = 200, description = "Session abandoned", body = FinishedSessionResponse),
        (status = 409, description = "No session loaded", body = ErrorResponse)
    )
)]
pub async fn abandon_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> HandlerResult<FinishedSessionResponse> {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.abandon_session().await
    };
    finish_response(&app_state, &engine, result).await
}

async fn finish_response(
    app_state: &AppState,
    engine: &SessionEngine,
    result: EngineResult<workout_session_core::Session>,
) -> HandlerResult<FinishedSessionResponse> {
    app_state.publish(engine);
    let session = result.map_err(|e| error_response(&e))?;
    tick_task::stop(app_state).await;
    info!(session_id = %session.id, status = session.status.as_str(), "Session finished.");
    Ok(Json(FinishedSessionResponse {
        session_id: session.id,
        status: session.status.as_str().to_string(),
        completed_at: session.completed_at,
        notes: session.notes.clone(),
        completed_sets: session.exercises.iter().map(|e| e.completed_sets()).sum(),
    }))
}

/// Delete the session record entirely.
#[utoipa::path(
    delete,
    path = "/session",
    responses(
        (status = 200, description = "Session discarded", body = SessionSnapshot),
        (status = 409, description = "No session loaded", body = ErrorResponse)
    )
)]
pub async fn discard_session_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.discard_session().await
    };
    if result.is_ok() {
        tick_task::stop(&app_state).await;
    }
    respond(&app_state, &engine, result)
}

//=========================================================================================
// Set and Rest Handlers
//=========================================================================================

/// Submit the current set and advance.
#[utoipa::path(
    post,
    path = "/sets/complete",
    request_body = CompleteSetRequest,
    responses(
        (status = 200, description = "Set recorded", body = SessionSnapshot),
        (status = 409, description = "No set is awaiting completion", body = ErrorResponse)
    )
)]
pub async fn complete_set_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CompleteSetRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.complete_set(body.rpe).await
    };
    respond(&app_state, &engine, result)
}

/// Edit the upcoming set's values of one exercise.
#[utoipa::path(
    put,
    path = "/pending",
    request_body = SetPendingRequest,
    responses(
        (status = 200, description = "Pending values stored", body = SessionSnapshot),
        (status = 404, description = "Exercise is not active in this session", body = ErrorResponse)
    )
)]
pub async fn set_pending_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SetPendingRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = engine.set_pending_result(body.exercise_id, body.reps, body.weight);
    respond(&app_state, &engine, result)
}

/// Edit already recorded sets (the final-results screen).
#[utoipa::path(
    put,
    path = "/sets",
    request_body = UpdateSetsRequest,
    responses(
        (status = 200, description = "All edits applied", body = SessionSnapshot),
        (status = 502, description = "Some edits failed", body = ErrorResponse)
    )
)]
pub async fn update_sets_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<UpdateSetsRequest>,
) -> HandlerResult {
    let edits = body
        .edits
        .into_iter()
        .map(|e| SetEdit {
            set_id: e.set_id,
            actual_reps: e.actual_reps,
            actual_weight: e.actual_weight,
            rpe: e.rpe,
        })
        .collect();
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.update_completed_sets(edits).await
    };
    respond(&app_state, &engine, result)
}

/// Remove one set from the session, then resync.
#[utoipa::path(
    delete,
    path = "/sets/{id}",
    responses(
        (status = 200, description = "Set deleted", body = SessionSnapshot),
        (status = 404, description = "No such set in the session", body = ErrorResponse),
        (status = 409, description = "Session not in progress", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "The session set id.")
    )
)]
pub async fn delete_set_handler(
    State(app_state): State<Arc<AppState>>,
    Path(set_id): Path<Uuid>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.delete_set(set_id).await
    };
    respond(&app_state, &engine, result)
}

/// End the current countdown now.
#[utoipa::path(
    post,
    path = "/rest/skip",
    responses(
        (status = 200, description = "Rest skipped", body = SessionSnapshot),
        (status = 409, description = "Not resting", body = ErrorResponse)
    )
)]
pub async fn skip_rest_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = engine.skip_rest();
    respond(&app_state, &engine, result)
}

/// Lengthen or shorten the current countdown.
#[utoipa::path(
    post,
    path = "/rest/adjust",
    request_body = AdjustRestRequest,
    responses(
        (status = 200, description = "Countdown adjusted", body = SessionSnapshot),
        (status = 409, description = "No countdown running", body = ErrorResponse)
    )
)]
pub async fn adjust_rest_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<AdjustRestRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = engine.adjust_rest_time(body.delta);
    respond(&app_state, &engine, result)
}

/// Freeze the countdown. A no-op when nothing is running.
#[utoipa::path(
    post,
    path = "/rest/pause",
    responses((status = 200, description = "Countdown paused", body = SessionSnapshot))
)]
pub async fn pause_rest_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    engine.pause_timer();
    Ok(Json(app_state.publish(&engine)))
}

/// Continue a frozen countdown. A no-op when nothing is paused.
#[utoipa::path(
    post,
    path = "/rest/resume",
    responses((status = 200, description = "Countdown resumed", body = SessionSnapshot))
)]
pub async fn resume_rest_handler(State(app_state): State<Arc<AppState>>) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    engine.resume_timer();
    Ok(Json(app_state.publish(&engine)))
}

//=========================================================================================
// Exercise Management Handlers
//=========================================================================================

/// Skip the upcoming exercise (its whole superset).
#[utoipa::path(
    post,
    path = "/exercises/skip",
    request_body = TargetRequest,
    responses(
        (status = 200, description = "Exercise skipped", body = SessionSnapshot),
        (status = 502, description = "Some skips failed", body = ErrorResponse)
    )
)]
pub async fn skip_exercise_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<TargetRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        if body.first {
            engine.skip_first_exercise().await
        } else {
            engine.skip_exercise().await
        }
    };
    respond(&app_state, &engine, result)
}

/// Replace the upcoming exercise with another canonical exercise.
#[utoipa::path(
    post,
    path = "/exercises/substitute",
    request_body = SubstituteRequest,
    responses(
        (status = 200, description = "Exercise substituted", body = SessionSnapshot),
        (status = 409, description = "Nothing upcoming to substitute", body = ErrorResponse)
    )
)]
pub async fn substitute_exercise_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SubstituteRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        if body.first {
            engine.substitute_first_exercise(body.new_exercise_id).await
        } else {
            engine.substitute_exercise(body.new_exercise_id).await
        }
    };
    respond(&app_state, &engine, result)
}

/// Move the upcoming exercise (or superset) to the end of the plan.
#[utoipa::path(
    post,
    path = "/exercises/postpone",
    request_body = TargetRequest,
    responses(
        (status = 200, description = "Exercise postponed", body = SessionSnapshot),
        (status = 409, description = "Nothing upcoming to postpone", body = ErrorResponse)
    )
)]
pub async fn postpone_exercise_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<TargetRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        if body.first {
            engine.postpone_first_exercise().await
        } else {
            engine.postpone_exercise().await
        }
    };
    respond(&app_state, &engine, result)
}

/// Put the active exercises in a new order. Supersets must stay contiguous.
#[utoipa::path(
    put,
    path = "/exercises/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Exercises reordered", body = SessionSnapshot),
        (status = 400, description = "Invalid order", body = ErrorResponse)
    )
)]
pub async fn reorder_exercises_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<ReorderRequest>,
) -> HandlerResult {
    let mut engine = app_state.engine.lock().await;
    let result = {
        let _busy = app_state.begin_submit();
        engine.reorder_exercises(body.exercise_ids).await
    };
    respond(&app_state, &engine, result)
}

/// The most recent completed performance of a canonical exercise.
#[utoipa::path(
    get,
    path = "/exercises/{id}/last-performance",
    responses(
        (status = 200, description = "Last performance, or null when never performed", body = LastPerformanceView),
        (status = 502, description = "Lookup failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "The canonical exercise id.")
    )
)]
pub async fn last_performance_handler(
    State(app_state): State<Arc<AppState>>,
    Path(exercise_id): Path<Uuid>,
) -> HandlerResult<Option<LastPerformanceView>> {
    let mut engine = app_state.engine.lock().await;
    let performance = engine
        .load_last_performance(exercise_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(performance.as_ref().map(LastPerformanceView::from)))
}
