// A fake session API on an ephemeral port, shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const TOKEN: &str = "test-token";

pub const SESSION_ID: Uuid = Uuid::from_u128(0x1000);
pub const LAST_SESSION_ID: Uuid = Uuid::from_u128(0x1001);
pub const ACTIVE_SESSION_ID: Uuid = Uuid::from_u128(0x1002);
pub const WORKOUT_ID: Uuid = Uuid::from_u128(0x2000);
pub const BUSY_WORKOUT_ID: Uuid = Uuid::from_u128(0x2001);
pub const BENCH_ROW: Uuid = Uuid::from_u128(0x3000);
pub const ROW_ROW: Uuid = Uuid::from_u128(0x3001);
pub const BENCH_ID: Uuid = Uuid::from_u128(0x4000);
pub const ROW_ID: Uuid = Uuid::from_u128(0x4001);
pub const ITEM_ID: Uuid = Uuid::from_u128(0x5000);

pub fn set_id(row: Uuid, number: u32) -> Uuid {
    Uuid::from_u128(row.as_u128() * 16 + number as u128)
}

/// Requests the fake received, as `(method path, body)`.
#[derive(Clone, Default)]
pub struct Recorder {
    pub requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorder {
    fn push(&self, line: String, body: Value) {
        self.requests.lock().unwrap().push((line, body));
    }

    pub fn bodies_for(&self, line: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == line)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

fn set_json(row: Uuid, number: u32, completed: bool) -> Value {
    json!({
        "id": set_id(row, number),
        "setNumber": number,
        "targetReps": 8,
        "targetWeight": "80.5",
        "actualReps": if completed { json!(8) } else { Value::Null },
        "actualWeight": if completed { json!(80.5) } else { Value::Null },
        "rpe": null,
        "completedAt": if completed { json!("2026-02-20T09:10:00Z") } else { Value::Null },
    })
}

/// Two single exercises, delivered out of position order: rowing (position 1)
/// before bench press (position 0), two sets each.
pub fn session_json(id: Uuid, status: &str, completed: bool) -> Value {
    json!({
        "id": id,
        "workoutId": WORKOUT_ID,
        "status": status,
        "startedAt": "2026-03-01T09:00:00Z",
        "completedAt": null,
        "notes": null,
        "exercises": [
            {
                "id": ROW_ROW,
                "exercise": { "id": ROW_ID, "name": "Seated Row", "muscleGroups": ["back"] },
                "status": "active",
                "position": 1,
                "workoutItem": { "id": Uuid::from_u128(0x5001), "type": "exercise", "restAfterSeconds": 120 },
                "restSeconds": 60,
                "sets": [set_json(ROW_ROW, 2, completed), set_json(ROW_ROW, 1, completed)]
            },
            {
                "id": BENCH_ROW,
                "exercise": { "id": BENCH_ID, "name": "Bench Press", "muscleGroups": ["chest", "triceps"] },
                "status": "active",
                "position": 0,
                "workoutItem": { "id": ITEM_ID, "type": "exercise", "restSeconds": null, "restAfterSeconds": 150 },
                "substitutedFromId": null,
                "restSeconds": 75,
                "sets": [set_json(BENCH_ROW, 1, completed), set_json(BENCH_ROW, 2, completed)]
            }
        ]
    })
}

fn error(status: StatusCode, code: &str, message: &str, details: Value) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message, "details": details } })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", TOKEN).as_str())
}

async fn start_session(
    State(recorder): State<Recorder>,
    Json(body): Json<Value>,
) -> Response {
    recorder.push("POST /sessions".to_string(), body.clone());
    if body["workoutId"] == json!(BUSY_WORKOUT_ID) {
        return error(
            StatusCode::CONFLICT,
            "SESSION_ALREADY_ACTIVE",
            "An active session already exists",
            json!({ "activeSessionId": ACTIVE_SESSION_ID }),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({ "data": session_json(SESSION_ID, "in_progress", false), "lastSession": null })),
    )
        .into_response()
}

async fn get_session(headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Missing token", Value::Null);
    }
    if id != SESSION_ID {
        return error(StatusCode::NOT_FOUND, "NOT_FOUND", "Session not found", Value::Null);
    }
    Json(json!({
        "data": session_json(SESSION_ID, "in_progress", false),
        "lastSession": session_json(LAST_SESSION_ID, "completed", true),
    }))
    .into_response()
}

async fn delete_session() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response()
}

async fn update_exercise() -> Response {
    error(
        StatusCode::BAD_REQUEST,
        "SESSION_NOT_ACTIVE",
        "Session is not in progress",
        Value::Null,
    )
}

async fn record_set(
    State(recorder): State<Recorder>,
    Path((session_id, exercise_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<Value>,
) -> Response {
    recorder.push(
        format!("POST /sessions/{}/exercises/{}/sets", session_id, exercise_id),
        body.clone(),
    );
    let number = body["setNumber"].as_u64().unwrap_or(1) as u32;
    Json(json!({
        "data": {
            "id": set_id(exercise_id, number),
            "setNumber": number,
            "targetReps": 8,
            "targetWeight": 80.5,
            "actualReps": body["actualReps"],
            "actualWeight": body["actualWeight"],
            "rpe": body.get("rpe").cloned().unwrap_or(Value::Null),
            "completedAt": "2026-03-01T09:06:00Z",
        }
    }))
    .into_response()
}

async fn delete_set(
    State(recorder): State<Recorder>,
    Path((session_id, set_id)): Path<(Uuid, Uuid)>,
) -> Response {
    recorder.push(
        format!("DELETE /sessions/{}/sets/{}", session_id, set_id),
        Value::Null,
    );
    StatusCode::NO_CONTENT.into_response()
}

async fn reorder(State(recorder): State<Recorder>, Json(body): Json<Value>) -> Response {
    recorder.push("PUT reorder".to_string(), body);
    error(
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        "Invalid exercise order",
        json!([{ "field": "exerciseIds", "message": "contains a skipped exercise" }]),
    )
}

async fn last_performance(Path(id): Path<Uuid>) -> Response {
    if id == BENCH_ID {
        Json(json!({
            "data": {
                "exerciseId": BENCH_ID,
                "performedAt": "2026-02-20T09:00:00Z",
                "sets": [set_json(BENCH_ROW, 1, true)]
            }
        }))
        .into_response()
    } else if id == ROW_ID {
        Json(json!({ "data": null })).into_response()
    } else {
        error(StatusCode::NOT_FOUND, "NOT_FOUND", "Exercise not found", Value::Null)
    }
}

/// Starts the fake and returns its base URL.
pub async fn spawn_upstream(recorder: Recorder) -> String {
    let app = Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/exercises/reorder", put(reorder))
        .route("/sessions/{id}/sets/{set_id}", delete(delete_set))
        .route("/sessions/{id}/exercises/{exercise_id}", patch(update_exercise))
        .route("/sessions/{id}/exercises/{exercise_id}/sets", post(record_set))
        .route("/exercises/{id}/last-performance", get(last_performance))
        .with_state(recorder);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://127.0.0.1:{}", port)
}
