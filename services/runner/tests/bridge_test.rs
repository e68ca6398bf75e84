// End-to-end test of the local bridge: real router, real adapters, fake upstream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use runner_lib::adapters::{FileRestStateStore, HttpSessionApi, SystemClock};
use runner_lib::config::Config;
use runner_lib::web::{build_router, state::AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use workout_session_core::ports::RestStateStore;
use workout_session_core::SessionEngine;

struct Bridge {
    url: String,
    client: reqwest::Client,
    store: FileRestStateStore,
    recorder: Recorder,
    _dir: tempfile::TempDir,
}

impl Bridge {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .delete(format!("{}{}", self.url, path))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.url, path))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }
}

async fn spawn_bridge() -> Bridge {
    let recorder = Recorder::default();
    let upstream = spawn_upstream(recorder.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let rest_path = dir.path().join("rest-state.json");

    let config = Config::from_lookup(|key| match key {
        "SESSION_API_URL" => Some(upstream.clone()),
        "SESSION_API_TOKEN" => Some(TOKEN.to_string()),
        "REST_STATE_PATH" => Some(rest_path.display().to_string()),
        "TICK_INTERVAL_MS" => Some("50".to_string()),
        _ => None,
    })
    .unwrap();

    let api = Arc::new(
        HttpSessionApi::new(
            config.session_api_url.clone(),
            config.session_api_token.clone(),
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let store = FileRestStateStore::new(config.rest_state_path.clone());
    let engine = SessionEngine::new(api, Arc::new(store.clone()), Arc::new(SystemClock));
    let app_state = Arc::new(AppState::new(engine, Arc::new(config)));
    let app = build_router(app_state).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Bridge {
        url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        store,
        recorder,
        _dir: dir,
    }
}

#[tokio::test]
async fn a_set_flows_from_overview_through_rest_and_back() {
    let bridge = spawn_bridge().await;

    let (status, snapshot) = bridge
        .post("/session/start", json!({ "workoutId": WORKOUT_ID }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["screen"], "overview");
    assert_eq!(snapshot["upcomingExercise"]["name"], "Bench Press");
    assert_eq!(snapshot["progress"]["totalSets"], 4);

    let (status, snapshot) = bridge.post("/session/begin", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["screen"], "exercise");
    assert_eq!(snapshot["currentExercise"]["id"], json!(BENCH_ROW));

    let (status, snapshot) = bridge
        .post("/sets/complete", json!({ "rpe": 8.0 }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["screen"], "rest");
    assert_eq!(snapshot["rest"]["durationSeconds"], 75);
    assert_eq!(snapshot["progress"]["completedSets"], 1);
    assert_eq!(snapshot["isSubmitting"], false);

    let recorded = bridge.recorder.bodies_for(&format!(
        "POST /sessions/{}/exercises/{}/sets",
        SESSION_ID, BENCH_ROW
    ));
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0]["actualWeight"], 80.5);

    let stored = bridge.store.load().unwrap().expect("rest state persisted");
    assert_eq!(stored.session_id, SESSION_ID);
    assert_eq!(stored.rest_duration, 75);

    let (status, snapshot) = bridge.post("/rest/skip", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["screen"], "exercise");
    assert_eq!(snapshot["currentSetIndex"], 1);
    assert!(bridge.store.load().unwrap().is_none());

    let (status, state) = bridge.get("/state").await;
    assert_eq!(status, 200);
    assert_eq!(state["screen"], "exercise");
}

#[tokio::test]
async fn actions_on_the_wrong_screen_are_conflicts() {
    let bridge = spawn_bridge().await;

    let (status, body) = bridge.post("/rest/skip", json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "NO_SESSION");

    bridge
        .post("/session/start", json!({ "workoutId": WORKOUT_ID }))
        .await;
    let (status, body) = bridge.post("/rest/adjust", json!({ "delta": 30 })).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn already_active_session_surfaces_its_id() {
    let bridge = spawn_bridge().await;

    let (status, body) = bridge
        .post("/session/start", json!({ "workoutId": BUSY_WORKOUT_ID }))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "SESSION_ALREADY_ACTIVE");
    assert_eq!(body["error"]["activeSessionId"], json!(ACTIVE_SESSION_ID));
}

#[tokio::test]
async fn last_performance_is_served_through_the_engine_cache() {
    let bridge = spawn_bridge().await;

    let (status, body) = bridge
        .get(&format!("/exercises/{}/last-performance", BENCH_ID))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["exerciseId"], json!(BENCH_ID));

    let (status, body) = bridge
        .get(&format!("/exercises/{}/last-performance", ROW_ID))
        .await;
    assert_eq!(status, 200);
    assert!(body.is_null());
}

#[tokio::test]
async fn deleting_a_set_mid_exercise_keeps_the_exercise_screen() {
    let bridge = spawn_bridge().await;
    bridge
        .post("/session/start", json!({ "workoutId": WORKOUT_ID }))
        .await;
    bridge.post("/session/begin", json!({})).await;

    let row_set = set_id(ROW_ROW, 2);
    let (status, snapshot) = bridge.delete(&format!("/sets/{}", row_set)).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["screen"], "exercise");
    assert_eq!(snapshot["currentExercise"]["id"], json!(BENCH_ROW));
    let line = format!("DELETE /sessions/{}/sets/{}", SESSION_ID, row_set);
    assert_eq!(bridge.recorder.bodies_for(&line).len(), 1);

    let (status, body) = bridge
        .delete(&format!("/sets/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
