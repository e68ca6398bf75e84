// Integration tests for the reqwest session adapter against a fake upstream.

mod common;

use std::time::Duration;

use common::*;
use runner_lib::adapters::HttpSessionApi;
use workout_session_core::domain::{ExerciseStatus, SessionStatus, SetResult};
use workout_session_core::ports::{PortError, SessionApi};

async fn adapter(recorder: &Recorder) -> HttpSessionApi {
    let base_url = spawn_upstream(recorder.clone()).await;
    HttpSessionApi::new(base_url, Some(TOKEN.to_string()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn get_session_decodes_the_envelope_in_position_order() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let bundle = api.get_session(SESSION_ID).await.unwrap();

    let session = bundle.session;
    assert_eq!(session.id, SESSION_ID);
    assert_eq!(session.status, SessionStatus::InProgress);
    let names: Vec<&str> = session
        .exercises
        .iter()
        .map(|e| e.exercise.name.as_str())
        .collect();
    assert_eq!(names, vec!["Bench Press", "Seated Row"]);

    let row = &session.exercises[1];
    assert_eq!(row.sets[0].set_number, 1);
    assert_eq!(row.sets[1].set_number, 2);
    assert_eq!(row.rest_seconds, Some(60));

    let bench = &session.exercises[0];
    assert_eq!(bench.sets[0].target_weight, Some(80.5));
    assert_eq!(
        bench.workout_item.as_ref().and_then(|i| i.rest_after_seconds),
        Some(150)
    );
    assert_eq!(bench.exercise.muscle_groups, vec!["chest", "triceps"]);

    let last = bundle.last_session.expect("last session present");
    assert_eq!(last.status, SessionStatus::Completed);
    assert!(last.exercises.iter().all(|e| e.completed_sets() == 2));
}

#[tokio::test]
async fn missing_token_maps_to_unauthorized() {
    let recorder = Recorder::default();
    let base_url = spawn_upstream(recorder).await;
    let api = HttpSessionApi::new(base_url, None, Duration::from_secs(5)).unwrap();

    let err = api.get_session(SESSION_ID).await.unwrap_err();
    assert!(matches!(err, PortError::Unauthorized));
}

#[tokio::test]
async fn unknown_session_maps_to_not_found() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let err = api.get_session(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(message) if message == "Session not found"));
}

#[tokio::test]
async fn second_active_session_reports_the_one_to_resume() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let err = api.start_session(BUSY_WORKOUT_ID).await.unwrap_err();
    match err {
        PortError::SessionAlreadyActive { active_session_id } => {
            assert_eq!(active_session_id, ACTIVE_SESSION_ID)
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let bodies = recorder.bodies_for("POST /sessions");
    assert_eq!(bodies[0]["workoutId"], serde_json::json!(BUSY_WORKOUT_ID));
}

#[tokio::test]
async fn record_set_result_sends_camel_case_and_omits_missing_rpe() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let set = api
        .record_set_result(
            SESSION_ID,
            BENCH_ROW,
            &SetResult {
                set_number: 2,
                actual_reps: 6,
                actual_weight: None,
                rpe: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(set.set_number, 2);
    assert_eq!(set.actual_reps, Some(6));
    assert!(set.is_completed());

    let line = format!("POST /sessions/{}/exercises/{}/sets", SESSION_ID, BENCH_ROW);
    let body = &recorder.bodies_for(&line)[0];
    assert_eq!(body["setNumber"], 2);
    assert_eq!(body["actualReps"], 6);
    assert!(body["actualWeight"].is_null());
    assert!(body.get("rpe").is_none());
}

#[tokio::test]
async fn validation_details_become_field_errors() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let err = api
        .reorder_exercises(SESSION_ID, &[ROW_ROW, BENCH_ROW])
        .await
        .unwrap_err();
    match err {
        PortError::Validation { message, fields } => {
            assert_eq!(message, "Invalid exercise order");
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "exerciseIds");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let body = &recorder.bodies_for("PUT reorder")[0];
    assert_eq!(body["exerciseIds"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn session_not_active_is_its_own_error() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let err = api
        .update_exercise_status(SESSION_ID, BENCH_ROW, ExerciseStatus::Skipped)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::SessionNotActive(_)));
    assert_eq!(err.code(), "SESSION_NOT_ACTIVE");
}

#[tokio::test]
async fn plain_text_server_error_is_unexpected() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let err = api.delete_session(SESSION_ID).await.unwrap_err();
    match err {
        PortError::Unexpected(message) => assert!(message.contains("database down")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn last_performance_handles_data_null_and_not_found() {
    let recorder = Recorder::default();
    let api = adapter(&recorder).await;

    let bench = api.get_last_performance(BENCH_ID).await.unwrap();
    let bench = bench.expect("bench has history");
    assert_eq!(bench.exercise_id, BENCH_ID);
    assert_eq!(bench.sets.len(), 1);

    assert!(api.get_last_performance(ROW_ID).await.unwrap().is_none());
    assert!(api
        .get_last_performance(uuid::Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}
