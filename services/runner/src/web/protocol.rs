//! services/runner/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged with the local UI: the engine snapshot it
//! renders from, and the WebSocket messages in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use workout_session_core::domain::{LastPerformance, SessionExercise, SessionSet};
use workout_session_core::{navigation, SessionEngine};

//=========================================================================================
// Engine Snapshot
//=========================================================================================

/// Everything the UI needs to render the current screen.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub workout_id: Option<Uuid>,
    /// `in_progress`, `completed` or `abandoned`.
    pub status: Option<String>,
    /// One of the kebab-case screen names, e.g. `superset-rest`.
    pub screen: String,
    pub current_exercise_index: usize,
    pub current_set_index: usize,
    pub superset_round: usize,
    pub superset_position: usize,
    pub superset_exercise_ids: Vec<Uuid>,
    pub is_in_superset: bool,
    pub is_last_set: bool,
    pub current_exercise: Option<ExerciseView>,
    pub upcoming_exercise: Option<ExerciseView>,
    /// The active exercises, in execution order.
    pub exercises: Vec<ExerciseView>,
    pub rest: Option<RestView>,
    pub progress: ProgressView,
    pub elapsed_seconds: i64,
    /// True while an action is waiting on the remote API.
    pub is_submitting: bool,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    /// The session row id; every action takes this one.
    pub id: Uuid,
    /// The canonical exercise id, for history lookups.
    pub exercise_id: Uuid,
    pub name: String,
    pub muscle_groups: Vec<String>,
    pub status: String,
    pub position: u32,
    pub workout_item_id: Option<Uuid>,
    pub in_superset: bool,
    pub substituted_from_id: Option<Uuid>,
    pub sets: Vec<SetView>,
    /// Values the next submission would send.
    pub next_result: Option<PendingView>,
    pub last_session_sets: Vec<SetView>,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetView {
    pub id: Uuid,
    pub set_number: u32,
    pub target_reps: u32,
    pub target_weight: Option<f64>,
    pub actual_reps: Option<u32>,
    pub actual_weight: Option<f64>,
    pub rpe: Option<f32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&SessionSet> for SetView {
    fn from(set: &SessionSet) -> Self {
        Self {
            id: set.id,
            set_number: set.set_number,
            target_reps: set.target_reps,
            target_weight: set.target_weight,
            actual_reps: set.actual_reps,
            actual_weight: set.actual_weight,
            rpe: set.rpe,
            completed_at: set.completed_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
pub struct PendingView {
    pub reps: u32,
    pub weight: Option<f64>,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestView {
    pub remaining_seconds: u32,
    pub duration_seconds: u32,
    /// `None` while paused.
    pub end_at: Option<DateTime<Utc>>,
    pub paused: bool,
    /// Fraction of the countdown still to go, 0.0 to 1.0.
    pub progress: f64,
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub completed_sets: usize,
    pub total_sets: usize,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastPerformanceView {
    pub exercise_id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub sets: Vec<SetView>,
}

impl From<&LastPerformance> for LastPerformanceView {
    fn from(performance: &LastPerformance) -> Self {
        Self {
            exercise_id: performance.exercise_id,
            performed_at: performance.performed_at,
            sets: performance.sets.iter().map(SetView::from).collect(),
        }
    }
}

impl SessionSnapshot {
    /// Reads the engine through its query helpers.
    pub fn from_engine(engine: &SessionEngine, is_submitting: bool) -> Self {
        let position = engine.position();
        let active = engine.active_exercises();
        let exercise_view = |exercise: &SessionExercise| -> ExerciseView {
            let index = navigation::index_of(&active, exercise.id);
            ExerciseView {
                id: exercise.id,
                exercise_id: exercise.exercise.id,
                name: exercise.exercise.name.clone(),
                muscle_groups: exercise.exercise.muscle_groups.clone(),
                status: exercise.status.as_str().to_string(),
                position: exercise.position,
                workout_item_id: exercise.workout_item_id(),
                in_superset: index.is_some_and(|i| navigation::is_in_superset(&active, i)),
                substituted_from_id: exercise.substituted_from_id,
                sets: exercise.sets.iter().map(SetView::from).collect(),
                next_result: engine
                    .pending_or_target(exercise.id)
                    .map(|p| PendingView {
                        reps: p.reps,
                        weight: p.weight,
                    }),
                last_session_sets: engine
                    .last_session_sets(exercise.exercise.id)
                    .into_iter()
                    .map(SetView::from)
                    .collect(),
            }
        };

        let rest = position.screen.is_resting().then(|| RestView {
            remaining_seconds: engine.rest_time_remaining(),
            duration_seconds: engine.rest_duration(),
            end_at: engine.rest_end_at(),
            paused: engine.is_timer_paused(),
            progress: engine.rest_progress(),
        });
        let progress = engine.progress();

        Self {
            session_id: engine.session().map(|s| s.id),
            workout_id: engine.session().map(|s| s.workout_id),
            status: engine.session().map(|s| s.status.as_str().to_string()),
            screen: position.screen.as_str().to_string(),
            current_exercise_index: position.exercise_index,
            current_set_index: position.set_index,
            superset_round: position.superset_round,
            superset_position: position.superset_position,
            superset_exercise_ids: position.superset_exercise_ids.clone(),
            is_in_superset: engine.is_in_superset(),
            is_last_set: engine.is_last_set(),
            current_exercise: engine.current_exercise().map(exercise_view),
            upcoming_exercise: engine.upcoming_exercise().map(exercise_view),
            exercises: active.iter().map(|e| exercise_view(e)).collect(),
            rest,
            progress: ProgressView {
                completed_sets: progress.completed_sets,
                total_sets: progress.total_sets,
            },
            elapsed_seconds: engine.elapsed().num_seconds(),
            is_submitting,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client (UI) TO the Server
//=========================================================================================

/// The quick actions the UI can send over the socket. Everything else goes
/// through the REST endpoints.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartWorkout,
    #[serde(rename_all = "camelCase")]
    SetPending {
        exercise_id: Uuid,
        reps: u32,
        weight: Option<f64>,
    },
    CompleteSet {
        rpe: Option<f32>,
    },
    SkipRest,
    AdjustRest {
        delta: i64,
    },
    PauseTimer,
    ResumeTimer,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (UI)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The latest engine state. Sent on connect and after every change.
    Snapshot { snapshot: SessionSnapshot },

    /// A rejected action. The connection stays open.
    Error { code: String, message: String },
}
