//! In-memory fakes of the ports and session builders shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::{
    ExerciseRef, ExerciseStatus, LastPerformance, RestState, Session, SessionBundle,
    SessionExercise, SessionSet, SessionStatus, SetEdit, SetResult, WorkoutItemRef,
    WorkoutItemType,
};
use crate::engine::SessionEngine;
use crate::ports::{Clock, PortError, PortResult, RestStateStore, SessionApi};

//=========================================================================================
// Builders
//=========================================================================================

pub fn exercise(name: &str, sets: u32) -> SessionExercise {
    SessionExercise {
        id: Uuid::new_v4(),
        exercise: ExerciseRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
            muscle_groups: vec!["legs".to_string()],
        },
        status: ExerciseStatus::Active,
        position: 0,
        workout_item: Some(WorkoutItemRef {
            id: Uuid::new_v4(),
            item_type: WorkoutItemType::Single,
            rest_seconds: None,
            rest_after_seconds: None,
        }),
        substituted_from_id: None,
        rest_seconds: None,
        sets: (1..=sets)
            .map(|n| SessionSet {
                id: Uuid::new_v4(),
                set_number: n,
                target_reps: 10,
                target_weight: Some(60.0),
                actual_reps: None,
                actual_weight: None,
                rpe: None,
                completed_at: None,
            })
            .collect(),
    }
}

pub fn superset_exercise(name: &str, sets: u32, item_id: Uuid) -> SessionExercise {
    let mut ex = exercise(name, sets);
    ex.workout_item = Some(WorkoutItemRef {
        id: item_id,
        item_type: WorkoutItemType::Superset,
        rest_seconds: None,
        rest_after_seconds: None,
    });
    ex
}

pub fn session_with(mut exercises: Vec<SessionExercise>) -> Session {
    for (i, ex) in exercises.iter_mut().enumerate() {
        ex.position = i as u32;
    }
    Session {
        id: Uuid::new_v4(),
        workout_id: Uuid::new_v4(),
        status: SessionStatus::InProgress,
        started_at: start_time(),
        completed_at: None,
        notes: None,
        exercises,
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

//=========================================================================================
// Fake Ports
//=========================================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now = *now + Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct MemoryRestStore {
    pub slot: Mutex<Option<RestState>>,
}

impl MemoryRestStore {
    pub fn get(&self) -> Option<RestState> {
        self.slot.lock().unwrap().clone()
    }

    pub fn put(&self, state: RestState) {
        *self.slot.lock().unwrap() = Some(state);
    }
}

impl RestStateStore for MemoryRestStore {
    fn load(&self) -> PortResult<Option<RestState>> {
        Ok(self.get())
    }

    fn save(&self, state: &RestState) -> PortResult<()> {
        self.put(state.clone());
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}

/// A server stand-in holding one session and recording every call.
pub struct FakeApi {
    pub session: Mutex<Session>,
    pub last_session: Mutex<Option<Session>>,
    pub calls: Mutex<Vec<String>>,
    pub failing_exercises: Mutex<HashSet<Uuid>>,
    pub fail_record: Mutex<bool>,
    pub last_performance: Mutex<HashMap<Uuid, LastPerformance>>,
}

impl FakeApi {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            last_session: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            failing_exercises: Mutex::new(HashSet::new()),
            fail_record: Mutex::new(false),
            last_performance: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn server_session(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    fn log(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn bundle(&self) -> SessionBundle {
        SessionBundle {
            session: self.server_session(),
            last_session: self.last_session.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl SessionApi for FakeApi {
    async fn start_session(&self, _workout_id: Uuid) -> PortResult<SessionBundle> {
        self.log("start_session");
        Ok(self.bundle())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<SessionBundle> {
        self.log("get_session");
        if self.session.lock().unwrap().id != session_id {
            return Err(PortError::NotFound(format!("session {}", session_id)));
        }
        Ok(self.bundle())
    }

    async fn update_session(
        &self,
        _session_id: Uuid,
        status: Option<SessionStatus>,
        notes: Option<String>,
    ) -> PortResult<Session> {
        self.log("update_session");
        let mut session = self.session.lock().unwrap();
        if let Some(status) = status {
            session.status = status;
            if status.is_terminal() {
                session.completed_at = Some(Utc::now());
            }
        }
        if notes.is_some() {
            session.notes = notes;
        }
        Ok(session.clone())
    }

    async fn delete_session(&self, _session_id: Uuid) -> PortResult<()> {
        self.log("delete_session");
        Ok(())
    }

    async fn update_exercise_status(
        &self,
        _session_id: Uuid,
        exercise_id: Uuid,
        status: ExerciseStatus,
    ) -> PortResult<SessionExercise> {
        self.log("update_exercise_status");
        if self.failing_exercises.lock().unwrap().contains(&exercise_id) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        let mut session = self.session.lock().unwrap();
        if session.status != SessionStatus::InProgress {
            return Err(PortError::SessionNotActive(session.id.to_string()));
        }
        let exercise = session
            .exercise_mut(exercise_id)
            .ok_or_else(|| PortError::NotFound(format!("exercise {}", exercise_id)))?;
        exercise.status = status;
        Ok(exercise.clone())
    }

    async fn substitute_exercise(
        &self,
        _session_id: Uuid,
        exercise_id: Uuid,
        new_exercise_id: Uuid,
    ) -> PortResult<SessionExercise> {
        self.log("substitute_exercise");
        let mut session = self.session.lock().unwrap();
        let index = session
            .exercises
            .iter()
            .position(|e| e.id == exercise_id)
            .ok_or_else(|| PortError::NotFound(format!("exercise {}", exercise_id)))?;
        session.exercises[index].status = ExerciseStatus::Substituted;
        let original = session.exercises[index].clone();
        let replacement = SessionExercise {
            id: Uuid::new_v4(),
            exercise: ExerciseRef {
                id: new_exercise_id,
                name: format!("{} (alt)", original.exercise.name),
                muscle_groups: original.exercise.muscle_groups.clone(),
            },
            status: ExerciseStatus::Active,
            substituted_from_id: Some(original.id),
            sets: original
                .sets
                .iter()
                .map(|s| SessionSet {
                    id: Uuid::new_v4(),
                    actual_reps: None,
                    actual_weight: None,
                    rpe: None,
                    completed_at: None,
                    ..s.clone()
                })
                .collect(),
            ..original
        };
        session.exercises.insert(index + 1, replacement.clone());
        Ok(replacement)
    }

    async fn reorder_exercises(
        &self,
        _session_id: Uuid,
        exercise_ids: &[Uuid],
    ) -> PortResult<Vec<SessionExercise>> {
        self.log("reorder_exercises");
        let mut session = self.session.lock().unwrap();
        let mut ordered = Vec::new();
        for (position, id) in exercise_ids.iter().enumerate() {
            let mut exercise = session
                .exercise(*id)
                .filter(|e| e.is_active())
                .cloned()
                .ok_or_else(|| PortError::Validation {
                    message: format!("exercise {} cannot be reordered", id),
                    fields: Vec::new(),
                })?;
            exercise.position = position as u32;
            ordered.push(exercise);
        }
        let rest: Vec<SessionExercise> = session
            .exercises
            .iter()
            .filter(|e| !exercise_ids.contains(&e.id))
            .cloned()
            .collect();
        session.exercises = ordered.iter().cloned().chain(rest).collect();
        Ok(ordered)
    }

    async fn record_set_result(
        &self,
        _session_id: Uuid,
        exercise_id: Uuid,
        result: &SetResult,
    ) -> PortResult<SessionSet> {
        self.log("record_set_result");
        if *self.fail_record.lock().unwrap() {
            return Err(PortError::Unexpected("gateway timeout".to_string()));
        }
        let mut session = self.session.lock().unwrap();
        let set = session
            .exercise_mut(exercise_id)
            .and_then(|e| e.sets.iter_mut().find(|s| s.set_number == result.set_number))
            .ok_or_else(|| PortError::NotFound(format!("set {}", result.set_number)))?;
        set.actual_reps = Some(result.actual_reps);
        set.actual_weight = result.actual_weight;
        set.rpe = result.rpe;
        set.completed_at = Some(Utc::now());
        Ok(set.clone())
    }

    async fn update_set(&self, _session_id: Uuid, edit: &SetEdit) -> PortResult<SessionSet> {
        self.log("update_set");
        let mut session = self.session.lock().unwrap();
        let set = session
            .exercises
            .iter_mut()
            .flat_map(|e| e.sets.iter_mut())
            .find(|s| s.id == edit.set_id)
            .ok_or_else(|| PortError::NotFound(format!("set {}", edit.set_id)))?;
        if edit.actual_reps == Some(0) {
            return Err(PortError::Validation {
                message: "actualReps must be positive".to_string(),
                fields: Vec::new(),
            });
        }
        set.actual_reps = edit.actual_reps.or(set.actual_reps);
        set.actual_weight = edit.actual_weight.or(set.actual_weight);
        set.rpe = edit.rpe.or(set.rpe);
        Ok(set.clone())
    }

    async fn delete_set(&self, _session_id: Uuid, set_id: Uuid) -> PortResult<()> {
        self.log("delete_set");
        let mut session = self.session.lock().unwrap();
        for exercise in session.exercises.iter_mut() {
            exercise.sets.retain(|s| s.id != set_id);
        }
        Ok(())
    }

    async fn get_last_performance(
        &self,
        exercise_id: Uuid,
    ) -> PortResult<Option<LastPerformance>> {
        self.log("get_last_performance");
        Ok(self.last_performance.lock().unwrap().get(&exercise_id).cloned())
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub engine: SessionEngine,
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryRestStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(session: Session) -> Self {
        let api = Arc::new(FakeApi::new(session));
        let store = Arc::new(MemoryRestStore::default());
        let clock = Arc::new(ManualClock::new(start_time() + Duration::minutes(5)));
        let engine = SessionEngine::new(api.clone(), store.clone(), clock.clone());
        Self {
            engine,
            api,
            store,
            clock,
        }
    }

    /// Loads the fake server's session into the engine.
    pub async fn loaded(session: Session) -> Self {
        let id = session.id;
        let mut harness = Self::new(session);
        harness.engine.load_session(id).await.unwrap();
        harness
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Ticks once after moving the clock past the current countdown.
    pub fn expire_rest(&mut self) {
        let remaining = i64::from(self.engine.rest_time_remaining());
        self.clock.advance(remaining);
        self.engine.tick();
    }
}
