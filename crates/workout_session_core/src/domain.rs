//! crates/workout_session_core/src/domain.rs
//!
//! Defines the pure, core data structures for a training session.
//! These structs are independent of any wire or storage format.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Session Records
//=========================================================================================

/// Lifecycle of a session record. Terminal once `Completed` or `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// One instance of performing a workout.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Ordered by `position`.
    pub exercises: Vec<SessionExercise>,
}

impl Session {
    pub fn exercise(&self, exercise_id: Uuid) -> Option<&SessionExercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }

    pub fn exercise_mut(&mut self, exercise_id: Uuid) -> Option<&mut SessionExercise> {
        self.exercises.iter_mut().find(|e| e.id == exercise_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseStatus {
    Active,
    Skipped,
    Substituted,
}

impl ExerciseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Skipped => "skipped",
            Self::Substituted => "substituted",
        }
    }
}

impl FromStr for ExerciseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "skipped" => Ok(Self::Skipped),
            "substituted" => Ok(Self::Substituted),
            other => Err(format!("unknown exercise status '{}'", other)),
        }
    }
}

/// The canonical exercise a session row refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseRef {
    pub id: Uuid,
    pub name: String,
    pub muscle_groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutItemType {
    Single,
    Superset,
}

impl FromStr for WorkoutItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" | "exercise" => Ok(Self::Single),
            "superset" => Ok(Self::Superset),
            other => Err(format!("unknown workout item type '{}'", other)),
        }
    }
}

/// The grouping unit of the workout template this row was planned from.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutItemRef {
    pub id: Uuid,
    pub item_type: WorkoutItemType,
    /// Rest between superset rounds.
    pub rest_seconds: Option<u32>,
    /// Rest after the item is finished, before the next one.
    pub rest_after_seconds: Option<u32>,
}

/// One exercise instance within a session.
#[derive(Debug, Clone)]
pub struct SessionExercise {
    pub id: Uuid,
    pub exercise: ExerciseRef,
    pub status: ExerciseStatus,
    pub position: u32,
    pub workout_item: Option<WorkoutItemRef>,
    pub substituted_from_id: Option<Uuid>,
    /// Rest between consecutive sets of this exercise.
    pub rest_seconds: Option<u32>,
    /// Ordered by `set_number`.
    pub sets: Vec<SessionSet>,
}

impl SessionExercise {
    pub fn is_active(&self) -> bool {
        self.status == ExerciseStatus::Active
    }

    pub fn workout_item_id(&self) -> Option<Uuid> {
        self.workout_item.as_ref().map(|item| item.id)
    }

    /// The workout item id, but only when the item is a superset block.
    pub fn superset_item_id(&self) -> Option<Uuid> {
        self.workout_item
            .as_ref()
            .filter(|item| item.item_type == WorkoutItemType::Superset)
            .map(|item| item.id)
    }

    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|s| s.is_completed()).count()
    }

    pub fn first_incomplete_set(&self) -> Option<usize> {
        self.sets.iter().position(|s| !s.is_completed())
    }
}

/// One planned or performed set.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSet {
    pub id: Uuid,
    /// 1-based ordering key.
    pub set_number: u32,
    pub target_reps: u32,
    pub target_weight: Option<f64>,
    pub actual_reps: Option<u32>,
    pub actual_weight: Option<f64>,
    pub rpe: Option<f32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSet {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A session together with the most recent completed session of the same workout.
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub session: Session,
    pub last_session: Option<Session>,
}

//=========================================================================================
// Engine-local Values
//=========================================================================================

/// A not-yet-submitted edit to the upcoming set of an exercise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingResult {
    pub reps: u32,
    pub weight: Option<f64>,
}

/// The values sent when recording a set result.
#[derive(Debug, Clone, PartialEq)]
pub struct SetResult {
    pub set_number: u32,
    pub actual_reps: u32,
    pub actual_weight: Option<f64>,
    pub rpe: Option<f32>,
}

/// A partial update to an already recorded set. Unset fields keep their prior value.
#[derive(Debug, Clone, PartialEq)]
pub struct SetEdit {
    pub set_id: Uuid,
    pub actual_reps: Option<u32>,
    pub actual_weight: Option<f64>,
    pub rpe: Option<f32>,
}

/// The most recent completed performance of a canonical exercise.
#[derive(Debug, Clone)]
pub struct LastPerformance {
    pub exercise_id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub sets: Vec<SessionSet>,
}

pub type PendingResults = HashMap<Uuid, PendingResult>;

//=========================================================================================
// Navigation
//=========================================================================================

/// Which screen of the session runner is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Overview,
    Exercise,
    SupersetExercise,
    Rest,
    Transition,
    SupersetRest,
    SupersetTransition,
    Summary,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Exercise => "exercise",
            Self::SupersetExercise => "superset-exercise",
            Self::Rest => "rest",
            Self::Transition => "transition",
            Self::SupersetRest => "superset-rest",
            Self::SupersetTransition => "superset-transition",
            Self::Summary => "summary",
        }
    }

    /// Screens that run a countdown.
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            Self::Rest | Self::Transition | Self::SupersetRest | Self::SupersetTransition
        )
    }

    /// Screens that expose skip/postpone/substitute for the upcoming exercise.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition | Self::SupersetTransition)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(Self::Overview),
            "exercise" => Ok(Self::Exercise),
            "superset-exercise" => Ok(Self::SupersetExercise),
            "rest" => Ok(Self::Rest),
            "transition" => Ok(Self::Transition),
            "superset-rest" => Ok(Self::SupersetRest),
            "superset-transition" => Ok(Self::SupersetTransition),
            "summary" => Ok(Self::Summary),
            other => Err(format!("unknown screen '{}'", other)),
        }
    }
}

/// Where the user is within the active exercise list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub screen: Screen,
    /// Index into the active exercise list, never the unfiltered one.
    pub exercise_index: usize,
    pub set_index: usize,
    /// 0-based round within the current superset.
    pub superset_round: usize,
    /// Index of the current exercise within `superset_exercise_ids`.
    pub superset_position: usize,
    pub superset_exercise_ids: Vec<Uuid>,
}

impl Position {
    pub fn at(screen: Screen) -> Self {
        Self {
            screen,
            exercise_index: 0,
            set_index: 0,
            superset_round: 0,
            superset_position: 0,
            superset_exercise_ids: Vec::new(),
        }
    }
}

/// Persisted snapshot that lets an in-flight countdown survive a reload.
#[derive(Debug, Clone, PartialEq)]
pub struct RestState {
    pub session_id: Uuid,
    pub position: Position,
    pub rest_end_at: DateTime<Utc>,
    pub rest_duration: u32,
}
