//! crates/workout_session_core/src/ports.rs
//!
//! Defines the service contracts (traits) the session engine depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! engine independent of the HTTP client, the local storage slot, and the clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ExerciseStatus, LastPerformance, RestState, Session, SessionBundle, SessionExercise,
    SessionSet, SessionStatus, SetEdit, SetResult,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A field-level problem reported by a validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// The error type for all port operations.
/// Mirrors the error codes of the remote session API.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("A session is already active: {active_session_id}")]
    SessionAlreadyActive { active_session_id: Uuid },
    #[error("Session is not active: {0}")]
    SessionNotActive(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The stable error code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::SessionAlreadyActive { .. } => "SESSION_ALREADY_ACTIVE",
            Self::SessionNotActive(_) => "SESSION_NOT_ACTIVE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Unexpected(_) => "INTERNAL_ERROR",
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote session/tracking API. It is the system of record.
#[async_trait]
pub trait SessionApi: Send + Sync {
    // --- Session Lifecycle ---
    async fn start_session(&self, workout_id: Uuid) -> PortResult<SessionBundle>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<SessionBundle>;

    /// Setting a terminal status stamps the completion time server-side.
    async fn update_session(
        &self,
        session_id: Uuid,
        status: Option<SessionStatus>,
        notes: Option<String>,
    ) -> PortResult<Session>;

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    // --- Exercise Management ---
    async fn update_exercise_status(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        status: ExerciseStatus,
    ) -> PortResult<SessionExercise>;

    /// Returns the replacement row. The original is marked substituted.
    async fn substitute_exercise(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        new_exercise_id: Uuid,
    ) -> PortResult<SessionExercise>;

    /// Supersets must be passed as contiguous blocks.
    async fn reorder_exercises(
        &self,
        session_id: Uuid,
        exercise_ids: &[Uuid],
    ) -> PortResult<Vec<SessionExercise>>;

    // --- Set Results ---
    /// Last write wins per (exercise, set number).
    async fn record_set_result(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        result: &SetResult,
    ) -> PortResult<SessionSet>;

    async fn update_set(&self, session_id: Uuid, edit: &SetEdit) -> PortResult<SessionSet>;

    async fn delete_set(&self, session_id: Uuid, set_id: Uuid) -> PortResult<()>;

    // --- History ---
    async fn get_last_performance(
        &self,
        exercise_id: Uuid,
    ) -> PortResult<Option<LastPerformance>>;
}

/// The durable local slot holding the rest-timer snapshot.
pub trait RestStateStore: Send + Sync {
    fn load(&self) -> PortResult<Option<RestState>>;
    fn save(&self, state: &RestState) -> PortResult<()>;
    fn clear(&self) -> PortResult<()>;
}

/// Wall clock used for every rest deadline.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
