pub mod domain;
pub mod engine;
pub mod navigation;
pub mod ports;
pub mod rest_timer;

#[cfg(test)]
mod testing;

pub use domain::{
    ExerciseRef, ExerciseStatus, LastPerformance, PendingResult, Position, RestState, Screen,
    Session, SessionBundle, SessionExercise, SessionSet, SessionStatus, SetEdit, SetResult,
    WorkoutItemRef, WorkoutItemType,
};
pub use engine::{EngineError, EngineResult, Progress, SessionEngine};
pub use ports::{Clock, FieldError, PortError, PortResult, RestStateStore, SessionApi};
pub use rest_timer::{RestTimer, TickOutcome};
