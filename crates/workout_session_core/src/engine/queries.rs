//! Read-only helpers the UI calls on every render.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::SessionEngine;
use crate::domain::{
    LastPerformance, PendingResult, Position, Screen, Session, SessionExercise, SessionSet,
};
use crate::navigation::{self, active_exercises};

/// Completed versus planned sets across the active exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed_sets: usize,
    pub total_sets: usize,
}

impl SessionEngine {
    pub fn session(&self) -> Option<&Session> {
        self.state.session.as_ref()
    }

    pub fn last_session(&self) -> Option<&Session> {
        self.state.last_session.as_ref()
    }

    pub fn position(&self) -> &Position {
        &self.state.position
    }

    pub fn screen(&self) -> Screen {
        self.state.position.screen
    }

    pub fn active_exercises(&self) -> Vec<&SessionExercise> {
        self.state
            .session
            .as_ref()
            .map(active_exercises)
            .unwrap_or_default()
    }

    pub fn current_exercise(&self) -> Option<&SessionExercise> {
        self.active_exercises()
            .get(self.state.position.exercise_index)
            .copied()
    }

    pub fn current_set(&self) -> Option<&SessionSet> {
        self.current_exercise()?
            .sets
            .get(self.state.position.set_index)
    }

    /// The exercise a transition (or the overview) is leading to.
    pub fn upcoming_exercise(&self) -> Option<&SessionExercise> {
        let screen = self.state.position.screen;
        if screen != Screen::Overview && !screen.is_transition() {
            return None;
        }
        let active = self.active_exercises();
        navigation::next_position(&active).and_then(|p| active.get(p.exercise_index).copied())
    }

    pub fn is_in_superset(&self) -> bool {
        !self.state.position.superset_exercise_ids.is_empty()
    }

    /// The members of the current superset, in execution order.
    pub fn superset_exercises(&self) -> Vec<&SessionExercise> {
        let Some(session) = self.state.session.as_ref() else {
            return Vec::new();
        };
        self.state
            .position
            .superset_exercise_ids
            .iter()
            .filter_map(|id| session.exercise(*id))
            .collect()
    }

    /// True when the current set is the last planned set of its exercise.
    pub fn is_last_set(&self) -> bool {
        self.current_exercise()
            .is_some_and(|e| self.state.position.set_index + 1 >= e.sets.len())
    }

    /// The values the next submission of `exercise_id` would send.
    pub fn pending_or_target(&self, exercise_id: Uuid) -> Option<PendingResult> {
        if let Some(pending) = self.state.pending_results.get(&exercise_id) {
            return Some(*pending);
        }
        let exercise = self.state.session.as_ref()?.exercise(exercise_id)?;
        let set = exercise
            .first_incomplete_set()
            .and_then(|i| exercise.sets.get(i))
            .or_else(|| exercise.sets.last())?;
        Some(PendingResult {
            reps: set.target_reps,
            weight: set.target_weight,
        })
    }

    /// Completed sets of the same canonical exercise in the previous session
    /// of this workout.
    pub fn last_session_sets(&self, canonical_exercise_id: Uuid) -> Vec<&SessionSet> {
        self.state
            .last_session
            .as_ref()
            .and_then(|s| {
                s.exercises
                    .iter()
                    .find(|e| e.exercise.id == canonical_exercise_id && e.completed_sets() > 0)
            })
            .map(|e| e.sets.iter().filter(|s| s.is_completed()).collect())
            .unwrap_or_default()
    }

    /// A cached "last time" lookup filled by `load_last_performance`.
    pub fn last_performance(&self, canonical_exercise_id: Uuid) -> Option<&LastPerformance> {
        self.state
            .last_performance
            .get(&canonical_exercise_id)
            .and_then(Option::as_ref)
    }

    pub fn progress(&self) -> Progress {
        let active = self.active_exercises();
        Progress {
            completed_sets: active.iter().map(|e| e.completed_sets()).sum(),
            total_sets: active.iter().map(|e| e.sets.len()).sum(),
        }
    }

    /// Wall time since the session started, or its total length once completed.
    pub fn elapsed(&self) -> Duration {
        let Some(session) = self.state.session.as_ref() else {
            return Duration::zero();
        };
        let end = session.completed_at.unwrap_or_else(|| self.clock.now());
        (end - session.started_at).max(Duration::zero())
    }

    pub fn rest_time_remaining(&self) -> u32 {
        self.state.timer.remaining()
    }

    pub fn rest_duration(&self) -> u32 {
        self.state.timer.duration()
    }

    pub fn rest_end_at(&self) -> Option<DateTime<Utc>> {
        self.state.timer.end_at()
    }

    pub fn is_timer_paused(&self) -> bool {
        self.state.timer.is_paused()
    }

    /// Fraction of the countdown still to go, for the progress ring.
    pub fn rest_progress(&self) -> f64 {
        self.state.timer.progress()
    }
}
