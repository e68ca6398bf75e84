//! Engine actions that talk to the remote API.
//!
//! Set completion patches local state in place after the server accepts it.
//! Substitute and reorder change server-side row identity, so they resync
//! with a full reload instead.

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use super::{EngineError, EngineResult, SessionEngine};
use crate::domain::{
    ExerciseStatus, LastPerformance, PendingResult, Position, Screen, Session, SessionSet,
    SessionStatus, SetEdit, SetResult,
};
use crate::navigation::{self, active_exercises};
use crate::ports::PortError;

const RUNNING_SCREENS: &[Screen] = &[Screen::Exercise, Screen::SupersetExercise];
const TRANSITION_SCREENS: &[Screen] = &[Screen::Transition, Screen::SupersetTransition];
const OVERVIEW_SCREEN: &[Screen] = &[Screen::Overview];

/// Collapses the results of a parallel batch: all succeed, or the first failure
/// is reported along with how many calls failed.
fn collect_batch<T>(results: Vec<Result<T, PortError>>) -> EngineResult<Vec<T>> {
    let total = results.len();
    let mut ok = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(e) => errors.push(e),
        }
    }
    let failed = errors.len();
    match errors.into_iter().next() {
        None => Ok(ok),
        Some(source) => {
            warn!(failed, total, "Parallel batch partially failed: {}", source);
            Err(EngineError::Batch {
                failed,
                total,
                source,
            })
        }
    }
}

impl SessionEngine {
    //=====================================================================================
    // Running the Session
    //=====================================================================================

    /// Leaves the overview for the first incomplete set.
    pub fn start_workout(&mut self) -> EngineResult<()> {
        self.require_screen(OVERVIEW_SCREEN, "start workout")?;
        let next = {
            let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
            navigation::next_position(&active_exercises(session))
        };
        self.set_position(next.unwrap_or_else(|| Position::at(Screen::Summary)));
        Ok(())
    }

    /// Records an edit to the upcoming set of `exercise_id`.
    pub fn set_pending_result(
        &mut self,
        exercise_id: Uuid,
        reps: u32,
        weight: Option<f64>,
    ) -> EngineResult<()> {
        let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
        if !session.exercise(exercise_id).is_some_and(|e| e.is_active()) {
            return Err(EngineError::UnknownExercise(exercise_id));
        }
        self.state
            .pending_results
            .insert(exercise_id, PendingResult { reps, weight });
        Ok(())
    }

    pub fn clear_pending_result(&mut self, exercise_id: Uuid) {
        self.state.pending_results.remove(&exercise_id);
    }

    /// Submits the current set with the pending values (or the targets) and
    /// advances the state machine. Local state changes only after the server
    /// accepted the result.
    pub async fn complete_set(&mut self, rpe: Option<f32>) -> EngineResult<()> {
        self.require_screen(RUNNING_SCREENS, "complete set")?;
        let session_id = self.session_id()?;

        let (exercise_id, result) = {
            let exercise = self
                .current_exercise()
                .ok_or(EngineError::InvalidState {
                    screen: self.state.position.screen,
                    action: "complete set",
                })?;
            let set = exercise
                .sets
                .get(self.state.position.set_index)
                .filter(|s| !s.is_completed())
                .ok_or(EngineError::InvalidState {
                    screen: self.state.position.screen,
                    action: "complete set",
                })?;
            let pending = self.state.pending_results.get(&exercise.id);
            let result = SetResult {
                set_number: set.set_number,
                actual_reps: pending.map(|p| p.reps).unwrap_or(set.target_reps),
                actual_weight: pending.map(|p| p.weight).unwrap_or(set.target_weight),
                rpe,
            };
            (exercise.id, result)
        };

        let recorded = self
            .api
            .record_set_result(session_id, exercise_id, &result)
            .await?;

        let now = self.clock.now();
        let session = self.state.session.as_mut().ok_or(EngineError::NoSession)?;
        if let Some(set) = session
            .exercise_mut(exercise_id)
            .and_then(|e| e.sets.iter_mut().find(|s| s.set_number == result.set_number))
        {
            set.actual_reps = recorded.actual_reps.or(Some(result.actual_reps));
            set.actual_weight = recorded.actual_weight.or(result.actual_weight);
            set.rpe = recorded.rpe.or(result.rpe);
            set.completed_at = recorded.completed_at.or(Some(now));
        }
        self.state.pending_results.remove(&exercise_id);
        info!(
            %exercise_id,
            set_number = result.set_number,
            reps = result.actual_reps,
            "Set completed."
        );

        self.advance_after_set();
        Ok(())
    }

    /// Picks the next screen after a completed set and starts its countdown.
    fn advance_after_set(&mut self) {
        let Some(session) = self.state.session.as_ref() else {
            return;
        };
        let active = active_exercises(session);
        let current = self.state.position.clone();
        let Some(exercise) = active.get(current.exercise_index).copied() else {
            return;
        };
        let anything_left = navigation::next_position(&active).is_some();
        let ids = navigation::superset_ids(&active, current.exercise_index);

        let (position, rest_seconds) = if !ids.is_empty() {
            let member = ids.iter().position(|id| *id == exercise.id).unwrap_or(0);
            let round = current.superset_round;
            if let Some((next_member, index)) =
                navigation::next_in_round(&active, &ids, round, member)
            {
                let position = Position {
                    screen: Screen::SupersetExercise,
                    exercise_index: index,
                    set_index: round,
                    superset_round: round,
                    superset_position: next_member,
                    superset_exercise_ids: ids,
                };
                (position, None)
            } else if let Some((next_round, next_member, index)) =
                navigation::next_round(&active, &ids, round)
            {
                let position = Position {
                    screen: Screen::SupersetRest,
                    exercise_index: index,
                    set_index: next_round,
                    superset_round: next_round,
                    superset_position: next_member,
                    superset_exercise_ids: ids,
                };
                (position, Some(navigation::rest_between_rounds(exercise)))
            } else if anything_left {
                let position = Position {
                    screen: Screen::SupersetTransition,
                    superset_exercise_ids: ids,
                    ..current
                };
                (position, Some(navigation::rest_after_item(exercise)))
            } else {
                let position = Position {
                    screen: Screen::SupersetRest,
                    superset_exercise_ids: ids,
                    ..current
                };
                (position, Some(navigation::rest_between_rounds(exercise)))
            }
        } else if let Some(next_set) = exercise.first_incomplete_set() {
            let position = Position {
                screen: Screen::Rest,
                set_index: next_set,
                ..current
            };
            (position, Some(navigation::rest_between_sets(exercise)))
        } else if anything_left {
            let position = Position {
                screen: Screen::Transition,
                ..current
            };
            (position, Some(navigation::rest_after_item(exercise)))
        } else {
            let position = Position {
                screen: Screen::Rest,
                ..current
            };
            (position, Some(navigation::rest_between_sets(exercise)))
        };

        self.set_position(position);
        match rest_seconds {
            Some(seconds) => {
                self.state.timer.start(self.clock.now(), seconds);
                self.persist_rest_state();
            }
            None => self.state.timer.stop(),
        }
    }

    //=====================================================================================
    // Skip / Substitute / Postpone
    //=====================================================================================

    /// Skips the upcoming exercise shown on a transition screen, together with
    /// every sibling of its superset.
    pub async fn skip_exercise(&mut self) -> EngineResult<()> {
        self.require_screen(TRANSITION_SCREENS, "skip exercise")?;
        self.skip_upcoming().await
    }

    /// Skips the first exercise (and its superset siblings) from the overview.
    pub async fn skip_first_exercise(&mut self) -> EngineResult<()> {
        self.require_screen(OVERVIEW_SCREEN, "skip first exercise")?;
        self.skip_upcoming().await
    }

    async fn skip_upcoming(&mut self) -> EngineResult<()> {
        let session_id = self.session_id()?;
        let anchor = self.current_exercise().map(|e| e.id);
        let block_ids = self.upcoming_block_ids()?;

        let calls = block_ids.iter().map(|exercise_id| {
            self.api
                .update_exercise_status(session_id, *exercise_id, ExerciseStatus::Skipped)
        });
        let updated = collect_batch(join_all(calls).await)?;

        let session = self.state.session.as_mut().ok_or(EngineError::NoSession)?;
        for row in &updated {
            if let Some(exercise) = session.exercise_mut(row.id) {
                exercise.status = row.status;
            }
            self.state.pending_results.remove(&row.id);
        }
        info!(skipped = block_ids.len(), "Upcoming exercise skipped.");

        self.renavigate_after_skip(anchor);
        Ok(())
    }

    fn renavigate_after_skip(&mut self, anchor: Option<Uuid>) {
        let Some(session) = self.state.session.as_ref() else {
            return;
        };
        let active = active_exercises(session);
        let anything_left = navigation::next_position(&active).is_some();
        let current = self.state.position.clone();

        let position = match current.screen {
            Screen::Overview if anything_left => Position::at(Screen::Overview),
            Screen::Overview => Position::at(Screen::Summary),
            screen => {
                let exercise_index = anchor
                    .and_then(|id| navigation::index_of(&active, id))
                    .unwrap_or(current.exercise_index.min(active.len().saturating_sub(1)));
                let screen = match screen {
                    Screen::Transition if !anything_left => Screen::Rest,
                    Screen::SupersetTransition if !anything_left => Screen::SupersetRest,
                    other => other,
                };
                let superset_exercise_ids = navigation::superset_ids(&active, exercise_index);
                let superset_position = anchor
                    .and_then(|id| superset_exercise_ids.iter().position(|s| *s == id))
                    .unwrap_or(0);
                Position {
                    screen,
                    exercise_index,
                    superset_position,
                    superset_exercise_ids,
                    ..current
                }
            }
        };

        if position.screen == Screen::Summary {
            self.state.timer.stop();
            self.clear_rest_state();
        }
        self.set_position(position);
        self.persist_rest_state();
    }

    /// Replaces the upcoming exercise with `new_exercise_id`, then resyncs.
    pub async fn substitute_exercise(&mut self, new_exercise_id: Uuid) -> EngineResult<()> {
        self.require_screen(TRANSITION_SCREENS, "substitute exercise")?;
        self.substitute_upcoming(new_exercise_id).await
    }

    /// Replaces the first exercise from the overview, then resyncs.
    pub async fn substitute_first_exercise(&mut self, new_exercise_id: Uuid) -> EngineResult<()> {
        self.require_screen(OVERVIEW_SCREEN, "substitute first exercise")?;
        self.substitute_upcoming(new_exercise_id).await
    }

    async fn substitute_upcoming(&mut self, new_exercise_id: Uuid) -> EngineResult<()> {
        let session_id = self.session_id()?;
        let exercise_id = self
            .upcoming_exercise()
            .map(|e| e.id)
            .ok_or(EngineError::InvalidState {
                screen: self.state.position.screen,
                action: "substitute exercise",
            })?;
        let replacement = self
            .api
            .substitute_exercise(session_id, exercise_id, new_exercise_id)
            .await?;
        info!(
            %exercise_id,
            replacement_id = %replacement.id,
            "Exercise substituted."
        );
        self.reload_preserving_rest().await
    }

    /// Moves the upcoming exercise (or its whole superset) to the end of the
    /// remaining list, then resyncs.
    pub async fn postpone_exercise(&mut self) -> EngineResult<()> {
        self.require_screen(TRANSITION_SCREENS, "postpone exercise")?;
        self.postpone_upcoming().await
    }

    pub async fn postpone_first_exercise(&mut self) -> EngineResult<()> {
        self.require_screen(OVERVIEW_SCREEN, "postpone first exercise")?;
        self.postpone_upcoming().await
    }

    async fn postpone_upcoming(&mut self) -> EngineResult<()> {
        let session_id = self.session_id()?;
        let order = {
            let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
            let active = active_exercises(session);
            let index = navigation::next_position(&active)
                .map(|p| p.exercise_index)
                .ok_or(EngineError::InvalidState {
                    screen: self.state.position.screen,
                    action: "postpone exercise",
                })?;
            navigation::postponed_order(&active, index)
        };
        self.api.reorder_exercises(session_id, &order).await?;
        info!(%session_id, "Upcoming exercise postponed.");
        self.reload_preserving_rest().await
    }

    /// Applies a caller-built order of the active exercises. Superset members
    /// must form contiguous blocks.
    pub async fn reorder_exercises(&mut self, exercise_ids: Vec<Uuid>) -> EngineResult<()> {
        let session_id = self.session_id()?;
        if self.state.position.screen == Screen::Summary {
            return Err(EngineError::InvalidState {
                screen: Screen::Summary,
                action: "reorder exercises",
            });
        }
        {
            let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
            navigation::validate_order(&active_exercises(session), &exercise_ids)
                .map_err(EngineError::InvalidReorder)?;
        }
        self.api.reorder_exercises(session_id, &exercise_ids).await?;
        info!(%session_id, count = exercise_ids.len(), "Exercises reordered.");
        self.reload_preserving_rest().await
    }

    fn upcoming_block_ids(&self) -> EngineResult<Vec<Uuid>> {
        let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
        let active = active_exercises(session);
        let index = navigation::next_position(&active)
            .map(|p| p.exercise_index)
            .ok_or(EngineError::InvalidState {
                screen: self.state.position.screen,
                action: "skip exercise",
            })?;
        Ok(navigation::block_of(&active, index)
            .into_iter()
            .map(|i| active[i].id)
            .collect())
    }

    //=====================================================================================
    // Editing Recorded Sets
    //=====================================================================================

    /// Partially updates one recorded set.
    pub async fn update_completed_set(&mut self, edit: SetEdit) -> EngineResult<()> {
        self.update_completed_sets(vec![edit]).await
    }

    /// Submits several set edits in parallel. Local sets are patched only when
    /// every call succeeded.
    pub async fn update_completed_sets(&mut self, edits: Vec<SetEdit>) -> EngineResult<()> {
        let session_id = self.session_id()?;
        {
            let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
            if let Some(unknown) = edits.iter().find(|edit| find_set(session, edit.set_id).is_none())
            {
                return Err(EngineError::UnknownSet(unknown.set_id));
            }
        }

        let calls = edits.iter().map(|edit| self.api.update_set(session_id, edit));
        let updated = collect_batch(join_all(calls).await)?;

        let session = self.state.session.as_mut().ok_or(EngineError::NoSession)?;
        for set in updated {
            if let Some(local) = find_set_mut(session, set.id) {
                local.actual_reps = set.actual_reps.or(local.actual_reps);
                local.actual_weight = set.actual_weight.or(local.actual_weight);
                local.rpe = set.rpe.or(local.rpe);
                local.completed_at = set.completed_at.or(local.completed_at);
            }
        }
        self.persist_rest_state();
        Ok(())
    }

    /// Removes one set from the session. Set numbering shifts server-side, so
    /// the session is resynced afterwards.
    pub async fn delete_set(&mut self, set_id: Uuid) -> EngineResult<()> {
        let session_id = self.session_id()?;
        {
            let session = self.state.session.as_ref().ok_or(EngineError::NoSession)?;
            if find_set(session, set_id).is_none() {
                return Err(EngineError::UnknownSet(set_id));
            }
        }
        self.api.delete_set(session_id, set_id).await?;
        info!(%session_id, %set_id, "Set deleted.");
        self.reload_preserving_rest().await
    }

    //=====================================================================================
    // Ending the Session
    //=====================================================================================

    /// Marks the session completed, clears rest persistence, and resets.
    pub async fn complete_session(&mut self, notes: Option<String>) -> EngineResult<Session> {
        self.finish(SessionStatus::Completed, notes).await
    }

    /// Marks the session abandoned, clears rest persistence, and resets.
    pub async fn abandon_session(&mut self) -> EngineResult<Session> {
        self.finish(SessionStatus::Abandoned, None).await
    }

    async fn finish(&mut self, status: SessionStatus, notes: Option<String>) -> EngineResult<Session> {
        let session_id = self.session_id()?;
        let session = self
            .api
            .update_session(session_id, Some(status), notes)
            .await?;
        info!(%session_id, status = status.as_str(), "Session finished.");
        self.clear_rest_state();
        self.reset();
        Ok(session)
    }

    /// Deletes the session record entirely.
    pub async fn discard_session(&mut self) -> EngineResult<()> {
        let session_id = self.session_id()?;
        self.api.delete_session(session_id).await?;
        info!(%session_id, "Session discarded.");
        self.clear_rest_state();
        self.reset();
        Ok(())
    }

    //=====================================================================================
    // History
    //=====================================================================================

    /// Fetches (once) the most recent completed performance of a canonical exercise.
    pub async fn load_last_performance(
        &mut self,
        exercise_id: Uuid,
    ) -> EngineResult<Option<LastPerformance>> {
        if let Some(cached) = self.state.last_performance.get(&exercise_id) {
            return Ok(cached.clone());
        }
        let performance = self.api.get_last_performance(exercise_id).await?;
        self.state
            .last_performance
            .insert(exercise_id, performance.clone());
        Ok(performance)
    }
}

fn find_set(session: &Session, set_id: Uuid) -> Option<&SessionSet> {
    session
        .exercises
        .iter()
        .flat_map(|e| e.sets.iter())
        .find(|s| s.id == set_id)
}

fn find_set_mut(session: &mut Session, set_id: Uuid) -> Option<&mut SessionSet> {
    session
        .exercises
        .iter_mut()
        .flat_map(|e| e.sets.iter_mut())
        .find(|s| s.id == set_id)
}
