//! crates/workout_session_core/src/engine/mod.rs
//!
//! The session engine: one explicit state container owning "where the user is"
//! in a training session. Actions (in `actions` and `timer`) mutate it and call
//! the remote API; queries (in `queries`) are read by the UI on every render.

mod actions;
mod queries;
mod timer;


pub use queries::Progress;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    LastPerformance, PendingResults, Position, RestState, Screen, Session, SessionBundle,
};
use crate::navigation::{self, active_exercises};
use crate::ports::{Clock, PortError, RestStateStore, SessionApi};
use crate::rest_timer::RestTimer;

//=========================================================================================
// Engine Error and Result Types
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No session is loaded")]
    NoSession,
    #[error("Action not allowed on the {screen} screen: {action}")]
    InvalidState { screen: Screen, action: &'static str },
    #[error("Invalid exercise order: {0}")]
    InvalidReorder(String),
    #[error("Unknown exercise: {0}")]
    UnknownExercise(Uuid),
    #[error("Unknown set: {0}")]
    UnknownSet(Uuid),
    /// Some calls of a parallel batch failed. Calls that succeeded are not rolled back.
    #[error("{failed} of {total} remote calls failed: {source}")]
    Batch {
        failed: usize,
        total: usize,
        #[source]
        source: PortError,
    },
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type EngineResult<T> = Result<T, EngineError>;

//=========================================================================================
// Engine State
//=========================================================================================

/// Everything the engine knows. Reset to `Default` when a session ends.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub session: Option<Session>,
    /// Most recent completed session of the same workout, for comparisons.
    pub last_session: Option<Session>,
    pub position: Position,
    pub timer: RestTimer,
    pub pending_results: PendingResults,
    /// Keyed by canonical exercise id; `None` records a lookup that found nothing.
    pub last_performance: HashMap<Uuid, Option<LastPerformance>>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            session: None,
            last_session: None,
            position: Position::at(Screen::Overview),
            timer: RestTimer::new(),
            pending_results: PendingResults::new(),
            last_performance: HashMap::new(),
        }
    }
}

pub struct SessionEngine {
    api: Arc<dyn SessionApi>,
    rest_store: Arc<dyn RestStateStore>,
    clock: Arc<dyn Clock>,
    state: EngineState,
}

impl SessionEngine {
    pub fn new(
        api: Arc<dyn SessionApi>,
        rest_store: Arc<dyn RestStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            rest_store,
            clock,
            state: EngineState::default(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Drops the loaded session and every piece of navigation state.
    pub fn reset(&mut self) {
        self.state = EngineState::default();
    }

    //=====================================================================================
    // Loading
    //=====================================================================================

    /// Starts a new session of `workout_id` and lands on the overview.
    ///
    /// A `SessionAlreadyActive` error carries the id of the session to resume instead.
    pub async fn start_session(&mut self, workout_id: Uuid) -> EngineResult<()> {
        let bundle = self.api.start_session(workout_id).await?;
        info!(session_id = %bundle.session.id, %workout_id, "Session started.");
        self.clear_rest_state();
        self.apply_bundle(bundle, None);
        Ok(())
    }

    /// Loads a persisted session and recomputes where the user left off.
    pub async fn load_session(&mut self, session_id: Uuid) -> EngineResult<()> {
        let bundle = self.api.get_session(session_id).await?;
        self.apply_bundle(bundle, None);
        info!(
            %session_id,
            screen = %self.state.position.screen,
            "Session loaded."
        );
        Ok(())
    }

    /// Full resync from the server after a change of row identity (substitute,
    /// reorder, set deletion). An in-flight countdown is saved first and
    /// restored after. A workout that has left the overview never returns to it.
    async fn reload_preserving_rest(&mut self) -> EngineResult<()> {
        let session_id = self.session_id()?;
        let anchor = self.current_exercise().map(|e| e.id);
        let was_paused = self.state.timer.is_paused();
        let started = self.state.position.screen != Screen::Overview;
        self.persist_rest_state();
        let bundle = self.api.get_session(session_id).await?;
        self.apply_bundle(bundle, anchor);
        if started && self.state.position.screen == Screen::Overview {
            let next = self
                .state
                .session
                .as_ref()
                .and_then(|s| navigation::next_position(&active_exercises(s)));
            if let Some(position) = next {
                self.set_position(position);
            }
        }
        if was_paused {
            self.state.timer.pause(self.clock.now());
        }
        debug!(%session_id, screen = %self.state.position.screen, "Session reloaded.");
        Ok(())
    }

    fn apply_bundle(&mut self, bundle: SessionBundle, anchor: Option<Uuid>) {
        let SessionBundle {
            session,
            last_session,
        } = bundle;

        let same_session = self.state.session.as_ref().map(|s| s.id) == Some(session.id);
        if same_session {
            self.state
                .pending_results
                .retain(|id, _| session.exercise(*id).is_some_and(|e| e.is_active()));
        } else {
            self.state.pending_results.clear();
            self.state.last_performance.clear();
        }
        self.state.timer.stop();

        let terminal = session.status.is_terminal();
        let active = active_exercises(&session);
        let mut position = if terminal {
            Position::at(Screen::Summary)
        } else {
            navigation::resume_position(&active)
        };

        if !terminal {
            if let Some(rest) = self.take_valid_rest_state(&session) {
                position = rest.position;
                if let Some(index) = anchor.and_then(|id| navigation::index_of(&active, id)) {
                    position.exercise_index = index;
                }
                position.superset_exercise_ids =
                    navigation::superset_ids(&active, position.exercise_index);
                position.superset_position = position
                    .superset_exercise_ids
                    .iter()
                    .position(|id| Some(*id) == active.get(position.exercise_index).map(|e| e.id))
                    .unwrap_or(0);
                self.state
                    .timer
                    .restore(self.clock.now(), rest.rest_end_at, rest.rest_duration);
            }
        } else {
            self.clear_rest_state();
        }

        self.state.position = position;
        self.state.session = Some(session);
        self.state.last_session = last_session;
        if self.state.timer.is_active() {
            self.persist_rest_state();
        }
    }

    //=====================================================================================
    // Rest-State Persistence
    //=====================================================================================

    /// Returns the stored snapshot only if it belongs to `session`, its deadline
    /// is still ahead, and it points inside the active list. Anything else is
    /// cleared silently.
    fn take_valid_rest_state(&self, session: &Session) -> Option<RestState> {
        let stored = match self.rest_store.load() {
            Ok(stored) => stored?,
            Err(e) => {
                warn!("Failed to read rest state: {:?}", e);
                return None;
            }
        };

        let active_len = active_exercises(session).len();
        let valid = stored.session_id == session.id
            && stored.rest_end_at > self.clock.now()
            && stored.position.screen.is_resting()
            && stored.position.exercise_index < active_len;
        if valid {
            Some(stored)
        } else {
            debug!(
                stored_session_id = %stored.session_id,
                session_id = %session.id,
                "Discarding stale rest state."
            );
            self.clear_rest_state();
            None
        }
    }

    /// Writes the navigation snapshot while a countdown is running or paused.
    fn persist_rest_state(&self) {
        let Some(session) = self.state.session.as_ref() else {
            return;
        };
        if !self.state.position.screen.is_resting() {
            return;
        }
        let Some(rest_end_at) = self.state.timer.deadline(self.clock.now()) else {
            return;
        };
        let snapshot = RestState {
            session_id: session.id,
            position: self.state.position.clone(),
            rest_end_at,
            rest_duration: self.state.timer.duration(),
        };
        if let Err(e) = self.rest_store.save(&snapshot) {
            warn!("Failed to persist rest state: {:?}", e);
        }
    }

    fn clear_rest_state(&self) {
        if let Err(e) = self.rest_store.clear() {
            warn!("Failed to clear rest state: {:?}", e);
        }
    }

    //=====================================================================================
    // Internal Helpers
    //=====================================================================================

    fn session_id(&self) -> EngineResult<Uuid> {
        self.state
            .session
            .as_ref()
            .map(|s| s.id)
            .ok_or(EngineError::NoSession)
    }

    fn require_screen(&self, allowed: &[Screen], action: &'static str) -> EngineResult<()> {
        if self.state.session.is_none() {
            return Err(EngineError::NoSession);
        }
        let screen = self.state.position.screen;
        if allowed.contains(&screen) {
            Ok(())
        } else {
            Err(EngineError::InvalidState { screen, action })
        }
    }

    fn set_position(&mut self, position: Position) {
        if position.screen != self.state.position.screen {
            info!(
                from = %self.state.position.screen,
                to = %position.screen,
                exercise_index = position.exercise_index,
                set_index = position.set_index,
                "Screen transition."
            );
        }
        self.state.position = position;
    }
}
