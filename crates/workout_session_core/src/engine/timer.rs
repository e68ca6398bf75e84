//! Rest-timer actions. None of these call the remote API.

use tracing::{debug, info};

use super::{EngineError, EngineResult, SessionEngine};
use crate::domain::{Position, Screen, SessionStatus};
use crate::navigation::{self, active_exercises};
use crate::rest_timer::TickOutcome;

impl SessionEngine {
    /// Advances the countdown from the wall clock. Called about once a second.
    /// Expiry takes the same path as [`SessionEngine::skip_rest`].
    pub fn tick(&mut self) -> TickOutcome {
        let in_progress = self
            .state
            .session
            .as_ref()
            .is_some_and(|s| s.status == SessionStatus::InProgress);
        if !in_progress {
            return TickOutcome::Idle;
        }
        let outcome = self.state.timer.tick(self.clock.now());
        if outcome == TickOutcome::Expired && self.state.position.screen.is_resting() {
            debug!(screen = %self.state.position.screen, "Rest countdown expired.");
            self.advance_after_rest();
        }
        outcome
    }

    /// Ends the current countdown early.
    pub fn skip_rest(&mut self) -> EngineResult<()> {
        if self.state.session.is_none() {
            return Err(EngineError::NoSession);
        }
        let screen = self.state.position.screen;
        if !screen.is_resting() {
            return Err(EngineError::InvalidState {
                screen,
                action: "skip rest",
            });
        }
        self.advance_after_rest();
        Ok(())
    }

    /// Moves from a countdown screen to the first incomplete set, or to the
    /// summary when nothing is left.
    fn advance_after_rest(&mut self) {
        self.state.timer.stop();
        self.clear_rest_state();
        let next = self
            .state
            .session
            .as_ref()
            .and_then(|session| navigation::next_position(&active_exercises(session)));
        match next {
            Some(position) => self.set_position(position),
            None => {
                info!("All exercises finished.");
                self.set_position(Position::at(Screen::Summary));
            }
        }
    }

    /// Shifts the countdown by `delta` seconds, never ending before now.
    pub fn adjust_rest_time(&mut self, delta: i64) -> EngineResult<()> {
        if !self.state.timer.adjust(self.clock.now(), delta) {
            return Err(EngineError::InvalidState {
                screen: self.state.position.screen,
                action: "adjust rest time",
            });
        }
        self.persist_rest_state();
        Ok(())
    }

    /// Freezes the countdown while an overlay hides it.
    pub fn pause_timer(&mut self) -> bool {
        let paused = self.state.timer.pause(self.clock.now());
        if paused {
            self.persist_rest_state();
        }
        paused
    }

    pub fn resume_timer(&mut self) -> bool {
        let resumed = self.state.timer.resume(self.clock.now());
        if resumed {
            self.persist_rest_state();
        }
        resumed
    }
}
