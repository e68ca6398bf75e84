//! services/runner/src/adapters/clock.rs

use chrono::{DateTime, Utc};
use workout_session_core::ports::Clock;

/// The process wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
