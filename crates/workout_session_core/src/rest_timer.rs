//! crates/workout_session_core/src/rest_timer.rs
//!
//! Wall-clock anchored rest countdown. The timer holds an absolute deadline
//! rather than a decrementing counter, so tick jitter never accumulates.

use chrono::{DateTime, Duration, Utc};

/// What a tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown exists.
    Idle,
    Paused,
    Running { remaining: u32 },
    /// The deadline was reached on this tick. Reported once per countdown.
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct RestTimer {
    /// `None` while paused or idle.
    end_at: Option<DateTime<Utc>>,
    duration: u32,
    remaining_ms: i64,
    active: bool,
}

/// Longest countdown the timer holds, in milliseconds. Matches the `u32` duration scale.
const MAX_REMAINING_MS: i64 = u32::MAX as i64 * 1000;

/// `ms` moved by `delta` seconds, saturating and clamped to `0..=MAX_REMAINING_MS`.
fn shifted_ms(ms: i64, delta: i64) -> i64 {
    ms.saturating_add(delta.saturating_mul(1000))
        .clamp(0, MAX_REMAINING_MS)
}

fn ceil_seconds(ms: i64) -> u32 {
    if ms <= 0 {
        0
    } else {
        u32::try_from((ms + 999) / 1000).unwrap_or(u32::MAX)
    }
}

impl RestTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh countdown of `seconds` from `now`.
    pub fn start(&mut self, now: DateTime<Utc>, seconds: u32) {
        self.end_at = Some(now + Duration::seconds(i64::from(seconds)));
        self.duration = seconds;
        self.remaining_ms = i64::from(seconds) * 1000;
        self.active = true;
    }

    /// Re-arms a countdown from a persisted deadline.
    pub fn restore(&mut self, now: DateTime<Utc>, end_at: DateTime<Utc>, duration: u32) {
        self.end_at = Some(end_at);
        self.remaining_ms = (end_at - now).num_milliseconds().max(0);
        self.duration = duration.max(ceil_seconds(self.remaining_ms));
        self.active = true;
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.active && self.end_at.is_none()
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.end_at
    }

    /// Seconds used as the scale of the progress display.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Whole seconds left, rounded up. Reaches 0 only once the deadline has passed.
    pub fn remaining(&self) -> u32 {
        ceil_seconds(self.remaining_ms)
    }

    /// Fraction of the countdown still to go, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if !self.active || self.duration == 0 {
            return 0.0;
        }
        (self.remaining_ms as f64 / (f64::from(self.duration) * 1000.0)).clamp(0.0, 1.0)
    }

    /// The deadline to persist. A paused countdown is stored as if it kept running
    /// from `now`, since the overlay that paused it does not survive a reload.
    pub fn deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.active {
            return None;
        }
        Some(
            self.end_at
                .unwrap_or_else(|| now + Duration::milliseconds(self.remaining_ms)),
        )
    }

    /// Recomputes the remaining time from the deadline. Never increases it.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.active {
            return TickOutcome::Idle;
        }
        let Some(end_at) = self.end_at else {
            return TickOutcome::Paused;
        };
        let left = (end_at - now).num_milliseconds().max(0);
        self.remaining_ms = self.remaining_ms.min(left);
        if self.remaining_ms == 0 {
            self.stop();
            return TickOutcome::Expired;
        }
        TickOutcome::Running {
            remaining: self.remaining(),
        }
    }

    /// Shifts the deadline by `delta` seconds, never before `now`. Grows the
    /// duration when the new remaining time exceeds it; never shrinks it.
    pub fn adjust(&mut self, now: DateTime<Utc>, delta: i64) -> bool {
        if !self.active {
            return false;
        }
        match self.end_at {
            Some(end_at) => {
                let left = (end_at - now).num_milliseconds();
                self.remaining_ms = shifted_ms(left, delta);
                self.end_at = Some(now + Duration::milliseconds(self.remaining_ms));
            }
            None => {
                self.remaining_ms = shifted_ms(self.remaining_ms, delta);
            }
        }
        self.duration = self.duration.max(self.remaining());
        true
    }

    /// Freezes the remaining time. Returns `false` if nothing was running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        let Some(end_at) = self.end_at.filter(|_| self.active) else {
            return false;
        };
        self.remaining_ms = self
            .remaining_ms
            .min((end_at - now).num_milliseconds().max(0));
        self.end_at = None;
        true
    }

    /// Re-anchors the deadline at `now + remaining`.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_paused() {
            return false;
        }
        self.end_at = Some(now + Duration::milliseconds(self.remaining_ms));
        true
    }
}
