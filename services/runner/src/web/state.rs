//! services/runner/src/web/state.rs
//!
//! Defines the application's shared state: the single engine, the snapshot
//! channel the UI listens on, and the handle of the tick task.

use crate::config::Config;
use crate::web::protocol::SessionSnapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use workout_session_core::SessionEngine;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    /// Every action locks this, so mutations never interleave.
    pub engine: Mutex<SessionEngine>,
    pub config: Arc<Config>,
    snapshots: watch::Sender<SessionSnapshot>,
    in_flight: AtomicUsize,
    /// Cancels the running tick task, if any.
    pub tick_token: Mutex<Option<CancellationToken>>,
    /// Cancelled once on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: SessionEngine, config: Arc<Config>) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::from_engine(&engine, false));
        Self {
            engine: Mutex::new(engine),
            config,
            snapshots,
            in_flight: AtomicUsize::new(0),
            tick_token: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Rebuilds the snapshot from `engine` and pushes it to every listener.
    pub fn publish(&self, engine: &SessionEngine) -> SessionSnapshot {
        let snapshot = SessionSnapshot::from_engine(engine, self.is_submitting());
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    /// Marks an action as in flight until the returned guard drops.
    pub fn begin_submit(&self) -> SubmitGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.snapshots.send_modify(|s| s.is_submitting = true);
        SubmitGuard { state: self }
    }
}

pub struct SubmitGuard<'a> {
    state: &'a AppState,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.state.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.state
            .snapshots
            .send_modify(|s| s.is_submitting = remaining > 0);
    }
}
