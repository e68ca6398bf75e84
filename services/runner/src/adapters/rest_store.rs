//! services/runner/src/adapters/rest_store.rs
//!
//! A `RestStateStore` backed by a single JSON file. The file is the one durable
//! slot; its record carries the owning session id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, io};
use tracing::{debug, warn};
use uuid::Uuid;
use workout_session_core::domain::{Position, RestState, Screen};
use workout_session_core::ports::{PortError, PortResult, RestStateStore};

const SLOT_KEY: &str = "workout-session-rest-state";

#[derive(Debug, Clone)]
pub struct FileRestStateStore {
    path: PathBuf,
}

impl FileRestStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

//=========================================================================================
// File Record
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestStateRecord {
    key: String,
    session_id: Uuid,
    current_screen: String,
    current_exercise_index: usize,
    current_set_index: usize,
    superset_round: usize,
    superset_position: usize,
    #[serde(default)]
    superset_exercise_ids: Vec<Uuid>,
    rest_end_at: DateTime<Utc>,
    rest_duration: u32,
}

impl RestStateRecord {
    fn from_domain(state: &RestState) -> Self {
        Self {
            key: SLOT_KEY.to_string(),
            session_id: state.session_id,
            current_screen: state.position.screen.as_str().to_string(),
            current_exercise_index: state.position.exercise_index,
            current_set_index: state.position.set_index,
            superset_round: state.position.superset_round,
            superset_position: state.position.superset_position,
            superset_exercise_ids: state.position.superset_exercise_ids.clone(),
            rest_end_at: state.rest_end_at,
            rest_duration: state.rest_duration,
        }
    }

    fn to_domain(self) -> Result<RestState, String> {
        if self.key != SLOT_KEY {
            return Err(format!("unexpected slot key '{}'", self.key));
        }
        Ok(RestState {
            session_id: self.session_id,
            position: Position {
                screen: self.current_screen.parse::<Screen>()?,
                exercise_index: self.current_exercise_index,
                set_index: self.current_set_index,
                superset_round: self.superset_round,
                superset_position: self.superset_position,
                superset_exercise_ids: self.superset_exercise_ids,
            },
            rest_end_at: self.rest_end_at,
            rest_duration: self.rest_duration,
        })
    }
}

//=========================================================================================
// `RestStateStore` Trait Implementation
//=========================================================================================

impl RestStateStore for FileRestStateStore {
    /// A missing file is an empty slot. An unreadable record is treated the same
    /// way and removed.
    fn load(&self) -> PortResult<Option<RestState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };

        let parsed = serde_json::from_str::<RestStateRecord>(&raw)
            .map_err(|e| e.to_string())
            .and_then(RestStateRecord::to_domain);
        match parsed {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(path = %self.path.display(), "Discarding unreadable rest state: {}", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Writes through a sibling temp file so a crash never leaves half a record.
    fn save(&self, state: &RestState) -> PortResult<()> {
        let json = serde_json::to_string_pretty(&RestStateRecord::from_domain(state))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| PortError::Unexpected(e.to_string()))?;
        fs::rename(&temp, &self.path).map_err(|e| PortError::Unexpected(e.to_string()))?;
        debug!(session_id = %state.session_id, rest_end_at = %state.rest_end_at, "Rest state saved.");
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}
