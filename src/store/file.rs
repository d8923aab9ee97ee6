//! File-backed snapshot persistence with atomic writes.
//!
//! Snapshots live under `dirs::data_dir()/<namespace>/snapshot.json`.
//! Writes go through a temp file + rename so a crash mid-write never
//! leaves a torn snapshot behind.

use crate::store::snapshot::Snapshot;
use crate::ScriptGateError;
use std::fs;
use std::path::PathBuf;

const SNAPSHOT_FILE: &str = "snapshot.json";

/// File-backed snapshot store.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a snapshot store under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, ScriptGateError> {
        let base_dir = dirs::data_dir().ok_or_else(|| {
            ScriptGateError::SnapshotIO("Could not find data directory".to_string())
        })?;
        Self::with_path(base_dir.join(namespace))
    }

    /// Create a snapshot store at a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, ScriptGateError> {
        fs::create_dir_all(&dir).map_err(|e| {
            ScriptGateError::SnapshotIO(format!("Failed to create snapshot dir: {}", e))
        })?;
        Ok(Self { dir })
    }

    /// Save a snapshot atomically (temp file + rename).
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), ScriptGateError> {
        let target = self.dir.join(SNAPSHOT_FILE);
        let temp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));

        let json = snapshot.to_json()?;
        fs::write(&temp, &json).map_err(|e| {
            ScriptGateError::SnapshotIO(format!("Failed to write temp file: {}", e))
        })?;
        fs::rename(&temp, &target).map_err(|e| {
            ScriptGateError::SnapshotIO(format!("Failed to rename snapshot file: {}", e))
        })?;
        Ok(())
    }

    /// Load the stored snapshot, if any.
    pub fn load(&self) -> Result<Option<Snapshot>, ScriptGateError> {
        let path = self.dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|e| {
            ScriptGateError::SnapshotIO(format!("Failed to read snapshot file: {}", e))
        })?;
        Ok(Some(Snapshot::from_json(&json)?))
    }

    /// Delete the stored snapshot if present.
    pub fn clear(&self) -> Result<(), ScriptGateError> {
        let path = self.dir.join(SNAPSHOT_FILE);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                ScriptGateError::SnapshotIO(format!("Failed to delete snapshot: {}", e))
            })?;
        }
        Ok(())
    }
}
