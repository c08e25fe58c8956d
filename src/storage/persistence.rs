use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::ward::{DailyReport, Patient};
use super::StorageError;

/// Table contents as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub daily_reports: Vec<DailyReport>,
}

/// JSON snapshot of the in-memory tables.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SnapshotFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot, or `None` when no file exists yet.
    pub fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Snapshot(format!("Failed to open snapshot: {}", e)))
            }
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|e| StorageError::Snapshot(format!("Failed to read snapshot: {}", e)))?;

        let snapshot = serde_json::from_slice(&buffer)
            .map_err(|e| StorageError::Snapshot(format!("Failed to deserialize snapshot: {}", e)))?;

        Ok(Some(snapshot))
    }

    /// Writes through a temporary file and renames it over the old snapshot.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::Snapshot(format!("Failed to create directory: {}", e)))?;
        }

        let serialized = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StorageError::Snapshot(format!("Serialization failed: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| StorageError::Snapshot(format!("Failed to create file: {}", e)))?;

        file.write_all(&serialized)
            .map_err(|e| StorageError::Snapshot(format!("Failed to write data: {}", e)))?;

        file.sync_all()
            .map_err(|e| StorageError::Snapshot(format!("Failed to sync data: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| StorageError::Snapshot(format!("Failed to rename file: {}", e)))?;

        Ok(())
    }
}
