use super::types::SessionRecord;
use crate::{CoachError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Write through a sibling temp file so a crash never leaves half a file
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CoachError::StorageError(format!("Cannot create {:?}: {}", parent, e))
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .map_err(|e| CoachError::StorageError(format!("Cannot write {:?}: {}", tmp, e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| CoachError::StorageError(format!("Cannot replace {:?}: {}", path, e)))
}

/// Capped, most-recent-first list of session records in a JSON file
///
/// Clones share one write lock, so read-modify-write cycles never interleave.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    cap: usize,
    write_lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap: cap.max(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored records, newest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Insert at the front, dropping the oldest entries past the cap.
    ///
    /// A file that no longer parses is moved aside before a fresh history is
    /// started. If it cannot be moved, nothing is written.
    pub fn prepend(&self, record: SessionRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut records = match self.load() {
            Ok(records) => records,
            Err(CoachError::StorageError(reason)) => {
                let backup = self.backup_unreadable()?;
                warn!(
                    "History {:?} is unreadable ({}), moved to {:?}",
                    self.path, reason, backup
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        records.insert(0, record);
        records.truncate(self.cap);

        let json = serde_json::to_vec_pretty(&records)?;
        write_atomic(&self.path, &json)?;
        debug!("History now holds {} records", records.len());
        Ok(())
    }

    fn backup_unreadable(&self) -> Result<PathBuf> {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S%3f")));
        let backup = PathBuf::from(name);
        fs::rename(&self.path, &backup).map_err(|e| {
            CoachError::StorageError(format!("Cannot move aside {:?}: {}", self.path, e))
        })?;
        Ok(backup)
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Single-slot hand-off of the latest record to the results view
#[derive(Debug, Clone)]
pub struct HandoffSlot {
    path: PathBuf,
}

impl HandoffSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace whatever the slot holds
    pub fn put(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        write_atomic(&self.path, &json)
    }

    /// Read and empty the slot
    pub fn take(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        fs::remove_file(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}
