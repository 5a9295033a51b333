//! Resume checkpoint persistence.
//!
//! A [`CheckpointStore`] owns a single small JSON record inside the root
//! directory being processed:
//!
//! ```json
//! {"next_file_to_process": "/media/library/b.wav"}
//! ```
//!
//! The record travels with the directory it describes, so several libraries
//! can be processed independently. None of the operations fail: a corrupt or
//! unreadable record is treated as absent, and write failures are only
//! logged, because losing a resume point must never stop an interruption
//! from completing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SubgenError;

/// Hidden file name of the checkpoint record inside the root directory.
pub const CHECKPOINT_FILE_NAME: &str = ".subgen_resume_state.json";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    next_file_to_process: String,
}

/// Load, save, and clear the resume checkpoint for one root directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// The store for `root`, backed by `root/.subgen_resume_state.json`.
    pub fn for_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            path: root.as_ref().join(CHECKPOINT_FILE_NAME),
        }
    }

    /// Location of the record on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a record file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the stored resume path.
    ///
    /// Returns `None` when no record exists, or when it cannot be read or
    /// parsed (a warning is logged in that case).
    pub fn load(&self) -> Option<PathBuf> {
        match self.try_load() {
            Ok(next) => next,
            Err(error) => {
                log::warn!(
                    "Could not read or parse state file '{}': {error}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<PathBuf>, SubgenError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let record: CheckpointRecord = serde_json::from_str(&content)?;
        Ok(Some(PathBuf::from(record.next_file_to_process)))
    }

    /// Record `next` as the item to resume from, replacing any previous
    /// record.
    ///
    /// Returns `false` (after logging a warning) if the record could not be
    /// written.
    pub fn save<P: AsRef<Path>>(&self, next: P) -> bool {
        match self.try_save(next.as_ref()) {
            Ok(()) => {
                log::debug!("Saved resume state to {}", self.path.display());
                true
            }
            Err(error) => {
                log::warn!(
                    "Could not save state file '{}': {error}",
                    self.path.display()
                );
                false
            }
        }
    }

    fn try_save(&self, next: &Path) -> Result<(), SubgenError> {
        let record = CheckpointRecord {
            next_file_to_process: next.to_string_lossy().into_owned(),
        };
        fs::write(&self.path, serde_json::to_string(&record)?)?;
        Ok(())
    }

    /// Remove the record. A missing record is not an error.
    ///
    /// Returns `true` if a record was removed.
    pub fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Resume state file '{}' cleared", self.path.display());
                true
            }
            Err(error) if error.kind() == ErrorKind::NotFound => false,
            Err(error) => {
                log::warn!(
                    "Could not clear state file '{}': {error}",
                    self.path.display()
                );
                false
            }
        }
    }
}
