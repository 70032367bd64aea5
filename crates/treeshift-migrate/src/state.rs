//! Durable migration checkpoints.
//!
//! The statefile maps source ids to destination ids:
//!
//! ```json
//! {"group":{"12":{"id":401}},"project":{"77":{"id":958,"done":true}}}
//! ```
//!
//! A project entry with `done: false` marks a destination project whose
//! content is known to be incomplete. It is never treated as migrated.

use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checkpoint for a created destination group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub id: u64,
}

/// Checkpoint for a destination project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub id: u64,
    pub done: bool,
}

/// Everything the engine knows about prior progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    #[serde(default)]
    pub group: BTreeMap<u64, GroupEntry>,
    #[serde(default)]
    pub project: BTreeMap<u64, ProjectEntry>,
}

impl MigrationState {
    /// Destination id of an already created group.
    pub fn group_dest(&self, source_id: u64) -> Option<u64> {
        self.group.get(&source_id).map(|entry| entry.id)
    }

    /// Checkpoint of a project, if any.
    pub fn project_entry(&self, source_id: u64) -> Option<ProjectEntry> {
        self.project.get(&source_id).copied()
    }

    pub fn record_group(&mut self, source_id: u64, dest_id: u64) {
        self.group.insert(source_id, GroupEntry { id: dest_id });
    }

    /// Record a freshly created, still empty destination project.
    pub fn record_pending_project(&mut self, source_id: u64, dest_id: u64) {
        self.project.insert(
            source_id,
            ProjectEntry {
                id: dest_id,
                done: false,
            },
        );
    }

    /// Flag a project as completely filled. Returns false if it was never recorded.
    pub fn mark_project_done(&mut self, source_id: u64) -> bool {
        match self.project.get_mut(&source_id) {
            Some(entry) => {
                entry.done = true;
                true
            }
            None => false,
        }
    }

    pub fn forget_project(&mut self, source_id: u64) -> Option<ProjectEntry> {
        self.project.remove(&source_id)
    }
}

/// How the statefile was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreMode {
    ReadWrite,
    /// Dry runs record no progress; the file is only ever opened for appending.
    AppendOnly,
}

/// Reads and writes the statefile.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    mode: StoreMode,
    _append_handle: Option<File>,
}

impl StateStore {
    /// Open a store that persists every checkpoint.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: StoreMode::ReadWrite,
            _append_handle: None,
        }
    }

    /// Open a store for a dry run: the file is opened append-only and never rewritten.
    pub fn open_append_only(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let handle = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            path,
            mode: StoreMode::AppendOnly,
            _append_handle: Some(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted state, or an empty state when there is none.
    ///
    /// A statefile that exists but cannot be parsed is fatal: prior progress
    /// is never guessed.
    pub fn load(&self) -> Result<MigrationState> {
        let mut raw = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut raw)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No statefile, starting fresh");
                return Ok(MigrationState::default());
            }
            Err(e) => return Err(self.corrupt(e.to_string())),
        }

        // A dry run may leave an empty file behind.
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(MigrationState::default());
        }

        serde_json::from_slice(&raw).map_err(|e| self.corrupt(e.to_string()))
    }

    /// Write `state` so that a later `load`, even after a crash, observes
    /// exactly it.
    ///
    /// The JSON is written to a sibling file that is truncated, written,
    /// flushed and synced, then renamed over the statefile; the directory is
    /// synced last so the rename itself survives power loss.
    pub fn persist(&self, state: &MigrationState) -> Result<()> {
        if self.mode == StoreMode::AppendOnly {
            debug!("Dry run, checkpoint not written");
            return Ok(());
        }

        let bytes = serde_json::to_vec(state)?;
        let tmp_path = self.tmp_path();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path)?;
        fsync_dir(self.parent_dir())?;

        debug!(
            groups = state.group.len(),
            projects = state.project.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn corrupt(&self, reason: String) -> MigrationError {
        MigrationError::CorruptState {
            path: self.path.display().to_string(),
            reason,
        }
    }
}

/// Sync a directory so that renames inside it are durable.
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
