// crates/sync-engine/src/persistence.rs
//! Persistence backends for the sync queue
//!
//! This module handles durable storage of queue state with:
//! - A swappable backend trait
//! - An in-memory backend for tests and ephemeral sessions
//! - A JSON file backend with atomic writes (temp file + rename)

use crate::error::{QueueError, QueueResult};
use crate::types::{AbandonedItem, SyncItem};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// File name of the pending queue inside a data directory
pub const QUEUE_FILE: &str = "queue.json";

/// File name of the abandoned list inside a data directory
pub const ABANDONED_FILE: &str = "abandoned.json";

/// Storage backend for the queue store
///
/// Each save replaces the whole collection. A save that returns `Ok` must be
/// durable; a save that returns `Err` must leave the previous state intact.
pub trait QueuePersistence: Send + Sync {
    /// Loads the pending queue in FIFO order
    fn load_pending(&self) -> QueueResult<Vec<SyncItem>>;

    /// Replaces the pending queue
    fn save_pending(&self, items: &[SyncItem]) -> QueueResult<()>;

    /// Loads abandoned items
    fn load_abandoned(&self) -> QueueResult<Vec<AbandonedItem>>;

    /// Replaces abandoned items
    fn save_abandoned(&self, items: &[AbandonedItem]) -> QueueResult<()>;
}

#[derive(Default)]
struct MemoryState {
    pending: Vec<SyncItem>,
    abandoned: Vec<AbandonedItem>,
    fail_writes: bool,
    pending_failures: usize,
    abandoned_failures: usize,
    writes: usize,
}

impl MemoryState {
    /// Consumes one scheduled failure from `budget`, if any
    fn refuse(fail_writes: bool, budget: &mut usize) -> QueueResult<()> {
        if fail_writes {
            return Err(QueueError::Unavailable("simulated write failure".to_string()));
        }
        if *budget > 0 {
            *budget -= 1;
            return Err(QueueError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory backend
///
/// Clones share the same storage, so handing a clone to a second
/// [`QueueStore`](crate::QueueStore) simulates a process restart.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPersistence {
    /// Creates an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail until reset
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }

    /// Makes the next `n` pending-queue saves fail; abandoned saves still work
    pub fn fail_next_pending_saves(&self, n: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.pending_failures = n;
        }
    }

    /// Makes the next `n` abandoned-list saves fail; pending saves still work
    pub fn fail_next_abandoned_saves(&self, n: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.abandoned_failures = n;
        }
    }

    /// Number of successful saves so far
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> QueueResult<T>) -> QueueResult<T> {
        let mut state = self.state.lock().map_err(|_| QueueError::LockPoisoned)?;
        f(&mut state)
    }
}

impl QueuePersistence for MemoryPersistence {
    fn load_pending(&self) -> QueueResult<Vec<SyncItem>> {
        self.with_state(|s| Ok(s.pending.clone()))
    }

    fn save_pending(&self, items: &[SyncItem]) -> QueueResult<()> {
        self.with_state(|s| {
            MemoryState::refuse(s.fail_writes, &mut s.pending_failures)?;
            s.pending = items.to_vec();
            s.writes += 1;
            Ok(())
        })
    }

    fn load_abandoned(&self) -> QueueResult<Vec<AbandonedItem>> {
        self.with_state(|s| Ok(s.abandoned.clone()))
    }

    fn save_abandoned(&self, items: &[AbandonedItem]) -> QueueResult<()> {
        self.with_state(|s| {
            MemoryState::refuse(s.fail_writes, &mut s.abandoned_failures)?;
            s.abandoned = items.to_vec();
            s.writes += 1;
            Ok(())
        })
    }
}

/// JSON file backend rooted at a data directory
///
/// `queue.json` holds the pending queue as a single JSON array; `abandoned.json`
/// holds abandoned items. Missing files read as empty collections. Empty or
/// unparsable files are reported as [`QueueError::Corrupt`] rather than
/// treated as empty, so a damaged queue is never silently discarded.
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    /// Opens a backend in `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> QueueResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| QueueError::Write {
                path: dir.clone(),
                source: e,
            })?;
            log::info!("Created queue directory: {}", dir.display());
        }
        Ok(Self { dir })
    }

    /// Returns the data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the pending queue file
    pub fn queue_path(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE)
    }

    /// Path of the abandoned items file
    pub fn abandoned_path(&self) -> PathBuf {
        self.dir.join(ABANDONED_FILE)
    }

    fn read_collection<T: DeserializeOwned>(&self, path: &Path) -> QueueResult<Vec<T>> {
        if !path.exists() {
            log::debug!("Queue file {} not found, starting empty", path.display());
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| QueueError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        if contents.trim().is_empty() {
            return Err(QueueError::Corrupt {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        serde_json::from_str(&contents).map_err(|e| QueueError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn write_collection<T: Serialize>(&self, path: &Path, items: &[T]) -> QueueResult<()> {
        let json = serde_json::to_string_pretty(items)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| QueueError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        let write_err = |e| QueueError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        temp_file.write_all(json.as_bytes()).map_err(write_err)?;
        temp_file.as_file().sync_all().map_err(write_err)?;

        temp_file.persist(path).map_err(|e| QueueError::Write {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        log::debug!("Persisted {} entries to {}", items.len(), path.display());
        Ok(())
    }
}

impl QueuePersistence for JsonFilePersistence {
    fn load_pending(&self) -> QueueResult<Vec<SyncItem>> {
        self.read_collection(&self.queue_path())
    }

    fn save_pending(&self, items: &[SyncItem]) -> QueueResult<()> {
        self.write_collection(&self.queue_path(), items)
    }

    fn load_abandoned(&self) -> QueueResult<Vec<AbandonedItem>> {
        self.read_collection(&self.abandoned_path())
    }

    fn save_abandoned(&self, items: &[AbandonedItem]) -> QueueResult<()> {
        self.write_collection(&self.abandoned_path(), items)
    }
}
