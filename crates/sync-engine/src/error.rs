// crates/sync-engine/src/error.rs
//! Error types for the sync queue and remote dispatch

use crate::types::EntityType;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for queue store operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for a single remote sync attempt
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the durable queue store
///
/// Every variant means the requested mutation did not happen: the in-memory
/// queue still equals the last persisted state.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Failed to read a persisted queue file
    #[error("Failed to read queue file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a persisted queue file
    #[error("Failed to write queue file at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Persisted queue could not be decoded
    #[error("Corrupt queue file at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Queue could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the write
    #[error("Persistence backend unavailable: {0}")]
    Unavailable(String),

    /// An item with this id is already queued
    #[error("Sync item already queued: {0}")]
    DuplicateId(String),

    /// No item with this id
    #[error("Sync item not found: {0}")]
    NotFound(String),

    /// Patch tried to move the retry counter backwards
    #[error("Retry count for {id} cannot decrease from {current} to {requested}")]
    RetryCountDecrease {
        id: String,
        current: u32,
        requested: u32,
    },

    /// Internal lock was poisoned by a panicking writer
    #[error("Queue lock poisoned")]
    LockPoisoned,
}

/// Errors returned by remote store adapters and entity handlers
///
/// The engine only cares about [`SyncError::is_retryable`]: retryable failures
/// leave the item queued, terminal ones abandon it immediately.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level failure, including going offline mid-call
    #[error("Network error: {0}")]
    Network(String),

    /// Remote call exceeded the adapter timeout
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Remote store rejected the entity
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Remote store already holds a conflicting entity
    #[error("Remote conflict: {0}")]
    Conflict(String),

    /// Payload is missing data the handler needs
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No handler registered for the entity type
    #[error("No handler registered for entity type {0}")]
    UnsupportedEntity(EntityType),

    /// A completed sub-step result could not be saved locally
    #[error("Failed to checkpoint step '{step}': {source}")]
    Checkpoint {
        step: String,
        #[source]
        source: QueueError,
    },
}

impl SyncError {
    /// Returns true if the item should stay queued for another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Timeout(_) | SyncError::Checkpoint { .. }
        )
    }

    /// Returns true if no amount of retrying can fix this failure
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }
}

impl From<heirloom_resilience::ResilienceError> for SyncError {
    fn from(err: heirloom_resilience::ResilienceError) -> Self {
        match err {
            heirloom_resilience::ResilienceError::Elapsed { limit } => SyncError::Timeout(limit),
        }
    }
}
