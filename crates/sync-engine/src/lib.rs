// crates/sync-engine/src/lib.rs
//! Offline-first synchronization engine
//!
//! This module queues locally created records and reconciles them with the
//! remote store once connectivity returns:
//! - Durable FIFO queue with swappable persistence (memory, JSON files)
//! - Connectivity tracking with offline-to-online notifications
//! - Single-flight drain with per-call timeouts and a bounded retry budget
//! - Composite entities (upload, then insert) that resume from checkpoints
//! - Abandoned items kept for inspection and manual retry
//!
//! # Example
//!
//! ```rust
//! use heirloom_sync_engine::{
//!     ConnectivityMonitor, EntityType, HandlerRegistry, MemoryPersistence, QueueStore,
//!     SyncConfig, SyncEngine,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(QueueStore::open(MemoryPersistence::new()).unwrap());
//! let monitor = Arc::new(ConnectivityMonitor::new(false));
//! let engine = SyncEngine::new(SyncConfig::default(), store, HandlerRegistry::new(), monitor);
//!
//! // Offline: the photo waits in the queue
//! engine
//!     .enqueue(
//!         EntityType::Photo,
//!         serde_json::json!({"attachment": "/photos/picnic.jpg", "record": {"caption": "Picnic"}}),
//!     )
//!     .unwrap();
//!
//! assert!(!engine.is_online());
//! assert_eq!(engine.pending_count().unwrap(), 1);
//! ```

mod connectivity;
mod engine;
mod error;
mod persistence;
mod remote;
mod store;
mod types;

pub use connectivity::{ConnectivityMonitor, Transition};
pub use engine::{DrainReport, DrainStatus, SyncConfig, SyncEngine};
pub use error::{QueueError, QueueResult, SyncError, SyncResult};
pub use persistence::{
    JsonFilePersistence, MemoryPersistence, QueuePersistence, ABANDONED_FILE, QUEUE_FILE,
};
pub use remote::{
    EntityHandler, HandlerRegistry, InsertRecord, RemoteStore, SyncContext, UploadThenInsert,
    UPLOADED_URL_KEY,
};
pub use store::QueueStore;
pub use heirloom_resilience::RetryPolicy;
pub use types::{
    AbandonReason, AbandonedItem, EntityType, QueueStatus, SyncItem, SyncItemPatch,
    DEFAULT_MAX_RETRIES,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_all_exports_accessible() {
        let store = Arc::new(QueueStore::open(MemoryPersistence::new()).unwrap());
        let monitor = Arc::new(ConnectivityMonitor::default());
        let _: SyncConfig = SyncConfig::default();
        let _: SyncEngine =
            SyncEngine::new(SyncConfig::default(), store, HandlerRegistry::new(), monitor);
    }
}
