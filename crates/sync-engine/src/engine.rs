// crates/sync-engine/src/engine.rs
//! Queue reconciler
//!
//! A drain is one FIFO pass over a snapshot of the queue. Items are attempted
//! one at a time; each remote call is bounded by the configured timeout. A
//! failing item is recorded and the pass moves on, so one bad item never
//! blocks the rest of the queue.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{QueueResult, SyncResult};
use crate::remote::{HandlerRegistry, SyncContext};
use crate::store::QueueStore;
use crate::types::{
    AbandonReason, EntityType, QueueStatus, SyncItem, SyncItemPatch, DEFAULT_MAX_RETRIES,
};
use chrono::{DateTime, Utc};
use heirloom_resilience::{RetryPolicy, Timeout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts before an item is abandoned
    pub max_retries: u32,
    /// Upper bound on a single remote call
    pub call_timeout: Duration,
    /// Spacing between automatic passes while items are still retrying
    pub backoff: RetryPolicy,
    /// Whether `enqueue` wakes the auto-sync task when online
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            call_timeout: Duration::from_secs(30),
            backoff: RetryPolicy::new(DEFAULT_MAX_RETRIES as usize)
                .with_initial_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(30)),
            auto_sync: true,
        }
    }
}

/// How a drain request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Every item in the snapshot was attempted
    Completed,
    /// Skipped: offline
    Offline,
    /// Skipped: another drain was running
    AlreadyRunning,
    /// Connectivity dropped mid-pass; remaining items were not attempted
    Interrupted,
    /// The queue could not be read; nothing was attempted
    StoreUnavailable,
}

/// Outcome counts of one drain request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub status: DrainStatus,
    /// Items handed to a handler
    pub attempted: usize,
    /// Items confirmed and removed
    pub synced: usize,
    /// Items left queued for a later pass
    pub retrying: usize,
    /// Items moved to the abandoned list
    pub abandoned: usize,
    /// Outcomes that could not be recorded locally
    pub store_errors: usize,
}

impl DrainReport {
    fn new(status: DrainStatus) -> Self {
        Self {
            status,
            attempted: 0,
            synced: 0,
            retrying: 0,
            abandoned: 0,
            store_errors: 0,
        }
    }

    /// Returns true if the request performed a pass
    pub fn ran(&self) -> bool {
        matches!(
            self.status,
            DrainStatus::Completed | DrainStatus::Interrupted
        )
    }
}

/// Clears the in-progress flag when a drain ends, however it ends
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Offline-first synchronization engine
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<QueueStore>,
    registry: HandlerRegistry,
    monitor: Arc<ConnectivityMonitor>,
    timeout: Timeout,
    draining: AtomicBool,
    last_drain: Mutex<Option<DateTime<Utc>>>,
    wake: Notify,
}

impl SyncEngine {
    /// Creates a new sync engine
    pub fn new(
        config: SyncConfig,
        store: Arc<QueueStore>,
        registry: HandlerRegistry,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let timeout = Timeout::new(config.call_timeout);
        Self {
            config,
            store,
            registry,
            monitor,
            timeout,
            draining: AtomicBool::new(false),
            last_drain: Mutex::new(None),
            wake: Notify::new(),
        }
    }

    /// The queue store backing this engine
    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    /// The connectivity monitor driving this engine
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Queues a submission that could not be confirmed immediately
    ///
    /// Returns once the item is persisted.
    pub fn enqueue(
        &self,
        entity_type: EntityType,
        payload: serde_json::Value,
    ) -> QueueResult<SyncItem> {
        let item = SyncItem::new(entity_type, payload);
        self.store.enqueue(item.clone())?;
        log::info!("Queued {} item {}", entity_type, item.id);

        if self.config.auto_sync && self.monitor.is_online() {
            self.wake.notify_one();
        }
        Ok(item)
    }

    /// Number of items waiting to sync
    pub fn pending_count(&self) -> QueueResult<usize> {
        self.store.len()
    }

    /// Current connectivity
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Returns true while a drain pass is running
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// When the last pass finished
    pub fn last_drain(&self) -> Option<DateTime<Utc>> {
        self.last_drain.lock().map(|t| *t).unwrap_or(None)
    }

    /// Queue status for status indicators
    pub fn status(&self) -> QueueResult<QueueStatus> {
        let (pending, abandoned) = self.store.counts()?;
        Ok(QueueStatus {
            pending,
            abandoned,
            online: self.is_online(),
            draining: self.is_draining(),
            last_drain: self.last_drain(),
        })
    }

    /// Runs one pass over the queue
    ///
    /// Never fails: every per-item failure is recorded on the item (or counted
    /// in the report when even that is impossible). Calling this while a pass
    /// is already running is a no-op.
    pub async fn drain(&self) -> DrainReport {
        if !self.monitor.is_online() {
            log::debug!("Drain skipped: offline");
            return DrainReport::new(DrainStatus::Offline);
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Drain skipped: already in progress");
            return DrainReport::new(DrainStatus::AlreadyRunning);
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = match self.store.list() {
            Ok(items) => items,
            Err(e) => {
                log::error!("Drain aborted, could not read queue: {}", e);
                let mut report = DrainReport::new(DrainStatus::StoreUnavailable);
                report.store_errors += 1;
                return report;
            }
        };
        let mut report = DrainReport::new(DrainStatus::Completed);

        if !snapshot.is_empty() {
            log::info!("Draining {} queued item(s)", snapshot.len());
        }

        for item in snapshot {
            if !self.monitor.is_online() {
                log::info!("Connectivity lost, stopping drain");
                report.status = DrainStatus::Interrupted;
                break;
            }

            // Budget already spent, e.g. after a lower max_retries or a failed abandon
            if item.is_exhausted(self.config.max_retries) {
                log::warn!(
                    "Item {} has no attempts left ({} of {}), abandoning",
                    item.id,
                    item.retry_count,
                    self.config.max_retries
                );
                self.abandon(item, AbandonReason::RetriesExhausted, &mut report);
                continue;
            }

            report.attempted += 1;
            let result = self.attempt(&item).await;
            self.record_outcome(&item, result, &mut report);
        }

        if let Ok(mut last) = self.last_drain.lock() {
            *last = Some(Utc::now());
        }

        log::info!(
            "Drain finished: {} synced, {} retrying, {} abandoned, {} store error(s)",
            report.synced,
            report.retrying,
            report.abandoned,
            report.store_errors
        );
        report
    }

    async fn attempt(&self, item: &SyncItem) -> SyncResult<()> {
        let mut ctx = SyncContext::new(item, &self.store);
        self.timeout
            .run(self.registry.sync_entity(&mut ctx))
            .await?
    }

    fn record_outcome(&self, item: &SyncItem, result: SyncResult<()>, report: &mut DrainReport) {
        let err = match result {
            Ok(()) => {
                match self.store.remove(&item.id) {
                    Ok(_) => {
                        log::debug!("Synced {} item {}", item.entity_type, item.id);
                        report.synced += 1;
                    }
                    Err(e) => {
                        log::error!(
                            "Item {} synced but could not be removed from the queue: {}",
                            item.id,
                            e
                        );
                        report.store_errors += 1;
                    }
                }
                return;
            }
            Err(err) => err,
        };

        // Checkpoints during the attempt may have changed the stored payload.
        let current = match self.store.get(&item.id) {
            Ok(Some(current)) => current,
            Ok(None) => {
                log::warn!("Item {} vanished from the queue during its attempt", item.id);
                return;
            }
            Err(e) => {
                log::error!("Could not reload item {}: {}", item.id, e);
                report.store_errors += 1;
                return;
            }
        };
        let failed = current.record_failure(&err);

        if err.is_terminal() {
            log::warn!("Item {} rejected: {}", item.id, err);
            self.abandon(failed, AbandonReason::Rejected, report);
        } else if failed.is_exhausted(self.config.max_retries) {
            log::warn!(
                "Item {} failed {} time(s), giving up: {}",
                item.id,
                failed.retry_count,
                err
            );
            self.abandon(failed, AbandonReason::RetriesExhausted, report);
        } else {
            log::debug!(
                "Item {} failed (attempt {} of {}): {}",
                item.id,
                failed.retry_count,
                self.config.max_retries,
                err
            );
            match self.store.update(&item.id, SyncItemPatch::failure_of(&failed)) {
                Ok(_) => report.retrying += 1,
                Err(e) => {
                    log::error!("Could not record failure of item {}: {}", item.id, e);
                    report.store_errors += 1;
                }
            }
        }
    }

    /// Moves `item` to the abandoned list
    ///
    /// If that fails the spent attempt is still written to the pending copy,
    /// so the next pass finds the budget exhausted instead of calling again.
    fn abandon(&self, item: SyncItem, reason: AbandonReason, report: &mut DrainReport) {
        let id = item.id.clone();
        let spent = SyncItemPatch::failure_of(&item);
        let Err(e) = self.store.abandon(item, reason) else {
            report.abandoned += 1;
            return;
        };

        log::error!("Could not abandon item {}: {}", id, e);
        report.store_errors += 1;
        if let Err(e) = self.store.update(&id, spent) {
            log::error!("Could not record spent attempt of item {}: {}", id, e);
        }
    }

    /// Drains repeatedly while items are still retrying, pacing passes with
    /// the backoff policy
    ///
    /// Stops after `backoff.max_attempts()` passes; later work is picked up by
    /// the next reconnect or enqueue.
    pub async fn drain_with_backoff(&self) -> DrainReport {
        let mut pass = 0;
        loop {
            let report = self.drain().await;
            pass += 1;

            if report.status != DrainStatus::Completed || report.retrying == 0 {
                return report;
            }
            if !self.config.backoff.allows_another(pass) {
                log::debug!(
                    "{} item(s) still retrying after {} pass(es), waiting for new work",
                    report.retrying,
                    pass
                );
                return report;
            }

            let delay = self.config.backoff.delay_for_attempt(pass);
            log::debug!(
                "{} item(s) still retrying, next pass in {:?}",
                report.retrying,
                delay
            );
            tokio::time::sleep(delay).await;

            if !self.monitor.is_online() {
                return report;
            }
        }
    }

    /// Spawns the background task that drains on reconnect and on new work
    ///
    /// The task runs until its handle is aborted.
    pub fn start_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut online_rx = self.monitor.subscribe();

        tokio::spawn(async move {
            if engine.is_online() && matches!(engine.pending_count(), Ok(n) if n > 0) {
                engine.drain_with_backoff().await;
            }

            loop {
                tokio::select! {
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            log::debug!("Connectivity monitor gone, stopping auto-sync");
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        if online {
                            engine.drain_with_backoff().await;
                        }
                    }
                    _ = engine.wake.notified() => {
                        engine.drain_with_backoff().await;
                    }
                }
            }
        })
    }
}
