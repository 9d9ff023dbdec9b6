// crates/sync-engine/src/store.rs
//! Durable queue store
//!
//! The store owns the only shared mutable state in the subsystem. Every
//! mutation follows the same shape: build the next state from a copy, persist
//! it, then publish it. Readers hold a shared lock and therefore only ever see
//! whole, persisted snapshots.

use crate::error::{QueueError, QueueResult};
use crate::persistence::QueuePersistence;
use crate::types::{AbandonReason, AbandonedItem, SyncItem, SyncItemPatch};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<SyncItem>,
    abandoned: Vec<AbandonedItem>,
}

/// Durable FIFO queue of pending sync items plus the abandoned list
pub struct QueueStore {
    backend: Box<dyn QueuePersistence>,
    state: RwLock<QueueState>,
}

impl QueueStore {
    /// Opens a store, re-hydrating from the backend
    ///
    /// Items that appear in both lists (a crash between the two writes of
    /// [`QueueStore::abandon`]) are treated as abandoned.
    pub fn open(backend: impl QueuePersistence + 'static) -> QueueResult<Self> {
        let mut pending = backend.load_pending()?;
        let abandoned = backend.load_abandoned()?;

        let abandoned_ids: HashSet<&str> = abandoned.iter().map(|a| a.item.id.as_str()).collect();
        let before = pending.len();
        pending.retain(|item| !abandoned_ids.contains(item.id.as_str()));
        if pending.len() != before {
            log::warn!(
                "Dropped {} pending item(s) already recorded as abandoned",
                before - pending.len()
            );
        }

        let mut seen = HashSet::new();
        pending.retain(|item| seen.insert(item.id.clone()));

        log::info!(
            "Queue store opened with {} pending and {} abandoned item(s)",
            pending.len(),
            abandoned.len()
        );

        Ok(Self {
            backend: Box::new(backend),
            state: RwLock::new(QueueState { pending, abandoned }),
        })
    }

    fn read(&self) -> QueueResult<RwLockReadGuard<'_, QueueState>> {
        self.state.read().map_err(|_| QueueError::LockPoisoned)
    }

    fn write(&self) -> QueueResult<RwLockWriteGuard<'_, QueueState>> {
        self.state.write().map_err(|_| QueueError::LockPoisoned)
    }

    /// Appends an item to the tail of the queue
    pub fn enqueue(&self, item: SyncItem) -> QueueResult<()> {
        let mut state = self.write()?;
        if state.pending.iter().any(|i| i.id == item.id)
            || state.abandoned.iter().any(|a| a.item.id == item.id)
        {
            return Err(QueueError::DuplicateId(item.id));
        }

        let mut next = state.pending.clone();
        next.push(item);
        self.backend.save_pending(&next)?;
        state.pending = next;

        log::debug!("Enqueued item, {} pending", state.pending.len());
        Ok(())
    }

    /// Ordered snapshot of the pending queue
    pub fn list(&self) -> QueueResult<Vec<SyncItem>> {
        Ok(self.read()?.pending.clone())
    }

    /// Looks up a pending item
    pub fn get(&self, id: &str) -> QueueResult<Option<SyncItem>> {
        Ok(self.read()?.pending.iter().find(|i| i.id == id).cloned())
    }

    /// Number of pending items
    pub fn len(&self) -> QueueResult<usize> {
        Ok(self.read()?.pending.len())
    }

    /// Returns true if nothing is pending
    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Applies a patch to a pending item and persists it
    pub fn update(&self, id: &str, patch: SyncItemPatch) -> QueueResult<SyncItem> {
        let mut state = self.write()?;
        let index = position(&state.pending, id)?;
        let current = &state.pending[index];

        if let Some(requested) = patch.retry_count {
            if requested < current.retry_count {
                return Err(QueueError::RetryCountDecrease {
                    id: id.to_string(),
                    current: current.retry_count,
                    requested,
                });
            }
        }

        let updated = current.apply(patch);
        let mut next = state.pending.clone();
        next[index] = updated.clone();
        self.backend.save_pending(&next)?;
        state.pending = next;

        Ok(updated)
    }

    /// Removes a pending item and persists the queue
    pub fn remove(&self, id: &str) -> QueueResult<SyncItem> {
        let mut state = self.write()?;
        let index = position(&state.pending, id)?;

        let mut next = state.pending.clone();
        let removed = next.remove(index);
        self.backend.save_pending(&next)?;
        state.pending = next;

        Ok(removed)
    }

    /// Moves a pending item to the abandoned list
    ///
    /// `item` is the final version of the item (with its last retry
    /// bookkeeping). The abandoned list is written before the pending queue.
    pub fn abandon(&self, item: SyncItem, reason: AbandonReason) -> QueueResult<AbandonedItem> {
        let mut state = self.write()?;
        let index = position(&state.pending, &item.id)?;

        let record = AbandonedItem::new(item, reason);
        let mut next_abandoned = state.abandoned.clone();
        next_abandoned.push(record.clone());
        self.backend.save_abandoned(&next_abandoned)?;

        let mut next_pending = state.pending.clone();
        next_pending.remove(index);
        if let Err(e) = self.backend.save_pending(&next_pending) {
            self.rollback_abandoned(&state.abandoned);
            return Err(e);
        }

        state.abandoned = next_abandoned;
        state.pending = next_pending;

        log::warn!(
            "Abandoned {} item {} ({}): {}",
            record.item.entity_type,
            record.item.id,
            reason,
            record.item.last_error.as_deref().unwrap_or("no error recorded")
        );
        Ok(record)
    }

    /// Snapshot of abandoned items
    pub fn abandoned(&self) -> QueueResult<Vec<AbandonedItem>> {
        Ok(self.read()?.abandoned.clone())
    }

    /// Pending and abandoned counts taken from one snapshot
    pub fn counts(&self) -> QueueResult<(usize, usize)> {
        let state = self.read()?;
        Ok((state.pending.len(), state.abandoned.len()))
    }

    /// Number of abandoned items
    pub fn abandoned_len(&self) -> QueueResult<usize> {
        Ok(self.read()?.abandoned.len())
    }

    /// Moves an abandoned item back to the tail of the queue for a manual retry
    ///
    /// The retry budget starts over: this is a new lifecycle for the item.
    pub fn requeue_abandoned(&self, id: &str) -> QueueResult<SyncItem> {
        let mut state = self.write()?;
        let index = state
            .abandoned
            .iter()
            .position(|a| a.item.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let revived = SyncItem {
            retry_count: 0,
            last_error: None,
            ..state.abandoned[index].item.clone()
        };

        // Pending first: a crash in between leaves the item abandoned, which
        // `open` resolves by dropping the pending copy.
        let mut next_pending = state.pending.clone();
        next_pending.push(revived.clone());
        self.backend.save_pending(&next_pending)?;

        let mut next_abandoned = state.abandoned.clone();
        next_abandoned.remove(index);
        if let Err(e) = self.backend.save_abandoned(&next_abandoned) {
            self.rollback_pending(&state.pending);
            return Err(e);
        }

        state.pending = next_pending;
        state.abandoned = next_abandoned;

        log::info!("Requeued abandoned item {}", id);
        Ok(revived)
    }

    /// Permanently deletes an abandoned item
    pub fn discard_abandoned(&self, id: &str) -> QueueResult<AbandonedItem> {
        let mut state = self.write()?;
        let index = state
            .abandoned
            .iter()
            .position(|a| a.item.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let mut next = state.abandoned.clone();
        let removed = next.remove(index);
        self.backend.save_abandoned(&next)?;
        state.abandoned = next;

        log::info!("Discarded abandoned item {}", id);
        Ok(removed)
    }

    fn rollback_abandoned(&self, previous: &[AbandonedItem]) {
        if let Err(e) = self.backend.save_abandoned(previous) {
            log::error!("Failed to roll back abandoned list: {}", e);
        }
    }

    fn rollback_pending(&self, previous: &[SyncItem]) {
        if let Err(e) = self.backend.save_pending(previous) {
            log::error!("Failed to roll back pending queue: {}", e);
        }
    }

    /// Leaves the state lock poisoned, as after a panic mid-mutation
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _held = self.state.write();
                    panic!("panicked while holding the queue lock");
                })
                .join();
        });
    }
}

fn position(items: &[SyncItem], id: &str) -> QueueResult<usize> {
    items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| QueueError::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use crate::types::EntityType;
    use serde_json::json;

    fn setup_store() -> (MemoryPersistence, QueueStore) {
        let backend = MemoryPersistence::new();
        let store = QueueStore::open(backend.clone()).expect("Failed to open store");
        (backend, store)
    }

    fn item(entity: EntityType) -> SyncItem {
        SyncItem::new(entity, json!({"n": 1}))
    }

    #[test]
    fn test_enqueue_preserves_fifo_order() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Photo);
        let b = item(EntityType::Story);
        let c = item(EntityType::FamilyMember);

        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store.enqueue(c.clone()).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_enqueue_rejects_duplicate_id() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Photo);

        store.enqueue(a.clone()).unwrap();
        let result = store.enqueue(a);

        assert!(matches!(result, Err(QueueError::DuplicateId(_))));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (backend, store) = setup_store();
        let a = item(EntityType::Photo);

        store.enqueue(a.clone()).unwrap();
        assert_eq!(backend.load_pending().unwrap().len(), 1);

        store
            .update(&a.id, SyncItemPatch::failure_of(&a.record_failure("offline")))
            .unwrap();
        assert_eq!(backend.load_pending().unwrap()[0].retry_count, 1);

        store.remove(&a.id).unwrap();
        assert!(backend.load_pending().unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let (backend, store) = setup_store();
        let a = item(EntityType::Photo);
        store.enqueue(a.clone()).unwrap();

        backend.fail_writes(true);
        assert!(store.enqueue(item(EntityType::Story)).is_err());
        assert!(store.remove(&a.id).is_err());
        assert!(store
            .update(&a.id, SyncItemPatch::payload(json!({"changed": true})))
            .is_err());

        assert_eq!(store.list().unwrap(), vec![a]);
    }

    #[test]
    fn test_update_rejects_retry_count_decrease() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Audio);
        store.enqueue(a.clone()).unwrap();
        store
            .update(&a.id, SyncItemPatch::failure_of(&a.record_failure("x").record_failure("x")))
            .unwrap();

        let result = store.update(
            &a.id,
            SyncItemPatch {
                retry_count: Some(1),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(QueueError::RetryCountDecrease { current: 2, .. })));
    }

    #[test]
    fn test_update_and_remove_unknown_id() {
        let (_backend, store) = setup_store();
        assert!(matches!(
            store.update("missing", SyncItemPatch::default()),
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(store.remove("missing"), Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_reopen_yields_identical_queue() {
        let (backend, store) = setup_store();
        store.enqueue(item(EntityType::Photo)).unwrap();
        store.enqueue(item(EntityType::Video).record_failure("timeout")).unwrap();
        let before = store.list().unwrap();
        drop(store);

        let reopened = QueueStore::open(backend).unwrap();
        assert_eq!(reopened.list().unwrap(), before);
    }

    #[test]
    fn test_abandon_moves_item() {
        let (backend, store) = setup_store();
        let a = item(EntityType::Photo);
        store.enqueue(a.clone()).unwrap();

        let record = store
            .abandon(a.record_failure("rejected"), AbandonReason::Rejected)
            .unwrap();

        assert_eq!(record.item.retry_count, 1);
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.abandoned_len().unwrap(), 1);
        assert_eq!(backend.load_abandoned().unwrap().len(), 1);
        assert!(backend.load_pending().unwrap().is_empty());
    }

    #[test]
    fn test_abandon_rolls_back_when_pending_write_fails() {
        let (backend, store) = setup_store();
        let a = item(EntityType::Photo);
        let b = item(EntityType::Story);
        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store
            .abandon(b.record_failure("bad title"), AbandonReason::Rejected)
            .unwrap();
        let pending_before = store.list().unwrap();
        let abandoned_before = store.abandoned().unwrap();

        backend.fail_next_pending_saves(1);
        let result = store.abandon(a.record_failure("gone"), AbandonReason::RetriesExhausted);

        assert!(matches!(result, Err(QueueError::Unavailable(_))));
        assert_eq!(store.list().unwrap(), pending_before);
        assert_eq!(store.abandoned().unwrap(), abandoned_before);
        assert_eq!(backend.load_pending().unwrap(), pending_before);
        assert_eq!(backend.load_abandoned().unwrap(), abandoned_before);
    }

    #[test]
    fn test_requeue_rolls_back_when_abandoned_write_fails() {
        let (backend, store) = setup_store();
        let a = item(EntityType::Video);
        let b = item(EntityType::Audio);
        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store
            .abandon(a.record_failure("timeout"), AbandonReason::RetriesExhausted)
            .unwrap();
        let pending_before = store.list().unwrap();
        let abandoned_before = store.abandoned().unwrap();

        backend.fail_next_abandoned_saves(1);
        let result = store.requeue_abandoned(&a.id);

        assert!(matches!(result, Err(QueueError::Unavailable(_))));
        assert_eq!(store.list().unwrap(), pending_before);
        assert_eq!(store.abandoned().unwrap(), abandoned_before);
        assert_eq!(backend.load_pending().unwrap(), pending_before);
        assert_eq!(backend.load_abandoned().unwrap(), abandoned_before);

        let reopened = QueueStore::open(backend).unwrap();
        assert_eq!(reopened.counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let (_backend, store) = setup_store();
        store.poison();

        assert!(matches!(store.len(), Err(QueueError::LockPoisoned)));
        assert!(matches!(
            store.enqueue(item(EntityType::Story)),
            Err(QueueError::LockPoisoned)
        ));
    }

    #[test]
    fn test_open_drops_pending_copy_of_abandoned_item() {
        let backend = MemoryPersistence::new();
        let a = item(EntityType::Photo);
        backend.save_pending(std::slice::from_ref(&a)).unwrap();
        backend
            .save_abandoned(&[AbandonedItem::new(a, AbandonReason::RetriesExhausted)])
            .unwrap();

        let store = QueueStore::open(backend).unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.abandoned_len().unwrap(), 1);
    }

    #[test]
    fn test_requeue_abandoned_resets_budget() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Story);
        let b = item(EntityType::Story);
        store.enqueue(a.clone()).unwrap();
        store.enqueue(b.clone()).unwrap();
        store
            .abandon(
                a.record_failure("x").record_failure("x").record_failure("x"),
                AbandonReason::RetriesExhausted,
            )
            .unwrap();

        let revived = store.requeue_abandoned(&a.id).unwrap();

        assert_eq!(revived.retry_count, 0);
        assert!(revived.last_error.is_none());
        assert_eq!(store.abandoned_len().unwrap(), 0);
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_discard_abandoned() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Story);
        store.enqueue(a.clone()).unwrap();
        store.abandon(a.clone(), AbandonReason::Rejected).unwrap();

        store.discard_abandoned(&a.id).unwrap();
        assert!(store.abandoned().unwrap().is_empty());
        assert!(matches!(
            store.discard_abandoned(&a.id),
            Err(QueueError::NotFound(_))
        ));
    }

    #[test]
    fn test_enqueue_rejects_id_of_abandoned_item() {
        let (_backend, store) = setup_store();
        let a = item(EntityType::Story);
        store.enqueue(a.clone()).unwrap();
        store.abandon(a.clone(), AbandonReason::Rejected).unwrap();

        assert!(matches!(store.enqueue(a), Err(QueueError::DuplicateId(_))));
    }
}
