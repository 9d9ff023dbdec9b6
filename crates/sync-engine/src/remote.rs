// crates/sync-engine/src/remote.rs
//! Remote store adapter boundary
//!
//! The engine never talks to the backend directly. It hands each item to the
//! [`HandlerRegistry`], which dispatches on [`EntityType`] to a registered
//! [`EntityHandler`]. Adding an entity type means registering a handler; the
//! drain loop does not change.
//!
//! Media payloads have the shape
//! `{ "attachment": "<local path>", "record": { ... } }`. Story and
//! family-member payloads carry their record under `"record"`, or are the
//! record themselves.

use crate::error::{SyncError, SyncResult};
use crate::store::QueueStore;
use crate::types::{EntityType, SyncItem, SyncItemPatch};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Payload key holding the URL of an already uploaded attachment
pub const UPLOADED_URL_KEY: &str = "uploadedUrl";

/// Low-level operations of the authoritative backend
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Uploads a local file to object storage and returns its public URL
    ///
    /// `key` is stable across retries of the same item.
    async fn upload_attachment(&self, bucket: &str, key: &str, source: &str) -> SyncResult<String>;

    /// Inserts a metadata record
    ///
    /// `key` is stable across retries of the same item.
    async fn insert_record(&self, table: &str, key: &str, record: &Value) -> SyncResult<()>;
}

/// Per-attempt view of a queued item handed to an [`EntityHandler`]
pub struct SyncContext<'a> {
    item: SyncItem,
    store: &'a QueueStore,
}

impl<'a> SyncContext<'a> {
    /// Creates a context for one attempt at `item`
    pub fn new(item: &SyncItem, store: &'a QueueStore) -> Self {
        Self {
            item: item.clone(),
            store,
        }
    }

    /// ID of the item being synced
    pub fn item_id(&self) -> &str {
        &self.item.id
    }

    /// Entity type of the item being synced
    pub fn entity_type(&self) -> EntityType {
        self.item.entity_type
    }

    /// Current payload, including checkpointed sub-results
    pub fn payload(&self) -> &Value {
        &self.item.payload
    }

    /// Reads a sub-result saved by an earlier attempt
    pub fn cached(&self, key: &str) -> Option<&Value> {
        self.item.payload.get(key)
    }

    /// Stable key for one step of this item, identical on every retry
    pub fn idempotency_key(&self, step: &str) -> String {
        format!("{}:{}", self.item.id, step)
    }

    /// Saves a completed sub-step result into the payload
    ///
    /// The updated payload is persisted through the queue store before this
    /// returns, so a later retry (or a restart) sees it.
    pub fn checkpoint(&mut self, key: &str, value: Value) -> SyncResult<()> {
        let mut payload = self.item.payload.clone();
        let map = payload.as_object_mut().ok_or_else(|| {
            SyncError::InvalidPayload("payload must be a JSON object to checkpoint".to_string())
        })?;
        map.insert(key.to_string(), value);
        let next = self.item.with_payload(payload);

        self.store
            .update(&next.id, SyncItemPatch::payload(next.payload.clone()))
            .map_err(|source| SyncError::Checkpoint {
                step: key.to_string(),
                source,
            })?;

        self.item = next;
        Ok(())
    }
}

/// Sync routine for one entity type
#[async_trait]
pub trait EntityHandler: Send + Sync {
    /// Pushes the item to the remote store
    ///
    /// Handlers with several remote steps must checkpoint each completed step
    /// so a retry resumes instead of repeating it.
    async fn sync(&self, ctx: &mut SyncContext<'_>) -> SyncResult<()>;
}

/// Dispatch table from entity type to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EntityType, Arc<dyn EntityHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler for every entity type
    pub fn with_defaults(remote: Arc<dyn RemoteStore>) -> Self {
        let mut registry = Self::new();
        registry
            .register(
                EntityType::Photo,
                UploadThenInsert::new(remote.clone(), "photos", "photos"),
            )
            .register(
                EntityType::Video,
                UploadThenInsert::new(remote.clone(), "videos", "videos"),
            )
            .register(
                EntityType::Audio,
                UploadThenInsert::new(remote.clone(), "audio", "audio_recordings"),
            )
            .register(EntityType::Story, InsertRecord::new(remote.clone(), "stories"))
            .register(
                EntityType::FamilyMember,
                InsertRecord::new(remote, "family_members"),
            );
        registry
    }

    /// Registers (or replaces) the handler for an entity type
    pub fn register(
        &mut self,
        entity_type: EntityType,
        handler: impl EntityHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(entity_type, Arc::new(handler));
        self
    }

    /// Returns true if a handler is registered
    pub fn handles(&self, entity_type: EntityType) -> bool {
        self.handlers.contains_key(&entity_type)
    }

    /// Dispatches one attempt to the handler for the item's entity type
    pub async fn sync_entity(&self, ctx: &mut SyncContext<'_>) -> SyncResult<()> {
        let handler = self
            .handlers
            .get(&ctx.entity_type())
            .cloned()
            .ok_or(SyncError::UnsupportedEntity(ctx.entity_type()))?;
        handler.sync(ctx).await
    }
}

/// Single-step handler: insert the record
pub struct InsertRecord {
    remote: Arc<dyn RemoteStore>,
    table: String,
}

impl InsertRecord {
    pub fn new(remote: Arc<dyn RemoteStore>, table: impl Into<String>) -> Self {
        Self {
            remote,
            table: table.into(),
        }
    }
}

#[async_trait]
impl EntityHandler for InsertRecord {
    async fn sync(&self, ctx: &mut SyncContext<'_>) -> SyncResult<()> {
        let record = ctx
            .payload()
            .get("record")
            .cloned()
            .unwrap_or_else(|| ctx.payload().clone());
        if !record.is_object() {
            return Err(SyncError::InvalidPayload(format!(
                "{} record must be a JSON object",
                ctx.entity_type()
            )));
        }

        let key = ctx.idempotency_key("insert");
        self.remote.insert_record(&self.table, &key, &record).await
    }
}

/// Composite handler: upload the attachment, then insert a record that
/// references the uploaded URL
///
/// The URL is checkpointed under [`UPLOADED_URL_KEY`] as soon as the upload
/// succeeds, so a failed insert is retried without uploading again.
pub struct UploadThenInsert {
    remote: Arc<dyn RemoteStore>,
    bucket: String,
    table: String,
}

impl UploadThenInsert {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        bucket: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            bucket: bucket.into(),
            table: table.into(),
        }
    }

    async fn upload(&self, ctx: &mut SyncContext<'_>) -> SyncResult<String> {
        if let Some(url) = ctx.cached(UPLOADED_URL_KEY).and_then(Value::as_str) {
            log::debug!("Item {} already uploaded, reusing {}", ctx.item_id(), url);
            return Ok(url.to_string());
        }

        let source = ctx
            .payload()
            .get("attachment")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SyncError::InvalidPayload(format!(
                    "{} payload has no attachment",
                    ctx.entity_type()
                ))
            })?
            .to_string();

        let key = ctx.idempotency_key("upload");
        let url = self
            .remote
            .upload_attachment(&self.bucket, &key, &source)
            .await?;
        ctx.checkpoint(UPLOADED_URL_KEY, Value::String(url.clone()))?;
        Ok(url)
    }
}

#[async_trait]
impl EntityHandler for UploadThenInsert {
    async fn sync(&self, ctx: &mut SyncContext<'_>) -> SyncResult<()> {
        let url = self.upload(ctx).await?;

        let mut record = match ctx.payload().get("record") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(SyncError::InvalidPayload(format!(
                    "{} record must be a JSON object",
                    ctx.entity_type()
                )))
            }
            None => Map::new(),
        };
        record.insert("url".to_string(), Value::String(url));

        let key = ctx.idempotency_key("insert");
        self.remote
            .insert_record(&self.table, &key, &Value::Object(record))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRemote {
        uploads: Mutex<Vec<(String, String, String)>>,
        inserts: Mutex<Vec<(String, String, Value)>>,
        fail_insert: bool,
    }

    #[async_trait]
    impl RemoteStore for RecordingRemote {
        async fn upload_attachment(
            &self,
            bucket: &str,
            key: &str,
            source: &str,
        ) -> SyncResult<String> {
            self.uploads.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                source.to_string(),
            ));
            Ok(format!("https://cdn.example/{}/{}", bucket, key))
        }

        async fn insert_record(&self, table: &str, key: &str, record: &Value) -> SyncResult<()> {
            self.inserts
                .lock()
                .unwrap()
                .push((table.to_string(), key.to_string(), record.clone()));
            if self.fail_insert {
                Err(SyncError::Network("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn store_with(item: &SyncItem) -> QueueStore {
        let store = QueueStore::open(MemoryPersistence::new()).unwrap();
        store.enqueue(item.clone()).unwrap();
        store
    }

    #[tokio::test]
    async fn test_upload_then_insert() {
        let remote = Arc::new(RecordingRemote::default());
        let handler = UploadThenInsert::new(remote.clone(), "photos", "photos");
        let item = SyncItem::new(
            EntityType::Photo,
            json!({"attachment": "/tmp/a.jpg", "record": {"caption": "Beach"}}),
        );
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        handler.sync(&mut ctx).await.unwrap();

        let uploads = remote.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].2, "/tmp/a.jpg");
        let inserts = remote.inserts.lock().unwrap();
        assert_eq!(inserts[0].0, "photos");
        assert_eq!(inserts[0].2["caption"], "Beach");
        assert_eq!(inserts[0].2["url"], format!("https://cdn.example/photos/{}:upload", item.id));
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_checkpointed_url() {
        let remote = Arc::new(RecordingRemote {
            fail_insert: true,
            ..Default::default()
        });
        let handler = UploadThenInsert::new(remote.clone(), "photos", "photos");
        let item = SyncItem::new(EntityType::Photo, json!({"attachment": "/tmp/a.jpg"}));
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        assert!(handler.sync(&mut ctx).await.is_err());

        let persisted = store.get(&item.id).unwrap().unwrap();
        assert!(persisted.payload[UPLOADED_URL_KEY].is_string());
    }

    #[tokio::test]
    async fn test_cached_url_skips_upload() {
        let remote = Arc::new(RecordingRemote::default());
        let handler = UploadThenInsert::new(remote.clone(), "videos", "videos");
        let item = SyncItem::new(
            EntityType::Video,
            json!({"attachment": "/tmp/v.mp4", "uploadedUrl": "https://cdn.example/v"}),
        );
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        handler.sync(&mut ctx).await.unwrap();

        assert!(remote.uploads.lock().unwrap().is_empty());
        assert_eq!(remote.inserts.lock().unwrap()[0].2["url"], "https://cdn.example/v");
    }

    #[tokio::test]
    async fn test_missing_attachment_is_terminal() {
        let remote = Arc::new(RecordingRemote::default());
        let handler = UploadThenInsert::new(remote, "audio", "audio_recordings");
        let item = SyncItem::new(EntityType::Audio, json!({"record": {}}));
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        let err = handler.sync(&mut ctx).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidPayload(_)));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_insert_record_uses_record_field_or_payload() {
        let remote = Arc::new(RecordingRemote::default());
        let handler = InsertRecord::new(remote.clone(), "stories");

        let wrapped = SyncItem::new(EntityType::Story, json!({"record": {"title": "A"}}));
        let store = store_with(&wrapped);
        handler.sync(&mut SyncContext::new(&wrapped, &store)).await.unwrap();

        let bare = SyncItem::new(EntityType::Story, json!({"title": "B"}));
        let store = store_with(&bare);
        handler.sync(&mut SyncContext::new(&bare, &store)).await.unwrap();

        let inserts = remote.inserts.lock().unwrap();
        assert_eq!(inserts[0].2, json!({"title": "A"}));
        assert_eq!(inserts[1].2, json!({"title": "B"}));
        assert_eq!(inserts[1].1, format!("{}:insert", bare.id));
    }

    #[tokio::test]
    async fn test_registry_dispatch_and_unsupported() {
        let remote = Arc::new(RecordingRemote::default());
        let mut registry = HandlerRegistry::new();
        registry.register(EntityType::Story, InsertRecord::new(remote.clone(), "stories"));

        let story = SyncItem::new(EntityType::Story, json!({"title": "t"}));
        let store = store_with(&story);
        registry
            .sync_entity(&mut SyncContext::new(&story, &store))
            .await
            .unwrap();

        let member = SyncItem::new(EntityType::FamilyMember, json!({"name": "Ada"}));
        let store = store_with(&member);
        let err = registry
            .sync_entity(&mut SyncContext::new(&member, &store))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedEntity(EntityType::FamilyMember)));
    }

    #[test]
    fn test_defaults_cover_every_entity_type() {
        let registry = HandlerRegistry::with_defaults(Arc::new(RecordingRemote::default()));
        for entity in EntityType::ALL {
            assert!(registry.handles(entity), "missing handler for {}", entity);
        }
    }

    #[test]
    fn test_checkpoint_requires_object_payload() {
        let item = SyncItem::new(EntityType::Photo, json!(["not", "an", "object"]));
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        let err = ctx.checkpoint("k", json!(1)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPayload(_)));
    }

    #[test]
    fn test_checkpoint_replaces_only_the_payload() {
        let item = SyncItem::new(EntityType::Video, json!({"attachment": "/tmp/v.mp4"}))
            .record_failure("timeout");
        let store = store_with(&item);
        let mut ctx = SyncContext::new(&item, &store);

        ctx.checkpoint(UPLOADED_URL_KEY, json!("https://cdn.example/v")).unwrap();
        ctx.checkpoint("thumb", json!("t.jpg")).unwrap();

        assert_eq!(ctx.item_id(), item.id);
        assert_eq!(ctx.entity_type(), EntityType::Video);
        assert_eq!(ctx.payload()["attachment"], "/tmp/v.mp4");
        assert_eq!(ctx.cached("thumb"), Some(&json!("t.jpg")));
        let persisted = store.get(&item.id).unwrap().unwrap();
        assert_eq!(&persisted.payload, ctx.payload());
        assert_eq!(persisted.retry_count, 1);
        assert_eq!(persisted.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_checkpoint_persistence_failure_is_retryable() {
        let backend = MemoryPersistence::new();
        let store = QueueStore::open(backend.clone()).unwrap();
        let item = SyncItem::new(EntityType::Photo, json!({}));
        store.enqueue(item.clone()).unwrap();
        backend.fail_writes(true);

        let mut ctx = SyncContext::new(&item, &store);
        let err = ctx.checkpoint(UPLOADED_URL_KEY, json!("u")).unwrap_err();

        assert!(matches!(err, SyncError::Checkpoint { .. }));
        assert!(err.is_retryable());
        assert!(ctx.cached(UPLOADED_URL_KEY).is_none());
    }
}
