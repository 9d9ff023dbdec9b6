// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of offline-first synchronization

use async_trait::async_trait;
use heirloom_sync_engine::{
    ConnectivityMonitor, EntityType, HandlerRegistry, MemoryPersistence, QueueStore, RemoteStore,
    SyncConfig, SyncEngine, SyncError, SyncResult,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Remote store that prints what it receives and drops the first insert
#[derive(Default)]
struct DemoRemote {
    inserts: AtomicUsize,
}

#[async_trait]
impl RemoteStore for DemoRemote {
    async fn upload_attachment(&self, bucket: &str, key: &str, source: &str) -> SyncResult<String> {
        println!("  ↑ upload {} -> {}/{}", source, bucket, key);
        Ok(format!("https://storage.example/{}/{}", bucket, key))
    }

    async fn insert_record(&self, table: &str, key: &str, record: &Value) -> SyncResult<()> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) == 0 {
            println!("  ✗ insert into {} dropped", table);
            return Err(SyncError::Network("connection reset".to_string()));
        }
        println!("  ✓ insert into {} ({}): {}", table, key, record);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Heirloom Sync Engine Demo");
    println!("=========================\n");

    let store = Arc::new(QueueStore::open(MemoryPersistence::new()).expect("store"));
    let monitor = Arc::new(ConnectivityMonitor::new(false));
    let registry = HandlerRegistry::with_defaults(Arc::new(DemoRemote::default()));
    let config = SyncConfig {
        call_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    };
    let engine = Arc::new(SyncEngine::new(config, store, registry, monitor));
    let auto_sync = engine.start_auto_sync();

    println!("1. Offline capture");
    println!("------------------");
    engine
        .enqueue(
            EntityType::Photo,
            json!({"attachment": "/photos/reunion-1987.jpg", "record": {"caption": "Reunion"}}),
        )
        .expect("enqueue photo");
    engine
        .enqueue(EntityType::FamilyMember, json!({"name": "Rosa", "born": 1921}))
        .expect("enqueue family member");
    println!("  Pending: {}\n", engine.pending_count().expect("count"));

    println!("2. Back online");
    println!("--------------");
    engine.monitor().set_online(true);

    while engine.pending_count().expect("count") > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let status = engine.status().expect("status");
    println!(
        "\n  Pending: {}, abandoned: {}",
        status.pending, status.abandoned
    );

    auto_sync.abort();
}
