// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use console::style;
use heirloom_config::{Config, ConfigManager, SyncSettings};
use heirloom_network::{Client, ClientConfig, ConnectivityChecker};
use heirloom_sync_engine::{
    AbandonedItem, ConnectivityMonitor, EntityType, JsonFilePersistence, QueueStore, RetryPolicy,
    SyncConfig, SyncItem, Transition,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved configuration for one invocation
pub struct Session {
    pub config: Config,
    pub data_dir: PathBuf,
}

impl Session {
    /// Opens the file-backed queue under the data directory
    pub fn open_store(&self) -> Result<QueueStore> {
        open_store(&self.data_dir)
    }
}

fn open_store(data_dir: &Path) -> Result<QueueStore> {
    let backend = JsonFilePersistence::open(data_dir.to_path_buf())
        .with_context(|| format!("Failed to open queue directory {}", data_dir.display()))?;
    QueueStore::open(backend).context("Failed to load sync queue")
}

/// Write the default config and create the queue directory
pub fn init(manager: &ConfigManager, session: &Session) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;
    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }

    JsonFilePersistence::open(session.data_dir.clone())
        .with_context(|| format!("Failed to create {}", session.data_dir.display()))?;
    println!("Queue directory: {}", session.data_dir.display());
    Ok(())
}

/// Queue a record for sync
pub fn enqueue(session: &Session, entity_type: &str, payload: &str) -> Result<SyncItem> {
    let entity_type = parse_entity(entity_type)?;
    let payload = parse_payload(payload)?;
    if entity_type.is_composite() && payload.get("attachment").and_then(Value::as_str).is_none() {
        bail!("{} payloads need an \"attachment\" path", entity_type);
    }

    let store = session.open_store()?;
    let item = SyncItem::new(entity_type, payload);
    store
        .enqueue(item.clone())
        .context("Failed to persist queued item")?;

    println!("{} Queued {} {}", style("✓").green().bold(), entity_type, item.id);
    Ok(item)
}

/// Show queue counts
pub fn status(session: &Session, json: bool) -> Result<()> {
    let store = session.open_store()?;
    let (pending, abandoned) = store.counts().context("Failed to read queue")?;
    let engine = engine_config(&session.config.sync);

    if json {
        let report = serde_json::json!({
            "pending": pending,
            "abandoned": abandoned,
            "maxRetries": engine.max_retries,
            "callTimeoutMs": engine.call_timeout.as_millis() as u64,
            "autoSync": engine.auto_sync,
            "dataDir": session.data_dir.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", status_summary(pending, abandoned));
    println!("  Queue: {}", session.data_dir.display());
    println!("  Retries: {}", retry_summary(&engine));
    Ok(())
}

/// List queued or abandoned items
pub fn list(session: &Session, abandoned: bool, json: bool) -> Result<()> {
    let store = session.open_store()?;
    let max_retries = session.config.sync.max_retries;

    if abandoned {
        let items = store.abandoned().context("Failed to read abandoned items")?;
        if json {
            println!("{}", serde_json::to_string_pretty(&items)?);
        } else if items.is_empty() {
            println!("No abandoned items.");
        } else {
            println!("\n{} Abandoned", style(items.len()).bold().red());
            println!("{}", "=".repeat(80));
            for entry in &items {
                println!("{}", describe_abandoned(entry));
            }
        }
        return Ok(());
    }

    let items = store.list().context("Failed to read queue")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Queue is empty. Everything is synced.");
    } else {
        println!("\n{} Pending", style(items.len()).bold().cyan());
        println!("{}", "=".repeat(80));
        for item in &items {
            println!("{}", describe_item(item, max_retries));
        }
    }
    Ok(())
}

/// Move an abandoned item back into the queue
pub fn requeue(session: &Session, id: &str) -> Result<SyncItem> {
    let store = session.open_store()?;
    let item = store
        .requeue_abandoned(id)
        .with_context(|| format!("Failed to requeue {}", id))?;

    println!("{} Requeued {} {}", style("✓").green().bold(), item.entity_type, item.id);
    Ok(item)
}

/// Permanently delete an abandoned item
pub fn discard(session: &Session, id: &str) -> Result<AbandonedItem> {
    let store = session.open_store()?;
    let entry = store
        .discard_abandoned(id)
        .with_context(|| format!("Failed to discard {}", id))?;

    println!("{} Discarded {} {}", style("✓").green().bold(), entry.item.entity_type, id);
    Ok(entry)
}

/// Probe network connectivity
pub async fn check(session: &Session) -> Result<()> {
    let checker = connectivity_checker(&session.config.sync)?;
    println!("Probing {} URL(s)...", checker.urls().len());

    if checker.is_online().await {
        println!("{} Online", style("●").green());
        Ok(())
    } else {
        println!("{} Offline", style("●").red());
        bail!("none of the probe URLs answered")
    }
}

/// Report connectivity transitions and queue counts until Ctrl-C
pub async fn watch(session: &Session) -> Result<()> {
    let checker = connectivity_checker(&session.config.sync)?;
    let monitor = Arc::new(ConnectivityMonitor::new(false));

    let data_dir = session.data_dir.clone();
    monitor.on_online(move || {
        let summary = open_store(&data_dir)
            .and_then(|store| store.counts().map_err(anyhow::Error::from));
        match summary {
            Ok((pending, abandoned)) => println!(
                "{} Online: {}",
                style("●").green(),
                status_summary(pending, abandoned)
            ),
            Err(e) => log::warn!("Could not read queue: {:#}", e),
        }
    });

    let probe_monitor = Arc::clone(&monitor);
    let probe = checker.spawn_probe(session.config.sync.probe_interval(), move |online| {
        if probe_monitor.set_online(online) == Transition::WentOffline {
            println!("{} Offline: changes will wait in the queue", style("●").red());
        }
    });

    println!(
        "Watching connectivity every {}s (Ctrl-C to stop)",
        session.config.sync.probe_interval_secs
    );
    let stopped = tokio::signal::ctrl_c().await;
    probe.abort();
    stopped.context("Failed to listen for Ctrl-C")
}

/// Engine settings derived from the `[sync]` config table
pub fn engine_config(settings: &SyncSettings) -> SyncConfig {
    SyncConfig {
        max_retries: settings.max_retries,
        call_timeout: settings.call_timeout(),
        backoff: RetryPolicy::new(settings.max_retries as usize)
            .with_initial_delay(settings.backoff_initial())
            .with_max_delay(settings.backoff_max()),
        auto_sync: settings.auto_sync,
    }
}

fn retry_summary(engine: &SyncConfig) -> String {
    let spacing = engine.backoff.clone().with_jitter(false);
    format!(
        "{} attempts, {}s per call, passes spaced {}ms to {}ms{}",
        engine.max_retries,
        engine.call_timeout.as_secs(),
        spacing.delay_for_attempt(1).as_millis(),
        spacing.delay_for_attempt(usize::MAX).as_millis(),
        if engine.auto_sync { "" } else { " (auto-sync off)" }
    )
}

fn connectivity_checker(settings: &SyncSettings) -> Result<ConnectivityChecker> {
    let client = Client::with_config(ClientConfig {
        timeout: settings.probe_timeout(),
        ..ClientConfig::default()
    })
    .context("Failed to build HTTP client")?;
    Ok(ConnectivityChecker::with_urls(client, settings.probe_urls.clone()))
}

fn parse_entity(raw: &str) -> Result<EntityType> {
    raw.parse::<EntityType>().map_err(anyhow::Error::msg)
}

fn parse_payload(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Payload is not valid JSON")?;
    if !value.is_object() {
        bail!("Payload must be a JSON object");
    }
    Ok(value)
}

fn status_summary(pending: usize, abandoned: usize) -> String {
    match (pending, abandoned) {
        (0, 0) => "Everything is synced".to_string(),
        (p, 0) => format!("{} pending, will retry", p),
        (0, a) => format!("{} abandoned, needs attention", a),
        (p, a) => format!("{} pending, will retry; {} abandoned, needs attention", p, a),
    }
}

fn describe_item(item: &SyncItem, max_retries: u32) -> String {
    let mut line = format!(
        "{}  {:<13} attempts {}/{}  queued {}",
        item.id,
        item.entity_type.as_str(),
        item.retry_count,
        max_retries,
        item.enqueued_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(error) = &item.last_error {
        line.push_str(&format!("\n  last error: {}", error));
    }
    line
}

fn describe_abandoned(entry: &AbandonedItem) -> String {
    let mut line = format!(
        "{}  {:<13} {} after {} attempt(s), {}",
        entry.item.id,
        entry.item.entity_type.as_str(),
        entry.reason,
        entry.item.retry_count,
        entry
            .abandoned_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(error) = &entry.item.last_error {
        line.push_str(&format!("\n  last error: {}", error));
    }
    line
}
