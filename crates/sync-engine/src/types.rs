// crates/sync-engine/src/types.rs
//! Core sync types and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Retry budget applied when no other limit is configured
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Entity type carried by a sync item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    /// Photo with a binary attachment
    Photo,
    /// Video with a binary attachment
    Video,
    /// Audio recording with a binary attachment
    Audio,
    /// Written story
    Story,
    /// Family member record
    FamilyMember,
}

impl EntityType {
    /// All entity types, in declaration order
    pub const ALL: [EntityType; 5] = [
        EntityType::Photo,
        EntityType::Video,
        EntityType::Audio,
        EntityType::Story,
        EntityType::FamilyMember,
    ];

    /// Wire name used in persisted state
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Photo => "photo",
            EntityType::Video => "video",
            EntityType::Audio => "audio",
            EntityType::Story => "story",
            EntityType::FamilyMember => "family-member",
        }
    }

    /// Returns true if syncing needs an attachment upload before the insert
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            EntityType::Photo | EntityType::Video | EntityType::Audio
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type '{}'", s))
    }
}

/// Current time truncated to the millisecond precision used on disk
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// One unit of deferred work
///
/// Items are never mutated in place by the engine. Each attempt produces a
/// new value via [`SyncItem::record_failure`] or [`SyncItem::with_payload`]
/// which the queue store then persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Unique item ID
    pub id: String,
    /// Entity type, selects the remote handler
    pub entity_type: EntityType,
    /// Entity-specific data
    pub payload: serde_json::Value,
    /// When the item was queued
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enqueued_at: DateTime<Utc>,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Message of the most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncItem {
    /// Creates a new item with a fresh ID
    pub fn new(entity_type: EntityType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_type,
            payload,
            enqueued_at: now_millis(),
            retry_count: 0,
            last_error: None,
        }
    }

    /// Returns the item after one more failed attempt
    pub fn record_failure(&self, error: impl ToString) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            last_error: Some(error.to_string()),
            ..self.clone()
        }
    }

    /// Returns the item with a replaced payload
    pub fn with_payload(&self, payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..self.clone()
        }
    }

    /// Returns true once the retry budget is spent
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Applies a patch, producing the updated item
    pub(crate) fn apply(&self, patch: SyncItemPatch) -> Self {
        Self {
            retry_count: patch.retry_count.unwrap_or(self.retry_count),
            last_error: patch.last_error.unwrap_or_else(|| self.last_error.clone()),
            payload: patch.payload.unwrap_or_else(|| self.payload.clone()),
            ..self.clone()
        }
    }
}

/// Partial update for a queued item
///
/// `None` leaves a field untouched. `last_error: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncItemPatch {
    pub retry_count: Option<u32>,
    pub last_error: Option<Option<String>>,
    pub payload: Option<serde_json::Value>,
}

impl SyncItemPatch {
    /// Patch carrying the retry bookkeeping of `item`
    pub fn failure_of(item: &SyncItem) -> Self {
        Self {
            retry_count: Some(item.retry_count),
            last_error: Some(item.last_error.clone()),
            payload: None,
        }
    }

    /// Patch replacing only the payload
    pub fn payload(payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }
}

/// Why an item left the active queue without syncing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbandonReason {
    /// Retry budget exhausted on retryable failures
    RetriesExhausted,
    /// Remote store returned a terminal error
    Rejected,
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonReason::RetriesExhausted => write!(f, "retries exhausted"),
            AbandonReason::Rejected => write!(f, "rejected"),
        }
    }
}

/// An item kept for inspection after it was abandoned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedItem {
    /// The item as of its final attempt
    pub item: SyncItem,
    /// Why it was abandoned
    pub reason: AbandonReason,
    /// When it was abandoned
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub abandoned_at: DateTime<Utc>,
}

impl AbandonedItem {
    /// Creates a new abandoned record
    pub fn new(item: SyncItem, reason: AbandonReason) -> Self {
        Self {
            item,
            reason,
            abandoned_at: now_millis(),
        }
    }
}

/// Snapshot of queue health for status indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Items waiting for a (re)try
    pub pending: usize,
    /// Items abandoned and awaiting user action
    pub abandoned: usize,
    /// Current connectivity
    pub online: bool,
    /// Whether a drain is running
    pub draining: bool,
    /// When the last drain pass finished
    pub last_drain: Option<DateTime<Utc>>,
}

impl QueueStatus {
    /// Returns true if anything still needs to sync
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    /// Returns true if the user has abandoned items to review
    pub fn needs_attention(&self) -> bool {
        self.abandoned > 0
    }
}
