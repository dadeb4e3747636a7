//! Identity types, content addressing and time

use crate::{EntityKind, MemoryKind, PlatformError, PlatformResult, ValueMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Wall-clock timestamp for `created_at` fields.
pub type Timestamp = DateTime<Utc>;

/// Lowercase hex SHA-256 digest addressing a memory entry.
pub type ContentHash = String;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Parse a wire reference to a stored entity. Text that is not a UUID names
/// nothing and fails as `NotFound` carrying the raw reference.
pub fn parse_entity_ref(entity: EntityKind, raw: &str) -> PlatformResult<EntityId> {
    Uuid::parse_str(raw.trim()).map_err(|_| PlatformError::not_found(entity, raw))
}

/// Opaque agent identifier as issued by the agent registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    content: &'a str,
    kind: MemoryKind,
    context: &'a ValueMap,
    agent_id: &'a AgentId,
}

/// Deterministic content address of a memory entry.
///
/// The digest covers `(content, kind, context, agent_id)` serialized as
/// canonical JSON. `ValueMap` is key-ordered, so two contexts with the same
/// pairs hash identically regardless of construction order.
pub fn compute_content_hash(
    content: &str,
    kind: MemoryKind,
    context: &ValueMap,
    agent_id: &AgentId,
) -> ContentHash {
    let input = HashInput {
        content,
        kind,
        context,
        agent_id,
    };
    // Serializing strings, enums and ordered maps cannot fail.
    let canonical = serde_json::to_vec(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Normalized key under which claims and evidence about the same statement meet.
/// Trims, collapses internal whitespace and lowercases.
pub fn normalize_content_key(content: &str) -> String {
    content
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// CLOCK
// ============================================================================

/// Time source. Services take `Arc<dyn Clock>` so tests can pin time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> TimestampMs;

    fn now(&self) -> Timestamp {
        DateTime::from_timestamp_millis(self.now_ms()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: TimestampMs) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}

/// Absolute expiry for a relative TTL in seconds. Non-positive TTLs never expire.
pub fn expiry_from_ttl(now: TimestampMs, ttl_secs: Option<i64>) -> Option<TimestampMs> {
    ttl_secs
        .filter(|ttl| *ttl > 0)
        .map(|ttl| now.saturating_add(ttl.saturating_mul(1000)))
}
