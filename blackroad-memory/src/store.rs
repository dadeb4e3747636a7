//! Memory store trait and in-memory implementation

use crate::search::SearchQuery;
use blackroad_core::{
    compute_content_hash, expiry_from_ttl, normalize_content_key, AgentId, Clock, ContentHash,
    EntityKind, MemoryEntry, MemoryKind, PlatformConfig, PlatformError, PlatformResult,
    StorageError, SystemClock, TimestampMs, TrinaryValue, ValueMap,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Input to [`MemoryStore::store`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub agent_id: AgentId,
    pub content: String,
    pub kind: MemoryKind,
    pub context: ValueMap,
    /// Relative expiry in seconds.
    pub ttl_secs: Option<i64>,
    /// Overrides the kind's default truth state.
    pub truth_state: Option<TrinaryValue>,
}

impl NewMemory {
    pub fn new(agent_id: impl Into<AgentId>, content: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            kind,
            context: ValueMap::new(),
            ttl_secs: None,
            truth_state: None,
        }
    }

    pub fn with_context(mut self, context: ValueMap) -> Self {
        self.context = context;
        self
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn with_truth_state(mut self, truth_state: TrinaryValue) -> Self {
        self.truth_state = Some(truth_state);
        self
    }

    pub fn hash(&self) -> ContentHash {
        compute_content_hash(&self.content, self.kind, &self.context, &self.agent_id)
    }
}

/// Result of a store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub stored: bool,
    pub hash: ContentHash,
    /// Timestamp of the first write for this hash.
    pub timestamp: TimestampMs,
    /// The hash already existed and nothing was written.
    pub deduplicated: bool,
}

/// Content-addressed, append-only memory store.
pub trait MemoryStore: Send + Sync {
    /// Insert-if-absent by content hash. Repeats return the existing hash and
    /// first-write timestamp without touching the entry.
    fn store(&self, memory: NewMemory) -> PlatformResult<StoreOutcome>;

    /// Fetch by hash. Invalidated or expired entries are `NotFound` unless
    /// `include_tombstones` is set.
    fn retrieve(&self, hash: &str, include_tombstones: bool) -> PlatformResult<MemoryEntry>;

    /// Live entries, newest first.
    fn list(&self, kind: Option<MemoryKind>, limit: Option<usize>) -> PlatformResult<Vec<MemoryEntry>>;

    /// Live entries ranked by relevance, ties newest first.
    fn search(&self, query: &str, limit: Option<usize>) -> PlatformResult<Vec<MemoryEntry>>;

    /// Tombstone a live entry. False for unknown or already dead hashes.
    fn invalidate(&self, hash: &str) -> PlatformResult<bool>;

    /// Live entries whose normalized content equals `content_key`.
    fn evidence(&self, content_key: &str) -> PlatformResult<Vec<MemoryEntry>>;

    /// Materialize tombstones for expired entries. Returns how many were marked.
    fn sweep_expired(&self) -> PlatformResult<usize>;

    fn count_live(&self) -> PlatformResult<usize>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    entries: HashMap<ContentHash, MemoryEntry>,
    /// normalized content key -> hashes
    by_key: HashMap<String, Vec<ContentHash>>,
}

/// In-memory store behind a single `RwLock`.
///
/// The write lock makes check-and-insert atomic, so concurrent identical
/// submissions produce exactly one entry.
#[derive(Debug)]
pub struct InMemoryMemoryStore {
    table: RwLock<MemoryTable>,
    clock: Arc<dyn Clock>,
    config: PlatformConfig,
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), PlatformConfig::default())
    }
}

impl InMemoryMemoryStore {
    pub fn new(clock: Arc<dyn Clock>, config: PlatformConfig) -> Self {
        Self {
            table: RwLock::new(MemoryTable::default()),
            clock,
            config,
        }
    }

    fn read(&self) -> PlatformResult<RwLockReadGuard<'_, MemoryTable>> {
        self.table
            .read()
            .map_err(|_| PlatformError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> PlatformResult<RwLockWriteGuard<'_, MemoryTable>> {
        self.table
            .write()
            .map_err(|_| PlatformError::Storage(StorageError::LockPoisoned))
    }
}

/// Newest first, hash as a stable tie-break.
fn by_recency(a: &MemoryEntry, b: &MemoryEntry) -> std::cmp::Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.hash.cmp(&b.hash))
}

impl MemoryStore for InMemoryMemoryStore {
    fn store(&self, memory: NewMemory) -> PlatformResult<StoreOutcome> {
        if memory.content.trim().is_empty() {
            return Err(PlatformError::missing_field("content"));
        }

        let hash = memory.hash();
        let now = self.clock.now_ms();
        let mut table = self.write()?;

        if let Some(existing) = table.entries.get(&hash) {
            tracing::debug!(hash = %hash, "memory store deduplicated");
            return Ok(StoreOutcome {
                stored: true,
                hash,
                timestamp: existing.timestamp,
                deduplicated: true,
            });
        }

        let truth_state = memory
            .truth_state
            .unwrap_or_else(|| memory.kind.default_truth_state());
        let entry = MemoryEntry {
            hash: hash.clone(),
            agent_id: memory.agent_id,
            content: memory.content,
            kind: memory.kind,
            context: memory.context,
            timestamp: now,
            truth_state,
            created_at: self.clock.now(),
            expires_at: expiry_from_ttl(now, memory.ttl_secs),
            invalidated_at: None,
        };
        table
            .by_key
            .entry(entry.content_key())
            .or_default()
            .push(hash.clone());
        table.entries.insert(hash.clone(), entry);

        tracing::debug!(hash = %hash, kind = %memory.kind, "memory stored");
        Ok(StoreOutcome {
            stored: true,
            hash,
            timestamp: now,
            deduplicated: false,
        })
    }

    fn retrieve(&self, hash: &str, include_tombstones: bool) -> PlatformResult<MemoryEntry> {
        let now = self.clock.now_ms();
        let table = self.read()?;
        table
            .entries
            .get(hash)
            .filter(|entry| include_tombstones || entry.is_live(now))
            .cloned()
            .ok_or_else(|| PlatformError::not_found(EntityKind::Memory, hash))
    }

    fn list(&self, kind: Option<MemoryKind>, limit: Option<usize>) -> PlatformResult<Vec<MemoryEntry>> {
        let limit = self.config.page_limit(limit, self.config.default_list_limit);
        let now = self.clock.now_ms();
        let table = self.read()?;
        let mut entries: Vec<MemoryEntry> = table
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .cloned()
            .collect();
        entries.sort_by(by_recency);
        entries.truncate(limit);
        Ok(entries)
    }

    fn search(&self, query: &str, limit: Option<usize>) -> PlatformResult<Vec<MemoryEntry>> {
        let limit = self.config.page_limit(limit, self.config.default_search_limit);
        let parsed = SearchQuery::parse(query);
        if parsed.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let now = self.clock.now_ms();
        let table = self.read()?;
        let mut scored: Vec<(usize, &MemoryEntry)> = table
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| (parsed.score(&entry.content), entry))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| by_recency(a, b)));

        tracing::debug!(query = %query, hits = scored.len(), "memory search");
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    fn invalidate(&self, hash: &str) -> PlatformResult<bool> {
        let now = self.clock.now_ms();
        let mut table = self.write()?;
        match table.entries.get_mut(hash) {
            Some(entry) if entry.is_live(now) => {
                entry.invalidated_at = Some(now);
                tracing::debug!(hash = %hash, "memory invalidated");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn evidence(&self, content_key: &str) -> PlatformResult<Vec<MemoryEntry>> {
        let key = normalize_content_key(content_key);
        let now = self.clock.now_ms();
        let table = self.read()?;
        let mut entries: Vec<MemoryEntry> = table
            .by_key
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|hash| table.entries.get(hash))
            .filter(|entry| entry.is_live(now))
            .cloned()
            .collect();
        entries.sort_by(by_recency);
        Ok(entries)
    }

    fn sweep_expired(&self) -> PlatformResult<usize> {
        let now = self.clock.now_ms();
        let mut table = self.write()?;
        let mut swept = 0;
        for entry in table.entries.values_mut() {
            if entry.invalidated_at.is_none() && entry.is_expired(now) {
                entry.invalidated_at = entry.expires_at;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::info!(swept, "expired memory entries tombstoned");
        }
        Ok(swept)
    }

    fn count_live(&self) -> PlatformResult<usize> {
        let now = self.clock.now_ms();
        let table = self.read()?;
        Ok(table.entries.values().filter(|e| e.is_live(now)).count())
    }
}

// ============================================================================
// TESTS
// ============================================================================
