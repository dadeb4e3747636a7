//! BlackRoad Memory - Content-Addressed Store
//!
//! Append-only store of typed memory entries addressed by the SHA-256 of
//! `(content, kind, context, agent_id)`. Entries are never physically
//! deleted; invalidation and TTL expiry leave tombstones that stay
//! retrievable for audit.

mod search;
mod store;

pub use search::{tokenize, SearchQuery};
pub use store::{InMemoryMemoryStore, MemoryStore, NewMemory, StoreOutcome};
