//! Entity records shared by the services

use crate::{
    normalize_content_key, AgentId, AgentStatus, CapabilitySet, ContentHash,
    ContradictionResolution, EntityId, MemoryKind, QuarantineStatus, QuarantineStrategy,
    Resolution, TaskStatus, Timestamp, TimestampMs, TrinaryValue, Value, ValueMap,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// MEMORY
// ============================================================================

/// Content-addressed memory entry. Immutable once stored apart from invalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MemoryEntry {
    pub hash: ContentHash,
    pub agent_id: AgentId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub context: ValueMap,
    pub timestamp: TimestampMs,
    #[cfg_attr(feature = "openapi", schema(value_type = i8))]
    pub truth_state: TrinaryValue,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<TimestampMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_at: Option<TimestampMs>,
}

impl MemoryEntry {
    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Neither invalidated nor past its expiry.
    pub fn is_live(&self, now: TimestampMs) -> bool {
        self.invalidated_at.is_none() && !self.is_expired(now)
    }

    pub fn content_key(&self) -> String {
        normalize_content_key(&self.content)
    }
}

// ============================================================================
// REASONING
// ============================================================================

/// A committed claim in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Claim {
    pub id: EntityId,
    pub content: String,
    #[cfg_attr(feature = "openapi", schema(value_type = i8))]
    pub truth_state: TrinaryValue,
    pub confidence: f64,
    pub source: String,
    pub timestamp: TimestampMs,
}

impl Claim {
    pub fn content_key(&self) -> String {
        normalize_content_key(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Contradiction {
    pub detected: bool,
    pub claims: Vec<Claim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ContradictionResolution>,
}

impl Contradiction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn claim_ids(&self) -> Vec<EntityId> {
        self.claims.iter().map(|c| c.id).collect()
    }
}

/// A set of claims held non-authoritative pending resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Quarantine {
    pub id: EntityId,
    /// Ordered, duplicate-free. "first" and "second" in a resolution refer to this order.
    pub claim_ids: Vec<EntityId>,
    pub reason: String,
    pub strategy: QuarantineStrategy,
    pub status: QuarantineStatus,
    pub opened_by: AgentId,
    pub created_at: TimestampMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<TimestampMs>,
    /// Claim that superseded the quarantined ones after a merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_claim_id: Option<EntityId>,
}

impl Quarantine {
    pub fn is_open(&self) -> bool {
        self.status == QuarantineStatus::Open
    }
}

// ============================================================================
// COORDINATION
// ============================================================================

/// Immutable bus event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Event {
    pub id: EntityId,
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    pub source_agent: AgentId,
    pub timestamp: TimestampMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<TimestampMs>,
}

impl Event {
    pub fn is_live(&self, now: TimestampMs) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Delegated unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Task {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub assigned_to: AgentId,
    pub assigned_by: AgentId,
    pub status: TaskStatus,
    pub priority: i32,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "CapabilitySet::is_empty")]
    pub required_capabilities: CapabilitySet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

/// Registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub capabilities: CapabilitySet,
    pub status: AgentStatus,
    pub created_at: Timestamp,
}

impl Agent {
    pub fn new(
        id: impl Into<AgentId>,
        name: impl Into<String>,
        agent_type: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent_type: agent_type.into(),
            capabilities: CapabilitySet::new(),
            status: AgentStatus::Active,
            created_at,
        }
    }

    pub fn with_capabilities<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.capabilities = tags.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }
}
