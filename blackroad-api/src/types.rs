//! Request and response records
//!
//! Field names follow the wire contract exactly (snake_case, plus the
//! `matchAll` and `byType` spellings inherited from the agent service).

use blackroad_coordination::{NewTask, TypeCount};
use blackroad_core::{
    Agent, AgentId, CapabilitySet, Claim, ContentHash, EntityId, MemoryEntry, MemoryKind,
    QuarantineStrategy, Resolution, Task, TaskStatus, Timestamp, TimestampMs, TrinaryValue, Value,
    ValueMap,
};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Caller identity as established by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub agent_id: AgentId,
}

impl CallContext {
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }
}

// ============================================================================
// MEMORY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMemoryRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ValueMap>,
    /// Seconds until the entry expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth_state: Option<TrinaryValue>,
}

impl StoreMemoryRequest {
    pub fn new(content: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            content: content.into(),
            kind,
            context: None,
            ttl: None,
            truth_state: None,
        }
    }

    pub fn with_context(mut self, context: ValueMap) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveMemoryRequest {
    pub hash: ContentHash,
    #[serde(default)]
    pub include_tombstones: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub memory: MemoryEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMemoriesRequest {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MemoryKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryListResponse {
    pub memories: Vec<MemoryEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMemoriesRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MemoryEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateMemoryRequest {
    pub hash: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
    pub hash: ContentHash,
}

// ============================================================================
// REASONING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub claim: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ValueMap>,
    #[serde(default = "default_true")]
    pub check_contradictions: bool,
}

impl EvaluateRequest {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            context: None,
            check_contradictions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitClaimRequest {
    pub claim: String,
    pub truth_state: TrinaryValue,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CommitClaimRequest {
    pub fn new(claim: impl Into<String>, truth_state: TrinaryValue, confidence: f64) -> Self {
        Self {
            claim: claim.into(),
            truth_state,
            confidence,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineRequest {
    /// Raw claim ids; malformed entries surface as `INVALID_REFERENCE`.
    pub claim_ids: Vec<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<QuarantineStrategy>,
}

impl QuarantineRequest {
    pub fn new(claim_ids: &[EntityId], reason: impl Into<String>) -> Self {
        Self {
            claim_ids: claim_ids.iter().map(EntityId::to_string).collect(),
            reason: reason.into(),
            resolution_strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: QuarantineStrategy) -> Self {
        self.resolution_strategy = Some(strategy);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub quarantine_id: String,
    pub resolution: Resolution,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_truth_state: Option<TrinaryValue>,
}

impl ResolveRequest {
    pub fn new(
        quarantine_id: EntityId,
        resolution: Resolution,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            quarantine_id: quarantine_id.to_string(),
            resolution,
            justification: justification.into(),
            new_truth_state: None,
        }
    }

    pub fn with_truth_state(mut self, truth_state: TrinaryValue) -> Self {
        self.new_truth_state = Some(truth_state);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth_state: Option<TrinaryValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsResponse {
    pub claims: Vec<Claim>,
    pub count: usize,
}

// ============================================================================
// COORDINATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Seconds until the event expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub topic: String,
    /// Exclusive lower bound on event timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<TimestampMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateRequest {
    pub task_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<AgentId>,
    #[serde(default, skip_serializing_if = "CapabilitySet::is_empty")]
    pub required_capabilities: CapabilitySet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl DelegateRequest {
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            description: description.into(),
            target_agent: None,
            required_capabilities: CapabilitySet::new(),
            priority: None,
            due_at: None,
            payload: None,
        }
    }

    pub fn to_agent(mut self, agent: impl Into<AgentId>) -> Self {
        self.target_agent = Some(agent.into());
        self
    }

    pub fn requiring<S: AsRef<str>>(mut self, capabilities: impl IntoIterator<Item = S>) -> Self {
        self.required_capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl From<DelegateRequest> for NewTask {
    fn from(req: DelegateRequest) -> Self {
        NewTask {
            task_type: req.task_type,
            description: req.description,
            target_agent: req.target_agent,
            required_capabilities: req.required_capabilities,
            priority: req.priority,
            due_at: req.due_at,
            payload: req.payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTaskRequest {
    pub task_id: String,
}

impl StartTaskRequest {
    pub fn new(task_id: EntityId) -> Self {
        Self {
            task_id: task_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl CompleteTaskRequest {
    pub fn new(task_id: EntityId, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.to_string(),
            status,
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

// ============================================================================
// AGENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAgentRequest {
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindAgentsRequest {
    pub capabilities: CapabilitySet,
    #[serde(default, rename = "matchAll")]
    pub match_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: Vec<Agent>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypesResponse {
    pub types: Vec<TypeCount>,
}

// ============================================================================
// MAINTENANCE
// ============================================================================

/// Outcome of one housekeeping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub expired_memories: usize,
    pub expired_events: usize,
    pub auto_resolved: usize,
}
