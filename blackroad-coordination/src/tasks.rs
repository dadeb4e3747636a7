//! Task delegation board
//!
//! Tasks move `pending -> in_progress -> {completed | failed}` and never
//! backwards. Every transition is a compare-and-swap under the board's write
//! lock, so concurrent or retried calls observe `InvalidTransition` instead of
//! clobbering each other.

use crate::registry::AgentRegistry;
use blackroad_core::{
    new_entity_id, topics, Agent, AgentId, AgentStatus, CapabilitySet, Clock, CoordinationError,
    EntityId, EntityKind, EventSink, PlatformConfig, PlatformError, PlatformResult, StorageError,
    Task, TaskStatus, Timestamp, Value,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Delegation request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub task_type: String,
    pub description: String,
    pub target_agent: Option<AgentId>,
    pub required_capabilities: CapabilitySet,
    pub priority: Option<i32>,
    pub due_at: Option<Timestamp>,
    pub payload: Option<Value>,
}

impl NewTask {
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

    pub fn with_due_at(mut self, due_at: Timestamp) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateOutcome {
    pub delegated: bool,
    pub task_id: EntityId,
    pub assigned_to: AgentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOutcome {
    pub task_id: EntityId,
    pub status: TaskStatus,
    pub completed: bool,
}

/// Delegation order: active before busy, then least loaded, then oldest, then id.
fn candidate_rank(agent: &Agent, load: usize) -> (bool, usize, Timestamp, AgentId) {
    (
        agent.status != AgentStatus::Active,
        load,
        agent.created_at,
        agent.id.clone(),
    )
}

pub struct TaskBoard {
    tasks: RwLock<HashMap<EntityId, Task>>,
    registry: Arc<dyn AgentRegistry>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Arc<dyn Clock>,
    config: PlatformConfig,
}

impl TaskBoard {
    pub fn new(registry: Arc<dyn AgentRegistry>, clock: Arc<dyn Clock>, config: PlatformConfig) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            registry,
            sink: None,
            clock,
            config,
        }
    }

    /// Announce task transitions on `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn read(&self) -> PlatformResult<RwLockReadGuard<'_, HashMap<EntityId, Task>>> {
        self.tasks
            .read()
            .map_err(|_| PlatformError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> PlatformResult<RwLockWriteGuard<'_, HashMap<EntityId, Task>>> {
        self.tasks
            .write()
            .map_err(|_| PlatformError::Storage(StorageError::LockPoisoned))
    }

    fn emit(&self, event_type: &str, task: &Task, caller: &AgentId) {
        let Some(sink) = &self.sink else {
            return;
        };
        let payload = Value::map([
            ("task_id", Value::from(task.id.to_string())),
            ("type", Value::from(task.task_type.as_str())),
            ("assigned_to", Value::from(task.assigned_to.as_str())),
            ("status", Value::from(task.status.as_str())),
        ]);
        if let Err(err) = sink.emit(topics::COORDINATION_TASKS, event_type, payload, caller) {
            tracing::warn!(error = %err, event_type, task_id = %task.id, "event emission failed");
        }
    }

    /// Create one pending task and assign it.
    ///
    /// An explicit target must be registered. Otherwise the task goes to the
    /// least-loaded non-inactive agent holding every required capability.
    pub fn delegate(&self, caller: &AgentId, request: NewTask) -> PlatformResult<DelegateOutcome> {
        if request.task_type.trim().is_empty() {
            return Err(PlatformError::missing_field("task_type"));
        }
        if request.description.trim().is_empty() {
            return Err(PlatformError::missing_field("description"));
        }

        let candidates = match &request.target_agent {
            Some(target) => vec![self.registry.get(target)?],
            None => self
                .registry
                .find_by_capabilities(&request.required_capabilities, true)?
                .into_iter()
                .filter(|agent| agent.status.can_accept_work())
                .collect(),
        };

        let mut tasks = self.write()?;
        let assignee = if request.target_agent.is_some() {
            candidates.into_iter().next()
        } else {
            let mut load: HashMap<&AgentId, usize> = HashMap::new();
            for task in tasks.values() {
                if task.status == TaskStatus::InProgress {
                    *load.entry(&task.assigned_to).or_default() += 1;
                }
            }
            candidates
                .iter()
                .min_by_key(|agent| {
                    candidate_rank(agent, load.get(&agent.id).copied().unwrap_or_default())
                })
                .cloned()
        };
        let assignee = assignee.ok_or_else(|| CoordinationError::NoCapableAgent {
            required: request.required_capabilities.to_vec(),
        })?;

        let task = Task {
            id: new_entity_id(),
            task_type: request.task_type,
            description: request.description,
            assigned_to: assignee.id.clone(),
            assigned_by: caller.clone(),
            status: TaskStatus::Pending,
            priority: request.priority.unwrap_or(self.config.default_task_priority),
            created_at: self.clock.now(),
            required_capabilities: request.required_capabilities,
            due_at: request.due_at,
            payload: request.payload,
            result: None,
            started_at: None,
            finished_at: None,
        };
        tasks.insert(task.id, task.clone());
        drop(tasks);

        tracing::info!(task_id = %task.id, assigned_to = %task.assigned_to, task_type = %task.task_type, "task delegated");
        self.emit("task_delegated", &task, caller);
        Ok(DelegateOutcome {
            delegated: true,
            task_id: task.id,
            assigned_to: task.assigned_to,
        })
    }

    /// Compare-and-swap `expected -> next` on one task.
    fn transition(
        &self,
        task_id: EntityId,
        next: TaskStatus,
        result: Option<Value>,
    ) -> PlatformResult<Task> {
        let mut tasks = self.write()?;
        let task = tasks
            .get_mut(&task_id)
            .ok_or_else(|| PlatformError::not_found(EntityKind::Task, task_id))?;
        if !task.status.can_transition_to(next) {
            return Err(CoordinationError::InvalidTransition {
                task_id,
                from: task.status,
                to: next,
            }
            .into());
        }
        let now = self.clock.now();
        task.status = next;
        if next.is_terminal() {
            task.finished_at = Some(now);
            task.result = result;
        } else {
            task.started_at = Some(now);
        }
        Ok(task.clone())
    }

    /// Consumer pick-up: `pending -> in_progress`.
    pub fn start(&self, caller: &AgentId, task_id: EntityId) -> PlatformResult<Task> {
        let task = self.transition(task_id, TaskStatus::InProgress, None)?;
        tracing::info!(task_id = %task_id, agent = %caller, "task started");
        self.emit("task_started", &task, caller);
        Ok(task)
    }

    /// Finish an in-progress task as `completed` or `failed`.
    pub fn complete(
        &self,
        caller: &AgentId,
        task_id: EntityId,
        status: TaskStatus,
        result: Option<Value>,
    ) -> PlatformResult<CompleteOutcome> {
        if !status.is_terminal() {
            return Err(PlatformError::invalid_value(
                "status",
                format!("{status} is not a terminal status (expected completed or failed)"),
            ));
        }
        let task = self.transition(task_id, status, result)?;
        tracing::info!(task_id = %task_id, status = %status, "task completed");
        self.emit("task_completed", &task, caller);
        Ok(CompleteOutcome {
            task_id,
            status,
            completed: true,
        })
    }

    pub fn get_task(&self, task_id: EntityId) -> PlatformResult<Task> {
        self.read()?
            .get(&task_id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(EntityKind::Task, task_id))
    }

    /// Tasks by priority descending, then oldest first.
    pub fn get_tasks(
        &self,
        status: Option<TaskStatus>,
        assigned_to: Option<&AgentId>,
    ) -> PlatformResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .read()?
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| assigned_to.map_or(true, |a| &t.assigned_to == a))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (Reverse(t.priority), t.created_at, t.id));
        Ok(tasks)
    }

    /// Number of `in_progress` tasks held by `agent`.
    pub fn load_of(&self, agent: &AgentId) -> PlatformResult<usize> {
        Ok(self
            .read()?
            .values()
            .filter(|t| t.status == TaskStatus::InProgress && &t.assigned_to == agent)
            .count())
    }
}
