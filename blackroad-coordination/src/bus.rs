//! Coordination bus facade
//!
//! Wires the event log, task board and agent registry together. Task
//! transitions are announced on the bus itself.

use crate::event_log::{EventLog, PublishOutcome, Subscription, TopicList};
use crate::registry::AgentRegistry;
use crate::tasks::{CompleteOutcome, DelegateOutcome, NewTask, TaskBoard};
use blackroad_core::{
    AgentId, Clock, EntityId, PlatformConfig, PlatformResult, Task, TaskStatus, TimestampMs, Value,
};
use std::sync::Arc;

pub struct CoordinationBus {
    events: Arc<EventLog>,
    tasks: TaskBoard,
    registry: Arc<dyn AgentRegistry>,
}

impl CoordinationBus {
    pub fn new(registry: Arc<dyn AgentRegistry>, clock: Arc<dyn Clock>, config: PlatformConfig) -> Self {
        let events = Arc::new(EventLog::new(Arc::clone(&clock), config.clone()));
        let tasks = TaskBoard::new(Arc::clone(&registry), clock, config)
            .with_event_sink(events.clone());
        Self {
            events,
            tasks,
            registry,
        }
    }

    /// The event log, usable as an `EventSink` for other services.
    pub fn event_log(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    pub fn registry(&self) -> &dyn AgentRegistry {
        self.registry.as_ref()
    }

    pub fn task_board(&self) -> &TaskBoard {
        &self.tasks
    }

    pub fn publish(
        &self,
        source_agent: &AgentId,
        topic: &str,
        event_type: &str,
        payload: Value,
        ttl_secs: Option<i64>,
    ) -> PlatformResult<PublishOutcome> {
        self.events
            .publish(source_agent, topic, event_type, payload, ttl_secs)
    }

    pub fn subscribe(
        &self,
        topic: &str,
        since: Option<TimestampMs>,
        limit: Option<usize>,
    ) -> PlatformResult<Subscription> {
        self.events.subscribe(topic, since, limit)
    }

    pub fn get_topics(&self) -> PlatformResult<TopicList> {
        self.events.get_topics()
    }

    pub fn delegate(&self, caller: &AgentId, request: NewTask) -> PlatformResult<DelegateOutcome> {
        self.tasks.delegate(caller, request)
    }

    pub fn start(&self, caller: &AgentId, task_id: EntityId) -> PlatformResult<Task> {
        self.tasks.start(caller, task_id)
    }

    pub fn complete(
        &self,
        caller: &AgentId,
        task_id: EntityId,
        status: TaskStatus,
        result: Option<Value>,
    ) -> PlatformResult<CompleteOutcome> {
        self.tasks.complete(caller, task_id, status, result)
    }

    pub fn get_tasks(
        &self,
        status: Option<TaskStatus>,
        assigned_to: Option<&AgentId>,
    ) -> PlatformResult<Vec<Task>> {
        self.tasks.get_tasks(status, assigned_to)
    }

    pub fn sweep_expired(&self) -> PlatformResult<usize> {
        self.events.sweep_expired()
    }
}
