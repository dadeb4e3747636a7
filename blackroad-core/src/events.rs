//! Event emission seam
//!
//! The reasoning engine and task board announce state changes on the bus
//! without depending on the coordination crate. The bus implements
//! `EventSink`; anything else (a test recorder, a no-op) can stand in.

use crate::{AgentId, EntityId, PlatformResult, Value};
use std::sync::Mutex;

/// Well-known topic names.
pub mod topics {
    pub const SYSTEM_EVENTS: &str = "system.events";
    pub const AGENT_BROADCAST: &str = "agent.broadcast";
    pub const REASONING_CONTRADICTIONS: &str = "reasoning.contradictions";
    pub const REASONING_QUARANTINE: &str = "reasoning.quarantine";
    pub const COORDINATION_TASKS: &str = "coordination.tasks";
}

/// Destination for platform events.
pub trait EventSink: Send + Sync {
    fn emit(
        &self,
        topic: &str,
        event_type: &str,
        payload: Value,
        source_agent: &AgentId,
    ) -> PlatformResult<EntityId>;
}

/// Sink that records emissions in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(topic, type, payload)` in emission order.
    pub fn recorded(&self) -> Vec<(String, String, Value)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.recorded()
            .iter()
            .filter(|(_, t, _)| t == event_type)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(
        &self,
        topic: &str,
        event_type: &str,
        payload: Value,
        _source_agent: &AgentId,
    ) -> PlatformResult<EntityId> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| crate::StorageError::LockPoisoned)?;
        events.push((topic.to_string(), event_type.to_string(), payload));
        Ok(crate::new_entity_id())
    }
}
