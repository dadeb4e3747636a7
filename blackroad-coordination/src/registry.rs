//! Agent registry
//!
//! The registry is owned outside the bus; delegation only reads it through
//! `AgentRegistry`. `InMemoryAgentRegistry` backs tests and single-process
//! deployments.

use blackroad_core::{
    Agent, AgentId, AgentStatus, CapabilitySet, EntityKind, PlatformConfig, PlatformError,
    PlatformResult,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter for `AgentRegistry::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentQuery {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl AgentQuery {
    pub fn of_type(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: Some(agent_type.into()),
            ..Self::default()
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn matches(&self, agent: &Agent) -> bool {
        self.agent_type
            .as_deref()
            .map_or(true, |t| agent.agent_type == t)
            && self
                .capability
                .as_deref()
                .map_or(true, |c| agent.has_capability(c))
    }
}

/// Every capability in the registry, overall and per agent type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityIndex {
    pub capabilities: Vec<String>,
    #[serde(rename = "byType")]
    pub by_type: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub agent_type: String,
    pub count: usize,
}

/// Read interface used for discovery and capability-based delegation.
pub trait AgentRegistry: Send + Sync {
    /// Agents ordered by `created_at`, then id.
    fn list(&self, query: &AgentQuery) -> PlatformResult<Vec<Agent>>;

    fn get(&self, id: &AgentId) -> PlatformResult<Agent>;

    /// Agents holding all (`match_all`) or any of `required`. An empty
    /// requirement matches every agent.
    fn find_by_capabilities(
        &self,
        required: &CapabilitySet,
        match_all: bool,
    ) -> PlatformResult<Vec<Agent>>;

    fn capabilities(&self) -> PlatformResult<CapabilityIndex>;

    /// Agent count per type, ordered by type name.
    fn types(&self) -> PlatformResult<Vec<TypeCount>>;
}

fn by_age(a: &Agent, b: &Agent) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: DashMap<AgentId, Agent>,
    config: PlatformConfig,
}

impl InMemoryAgentRegistry {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            agents: DashMap::new(),
            config,
        }
    }

    /// Insert or replace an agent.
    pub fn register(&self, agent: Agent) -> PlatformResult<()> {
        if agent.id.as_str().trim().is_empty() {
            return Err(PlatformError::missing_field("id"));
        }
        tracing::debug!(agent = %agent.id, agent_type = %agent.agent_type, "agent registered");
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    pub fn set_status(&self, id: &AgentId, status: AgentStatus) -> PlatformResult<Agent> {
        let mut agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| PlatformError::not_found(EntityKind::Agent, id))?;
        agent.status = status;
        Ok(agent.clone())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn snapshot(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by(by_age);
        agents
    }
}

impl AgentRegistry for InMemoryAgentRegistry {
    fn list(&self, query: &AgentQuery) -> PlatformResult<Vec<Agent>> {
        let limit = self
            .config
            .page_limit(query.limit, self.config.default_list_limit);
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|agent| query.matches(agent))
            .skip(query.offset)
            .take(limit)
            .collect())
    }

    fn get(&self, id: &AgentId) -> PlatformResult<Agent> {
        self.agents
            .get(id)
            .map(|a| a.value().clone())
            .ok_or_else(|| PlatformError::not_found(EntityKind::Agent, id))
    }

    fn find_by_capabilities(
        &self,
        required: &CapabilitySet,
        match_all: bool,
    ) -> PlatformResult<Vec<Agent>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|agent| {
                if match_all {
                    agent.capabilities.match_all(required)
                } else {
                    agent.capabilities.match_any(required)
                }
            })
            .collect())
    }

    fn capabilities(&self) -> PlatformResult<CapabilityIndex> {
        let mut all = CapabilitySet::new();
        let mut by_type: BTreeMap<String, CapabilitySet> = BTreeMap::new();
        for agent in self.agents.iter() {
            all = all.union(&agent.capabilities);
            let entry = by_type.entry(agent.agent_type.clone()).or_default();
            *entry = entry.union(&agent.capabilities);
        }
        Ok(CapabilityIndex {
            capabilities: all.to_vec(),
            by_type: by_type
                .into_iter()
                .map(|(agent_type, caps)| (agent_type, caps.to_vec()))
                .collect(),
        })
    }

    fn types(&self) -> PlatformResult<Vec<TypeCount>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for agent in self.agents.iter() {
            *counts.entry(agent.agent_type.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(agent_type, count)| TypeCount { agent_type, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackroad_core::ErrorKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn agent(id: &str, agent_type: &str, caps: &[&str], minute: u32) -> Agent {
        let created_at = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, minute, 0)
            .single()
            .unwrap_or_default();
        Agent::new(id, id.to_uppercase(), agent_type, created_at).with_capabilities(caps.iter())
    }

    fn registry() -> InMemoryAgentRegistry {
        let registry = InMemoryAgentRegistry::default();
        registry.register(agent("coder", "engineer", &["rust", "sql"], 1)).unwrap();
        registry.register(agent("tester", "engineer", &["rust", "qa"], 2)).unwrap();
        registry.register(agent("writer", "author", &["docs"], 3)).unwrap();
        registry
    }

    fn ids(agents: &[Agent]) -> Vec<&str> {
        agents.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_list_filters_and_pages() {
        let registry = registry();
        let all = registry.list(&AgentQuery::default()).unwrap();
        assert_eq!(ids(&all), vec!["coder", "tester", "writer"]);

        let engineers = registry.list(&AgentQuery::of_type("engineer")).unwrap();
        assert_eq!(ids(&engineers), vec!["coder", "tester"]);

        let qa = registry
            .list(&AgentQuery::default().with_capability(" QA "))
            .unwrap();
        assert_eq!(ids(&qa), vec!["tester"]);

        let page = registry
            .list(&AgentQuery::default().with_offset(1).with_limit(1))
            .unwrap();
        assert_eq!(ids(&page), vec!["tester"]);

        assert!(registry
            .list(&AgentQuery::default().with_limit(0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = registry();
        assert_eq!(registry.get(&AgentId::new("coder")).unwrap().name, "CODER");
        let err = registry.get(&AgentId::new("ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.offending_ids(), vec!["ghost".to_string()]);
    }

    #[test]
    fn test_find_by_capabilities() {
        let registry = registry();
        let rust_sql: CapabilitySet = ["rust", "sql"].into_iter().collect();
        assert_eq!(
            ids(&registry.find_by_capabilities(&rust_sql, true).unwrap()),
            vec!["coder"]
        );
        assert_eq!(
            ids(&registry.find_by_capabilities(&rust_sql, false).unwrap()),
            vec!["coder", "tester"]
        );
        assert_eq!(
            registry
                .find_by_capabilities(&CapabilitySet::new(), true)
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn test_set_status() {
        let registry = registry();
        let agent = registry
            .set_status(&AgentId::new("writer"), AgentStatus::Busy)
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Busy);
        assert!(registry
            .set_status(&AgentId::new("ghost"), AgentStatus::Busy)
            .is_err());
    }

    #[test]
    fn test_register_rejects_blank_id() {
        let registry = InMemoryAgentRegistry::default();
        assert!(registry.register(agent("  ", "x", &[], 0)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_capability_index_and_types_wire_shape() {
        let registry = registry();
        let index = serde_json::to_value(registry.capabilities().unwrap()).unwrap();
        assert_eq!(
            index,
            json!({
                "capabilities": ["docs", "qa", "rust", "sql"],
                "byType": {"author": ["docs"], "engineer": ["qa", "rust", "sql"]}
            })
        );

        let types = serde_json::to_value(registry.types().unwrap()).unwrap();
        assert_eq!(
            types,
            json!([{"type": "author", "count": 1}, {"type": "engineer", "count": 2}])
        );
    }
}
