//! Endpoint names
//!
//! Each operation is reachable under a stable `service/operation` name.
//! These names are the wire contract and never change.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! endpoints {
    ($($variant:ident => $name:literal,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Endpoint {
            $($variant,)+
        }

        impl Endpoint {
            pub const ALL: &'static [Endpoint] = &[$(Endpoint::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Endpoint::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Endpoint> {
                match name.trim_matches('/') {
                    $($name => Some(Endpoint::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

endpoints! {
    MemoryStore => "memory/store",
    MemoryRetrieve => "memory/retrieve",
    MemoryList => "memory/list",
    MemorySearch => "memory/search",
    MemoryInvalidate => "memory/invalidate",
    ReasoningEvaluate => "reasoning/evaluate",
    ReasoningCommit => "reasoning/commit",
    ReasoningQuarantine => "reasoning/quarantine",
    ReasoningResolve => "reasoning/resolve",
    ReasoningClaims => "reasoning/claims",
    CoordinationPublish => "coordination/publish",
    CoordinationSubscribe => "coordination/subscribe",
    CoordinationTopics => "coordination/topics",
    CoordinationDelegate => "coordination/delegate",
    CoordinationTasks => "coordination/tasks",
    CoordinationStart => "coordination/start",
    CoordinationComplete => "coordination/complete",
    AgentList => "agent/list",
    AgentGet => "agent/get",
    AgentFind => "agent/find",
    AgentCapabilities => "agent/capabilities",
    AgentTypes => "agent/types",
}

impl Endpoint {
    /// Service prefix: `memory`, `reasoning`, `coordination` or `agent`.
    pub fn service(&self) -> &'static str {
        self.as_str().split('/').next().unwrap_or_default()
    }

    /// Whether the call can change platform state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Endpoint::MemoryStore
                | Endpoint::MemoryInvalidate
                | Endpoint::ReasoningCommit
                | Endpoint::ReasoningQuarantine
                | Endpoint::ReasoningResolve
                | Endpoint::CoordinationPublish
                | Endpoint::CoordinationDelegate
                | Endpoint::CoordinationStart
                | Endpoint::CoordinationComplete
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Endpoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Endpoint::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown endpoint '{}'", name)))
    }
}
