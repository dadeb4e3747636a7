//! BlackRoad Coordination - Topic Bus and Task Delegation
//!
//! Pull-based publish/subscribe over named topics, a monotonic task state
//! machine, and capability-based routing of delegated work through an
//! agent registry.

mod bus;
mod event_log;
mod registry;
mod tasks;

pub use bus::CoordinationBus;
pub use event_log::{validate_topic, EventLog, PublishOutcome, Subscription, TopicList};
pub use registry::{AgentQuery, AgentRegistry, CapabilityIndex, InMemoryAgentRegistry, TypeCount};
pub use tasks::{CompleteOutcome, DelegateOutcome, NewTask, TaskBoard};
