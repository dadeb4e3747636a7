//! BlackRoad Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for core value types
//! - Fixtures for agents, registries and clocks
//! - Assertions on error kinds

pub use blackroad_core::*;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for core value types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_trinary() -> impl Strategy<Value = TrinaryValue> {
        prop_oneof![
            Just(TrinaryValue::True),
            Just(TrinaryValue::Unknown),
            Just(TrinaryValue::False),
        ]
    }

    pub fn arb_memory_kind() -> impl Strategy<Value = MemoryKind> {
        prop::sample::select(MemoryKind::ALL.to_vec())
    }

    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        "agent-[a-z0-9]{1,8}".prop_map(AgentId::new)
    }

    /// Short lowercase sentences of one to six words.
    pub fn arb_content() -> impl Strategy<Value = String> {
        "[a-z]{1,10}( [a-z]{1,10}){0,5}"
    }

    pub fn arb_confidence() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    /// Tags held by the seeded agents, plus two nobody holds.
    pub const CAPABILITY_VOCABULARY: [&str; 6] = ["rust", "sql", "qa", "docs", "art", "ops"];

    pub fn arb_capability_set() -> impl Strategy<Value = CapabilitySet> {
        prop::sample::subsequence(CAPABILITY_VOCABULARY.to_vec(), 0..=3)
            .prop_map(|tags| tags.into_iter().collect())
    }

    /// Nested payload values. Floats stay finite so values compare equal to themselves.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e6f64..1.0e6).prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    pub fn arb_value_map() -> impl Strategy<Value = ValueMap> {
        prop::collection::btree_map("[a-z]{1,6}", arb_value(), 0..4)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    /// Start of every fixture clock: 2026-01-01T00:00:00Z.
    pub const FIXTURE_EPOCH_MS: TimestampMs = 1_767_225_600_000;

    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(FIXTURE_EPOCH_MS))
    }

    /// Active agent created `minute` minutes after the fixture epoch.
    pub fn test_agent(id: &str, agent_type: &str, capabilities: &[&str], minute: i64) -> Agent {
        let created_at = Utc
            .timestamp_millis_opt(FIXTURE_EPOCH_MS + minute * 60_000)
            .single()
            .unwrap_or_default();
        Agent::new(id, id.to_uppercase(), agent_type, created_at)
            .with_capabilities(capabilities.iter())
    }

    /// - `coder` (engineer: rust, sql)
    /// - `tester` (engineer: rust, qa)
    /// - `writer` (author: docs)
    /// - `retired` (engineer: rust, inactive)
    pub fn seeded_agents() -> Vec<Agent> {
        vec![
            test_agent("coder", "engineer", &["rust", "sql"], 1),
            test_agent("tester", "engineer", &["rust", "qa"], 2),
            test_agent("writer", "author", &["docs"], 3),
            test_agent("retired", "engineer", &["rust"], 0).with_status(AgentStatus::Inactive),
        ]
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on platform results.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &PlatformResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a result failed with the given flat error kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &PlatformResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "Wrong error kind for {:?}", err),
            Ok(value) => panic!("Expected {} error, got Ok: {:?}", kind, value),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &PlatformResult<T>, id: &str) {
        assert_kind(result, ErrorKind::NotFound);
        if let Err(err) = result {
            assert_eq!(err.offending_ids(), vec![id.to_string()]);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
