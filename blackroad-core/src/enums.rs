//! Enum types for platform entities

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error when parsing an enum from its wire string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display` and `FromStr` over a fixed wire vocabulary.
/// Parsing is case-insensitive and tolerates surrounding whitespace.
macro_rules! wire_enum {
    ($name:ident, $label:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(EnumParseError {
                        kind: $label,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

// ============================================================================
// TRINARY LOGIC
// ============================================================================

/// Three-valued truth domain. Contradiction collapses to `Unknown`, never to
/// an error and never to a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TrinaryValue {
    False = -1,
    #[default]
    Unknown = 0,
    True = 1,
}

impl TrinaryValue {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(TrinaryValue::True),
            0 => Some(TrinaryValue::Unknown),
            -1 => Some(TrinaryValue::False),
            _ => None,
        }
    }

    /// Sign of a weighted vote. Zero stays `Unknown`.
    pub fn from_score(score: f64) -> Self {
        if score > f64::EPSILON {
            TrinaryValue::True
        } else if score < -f64::EPSILON {
            TrinaryValue::False
        } else {
            TrinaryValue::Unknown
        }
    }

    /// TRUE against FALSE is a hard contradiction. Anything against UNKNOWN is not.
    pub fn contradicts(self, other: TrinaryValue) -> bool {
        matches!(
            (self, other),
            (TrinaryValue::True, TrinaryValue::False) | (TrinaryValue::False, TrinaryValue::True)
        )
    }

    /// Kleene negation.
    pub fn not(self) -> Self {
        match self {
            TrinaryValue::True => TrinaryValue::False,
            TrinaryValue::False => TrinaryValue::True,
            TrinaryValue::Unknown => TrinaryValue::Unknown,
        }
    }

    /// Kleene conjunction (minimum).
    pub fn and(self, other: TrinaryValue) -> Self {
        self.min(other)
    }

    /// Kleene disjunction (maximum).
    pub fn or(self, other: TrinaryValue) -> Self {
        self.max(other)
    }

    pub fn is_decided(self) -> bool {
        self != TrinaryValue::Unknown
    }
}

impl fmt::Display for TrinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TrinaryValue::True => "true",
            TrinaryValue::Unknown => "unknown",
            TrinaryValue::False => "false",
        };
        f.write_str(value)
    }
}

impl FromStr for TrinaryValue {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(TrinaryValue::True),
            "unknown" | "0" => Ok(TrinaryValue::Unknown),
            "false" | "-1" => Ok(TrinaryValue::False),
            _ => Err(EnumParseError {
                kind: "truth state",
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for TrinaryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

struct TrinaryVisitor;

impl<'de> Visitor<'de> for TrinaryVisitor {
    type Value = TrinaryValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("1, 0, -1, \"true\", \"unknown\" or \"false\"")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TrinaryValue, E> {
        TrinaryValue::from_i64(v)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TrinaryValue, E> {
        i64::try_from(v)
            .ok()
            .and_then(TrinaryValue::from_i64)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TrinaryValue, E> {
        v.parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for TrinaryValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TrinaryVisitor)
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Kind of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fact,
    Observation,
    Inference,
    Commitment,
}

wire_enum!(MemoryKind, "memory kind", {
    Fact => "fact",
    Observation => "observation",
    Inference => "inference",
    Commitment => "commitment",
});

impl MemoryKind {
    /// Truth state an entry of this kind carries unless the caller says otherwise.
    pub fn default_truth_state(&self) -> TrinaryValue {
        match self {
            MemoryKind::Inference => TrinaryValue::Unknown,
            _ => TrinaryValue::True,
        }
    }
}

// ============================================================================
// REASONING
// ============================================================================

/// Suggested handling of a detected contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ContradictionResolution {
    /// Every involved claim already sits in an open quarantine
    Quarantine,
    /// Claims from distinct sources diverge
    Branch,
    /// A single source contradicts itself
    Reconcile,
}

wire_enum!(ContradictionResolution, "contradiction resolution", {
    Quarantine => "quarantine",
    Branch => "branch",
    Reconcile => "reconcile",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStrategy {
    #[default]
    AwaitEvidence,
    HumanReview,
    AutoResolve,
}

wire_enum!(QuarantineStrategy, "quarantine strategy", {
    AwaitEvidence => "await_evidence",
    HumanReview => "human_review",
    AutoResolve => "auto_resolve",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStatus {
    Open,
    Resolved,
}

wire_enum!(QuarantineStatus, "quarantine status", {
    Open => "open",
    Resolved => "resolved",
});

/// How a quarantine is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    AcceptFirst,
    AcceptSecond,
    RejectBoth,
    Merge,
}

wire_enum!(Resolution, "resolution", {
    AcceptFirst => "accept_first",
    AcceptSecond => "accept_second",
    RejectBoth => "reject_both",
    Merge => "merge",
});

/// Advice returned alongside an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    Quarantine,
    AwaitResolution,
    GatherEvidence,
}

wire_enum!(Recommendation, "recommendation", {
    Accept => "accept",
    Quarantine => "quarantine",
    AwaitResolution => "await_resolution",
    GatherEvidence => "gather_evidence",
});

// ============================================================================
// COORDINATION
// ============================================================================

/// Task lifecycle: `pending -> in_progress -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

wire_enum!(TaskStatus, "task status", {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
});

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
    Busy,
}

wire_enum!(AgentStatus, "agent status", {
    Active => "active",
    Inactive => "inactive",
    Busy => "busy",
});

impl AgentStatus {
    /// Whether the agent may receive delegated work at all.
    pub fn can_accept_work(&self) -> bool {
        !matches!(self, AgentStatus::Inactive)
    }
}

/// Entity discriminator used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Memory,
    Claim,
    Quarantine,
    Task,
    Agent,
}

wire_enum!(EntityKind, "entity kind", {
    Memory => "memory",
    Claim => "claim",
    Quarantine => "quarantine",
    Task => "task",
    Agent => "agent",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trinary_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&TrinaryValue::True).unwrap(), "1");
        assert_eq!(serde_json::to_string(&TrinaryValue::Unknown).unwrap(), "0");
        assert_eq!(serde_json::to_string(&TrinaryValue::False).unwrap(), "-1");
    }

    #[test]
    fn test_trinary_accepts_integer_and_word_forms() {
        let parsed: TrinaryValue = serde_json::from_str("-1").unwrap();
        assert_eq!(parsed, TrinaryValue::False);
        let parsed: TrinaryValue = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, TrinaryValue::Unknown);
        assert!(serde_json::from_str::<TrinaryValue>("2").is_err());
        assert!(serde_json::from_str::<TrinaryValue>("\"maybe\"").is_err());
    }

    #[test]
    fn test_trinary_contradiction_is_hard_only() {
        assert!(TrinaryValue::True.contradicts(TrinaryValue::False));
        assert!(TrinaryValue::False.contradicts(TrinaryValue::True));
        assert!(!TrinaryValue::True.contradicts(TrinaryValue::Unknown));
        assert!(!TrinaryValue::Unknown.contradicts(TrinaryValue::False));
        assert!(!TrinaryValue::True.contradicts(TrinaryValue::True));
    }

    #[test]
    fn test_trinary_kleene_algebra() {
        use TrinaryValue::*;
        assert_eq!(True.and(Unknown), Unknown);
        assert_eq!(False.and(Unknown), False);
        assert_eq!(True.or(Unknown), True);
        assert_eq!(False.or(Unknown), Unknown);
        assert_eq!(Unknown.not(), Unknown);
    }

    #[test]
    fn test_from_score() {
        assert_eq!(TrinaryValue::from_score(0.4), TrinaryValue::True);
        assert_eq!(TrinaryValue::from_score(-0.4), TrinaryValue::False);
        assert_eq!(TrinaryValue::from_score(0.0), TrinaryValue::Unknown);
    }

    #[test]
    fn test_wire_names_roundtrip() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), *status);
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(
            " Accept_Second ".parse::<Resolution>().unwrap(),
            Resolution::AcceptSecond
        );
        let err = "sideways".parse::<Resolution>().unwrap_err();
        assert_eq!(err.kind, "resolution");
    }

    #[test]
    fn test_task_status_transitions_are_monotonic() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn test_memory_kind_default_truth() {
        assert_eq!(MemoryKind::Fact.default_truth_state(), TrinaryValue::True);
        assert_eq!(MemoryKind::Inference.default_truth_state(), TrinaryValue::Unknown);
    }
}
