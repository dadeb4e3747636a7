//! BlackRoad Reasoning - Trinary Logic Engine
//!
//! Claims carry a truth state in {TRUE, UNKNOWN, FALSE} and a confidence.
//! Claims that oppose each other under the same normalized content are
//! reported as contradictions and can be quarantined. A quarantined claim
//! stays in the ledger but no longer counts toward evaluation until the
//! quarantine is resolved exactly once.

mod engine;
mod ledger;

pub use engine::{CommitOutcome, Evaluation, QuarantineOutcome, ReasoningEngine, ResolveOutcome};
