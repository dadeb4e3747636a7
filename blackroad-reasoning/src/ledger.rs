//! Per-content-key claim ledger
//!
//! A bucket holds every claim ever committed under one normalized content
//! key, in commit order. Contradiction detection never crosses buckets.

use blackroad_core::{Claim, Contradiction, ContradictionResolution, EntityId};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub(crate) struct ClaimRecord {
    pub claim: Claim,
    /// Replaced by a merged claim. Superseded claims are dead.
    pub superseded: bool,
    /// Open quarantine holding this claim.
    pub quarantine: Option<EntityId>,
}

impl ClaimRecord {
    pub fn new(claim: Claim) -> Self {
        Self {
            claim,
            superseded: false,
            quarantine: None,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.superseded
    }

    /// Counts toward confidence-weighted evaluation.
    pub fn is_authoritative(&self) -> bool {
        self.is_live() && self.quarantine.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct KeyBucket {
    pub records: Vec<ClaimRecord>,
}

impl KeyBucket {
    pub fn get(&self, id: EntityId) -> Option<&ClaimRecord> {
        self.records.iter().find(|r| r.claim.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut ClaimRecord> {
        self.records.iter_mut().find(|r| r.claim.id == id)
    }

    /// Live claims taking part in at least one hard contradiction, in commit order.
    ///
    /// A pair contradicts when one is TRUE, the other FALSE, and both carry
    /// confidence of at least `threshold`.
    pub fn contradicting(&self, threshold: f64) -> Vec<&ClaimRecord> {
        let live: Vec<&ClaimRecord> = self
            .records
            .iter()
            .filter(|r| r.is_live() && r.claim.confidence >= threshold)
            .collect();

        let mut involved = BTreeSet::new();
        for (i, a) in live.iter().enumerate() {
            for (j, b) in live.iter().enumerate().skip(i + 1) {
                if a.claim.truth_state.contradicts(b.claim.truth_state) {
                    involved.insert(i);
                    involved.insert(j);
                }
            }
        }
        involved.into_iter().map(|i| live[i]).collect()
    }

    /// Signed, confidence-weighted vote of authoritative claims.
    pub fn vote(&self) -> (f64, usize) {
        self.records
            .iter()
            .filter(|r| r.is_authoritative())
            .fold((0.0, 0), |(score, n), r| {
                (
                    score + f64::from(r.claim.truth_state.as_i8()) * r.claim.confidence,
                    n + 1,
                )
            })
    }

    pub fn live_claims(&self) -> impl Iterator<Item = &Claim> {
        self.records
            .iter()
            .filter(|r| r.is_live())
            .map(|r| &r.claim)
    }
}

/// Build the wire contradiction from the involved records.
pub(crate) fn summarize(involved: &[&ClaimRecord]) -> Contradiction {
    if involved.is_empty() {
        return Contradiction::none();
    }
    let resolution = if involved.iter().all(|r| r.quarantine.is_some()) {
        ContradictionResolution::Quarantine
    } else {
        let sources: BTreeSet<&str> = involved.iter().map(|r| r.claim.source.as_str()).collect();
        if sources.len() > 1 {
            ContradictionResolution::Branch
        } else {
            ContradictionResolution::Reconcile
        }
    };
    Contradiction {
        detected: true,
        claims: involved.iter().map(|r| r.claim.clone()).collect(),
        resolution: Some(resolution),
    }
}
