//! Reasoning engine: claim ledger, evaluation and the quarantine state machine
//!
//! Locking discipline:
//! - one mutex per content-key bucket; commit and evaluation of a key are
//!   serialized on it, different keys never contend
//! - one mutex per quarantine; `resolve` is a compare-and-swap of
//!   `open -> resolved` under it
//! - order is quarantine mutex first, then buckets in ascending key order
//! - no mutex is ever awaited while a `DashMap` reference is held

use crate::ledger::{summarize, ClaimRecord, KeyBucket};
use blackroad_core::{
    context_matches, new_entity_id, normalize_content_key, topics, AgentId, Claim, Clock,
    Contradiction, ContradictionResolution, EntityId, EntityKind, EventSink, PlatformConfig,
    PlatformError, PlatformResult, Quarantine, QuarantineStatus, QuarantineStrategy,
    ReasoningError, Recommendation, Resolution, StorageError, TrinaryValue, Value, ValueMap,
};
use blackroad_memory::MemoryStore;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

type Bucket = Arc<Mutex<KeyBucket>>;
type Guards<'a> = BTreeMap<&'a str, MutexGuard<'a, KeyBucket>>;

fn poisoned<T>(_: T) -> PlatformError {
    PlatformError::Storage(StorageError::LockPoisoned)
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub claim: String,
    pub evaluated: bool,
    pub initial_state: TrinaryValue,
    pub contradictions: Contradiction,
    pub recommendation: Recommendation,
    /// Authoritative claims that voted.
    pub supporting_claims: usize,
    /// Memory entries that voted.
    pub memory_evidence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub committed: bool,
    pub claim: Claim,
    /// The new claim is part of a live contradiction.
    pub contradiction_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineOutcome {
    pub quarantined: bool,
    pub quarantine_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub resolved: bool,
    pub quarantine_id: EntityId,
    pub resolution: Resolution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_claim: Option<Claim>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Trinary-logic reasoning engine.
///
/// Commits are never rejected for contradicting the ledger; contradictions are
/// detected and reported, and callers decide whether to quarantine.
pub struct ReasoningEngine {
    memory: Arc<dyn MemoryStore>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Arc<dyn Clock>,
    config: PlatformConfig,
    buckets: DashMap<String, Bucket>,
    claim_keys: DashMap<EntityId, String>,
    quarantines: DashMap<EntityId, Arc<Mutex<Quarantine>>>,
}

impl ReasoningEngine {
    pub fn new(memory: Arc<dyn MemoryStore>, clock: Arc<dyn Clock>, config: PlatformConfig) -> Self {
        Self {
            memory,
            sink: None,
            clock,
            config,
            buckets: DashMap::new(),
            claim_keys: DashMap::new(),
            quarantines: DashMap::new(),
        }
    }

    /// Announce contradictions and quarantine transitions on `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn bucket(&self, key: &str) -> Bucket {
        Arc::clone(&self.buckets.entry(key.to_string()).or_default())
    }

    fn existing_bucket(&self, key: &str) -> Option<Bucket> {
        self.buckets.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Content key of every id. Unknown ids fail as one `InvalidReference`.
    fn keys_for(&self, ids: &[EntityId]) -> PlatformResult<BTreeMap<EntityId, String>> {
        let mut keys = BTreeMap::new();
        let mut unknown = Vec::new();
        for id in ids {
            match self.claim_keys.get(id) {
                Some(key) => {
                    keys.insert(*id, key.value().clone());
                }
                None => unknown.push(id.to_string()),
            }
        }
        if unknown.is_empty() {
            Ok(keys)
        } else {
            Err(ReasoningError::InvalidReference { ids: unknown }.into())
        }
    }

    /// Buckets for the given keys, ascending and deduplicated.
    fn buckets_for(&self, keys: &BTreeMap<EntityId, String>) -> Vec<(String, Bucket)> {
        let unique: BTreeSet<&String> = keys.values().collect();
        unique
            .into_iter()
            .map(|key| (key.clone(), self.bucket(key)))
            .collect()
    }

    fn emit(&self, topic: &str, event_type: &str, payload: Value, caller: &AgentId) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.emit(topic, event_type, payload, caller) {
                tracing::warn!(error = %err, topic, event_type, "event emission failed");
            }
        }
    }

    // ------------------------------------------------------------------------
    // evaluate
    // ------------------------------------------------------------------------

    /// Derive an initial truth state for `claim` from the ledger and memory.
    ///
    /// A live contradiction on the key forces `Unknown`. Otherwise the state is
    /// the sign of the confidence-weighted vote of authoritative claims plus
    /// memory evidence matching `context`.
    pub fn evaluate(
        &self,
        claim: &str,
        context: Option<&ValueMap>,
        check_contradictions: bool,
    ) -> PlatformResult<Evaluation> {
        let key = normalize_content_key(claim);
        if key.is_empty() {
            return Err(PlatformError::missing_field("claim"));
        }

        let evidence: Vec<_> = self
            .memory
            .evidence(&key)?
            .into_iter()
            .filter(|entry| context.map_or(true, |ctx| context_matches(&entry.context, ctx)))
            .collect();
        let memory_score: f64 = evidence
            .iter()
            .map(|entry| f64::from(entry.truth_state.as_i8()) * self.config.memory_evidence_weight)
            .sum();

        let (contradictions, claim_score, supporting_claims) = match self.existing_bucket(&key) {
            Some(bucket) => {
                let guard = bucket.lock().map_err(poisoned)?;
                let contradictions = if check_contradictions {
                    summarize(&guard.contradicting(self.config.contradiction_threshold))
                } else {
                    Contradiction::none()
                };
                let (score, voters) = guard.vote();
                (contradictions, score, voters)
            }
            None => (Contradiction::none(), 0.0, 0),
        };

        let (initial_state, recommendation) = if contradictions.detected {
            let recommendation =
                if contradictions.resolution == Some(ContradictionResolution::Quarantine) {
                    Recommendation::AwaitResolution
                } else {
                    Recommendation::Quarantine
                };
            (TrinaryValue::Unknown, recommendation)
        } else {
            let state = TrinaryValue::from_score(claim_score + memory_score);
            let recommendation = if state.is_decided() {
                Recommendation::Accept
            } else {
                Recommendation::GatherEvidence
            };
            (state, recommendation)
        };

        tracing::debug!(
            key = %key,
            state = %initial_state,
            contradiction = contradictions.detected,
            "claim evaluated"
        );
        Ok(Evaluation {
            claim: claim.to_string(),
            evaluated: true,
            initial_state,
            contradictions,
            recommendation,
            supporting_claims,
            memory_evidence: evidence.len(),
        })
    }

    // ------------------------------------------------------------------------
    // commit
    // ------------------------------------------------------------------------

    /// Append a claim to the ledger. `source` defaults to the caller.
    pub fn commit_claim(
        &self,
        caller: &AgentId,
        content: &str,
        truth_state: TrinaryValue,
        confidence: f64,
        source: Option<String>,
    ) -> PlatformResult<CommitOutcome> {
        let key = normalize_content_key(content);
        if key.is_empty() {
            return Err(PlatformError::missing_field("claim"));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(PlatformError::invalid_value(
                "confidence",
                format!("{confidence} is outside [0.0, 1.0]"),
            ));
        }

        let claim = Claim {
            id: new_entity_id(),
            content: content.to_string(),
            truth_state,
            confidence,
            source: source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| caller.to_string()),
            timestamp: self.clock.now_ms(),
        };

        let bucket = self.bucket(&key);
        let involved: Vec<EntityId> = {
            let mut guard = bucket.lock().map_err(poisoned)?;
            guard.records.push(ClaimRecord::new(claim.clone()));
            self.claim_keys.insert(claim.id, key.clone());
            let involved = guard.contradicting(self.config.contradiction_threshold);
            if involved.iter().any(|r| r.claim.id == claim.id) {
                involved.iter().map(|r| r.claim.id).collect()
            } else {
                Vec::new()
            }
        };

        let contradiction_detected = !involved.is_empty();
        tracing::debug!(claim_id = %claim.id, key = %key, truth = %truth_state, "claim committed");
        if contradiction_detected {
            tracing::info!(claim_id = %claim.id, involved = involved.len(), "contradiction detected");
            self.emit(
                topics::REASONING_CONTRADICTIONS,
                "contradiction_detected",
                Value::map([
                    ("claim_id", Value::from(claim.id.to_string())),
                    ("content", Value::from(claim.content.clone())),
                    (
                        "claim_ids",
                        Value::from(involved.iter().map(|id| id.to_string()).collect::<Vec<_>>()),
                    ),
                ]),
                caller,
            );
        }

        Ok(CommitOutcome {
            committed: true,
            claim,
            contradiction_detected,
        })
    }

    // ------------------------------------------------------------------------
    // quarantine
    // ------------------------------------------------------------------------

    /// Place live claims into a new open quarantine.
    ///
    /// Fails with `InvalidReference` for an empty set or any unknown or
    /// superseded id, and with `AlreadyQuarantined` if any claim already sits in
    /// an open quarantine. Either failure leaves every claim untouched.
    pub fn quarantine(
        &self,
        caller: &AgentId,
        claim_ids: &[EntityId],
        reason: &str,
        strategy: Option<QuarantineStrategy>,
    ) -> PlatformResult<QuarantineOutcome> {
        let mut ids: Vec<EntityId> = Vec::with_capacity(claim_ids.len());
        for id in claim_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(ReasoningError::InvalidReference { ids: Vec::new() }.into());
        }

        let keys = self.keys_for(&ids)?;
        let buckets = self.buckets_for(&keys);
        let mut guards = lock_all(&buckets)?;

        let mut dead = Vec::new();
        for id in &ids {
            match record(&guards, &keys, *id) {
                Some(record) if record.is_live() => {
                    if let Some(quarantine_id) = record.quarantine {
                        return Err(ReasoningError::AlreadyQuarantined {
                            claim_id: *id,
                            quarantine_id,
                        }
                        .into());
                    }
                }
                _ => dead.push(id.to_string()),
            }
        }
        if !dead.is_empty() {
            return Err(ReasoningError::InvalidReference { ids: dead }.into());
        }

        let quarantine_id = new_entity_id();
        for id in &ids {
            if let Some(record) = record_mut(&mut guards, &keys, *id) {
                record.quarantine = Some(quarantine_id);
            }
        }
        let strategy = strategy.unwrap_or_default();
        self.quarantines.insert(
            quarantine_id,
            Arc::new(Mutex::new(Quarantine {
                id: quarantine_id,
                claim_ids: ids.clone(),
                reason: reason.to_string(),
                strategy,
                status: QuarantineStatus::Open,
                opened_by: caller.clone(),
                created_at: self.clock.now_ms(),
                resolution: None,
                justification: None,
                resolved_at: None,
                merged_claim_id: None,
            })),
        );
        drop(guards);

        tracing::info!(quarantine_id = %quarantine_id, claims = ids.len(), strategy = %strategy, "quarantine opened");
        self.emit(
            topics::REASONING_QUARANTINE,
            "quarantine_opened",
            Value::map([
                ("quarantine_id", Value::from(quarantine_id.to_string())),
                (
                    "claim_ids",
                    Value::from(ids.iter().map(|id| id.to_string()).collect::<Vec<_>>()),
                ),
                ("reason", Value::from(reason)),
                ("strategy", Value::from(strategy.as_str())),
            ]),
            caller,
        );

        Ok(QuarantineOutcome {
            quarantined: true,
            quarantine_id,
        })
    }

    /// [`quarantine`](Self::quarantine) over raw wire ids. Malformed and
    /// unknown ids are reported together as one `InvalidReference`.
    pub fn quarantine_refs<S: AsRef<str>>(
        &self,
        caller: &AgentId,
        claim_refs: &[S],
        reason: &str,
        strategy: Option<QuarantineStrategy>,
    ) -> PlatformResult<QuarantineOutcome> {
        let mut ids = Vec::with_capacity(claim_refs.len());
        let mut bad = Vec::new();
        for raw in claim_refs {
            let raw = raw.as_ref();
            match EntityId::parse_str(raw.trim()) {
                Ok(id) if self.claim_keys.contains_key(&id) => ids.push(id),
                _ => bad.push(raw.to_string()),
            }
        }
        if !bad.is_empty() {
            tracing::debug!(ids = ?bad, "quarantine rejected unresolvable claim ids");
            return Err(ReasoningError::InvalidReference { ids: bad }.into());
        }
        self.quarantine(caller, &ids, reason, strategy)
    }

    // ------------------------------------------------------------------------
    // resolve
    // ------------------------------------------------------------------------

    /// Close an open quarantine. Exactly one concurrent caller wins; the rest
    /// observe `AlreadyResolved`.
    pub fn resolve(
        &self,
        caller: &AgentId,
        quarantine_id: EntityId,
        resolution: Resolution,
        justification: &str,
        new_truth_state: Option<TrinaryValue>,
    ) -> PlatformResult<ResolveOutcome> {
        let entry = self
            .quarantines
            .get(&quarantine_id)
            .map(|q| Arc::clone(q.value()))
            .ok_or_else(|| PlatformError::not_found(EntityKind::Quarantine, quarantine_id))?;
        let mut quarantine = entry.lock().map_err(poisoned)?;
        if !quarantine.is_open() {
            return Err(ReasoningError::AlreadyResolved { quarantine_id }.into());
        }

        let ids = quarantine.claim_ids.clone();
        let winner = match resolution {
            Resolution::AcceptFirst => ids.first().copied(),
            Resolution::AcceptSecond => Some(*ids.get(1).ok_or_else(|| {
                PlatformError::from(ReasoningError::InvalidReference {
                    ids: ids.iter().map(EntityId::to_string).collect(),
                })
            })?),
            Resolution::RejectBoth | Resolution::Merge => None,
        };
        let merged_truth = match resolution {
            Resolution::Merge => Some(
                new_truth_state.ok_or_else(|| PlatformError::missing_field("new_truth_state"))?,
            ),
            _ => None,
        };

        let keys = self.keys_for(&ids)?;
        let buckets = self.buckets_for(&keys);
        let mut guards = lock_all(&buckets)?;
        let now = self.clock.now_ms();

        let mut merged_claim = None;
        match merged_truth {
            None => {
                for id in &ids {
                    if let Some(record) = record_mut(&mut guards, &keys, *id) {
                        record.quarantine = None;
                        if winner != Some(*id) {
                            record.claim.truth_state = TrinaryValue::Unknown;
                        }
                    }
                }
            }
            Some(truth_state) => {
                let mut confidence = 0.0f64;
                let mut content = None;
                for id in &ids {
                    if let Some(record) = record_mut(&mut guards, &keys, *id) {
                        record.quarantine = None;
                        record.superseded = true;
                        confidence = confidence.max(record.claim.confidence);
                        content.get_or_insert_with(|| record.claim.content.clone());
                    }
                }
                let claim = Claim {
                    id: new_entity_id(),
                    content: content.unwrap_or_default(),
                    truth_state,
                    confidence,
                    source: format!("merge:{justification}"),
                    timestamp: now,
                };
                let first_key = ids.first().and_then(|id| keys.get(id));
                if let Some(bucket) = first_key.and_then(|key| guards.get_mut(key.as_str())) {
                    bucket.records.push(ClaimRecord::new(claim.clone()));
                }
                if let Some(key) = first_key {
                    self.claim_keys.insert(claim.id, key.clone());
                }
                merged_claim = Some(claim);
            }
        }

        quarantine.status = QuarantineStatus::Resolved;
        quarantine.resolution = Some(resolution);
        quarantine.justification = Some(justification.to_string());
        quarantine.resolved_at = Some(now);
        quarantine.merged_claim_id = merged_claim.as_ref().map(|c| c.id);
        drop(guards);
        drop(quarantine);

        tracing::info!(quarantine_id = %quarantine_id, resolution = %resolution, "quarantine resolved");
        let mut payload = BTreeMap::from([
            ("quarantine_id".to_string(), Value::from(quarantine_id.to_string())),
            ("resolution".to_string(), Value::from(resolution.as_str())),
            ("justification".to_string(), Value::from(justification)),
        ]);
        if let Some(claim) = &merged_claim {
            payload.insert("merged_claim_id".to_string(), Value::from(claim.id.to_string()));
        }
        self.emit(
            topics::REASONING_QUARANTINE,
            "quarantine_resolved",
            Value::Map(payload),
            caller,
        );

        Ok(ResolveOutcome {
            resolved: true,
            quarantine_id,
            resolution,
            merged_claim,
        })
    }

    /// Resolve every open `auto_resolve` quarantine by comparing the
    /// confidence of its first two claims. Ties and single-claim quarantines
    /// are rejected outright.
    pub fn auto_resolve_pending(&self, caller: &AgentId) -> PlatformResult<Vec<ResolveOutcome>> {
        let pending: Vec<Quarantine> = self
            .list_quarantines(Some(QuarantineStatus::Open))?
            .into_iter()
            .filter(|q| q.strategy == QuarantineStrategy::AutoResolve)
            .collect();

        let mut resolved = Vec::new();
        for quarantine in pending {
            let resolution = match quarantine.claim_ids.as_slice() {
                [first, second, ..] => {
                    let a = self.claim(*first)?.confidence;
                    let b = self.claim(*second)?.confidence;
                    if a > b {
                        Resolution::AcceptFirst
                    } else if b > a {
                        Resolution::AcceptSecond
                    } else {
                        Resolution::RejectBoth
                    }
                }
                _ => Resolution::RejectBoth,
            };
            match self.resolve(
                caller,
                quarantine.id,
                resolution,
                "auto_resolve: highest confidence wins",
                None,
            ) {
                Ok(outcome) => resolved.push(outcome),
                Err(PlatformError::Reasoning(ReasoningError::AlreadyResolved { .. })) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------------

    /// Live claims, newest first, optionally filtered by truth state.
    pub fn get_claims(&self, truth_state: Option<TrinaryValue>) -> PlatformResult<Vec<Claim>> {
        let buckets: Vec<Bucket> = self.buckets.iter().map(|b| Arc::clone(b.value())).collect();
        let mut claims = Vec::new();
        for bucket in buckets {
            let guard = bucket.lock().map_err(poisoned)?;
            claims.extend(
                guard
                    .live_claims()
                    .filter(|c| truth_state.map_or(true, |t| c.truth_state == t))
                    .cloned(),
            );
        }
        claims.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(claims)
    }

    /// Any claim ever committed, superseded ones included.
    pub fn claim(&self, id: EntityId) -> PlatformResult<Claim> {
        let key = self
            .claim_keys
            .get(&id)
            .map(|k| k.value().clone())
            .ok_or_else(|| PlatformError::not_found(EntityKind::Claim, id))?;
        let bucket = self.bucket(&key);
        let guard = bucket.lock().map_err(poisoned)?;
        guard
            .get(id)
            .map(|r| r.claim.clone())
            .ok_or_else(|| PlatformError::not_found(EntityKind::Claim, id))
    }

    /// Open quarantine currently holding `claim_id`, if any.
    pub fn open_quarantine_of(&self, claim_id: EntityId) -> PlatformResult<Option<EntityId>> {
        let key = self
            .claim_keys
            .get(&claim_id)
            .map(|k| k.value().clone())
            .ok_or_else(|| PlatformError::not_found(EntityKind::Claim, claim_id))?;
        let bucket = self.bucket(&key);
        let guard = bucket.lock().map_err(poisoned)?;
        Ok(guard.get(claim_id).and_then(|r| r.quarantine))
    }

    pub fn get_quarantine(&self, id: EntityId) -> PlatformResult<Quarantine> {
        let entry = self
            .quarantines
            .get(&id)
            .map(|q| Arc::clone(q.value()))
            .ok_or_else(|| PlatformError::not_found(EntityKind::Quarantine, id))?;
        let quarantine = entry.lock().map_err(poisoned)?;
        Ok(quarantine.clone())
    }

    /// Quarantines in creation order.
    pub fn list_quarantines(
        &self,
        status: Option<QuarantineStatus>,
    ) -> PlatformResult<Vec<Quarantine>> {
        let entries: Vec<Arc<Mutex<Quarantine>>> = self
            .quarantines
            .iter()
            .map(|q| Arc::clone(q.value()))
            .collect();
        let mut quarantines = Vec::with_capacity(entries.len());
        for entry in entries {
            let quarantine = entry.lock().map_err(poisoned)?;
            if status.map_or(true, |s| quarantine.status == s) {
                quarantines.push(quarantine.clone());
            }
        }
        quarantines.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(quarantines)
    }
}

/// Lock buckets in the given (ascending) order.
fn lock_all(buckets: &[(String, Bucket)]) -> PlatformResult<Guards<'_>> {
    let mut guards = BTreeMap::new();
    for (key, bucket) in buckets {
        guards.insert(key.as_str(), bucket.lock().map_err(poisoned)?);
    }
    Ok(guards)
}

fn record<'g>(
    guards: &'g Guards<'_>,
    keys: &BTreeMap<EntityId, String>,
    id: EntityId,
) -> Option<&'g ClaimRecord> {
    let key = keys.get(&id)?;
    guards.get(key.as_str())?.get(id)
}

fn record_mut<'g>(
    guards: &'g mut Guards<'_>,
    keys: &BTreeMap<EntityId, String>,
    id: EntityId,
) -> Option<&'g mut ClaimRecord> {
    let key = keys.get(&id)?;
    guards.get_mut(key.as_str())?.get_mut(id)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use blackroad_core::{ErrorKind, ManualClock, MemoryKind, RecordingSink};
    use blackroad_memory::{InMemoryMemoryStore, NewMemory};
    use blackroad_test_utils::assertions::{assert_kind, assert_not_found};
    use std::sync::Barrier;

    struct Fixture {
        engine: ReasoningEngine,
        memory: Arc<InMemoryMemoryStore>,
        clock: Arc<ManualClock>,
        sink: Arc<RecordingSink>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let memory = Arc::new(InMemoryMemoryStore::new(
            clock.clone(),
            PlatformConfig::default(),
        ));
        let sink = Arc::new(RecordingSink::new());
        let engine = ReasoningEngine::new(memory.clone(), clock.clone(), PlatformConfig::default())
            .with_event_sink(sink.clone());
        Fixture {
            engine,
            memory,
            clock,
            sink,
        }
    }

    fn caller() -> AgentId {
        AgentId::new("agent-1")
    }

    fn commit(f: &Fixture, content: &str, truth: TrinaryValue, confidence: f64) -> Claim {
        f.clock.advance(1);
        f.engine
            .commit_claim(&caller(), content, truth, confidence, None)
            .unwrap()
            .claim
    }

    #[test]
    fn test_contradiction_dominates_evaluation() {
        let f = fixture();
        commit(&f, "X", TrinaryValue::True, 0.9);
        commit(&f, "X", TrinaryValue::False, 0.9);

        let evaluation = f.engine.evaluate("X", None, true).unwrap();
        assert!(evaluation.evaluated);
        assert!(evaluation.contradictions.detected);
        assert_eq!(evaluation.contradictions.claims.len(), 2);
        assert_eq!(evaluation.initial_state, TrinaryValue::Unknown);
        assert_eq!(evaluation.recommendation, Recommendation::Quarantine);
        assert_eq!(
            evaluation.contradictions.resolution,
            Some(ContradictionResolution::Reconcile)
        );
    }

    #[test]
    fn test_content_key_matching_is_normalized() {
        let f = fixture();
        commit(&f, "The sky is blue", TrinaryValue::True, 0.9);
        commit(&f, "  the SKY   is blue ", TrinaryValue::False, 0.9);
        assert!(f.engine.evaluate("the sky is blue", None, true).unwrap().contradictions.detected);
        assert!(!f.engine.evaluate("the sky is green", None, true).unwrap().contradictions.detected);
    }

    #[test]
    fn test_low_confidence_opposition_is_not_a_contradiction() {
        let f = fixture();
        commit(&f, "X", TrinaryValue::True, 0.9);
        commit(&f, "X", TrinaryValue::False, 0.4);

        let evaluation = f.engine.evaluate("X", None, true).unwrap();
        assert!(!evaluation.contradictions.detected);
        assert_eq!(evaluation.initial_state, TrinaryValue::True);
        assert_eq!(evaluation.recommendation, Recommendation::Accept);
        assert_eq!(evaluation.supporting_claims, 2);
    }

    #[test]
    fn test_skipping_contradiction_check_uses_the_vote() {
        let f = fixture();
        commit(&f, "X", TrinaryValue::True, 0.9);
        commit(&f, "X", TrinaryValue::False, 0.6);

        let evaluation = f.engine.evaluate("X", None, false).unwrap();
        assert!(!evaluation.contradictions.detected);
        assert_eq!(evaluation.initial_state, TrinaryValue::True);
    }

    #[test]
    fn test_no_evidence_means_unknown() {
        let f = fixture();
        let evaluation = f.engine.evaluate("never heard of it", None, true).unwrap();
        assert_eq!(evaluation.initial_state, TrinaryValue::Unknown);
        assert_eq!(evaluation.recommendation, Recommendation::GatherEvidence);
        assert!(matches!(
            f.engine.evaluate("   ", None, true),
            Err(PlatformError::Validation(_))
        ));
    }

    #[test]
    fn test_memory_evidence_votes_and_respects_context() {
        let f = fixture();
        let context = ValueMap::from([("project".to_string(), Value::from("apollo"))]);
        f.memory
            .store(
                NewMemory::new("agent-2", "launch is on schedule", MemoryKind::Observation)
                    .with_truth_state(TrinaryValue::False)
                    .with_context(context.clone()),
            )
            .unwrap();

        let evaluation = f
            .engine
            .evaluate("Launch is on schedule", Some(&context), true)
            .unwrap();
        assert_eq!(evaluation.initial_state, TrinaryValue::False);
        assert_eq!(evaluation.memory_evidence, 1);

        let other = ValueMap::from([("project".to_string(), Value::from("gemini"))]);
        let evaluation = f
            .engine
            .evaluate("launch is on schedule", Some(&other), true)
            .unwrap();
        assert_eq!(evaluation.memory_evidence, 0);
        assert_eq!(evaluation.initial_state, TrinaryValue::Unknown);
    }

    #[test]
    fn test_commit_validates_confidence_and_content() {
        let f = fixture();
        for bad in [-0.1, 1.01, f64::NAN] {
            let err = f
                .engine
                .commit_claim(&caller(), "X", TrinaryValue::True, bad, None)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(f
            .engine
            .commit_claim(&caller(), "", TrinaryValue::True, 0.5, None)
            .is_err());
        assert!(f.engine.get_claims(None).unwrap().is_empty());
    }

    #[test]
    fn test_commit_defaults_source_and_reports_contradiction() {
        let f = fixture();
        let first = f
            .engine
            .commit_claim(&caller(), "X", TrinaryValue::True, 0.9, None)
            .unwrap();
        assert_eq!(first.claim.source, "agent-1");
        assert!(!first.contradiction_detected);

        let second = f
            .engine
            .commit_claim(
                &caller(),
                "X",
                TrinaryValue::False,
                0.9,
                Some("sensor-7".to_string()),
            )
            .unwrap();
        assert!(second.committed);
        assert_eq!(second.claim.source, "sensor-7");
        assert!(second.contradiction_detected);
        assert_eq!(f.sink.count_of("contradiction_detected"), 1);
    }

    #[test]
    fn test_quarantine_rejects_bad_references() {
        let f = fixture();
        let claim = commit(&f, "X", TrinaryValue::True, 0.9);
        let unknown = new_entity_id();

        assert_kind(
            &f.engine.quarantine(&caller(), &[], "r", None),
            ErrorKind::InvalidReference,
        );

        let err = f
            .engine
            .quarantine(&caller(), &[claim.id, unknown], "r", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert_eq!(err.offending_ids(), vec![unknown.to_string()]);
        assert_eq!(f.engine.open_quarantine_of(claim.id).unwrap(), None);
    }

    #[test]
    fn test_quarantine_refs_reports_malformed_and_unknown_ids() {
        let f = fixture();
        let claim = commit(&f, "X", TrinaryValue::True, 0.9);
        let unknown = new_entity_id().to_string();

        let refs = vec![claim.id.to_string(), "not-a-uuid".to_string(), unknown.clone()];
        let err = f
            .engine
            .quarantine_refs(&caller(), &refs, "r", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert_eq!(err.offending_ids(), vec!["not-a-uuid".to_string(), unknown]);
        assert_eq!(f.engine.open_quarantine_of(claim.id).unwrap(), None);

        let ok = f
            .engine
            .quarantine_refs(&caller(), &[format!(" {} ", claim.id)], "r", None)
            .unwrap();
        assert_eq!(
            f.engine.open_quarantine_of(claim.id).unwrap(),
            Some(ok.quarantine_id)
        );
    }

    #[test]
    fn test_claim_cannot_enter_two_open_quarantines() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let b = commit(&f, "X", TrinaryValue::False, 0.9);
        let first = f
            .engine
            .quarantine(&caller(), &[a.id, b.id, a.id], "conflict", None)
            .unwrap();
        assert!(first.quarantined);
        assert_eq!(
            f.engine.get_quarantine(first.quarantine_id).unwrap().claim_ids,
            vec![a.id, b.id]
        );

        let err = f
            .engine
            .quarantine(&caller(), &[b.id], "again", None)
            .unwrap_err();
        assert_eq!(
            err,
            PlatformError::Reasoning(ReasoningError::AlreadyQuarantined {
                claim_id: b.id,
                quarantine_id: first.quarantine_id,
            })
        );
        assert_eq!(f.sink.count_of("quarantine_opened"), 1);
    }

    #[test]
    fn test_quarantined_claims_are_not_authoritative() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let b = commit(&f, "X", TrinaryValue::False, 0.9);
        commit(&f, "X", TrinaryValue::True, 0.3);
        f.engine
            .quarantine(&caller(), &[a.id, b.id], "conflict", None)
            .unwrap();

        let evaluation = f.engine.evaluate("X", None, true).unwrap();
        assert!(evaluation.contradictions.detected);
        assert_eq!(
            evaluation.contradictions.resolution,
            Some(ContradictionResolution::Quarantine)
        );
        assert_eq!(evaluation.recommendation, Recommendation::AwaitResolution);
        assert_eq!(evaluation.initial_state, TrinaryValue::Unknown);

        let unchecked = f.engine.evaluate("X", None, false).unwrap();
        assert_eq!(unchecked.supporting_claims, 1);
        assert_eq!(unchecked.initial_state, TrinaryValue::True);
    }

    #[test]
    fn test_reject_both_is_terminal() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let b = commit(&f, "X", TrinaryValue::False, 0.9);
        let q = f
            .engine
            .quarantine(&caller(), &[a.id, b.id], "conflict", None)
            .unwrap();

        let outcome = f
            .engine
            .resolve(&caller(), q.quarantine_id, Resolution::RejectBoth, "test", None)
            .unwrap();
        assert!(outcome.resolved);
        assert_eq!(f.engine.claim(a.id).unwrap().truth_state, TrinaryValue::Unknown);
        assert_eq!(f.engine.claim(b.id).unwrap().truth_state, TrinaryValue::Unknown);

        let err = f
            .engine
            .resolve(&caller(), q.quarantine_id, Resolution::AcceptFirst, "again", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
        assert_eq!(err.offending_ids(), vec![q.quarantine_id.to_string()]);

        let stored = f.engine.get_quarantine(q.quarantine_id).unwrap();
        assert_eq!(stored.status, QuarantineStatus::Resolved);
        assert_eq!(stored.resolution, Some(Resolution::RejectBoth));
        assert!(!f.engine.evaluate("X", None, true).unwrap().contradictions.detected);
    }

    #[test]
    fn test_accept_first_demotes_the_rest() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let b = commit(&f, "X", TrinaryValue::False, 0.95);
        let q = f
            .engine
            .quarantine(&caller(), &[a.id, b.id], "conflict", None)
            .unwrap();
        f.engine
            .resolve(&caller(), q.quarantine_id, Resolution::AcceptFirst, "trusted", None)
            .unwrap();

        assert_eq!(f.engine.claim(a.id).unwrap().truth_state, TrinaryValue::True);
        assert_eq!(f.engine.claim(b.id).unwrap().truth_state, TrinaryValue::Unknown);
        assert_eq!(f.engine.open_quarantine_of(a.id).unwrap(), None);

        let evaluation = f.engine.evaluate("X", None, true).unwrap();
        assert!(!evaluation.contradictions.detected);
        assert_eq!(evaluation.initial_state, TrinaryValue::True);
        assert_eq!(evaluation.recommendation, Recommendation::Accept);
    }

    #[test]
    fn test_accept_second_needs_two_claims() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let q = f
            .engine
            .quarantine(&caller(), &[a.id], "suspicious", None)
            .unwrap();
        let err = f
            .engine
            .resolve(&caller(), q.quarantine_id, Resolution::AcceptSecond, "j", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert!(f.engine.get_quarantine(q.quarantine_id).unwrap().is_open());
    }

    #[test]
    fn test_merge_supersedes_with_new_claim() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.7);
        let b = commit(&f, "X", TrinaryValue::False, 0.9);
        let q = f
            .engine
            .quarantine(&caller(), &[a.id, b.id], "conflict", None)
            .unwrap();

        let err = f
            .engine
            .resolve(&caller(), q.quarantine_id, Resolution::Merge, "combined", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let outcome = f
            .engine
            .resolve(
                &caller(),
                q.quarantine_id,
                Resolution::Merge,
                "combined",
                Some(TrinaryValue::Unknown),
            )
            .unwrap();
        let merged = outcome.merged_claim.unwrap();
        assert_eq!(merged.content, "X");
        assert_eq!(merged.truth_state, TrinaryValue::Unknown);
        assert!((merged.confidence - 0.9).abs() < 1e-9);
        assert_eq!(merged.source, "merge:combined");

        let live = f.engine.get_claims(None).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, merged.id);
        assert_eq!(
            f.engine.get_quarantine(q.quarantine_id).unwrap().merged_claim_id,
            Some(merged.id)
        );

        assert_kind(
            &f.engine.quarantine(&caller(), &[a.id], "superseded", None),
            ErrorKind::InvalidReference,
        );
    }

    #[test]
    fn test_resolve_unknown_quarantine_is_not_found() {
        let f = fixture();
        let ghost = new_entity_id();
        assert_not_found(
            &f.engine.resolve(&caller(), ghost, Resolution::RejectBoth, "j", None),
            &ghost.to_string(),
        );
        assert_not_found(&f.engine.get_quarantine(ghost), &ghost.to_string());
    }

    #[test]
    fn test_get_claims_orders_and_filters() {
        let f = fixture();
        let a = commit(&f, "A", TrinaryValue::True, 0.9);
        let b = commit(&f, "B", TrinaryValue::False, 0.9);
        let c = commit(&f, "C", TrinaryValue::True, 0.2);

        let all: Vec<_> = f.engine.get_claims(None).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(all, vec![c.id, b.id, a.id]);

        let trues: Vec<_> = f
            .engine
            .get_claims(Some(TrinaryValue::True))
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(trues, vec![c.id, a.id]);
        assert!(f.engine.get_claims(Some(TrinaryValue::Unknown)).unwrap().is_empty());
    }

    #[test]
    fn test_auto_resolve_prefers_higher_confidence() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.6);
        let b = commit(&f, "X", TrinaryValue::False, 0.8);
        let auto = f
            .engine
            .quarantine(&caller(), &[a.id, b.id], "c", Some(QuarantineStrategy::AutoResolve))
            .unwrap();

        let c = commit(&f, "Y", TrinaryValue::True, 0.7);
        let d = commit(&f, "Y", TrinaryValue::False, 0.7);
        let tie = f
            .engine
            .quarantine(&caller(), &[c.id, d.id], "c", Some(QuarantineStrategy::AutoResolve))
            .unwrap();

        let e = commit(&f, "Z", TrinaryValue::True, 0.9);
        let g = commit(&f, "Z", TrinaryValue::False, 0.9);
        let manual = f
            .engine
            .quarantine(&caller(), &[e.id, g.id], "c", Some(QuarantineStrategy::HumanReview))
            .unwrap();

        let outcomes = f.engine.auto_resolve_pending(&caller()).unwrap();
        assert_eq!(outcomes.len(), 2);
        let by_id: BTreeMap<_, _> = outcomes
            .iter()
            .map(|o| (o.quarantine_id, o.resolution))
            .collect();
        assert_eq!(by_id[&auto.quarantine_id], Resolution::AcceptSecond);
        assert_eq!(by_id[&tie.quarantine_id], Resolution::RejectBoth);
        assert!(f.engine.get_quarantine(manual.quarantine_id).unwrap().is_open());
        assert_eq!(f.engine.claim(b.id).unwrap().truth_state, TrinaryValue::False);
        assert_eq!(f.engine.claim(a.id).unwrap().truth_state, TrinaryValue::Unknown);
        assert_eq!(
            f.engine.list_quarantines(Some(QuarantineStatus::Open)).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_concurrent_resolve_is_exactly_once() {
        let f = fixture();
        let a = commit(&f, "X", TrinaryValue::True, 0.9);
        let b = commit(&f, "X", TrinaryValue::False, 0.9);
        let q = f
            .engine
            .quarantine(&caller(), &[a.id, b.id], "conflict", None)
            .unwrap();

        let threads = 8;
        let barrier = Barrier::new(threads);
        let results: Vec<PlatformResult<ResolveOutcome>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        f.engine.resolve(
                            &caller(),
                            q.quarantine_id,
                            Resolution::RejectBoth,
                            "race",
                            None,
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::AlreadyResolved));
        assert_eq!(f.sink.count_of("quarantine_resolved"), 1);
    }

    #[test]
    fn test_concurrent_opposing_commits_are_serialized_per_key() {
        for _ in 0..20 {
            let f = fixture();
            let barrier = Barrier::new(2);
            let outcomes: Vec<CommitOutcome> = std::thread::scope(|s| {
                let handles: Vec<_> = [TrinaryValue::True, TrinaryValue::False]
                    .into_iter()
                    .map(|truth| {
                        let engine = &f.engine;
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            engine.commit_claim(&caller(), "race", truth, 0.9, None).unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            let detected = outcomes.iter().filter(|o| o.contradiction_detected).count();
            assert_eq!(detected, 1);
            assert!(f.engine.evaluate("race", None, true).unwrap().contradictions.detected);
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use blackroad_core::{ErrorKind, ManualClock};
    use blackroad_memory::InMemoryMemoryStore;
    use blackroad_test_utils::assertions::{assert_kind, assert_ok};
    use blackroad_test_utils::generators::{arb_confidence, arb_trinary};
    use proptest::prelude::*;

    fn engine() -> ReasoningEngine {
        let clock = Arc::new(ManualClock::new(0));
        let memory = Arc::new(InMemoryMemoryStore::new(clock.clone(), PlatformConfig::default()));
        ReasoningEngine::new(memory, clock, PlatformConfig::default())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_detection_matches_definition(
            commits in prop::collection::vec((arb_trinary(), arb_confidence()), 0..8)
        ) {
            let engine = engine();
            let agent = AgentId::new("p");
            for (truth, confidence) in &commits {
                engine.commit_claim(&agent, "key", *truth, *confidence, None).unwrap();
            }
            let strong = |t: TrinaryValue| commits.iter().any(|(truth, c)| *truth == t && *c >= 0.5);
            let expected = strong(TrinaryValue::True) && strong(TrinaryValue::False);

            let evaluation = engine.evaluate("key", None, true).unwrap();
            prop_assert_eq!(evaluation.contradictions.detected, expected);
            if expected {
                prop_assert_eq!(evaluation.initial_state, TrinaryValue::Unknown);
            }
        }

        #[test]
        fn prop_resolution_clears_contradiction(
            resolution in prop_oneof![
                Just(Resolution::AcceptFirst),
                Just(Resolution::AcceptSecond),
                Just(Resolution::RejectBoth),
                Just(Resolution::Merge),
            ],
            merged in arb_trinary(),
        ) {
            let engine = engine();
            let agent = AgentId::new("p");
            let a = engine.commit_claim(&agent, "k", TrinaryValue::True, 0.9, None).unwrap().claim;
            let b = engine.commit_claim(&agent, "k", TrinaryValue::False, 0.9, None).unwrap().claim;
            let q = engine.quarantine(&agent, &[a.id, b.id], "p", None).unwrap();
            assert_ok(&engine.resolve(&agent, q.quarantine_id, resolution, "p", Some(merged)));

            prop_assert!(!engine.evaluate("k", None, true).unwrap().contradictions.detected);
            let repeat = engine.resolve(&agent, q.quarantine_id, resolution, "p", Some(merged));
            assert_kind(&repeat, ErrorKind::AlreadyResolved);
        }
    }
}
