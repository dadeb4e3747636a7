//! Agent session
//!
//! Convenience operations for a single agent, composed from the platform's
//! endpoints. Every call runs as the session's agent.

use crate::error::ApiResult;
use crate::platform::Platform;
use crate::types::*;
use blackroad_coordination::{AgentQuery, DelegateOutcome, PublishOutcome};
use blackroad_core::{
    topics, AgentId, ContentHash, EntityId, MemoryKind, PlatformError, ReasoningError,
    TrinaryValue, Value, ValueMap,
};
use blackroad_reasoning::CommitOutcome;
use serde::{Deserialize, Serialize};

const DEFAULT_ASSERT_CONFIDENCE: f64 = 0.9;
const DEFAULT_LEARN_CONFIDENCE: f64 = 0.8;
const HELP_PRIORITY: i32 = 3;
const QUESTION_PRIORITY: i32 = 5;
const THINK_QUARANTINE_REASON: &str = "Contradiction detected during think()";

/// Result of `learn`: the stored fact and the claim asserting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnOutcome {
    pub memory_hash: ContentHash,
    pub claim_id: EntityId,
}

pub struct AgentSession<'p> {
    platform: &'p Platform,
    ctx: CallContext,
}

impl<'p> AgentSession<'p> {
    pub fn new(platform: &'p Platform, agent_id: impl Into<AgentId>) -> Self {
        Self {
            platform,
            ctx: CallContext::new(agent_id),
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.ctx.agent_id
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    // ========================================================================
    // MEMORY
    // ========================================================================

    fn store(
        &self,
        kind: MemoryKind,
        content: &str,
        context: Option<ValueMap>,
    ) -> ApiResult<ContentHash> {
        let mut req = StoreMemoryRequest::new(content, kind);
        req.context = context;
        Ok(self.platform.store_memory(&self.ctx, req)?.hash)
    }

    pub fn remember(&self, content: &str, context: Option<ValueMap>) -> ApiResult<ContentHash> {
        self.store(MemoryKind::Fact, content, context)
    }

    pub fn observe(&self, content: &str, context: Option<ValueMap>) -> ApiResult<ContentHash> {
        self.store(MemoryKind::Observation, content, context)
    }

    pub fn infer(&self, content: &str, context: Option<ValueMap>) -> ApiResult<ContentHash> {
        self.store(MemoryKind::Inference, content, context)
    }

    pub fn commit(&self, content: &str, context: Option<ValueMap>) -> ApiResult<ContentHash> {
        self.store(MemoryKind::Commitment, content, context)
    }

    // ========================================================================
    // REASONING
    // ========================================================================

    fn assert_claim(
        &self,
        claim: &str,
        truth_state: TrinaryValue,
        confidence: f64,
    ) -> ApiResult<CommitOutcome> {
        self.platform.commit_claim(
            &self.ctx,
            CommitClaimRequest::new(claim, truth_state, confidence),
        )
    }

    /// Commit `claim` as TRUE, at 0.9 confidence unless given.
    pub fn assert_true(&self, claim: &str, confidence: Option<f64>) -> ApiResult<CommitOutcome> {
        self.assert_claim(
            claim,
            TrinaryValue::True,
            confidence.unwrap_or(DEFAULT_ASSERT_CONFIDENCE),
        )
    }

    pub fn assert_false(&self, claim: &str, confidence: Option<f64>) -> ApiResult<CommitOutcome> {
        self.assert_claim(
            claim,
            TrinaryValue::False,
            confidence.unwrap_or(DEFAULT_ASSERT_CONFIDENCE),
        )
    }

    pub fn assert_unknown(&self, claim: &str) -> ApiResult<CommitOutcome> {
        self.assert_claim(claim, TrinaryValue::Unknown, 0.0)
    }

    // ========================================================================
    // COORDINATION
    // ========================================================================

    fn publish(&self, topic: &str, event_type: &str, payload: Value) -> ApiResult<PublishOutcome> {
        self.platform.publish(
            &self.ctx,
            PublishRequest {
                topic: topic.to_string(),
                event_type: event_type.to_string(),
                payload,
                ttl: None,
            },
        )
    }

    /// Publish on `system.events`.
    pub fn emit(&self, event_type: &str, payload: Value) -> ApiResult<PublishOutcome> {
        self.publish(topics::SYSTEM_EVENTS, event_type, payload)
    }

    /// Publish `{message}` on `agent.broadcast`.
    pub fn broadcast(&self, message: &str) -> ApiResult<PublishOutcome> {
        self.publish(
            topics::AGENT_BROADCAST,
            "message",
            Value::map([("message", message)]),
        )
    }

    pub fn request_help<S: AsRef<str>>(
        &self,
        description: &str,
        required_capabilities: impl IntoIterator<Item = S>,
    ) -> ApiResult<DelegateOutcome> {
        self.platform.delegate(
            &self.ctx,
            DelegateRequest::new("help_request", description)
                .requiring(required_capabilities)
                .with_priority(HELP_PRIORITY),
        )
    }

    // ========================================================================
    // COMPOSITES
    // ========================================================================

    /// Evaluate `thought` and record it.
    ///
    /// A contradicted thought gets its conflicting claims quarantined and is
    /// stored as an `[QUARANTINED]` observation; anything else is stored as
    /// an inference.
    pub fn think(&self, thought: &str) -> ApiResult<ContentHash> {
        let evaluation = self.platform.evaluate(EvaluateRequest::new(thought))?;
        if !evaluation.contradictions.detected {
            return self.infer(thought, None);
        }

        let claim_ids = evaluation.contradictions.claim_ids();
        if let Some(quarantine_id) = self.quarantine_unheld(claim_ids, THINK_QUARANTINE_REASON)? {
            tracing::info!(agent = %self.ctx.agent_id, quarantine_id = %quarantine_id, "thought quarantined");
        }

        self.observe(&format!("[QUARANTINED] {}", thought), None)
    }

    /// Quarantine whichever of `claim_ids` no open quarantine holds yet.
    ///
    /// A claim found already held is dropped and the rest retried, so claims
    /// taken by a concurrent caller never block the others. Returns `None`
    /// when every claim was already held.
    fn quarantine_unheld(
        &self,
        mut claim_ids: Vec<EntityId>,
        reason: &str,
    ) -> ApiResult<Option<EntityId>> {
        while !claim_ids.is_empty() {
            let outcome = self.platform.reasoning().quarantine(
                &self.ctx.agent_id,
                &claim_ids,
                reason,
                None,
            );
            match outcome {
                Ok(q) => return Ok(Some(q.quarantine_id)),
                Err(PlatformError::Reasoning(ReasoningError::AlreadyQuarantined {
                    claim_id,
                    ..
                })) => claim_ids.retain(|id| *id != claim_id),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Remember `content` as a fact and assert it TRUE at 0.8 confidence.
    pub fn learn(&self, content: &str, context: Option<ValueMap>) -> ApiResult<LearnOutcome> {
        let memory_hash = self.remember(content, context)?;
        let claim = self.assert_true(content, Some(DEFAULT_LEARN_CONFIDENCE))?;
        Ok(LearnOutcome {
            memory_hash,
            claim_id: claim.claim.id,
        })
    }

    /// Delegate a `question` task to an agent holding `required_capabilities`.
    pub fn ask<S: AsRef<str>>(
        &self,
        question: &str,
        required_capabilities: impl IntoIterator<Item = S>,
    ) -> ApiResult<DelegateOutcome> {
        self.platform.delegate(
            &self.ctx,
            DelegateRequest::new("question", question)
                .requiring(required_capabilities)
                .with_priority(QUESTION_PRIORITY),
        )
    }

    /// Hand a `collaboration` task to the first listed agent of each type.
    /// Types with no registered agent are skipped.
    pub fn collaborate(&self, description: &str, agent_types: &[&str]) -> ApiResult<Vec<EntityId>> {
        let mut task_ids = Vec::new();
        for agent_type in agent_types {
            let found = self
                .platform
                .list_agents(AgentQuery::of_type(*agent_type).with_limit(1))?;
            if let Some(agent) = found.agents.into_iter().next() {
                let outcome = self.platform.delegate(
                    &self.ctx,
                    DelegateRequest::new("collaboration", description).to_agent(agent.id),
                )?;
                task_ids.push(outcome.task_id);
            }
        }
        Ok(task_ids)
    }
}
