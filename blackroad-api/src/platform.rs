//! Platform dispatcher
//!
//! `Platform` wires the memory store, reasoning engine and coordination bus
//! together and exposes one typed method per endpoint. `call` is the
//! name-based entry point a transport hands already-authenticated,
//! already-decoded requests to.

use crate::endpoint::Endpoint;
use crate::error::{ApiError, ApiResult};
use crate::types::*;
use blackroad_coordination::{
    AgentQuery, AgentRegistry, CapabilityIndex, CompleteOutcome, CoordinationBus, DelegateOutcome,
    InMemoryAgentRegistry, PublishOutcome, Subscription, TopicList,
};
use blackroad_core::{
    parse_entity_ref, Clock, EntityKind, EventSink, PlatformConfig, SystemClock,
};
use blackroad_memory::{InMemoryMemoryStore, MemoryStore, NewMemory, StoreOutcome};
use blackroad_reasoning::{
    CommitOutcome, Evaluation, QuarantineOutcome, ReasoningEngine, ResolveOutcome,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

fn parse<T: DeserializeOwned>(args: serde_json::Value) -> ApiResult<T> {
    Ok(serde_json::from_value(args)?)
}

fn respond<T: Serialize>(value: T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode response: {}", e)))
}

/// The three services behind a single caller-facing surface.
pub struct Platform {
    config: PlatformConfig,
    memory: Arc<InMemoryMemoryStore>,
    reasoning: ReasoningEngine,
    bus: CoordinationBus,
    registry: Arc<InMemoryAgentRegistry>,
}

impl Platform {
    /// Build a platform on the system clock.
    pub fn new(config: PlatformConfig) -> ApiResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PlatformConfig, clock: Arc<dyn Clock>) -> ApiResult<Self> {
        config.validate()?;

        let registry = Arc::new(InMemoryAgentRegistry::new(config.clone()));
        let bus = CoordinationBus::new(registry.clone(), Arc::clone(&clock), config.clone());
        let memory = Arc::new(InMemoryMemoryStore::new(Arc::clone(&clock), config.clone()));
        let sink: Arc<dyn EventSink> = bus.event_log();
        let reasoning = ReasoningEngine::new(memory.clone(), clock, config.clone())
            .with_event_sink(sink);

        tracing::info!(
            contradiction_threshold = config.contradiction_threshold,
            max_page_size = config.max_page_size,
            "platform initialized"
        );

        Ok(Self {
            config,
            memory,
            reasoning,
            bus,
            registry,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Registry handle for onboarding agents and changing their status.
    pub fn registry(&self) -> &InMemoryAgentRegistry {
        &self.registry
    }

    pub fn memory(&self) -> &InMemoryMemoryStore {
        &self.memory
    }

    pub fn reasoning(&self) -> &ReasoningEngine {
        &self.reasoning
    }

    pub fn bus(&self) -> &CoordinationBus {
        &self.bus
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Invoke an endpoint by wire name. A `null` argument is treated as `{}`.
    pub fn call(
        &self,
        ctx: &CallContext,
        name: &str,
        args: serde_json::Value,
    ) -> ApiResult<serde_json::Value> {
        tracing::debug!(endpoint = %name, agent = %ctx.agent_id, "platform call");

        let endpoint =
            Endpoint::from_name(name).ok_or_else(|| ApiError::endpoint_not_found(name))?;
        let args = if args.is_null() {
            serde_json::json!({})
        } else {
            args
        };

        let result = match endpoint {
            Endpoint::MemoryStore => respond(self.store_memory(ctx, parse(args)?)?),
            Endpoint::MemoryRetrieve => respond(self.retrieve_memory(parse(args)?)?),
            Endpoint::MemoryList => respond(self.list_memories(parse(args)?)?),
            Endpoint::MemorySearch => respond(self.search_memories(parse(args)?)?),
            Endpoint::MemoryInvalidate => respond(self.invalidate_memory(parse(args)?)?),
            Endpoint::ReasoningEvaluate => respond(self.evaluate(parse(args)?)?),
            Endpoint::ReasoningCommit => respond(self.commit_claim(ctx, parse(args)?)?),
            Endpoint::ReasoningQuarantine => respond(self.quarantine(ctx, parse(args)?)?),
            Endpoint::ReasoningResolve => respond(self.resolve(ctx, parse(args)?)?),
            Endpoint::ReasoningClaims => respond(self.claims(parse(args)?)?),
            Endpoint::CoordinationPublish => respond(self.publish(ctx, parse(args)?)?),
            Endpoint::CoordinationSubscribe => respond(self.subscribe(parse(args)?)?),
            Endpoint::CoordinationTopics => respond(self.topics()?),
            Endpoint::CoordinationDelegate => respond(self.delegate(ctx, parse(args)?)?),
            Endpoint::CoordinationTasks => respond(self.tasks(parse(args)?)?),
            Endpoint::CoordinationStart => respond(self.start_task(ctx, parse(args)?)?),
            Endpoint::CoordinationComplete => respond(self.complete_task(ctx, parse(args)?)?),
            Endpoint::AgentList => respond(self.list_agents(parse(args)?)?),
            Endpoint::AgentGet => respond(self.get_agent(parse(args)?)?),
            Endpoint::AgentFind => respond(self.find_agents(parse(args)?)?),
            Endpoint::AgentCapabilities => respond(self.agent_capabilities()?),
            Endpoint::AgentTypes => respond(self.agent_types()?),
        };

        if let Err(err) = &result {
            tracing::debug!(endpoint = %endpoint, code = %err.code, "platform call failed");
        }
        result
    }

    // ========================================================================
    // MEMORY
    // ========================================================================

    pub fn store_memory(
        &self,
        ctx: &CallContext,
        req: StoreMemoryRequest,
    ) -> ApiResult<StoreOutcome> {
        let mut memory = NewMemory::new(ctx.agent_id.clone(), req.content, req.kind);
        if let Some(context) = req.context {
            memory = memory.with_context(context);
        }
        if let Some(ttl) = req.ttl {
            memory = memory.with_ttl(ttl);
        }
        if let Some(truth_state) = req.truth_state {
            memory = memory.with_truth_state(truth_state);
        }
        Ok(self.memory.store(memory)?)
    }

    pub fn retrieve_memory(&self, req: RetrieveMemoryRequest) -> ApiResult<MemoryResponse> {
        let memory = self.memory.retrieve(&req.hash, req.include_tombstones)?;
        Ok(MemoryResponse { memory })
    }

    pub fn list_memories(&self, req: ListMemoriesRequest) -> ApiResult<MemoryListResponse> {
        let memories = self.memory.list(req.kind, req.limit)?;
        Ok(MemoryListResponse {
            count: memories.len(),
            memories,
        })
    }

    pub fn search_memories(&self, req: SearchMemoriesRequest) -> ApiResult<SearchResponse> {
        let results = self.memory.search(&req.query, req.limit)?;
        Ok(SearchResponse {
            count: results.len(),
            results,
        })
    }

    pub fn invalidate_memory(&self, req: InvalidateMemoryRequest) -> ApiResult<InvalidateResponse> {
        let invalidated = self.memory.invalidate(&req.hash)?;
        Ok(InvalidateResponse {
            invalidated,
            hash: req.hash,
        })
    }

    // ========================================================================
    // REASONING
    // ========================================================================

    pub fn evaluate(&self, req: EvaluateRequest) -> ApiResult<Evaluation> {
        Ok(self.reasoning.evaluate(
            &req.claim,
            req.context.as_ref(),
            req.check_contradictions,
        )?)
    }

    pub fn commit_claim(
        &self,
        ctx: &CallContext,
        req: CommitClaimRequest,
    ) -> ApiResult<CommitOutcome> {
        Ok(self.reasoning.commit_claim(
            &ctx.agent_id,
            &req.claim,
            req.truth_state,
            req.confidence,
            req.source,
        )?)
    }

    pub fn quarantine(
        &self,
        ctx: &CallContext,
        req: QuarantineRequest,
    ) -> ApiResult<QuarantineOutcome> {
        Ok(self.reasoning.quarantine_refs(
            &ctx.agent_id,
            &req.claim_ids,
            &req.reason,
            req.resolution_strategy,
        )?)
    }

    pub fn resolve(&self, ctx: &CallContext, req: ResolveRequest) -> ApiResult<ResolveOutcome> {
        let quarantine_id = parse_entity_ref(EntityKind::Quarantine, &req.quarantine_id)?;
        Ok(self.reasoning.resolve(
            &ctx.agent_id,
            quarantine_id,
            req.resolution,
            &req.justification,
            req.new_truth_state,
        )?)
    }

    pub fn claims(&self, req: ClaimsRequest) -> ApiResult<ClaimsResponse> {
        let claims = self.reasoning.get_claims(req.truth_state)?;
        Ok(ClaimsResponse {
            count: claims.len(),
            claims,
        })
    }

    // ========================================================================
    // COORDINATION
    // ========================================================================

    pub fn publish(&self, ctx: &CallContext, req: PublishRequest) -> ApiResult<PublishOutcome> {
        Ok(self.bus.publish(
            &ctx.agent_id,
            &req.topic,
            &req.event_type,
            req.payload,
            req.ttl,
        )?)
    }

    pub fn subscribe(&self, req: SubscribeRequest) -> ApiResult<Subscription> {
        Ok(self.bus.subscribe(&req.topic, req.since, req.limit)?)
    }

    pub fn topics(&self) -> ApiResult<TopicList> {
        Ok(self.bus.get_topics()?)
    }

    pub fn delegate(&self, ctx: &CallContext, req: DelegateRequest) -> ApiResult<DelegateOutcome> {
        Ok(self.bus.delegate(&ctx.agent_id, req.into())?)
    }

    pub fn tasks(&self, req: TasksRequest) -> ApiResult<TasksResponse> {
        let tasks = self.bus.get_tasks(req.status, req.assigned_to.as_ref())?;
        Ok(TasksResponse {
            count: tasks.len(),
            tasks,
        })
    }

    pub fn start_task(&self, ctx: &CallContext, req: StartTaskRequest) -> ApiResult<TaskResponse> {
        let task_id = parse_entity_ref(EntityKind::Task, &req.task_id)?;
        let task = self.bus.start(&ctx.agent_id, task_id)?;
        Ok(TaskResponse { task })
    }

    pub fn complete_task(
        &self,
        ctx: &CallContext,
        req: CompleteTaskRequest,
    ) -> ApiResult<CompleteOutcome> {
        let task_id = parse_entity_ref(EntityKind::Task, &req.task_id)?;
        Ok(self
            .bus
            .complete(&ctx.agent_id, task_id, req.status, req.result)?)
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    pub fn list_agents(&self, query: AgentQuery) -> ApiResult<AgentsResponse> {
        let agents = self.registry.list(&query)?;
        Ok(AgentsResponse {
            count: agents.len(),
            agents,
        })
    }

    pub fn get_agent(&self, req: GetAgentRequest) -> ApiResult<AgentResponse> {
        let agent = self.registry.get(&req.agent_id)?;
        Ok(AgentResponse { agent })
    }

    pub fn find_agents(&self, req: FindAgentsRequest) -> ApiResult<AgentsResponse> {
        let agents = self
            .registry
            .find_by_capabilities(&req.capabilities, req.match_all)?;
        Ok(AgentsResponse {
            count: agents.len(),
            agents,
        })
    }

    pub fn agent_capabilities(&self) -> ApiResult<CapabilityIndex> {
        Ok(self.registry.capabilities()?)
    }

    pub fn agent_types(&self) -> ApiResult<TypesResponse> {
        Ok(TypesResponse {
            types: self.registry.types()?,
        })
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Tombstone expired memories, prune expired events and settle every
    /// open `auto_resolve` quarantine.
    pub fn run_maintenance(&self, ctx: &CallContext) -> ApiResult<MaintenanceReport> {
        let report = MaintenanceReport {
            expired_memories: self.memory.sweep_expired()?,
            expired_events: self.bus.sweep_expired()?,
            auto_resolved: self.reasoning.auto_resolve_pending(&ctx.agent_id)?.len(),
        };
        tracing::info!(
            expired_memories = report.expired_memories,
            expired_events = report.expired_events,
            auto_resolved = report.auto_resolved,
            "maintenance pass complete"
        );
        Ok(report)
    }
}
