//! Name-based dispatch and the JSON wire shape.

use blackroad_api::*;
use blackroad_core::PlatformConfig;
use blackroad_test_utils::fixtures;
use serde_json::{json, Value as Json};

fn platform() -> Platform {
    let platform = Platform::with_clock(PlatformConfig::default(), fixtures::manual_clock())
        .expect("default config is valid");
    for agent in fixtures::seeded_agents() {
        platform.registry().register(agent).expect("seed agent");
    }
    platform
}

fn call(platform: &Platform, name: &str, args: Json) -> ApiResult<Json> {
    platform.call(&CallContext::new("caller"), name, args)
}

#[test]
fn every_endpoint_is_routed() {
    let platform = platform();
    for endpoint in Endpoint::ALL {
        let result = call(&platform, endpoint.as_str(), json!({}));
        if let Err(err) = result {
            assert_ne!(err.code, ErrorCode::EndpointNotFound, "{endpoint}");
        }
    }
    assert_eq!(Endpoint::ALL.len(), 22);
}

#[test]
fn evaluate_response_shape() -> ApiResult<()> {
    let platform = platform();
    call(
        &platform,
        "reasoning/commit",
        json!({"claim": "tests pass", "truth_state": 1, "confidence": 0.9}),
    )?;
    let evaluation = call(&platform, "reasoning/evaluate", json!({"claim": "Tests  Pass"}))?;

    assert_eq!(evaluation["claim"], "Tests  Pass");
    assert_eq!(evaluation["evaluated"], true);
    assert_eq!(evaluation["initial_state"], 1);
    assert_eq!(evaluation["contradictions"]["detected"], false);
    assert_eq!(evaluation["recommendation"], "accept");
    Ok(())
}

#[test]
fn unknown_memory_reports_kind_and_hash() {
    let platform = platform();
    let hash = "f".repeat(64);
    let err = call(&platform, "memory/retrieve", json!({"hash": hash.clone()})).unwrap_err();
    assert_eq!(err.code, ErrorCode::EntityNotFound);
    assert_eq!(err.details.as_ref().map(|d| d["kind"].clone()), Some(json!("not_found")));
    assert_eq!(err.ids(), vec![hash]);
}

#[test]
fn quarantine_of_unknown_claims_is_invalid_reference() {
    let platform = platform();
    let ghost = "01890a5d-ac96-774b-bcce-b302099a8057";
    let err = call(
        &platform,
        "reasoning/quarantine",
        json!({"claim_ids": [ghost], "reason": "?"}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidReference);
    assert_eq!(err.ids(), vec![ghost.to_string()]);

    let err = call(
        &platform,
        "reasoning/quarantine",
        json!({"claim_ids": [], "reason": "?"}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidReference);
}

#[test]
fn malformed_claim_ids_are_invalid_reference() -> ApiResult<()> {
    let platform = platform();
    let committed = call(
        &platform,
        "reasoning/commit",
        json!({"claim": "X", "truth_state": 1, "confidence": 0.9}),
    )?;
    let real = committed["claim"]["id"].clone();

    let err = call(
        &platform,
        "reasoning/quarantine",
        json!({"claim_ids": [real, "not-a-uuid"], "reason": "r"}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidReference);
    assert_eq!(
        err.details.as_ref().map(|d| d["kind"].clone()),
        Some(json!("invalid_reference"))
    );
    assert_eq!(err.ids(), vec!["not-a-uuid".to_string()]);

    let quarantines = platform.reasoning().list_quarantines(None)?;
    assert!(quarantines.is_empty());
    Ok(())
}

#[test]
fn malformed_quarantine_and_task_ids_are_not_found() {
    let platform = platform();
    let cases = [
        (
            "reasoning/resolve",
            json!({"quarantine_id": "bogus", "resolution": "reject_both", "justification": "j"}),
        ),
        ("coordination/start", json!({"task_id": "bogus"})),
        (
            "coordination/complete",
            json!({"task_id": "bogus", "status": "completed"}),
        ),
    ];
    for (endpoint, args) in cases {
        let err = call(&platform, endpoint, args).unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound, "{endpoint}");
        assert_eq!(
            err.details.as_ref().map(|d| d["kind"].clone()),
            Some(json!("not_found")),
            "{endpoint}"
        );
        assert_eq!(err.ids(), vec!["bogus".to_string()], "{endpoint}");
    }
}

#[test]
fn delegation_without_capable_agent() {
    let platform = platform();
    let err = call(
        &platform,
        "coordination/delegate",
        json!({"task_type": "paint", "description": "mural", "required_capabilities": ["art"]}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::NoCapableAgent);
    assert_eq!(err.ids(), vec!["art".to_string()]);

    let err = call(
        &platform,
        "coordination/delegate",
        json!({"task_type": "paint", "description": "mural", "target_agent": "ghost"}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::EntityNotFound);
}

#[test]
fn delegation_skips_inactive_and_prefers_least_loaded() -> ApiResult<()> {
    let platform = platform();
    let first = call(
        &platform,
        "coordination/delegate",
        json!({"task_type": "build", "description": "one", "required_capabilities": ["rust"]}),
    )?;
    // `retired` is older but inactive; `coder` is the oldest active rust agent.
    assert_eq!(first["assigned_to"], "coder");
    call(&platform, "coordination/start", json!({"task_id": first["task_id"]}))?;

    let second = call(
        &platform,
        "coordination/delegate",
        json!({"task_type": "build", "description": "two", "required_capabilities": ["rust"]}),
    )?;
    assert_eq!(second["assigned_to"], "tester");
    Ok(())
}

#[test]
fn task_listing_filters_and_orders() -> ApiResult<()> {
    let platform = platform();
    for (description, priority) in [("low", 1), ("high", 9), ("mid", 5)] {
        call(
            &platform,
            "coordination/delegate",
            json!({"task_type": "t", "description": description, "target_agent": "writer", "priority": priority}),
        )?;
    }
    let tasks = call(&platform, "coordination/tasks", json!({"status": "pending"}))?;
    assert_eq!(tasks["count"], 3);
    let order: Vec<&str> = tasks["tasks"]
        .as_array()
        .map(|tasks| tasks.iter().filter_map(|t| t["description"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(order, vec!["high", "mid", "low"]);

    let none = call(&platform, "coordination/tasks", json!({"status": "completed"}))?;
    assert_eq!(none["count"], 0);
    Ok(())
}

#[test]
fn agent_discovery_endpoints() -> ApiResult<()> {
    let platform = platform();

    let engineers = call(&platform, "agent/list", json!({"type": "engineer", "limit": 2}))?;
    assert_eq!(engineers["count"], 2);

    let found = call(
        &platform,
        "agent/find",
        json!({"capabilities": ["rust", "qa"], "matchAll": true}),
    )?;
    assert_eq!(found["count"], 1);
    assert_eq!(found["agents"][0]["id"], "tester");

    let any = call(&platform, "agent/find", json!({"capabilities": ["qa", "docs"]}))?;
    assert_eq!(any["count"], 2);

    let agent = call(&platform, "agent/get", json!({"agent_id": "writer"}))?;
    assert_eq!(agent["agent"]["type"], "author");

    let capabilities = call(&platform, "agent/capabilities", Json::Null)?;
    assert_eq!(capabilities["byType"]["author"], json!(["docs"]));

    let types = call(&platform, "agent/types", Json::Null)?;
    assert_eq!(
        types["types"],
        json!([{"type": "author", "count": 1}, {"type": "engineer", "count": 3}])
    );
    Ok(())
}

#[test]
fn bad_inputs_map_to_client_errors() {
    let platform = platform();

    let err = call(
        &platform,
        "reasoning/commit",
        json!({"claim": "x", "truth_state": 2, "confidence": 0.5}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    let err = call(
        &platform,
        "reasoning/commit",
        json!({"claim": "x", "truth_state": "true", "confidence": 1.5}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);

    let err = call(
        &platform,
        "coordination/publish",
        json!({"topic": "has space", "type": "x"}),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(err.code.is_client_error());

    let err = call(&platform, "memory/search", json!({"limit": 3})).unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingField);
}

#[test]
fn search_ranks_by_relevance() -> ApiResult<()> {
    let platform = platform();
    for content in ["rust borrow checker", "rust rust rust", "python typing"] {
        call(&platform, "memory/store", json!({"content": content, "type": "fact"}))?;
    }
    let results = call(&platform, "memory/search", json!({"query": "rust", "limit": 5}))?;
    assert_eq!(results["count"], 2);
    assert_eq!(results["results"][0]["content"], "rust rust rust");
    Ok(())
}
