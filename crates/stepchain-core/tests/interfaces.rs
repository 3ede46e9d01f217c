// crates/stepchain-core/tests/interfaces.rs
// ============================================================================
// Module: Collaborator Interface Tests
// Description: Tests for trace-store idempotency, caching, and the graph.
// ============================================================================
//! ## Overview
//! Validates the collaborator contracts: appends are idempotent by
//! `(trace_id, index)`, cached responses are byte-identical, fixtures are
//! deterministic, and the execution graph order is frozen.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use stepchain_core::FixtureModelProvider;
use stepchain_core::IdempotencyCache;
use stepchain_core::InMemoryIdempotencyCache;
use stepchain_core::InMemoryTraceStore;
use stepchain_core::ModelProvider;
use stepchain_core::StepName;
use stepchain_core::TraceId;
use stepchain_core::TraceStore;
use stepchain_core::runtime::ExecutionGraph;

// ============================================================================
// SECTION: Trace Store
// ============================================================================

#[test]
fn trace_store_append_is_idempotent_by_trace_and_index() {
    let mut store = InMemoryTraceStore::new();
    let trace_id = TraceId::new("trace-1");
    store.append(&trace_id, 0, b"{\"index\":0}\n").expect("first append");
    store.append(&trace_id, 0, b"{\"index\":0}\n").expect("identical re-append is a no-op");
    assert_eq!(store.trace_bytes(&trace_id), b"{\"index\":0}\n");
}

#[test]
fn trace_store_rejects_conflicting_re_appends() {
    let mut store = InMemoryTraceStore::new();
    let trace_id = TraceId::new("trace-1");
    store.append(&trace_id, 0, b"{\"index\":0}\n").expect("first append");
    let err = store.append(&trace_id, 0, b"{\"index\":9}\n").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("conflict"), "unexpected error: {rendered}");
}

#[test]
fn trace_store_concatenates_records_in_index_order() {
    let mut store = InMemoryTraceStore::new();
    let trace_id = TraceId::new("trace-1");
    store.append(&trace_id, 1, b"b\n").expect("append");
    store.append(&trace_id, 0, b"a\n").expect("append");
    store.append(&TraceId::new("trace-2"), 0, b"x\n").expect("append");
    assert_eq!(store.trace_bytes(&trace_id), b"a\nb\n");
}

// ============================================================================
// SECTION: Idempotency Cache
// ============================================================================

#[test]
fn cached_responses_are_byte_identical() {
    let mut cache = InMemoryIdempotencyCache::new();
    let trace_id = TraceId::new("trace-1");
    assert_eq!(cache.get(&trace_id), None);

    let response = b"{\"final_state\":{}}".to_vec();
    cache.put(&trace_id, response.clone(), 600);
    assert_eq!(cache.get(&trace_id), Some(response));
}

// ============================================================================
// SECTION: Fixture Provider
// ============================================================================

#[test]
fn fixture_provider_is_deterministic_per_prompt() {
    let provider = FixtureModelProvider::new()
        .with_response("alpha", b"{\"a\":1}".to_vec())
        .with_fallback(b"{\"fallback\":true}".to_vec());

    let first = provider.generate("alpha", None).expect("generate");
    let second = provider.generate("alpha", None).expect("generate");
    assert_eq!(first, second);
    assert_eq!(provider.generate("other", None).expect("generate"), b"{\"fallback\":true}");
}

#[test]
fn fixture_provider_without_fallback_reports_missing_prompts() {
    let provider = FixtureModelProvider::new();
    assert!(provider.generate("anything", None).is_err());
}

// ============================================================================
// SECTION: Execution Graph
// ============================================================================

#[test]
fn graph_order_is_frozen() {
    let graph = ExecutionGraph::standard();
    assert_eq!(graph.len(), 7);
    assert!(!graph.is_empty());
    assert_eq!(graph.step_at(0), Some(StepName::Normalize));
    assert_eq!(graph.step_at(6), Some(StepName::Audit));
    assert_eq!(graph.step_at(7), None);
    assert_eq!(graph.next(3), Some(4));
    assert_eq!(graph.next(6), None);
    assert_eq!(graph.position(StepName::Verify), 4);
}

#[test]
fn artifact_keys_are_stable_per_step() {
    assert_eq!(StepName::Normalize.artifact_key(), "normalization");
    assert_eq!(StepName::AcquireEvidence.artifact_key(), "evidence");
    assert_eq!(StepName::Verify.artifact_key(), "verification");
    assert_eq!(StepName::Audit.artifact_key(), "audit");
}
