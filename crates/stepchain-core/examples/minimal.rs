// crates/stepchain-core/examples/minimal.rs
// ============================================================================
// Module: Stepchain Minimal Example
// Description: Minimal end-to-end Stepchain run using in-memory adapters.
// Purpose: Demonstrate execution, trace storage, and offline verification.
// Dependencies: serde_json, stepchain-core
// ============================================================================

//! ## Overview
//! Runs a minimal problem with a loop over evidence acquisition and
//! verification, using a fixture model provider and an in-memory trace
//! store. The run is fully deterministic: executing it twice produces
//! byte-identical trace output.

use serde_json::json;
use stepchain_core::ExecuteRequest;
use stepchain_core::FixtureModelProvider;
use stepchain_core::InMemoryTraceStore;
use stepchain_core::Timestamp;
use stepchain_core::TraceId;
use stepchain_core::TraceStore;
use stepchain_core::runtime::Engine;
use stepchain_core::runtime::verify_trace_bytes;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let problem_spec = json!({
        "version": "1.0.0",
        "id": "req-minimal",
        "created_at": "2026-02-02T00:00:00Z",
        "inputs": {
            "prompt": "Summarize the attached incident report.",
            "goals": ["identify the root cause", "list the follow-up actions"],
            "context": {"report": "Disk pressure on node-7 caused evictions."},
        },
        "settings": {
            "verification_paths": [{"name": "grounding", "evidence_required": true}],
            "loop": {
                "enabled": true,
                "start_step": "AcquireEvidence",
                "end_step": "Verify",
                "max_iterations": 3,
                "stop_condition": {
                    "path": "artifacts.verification.status",
                    "operator": "equals",
                    "value": "passed",
                },
            },
        },
    });

    let provider = FixtureModelProvider::new()
        .with_fallback(br#"{"summary": "evictions caused by disk pressure"}"#.to_vec());
    let request = ExecuteRequest {
        problem_spec,
        trace_id: TraceId::new("trace-minimal"),
        now: Timestamp::parse("2026-02-02T00:00:00Z")?,
    };

    let engine = Engine::new();
    let outcome = engine.execute(&request, Some(&provider), None)?;

    let mut store = InMemoryTraceStore::new();
    for (index, line) in outcome.trace.split_inclusive(|byte| *byte == b'\n').enumerate() {
        store.append(&request.trace_id, u64::try_from(index)?, line)?;
    }

    let summary = verify_trace_bytes(&store.trace_bytes(&request.trace_id))?;
    let replay = engine.execute(&request, Some(&provider), None)?;
    assert_eq!(replay.trace, outcome.trace, "replay must be byte-identical");

    let _ = (summary, outcome.final_state);
    Ok(())
}
