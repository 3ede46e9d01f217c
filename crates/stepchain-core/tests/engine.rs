// crates/stepchain-core/tests/engine.rs
// ============================================================================
// Module: Engine Runner Tests
// Description: End-to-end scenarios for execution, loops, replay, and errors.
// ============================================================================
//! ## Overview
//! Exercises the specification scenarios: header stability, the full success
//! path, loop stop and exhaustion, schema rejection before the header, and
//! byte-identical replay. Also covers cancellation and collaborator failures.

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

use serde_json::Value;
use serde_json::json;
use stepchain_core::CancelFlag;
use stepchain_core::ErrorCode;
use stepchain_core::ExecuteOutcome;
use stepchain_core::ExecuteRequest;
use stepchain_core::FixtureModelProvider;
use stepchain_core::ModelError;
use stepchain_core::ModelProvider;
use stepchain_core::StateStatus;
use stepchain_core::Timestamp;
use stepchain_core::TraceId;
use stepchain_core::hashing::HashDigest;
use stepchain_core::runtime::Engine;
use stepchain_core::runtime::verify_trace_bytes;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn minimal_spec() -> Value {
    json!({
        "version": "1.0.0",
        "id": "req-1",
        "created_at": "2026-02-02T00:00:00Z",
        "inputs": {"prompt": "Hello world"},
    })
}

fn loop_spec(context: Value) -> Value {
    json!({
        "version": "1.0.0",
        "id": "req-loop",
        "created_at": "2026-02-02T00:00:00Z",
        "inputs": {"prompt": "Hello world", "context": context},
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
    })
}

fn request(spec: Value) -> ExecuteRequest {
    ExecuteRequest {
        problem_spec: spec,
        trace_id: TraceId::new("trace-1"),
        now: Timestamp::parse("2026-02-02T00:00:00Z").expect("timestamp"),
    }
}

fn run(spec: Value) -> ExecuteOutcome {
    Engine::new().execute(&request(spec), None, None).expect("execute")
}

fn trace_lines(trace: &[u8]) -> Vec<Value> {
    let body = trace.strip_suffix(b"\n").expect("trailing line feed");
    body.split(|byte| *byte == b'\n')
        .map(|line| serde_json::from_slice(line).expect("record json"))
        .collect()
}

/// Provider double that always times out.
struct TimeoutProvider;

impl ModelProvider for TimeoutProvider {
    fn generate(&self, _prompt: &str, _schema: Option<&Value>) -> Result<Vec<u8>, ModelError> {
        Err(ModelError::Timeout)
    }
}

// ============================================================================
// SECTION: Header and Success Path
// ============================================================================

#[test]
fn header_is_first_with_stable_hashes() {
    let outcome = run(minimal_spec());
    let lines = trace_lines(&outcome.trace);
    let header = &lines[0];

    assert_eq!(header["index"], json!(0));
    assert_eq!(header["trace_id"], json!("trace-1"));
    assert_eq!(header["hash_algorithm"], json!("sha256"));
    assert_eq!(header["canonicalization"], json!("json-c14n-v1"));
    assert!(HashDigest::is_well_formed(header["problem_spec_hash"].as_str().expect("hash")));
    assert!(HashDigest::is_well_formed(header["initial_state_hash"].as_str().expect("hash")));
    assert!(header.get("prev_hash").is_none(), "header carries no prev_hash");
}

#[test]
fn success_path_runs_all_seven_steps_in_graph_order() {
    let outcome = run(minimal_spec());
    assert_eq!(outcome.final_state.status, StateStatus::Completed);
    assert_eq!(outcome.final_state.step_index, 7);
    assert!(outcome.final_state.errors.is_empty());

    let lines = trace_lines(&outcome.trace);
    assert_eq!(lines.len(), 8, "header plus seven step records");
    let steps: Vec<&str> = lines[1 ..]
        .iter()
        .map(|line| line["result"]["step"].as_str().expect("step name"))
        .collect();
    assert_eq!(
        steps,
        vec![
            "Normalize",
            "Decompose",
            "AcquireEvidence",
            "Compute",
            "Verify",
            "Synthesize",
            "Audit"
        ]
    );
    for key in
        ["normalization", "decomposition", "evidence", "computation", "verification", "synthesis",
         "audit"]
    {
        assert!(outcome.final_state.artifacts.contains_key(key), "missing artifact `{key}`");
    }
}

#[test]
fn trace_records_chain_and_step_index_is_monotonic() {
    let outcome = run(minimal_spec());
    let lines = trace_lines(&outcome.trace);

    for (position, line) in lines.iter().enumerate() {
        assert_eq!(line["index"].as_u64(), Some(u64::try_from(position).expect("index")));
    }
    for pair in lines.windows(2) {
        assert_eq!(pair[1]["prev_hash"], pair[0]["record_hash"], "chain linkage must hold");
    }
    let mut previous = 0;
    for line in &lines[1 ..] {
        let step_index = line["step_index"].as_u64().expect("step index");
        assert!(step_index > previous, "step_index must be strictly monotonic");
        previous = step_index;
    }

    let summary = verify_trace_bytes(&outcome.trace).expect("verify");
    assert_eq!(summary.records, 8);
    assert_eq!(summary.step_records, 7);
    assert_eq!(summary.control_records, 0);
}

#[test]
fn replay_produces_byte_identical_traces() {
    let first = run(minimal_spec());
    let second = run(minimal_spec());
    assert_eq!(first.trace, second.trace, "replay must be byte-identical");
    assert_eq!(first.final_state, second.final_state);
}

// ============================================================================
// SECTION: Loop Scenarios
// ============================================================================

#[test]
fn loop_stops_on_first_satisfied_check() {
    let outcome = run(loop_spec(json!({"doc": "attached evidence"})));
    assert_eq!(outcome.final_state.status, StateStatus::Completed);

    let lines = trace_lines(&outcome.trace);
    let controls: Vec<&Value> =
        lines.iter().filter(|line| line.get("control_type").is_some()).collect();
    assert_eq!(controls.len(), 1, "exactly one control record");
    assert_eq!(controls[0]["action"], json!("stop"));
    assert_eq!(controls[0]["loop_iteration"], json!(1));
    assert_eq!(controls[0]["start_step"], json!("AcquireEvidence"));
    assert_eq!(controls[0]["end_step"], json!("Verify"));
    assert_eq!(outcome.final_state.step_index, 7);
}

#[test]
fn loop_exhaustion_emits_max_iterations_and_completes() {
    let outcome = run(loop_spec(json!({})));
    assert_eq!(
        outcome.final_state.status,
        StateStatus::Completed,
        "exhaustion does not fail the run; the verification artifact carries the truth"
    );

    let lines = trace_lines(&outcome.trace);
    let actions: Vec<&str> = lines
        .iter()
        .filter(|line| line.get("control_type").is_some())
        .map(|line| line["action"].as_str().expect("action"))
        .collect();
    assert_eq!(actions, vec!["repeat", "repeat", "max_iterations_reached"]);

    let step_records = lines.iter().filter(|line| line.get("result").is_some()).count();
    assert_eq!(step_records, 13, "two lead-in steps, three looped triples, two tail steps");
    assert_eq!(outcome.final_state.step_index, 13);

    assert_eq!(outcome.final_state.artifacts["verification"]["status"], json!("failed"));
    assert!(outcome.final_state.artifacts.contains_key("verification.iter.2"));
    assert!(outcome.final_state.artifacts.contains_key("verification.iter.3"));
    assert!(outcome.final_state.artifacts.contains_key("evidence.iter.3"));

    let summary = verify_trace_bytes(&outcome.trace).expect("verify");
    assert_eq!(summary.control_records, 3);
}

#[test]
fn loop_iterations_never_exceed_max_iterations() {
    let outcome = run(loop_spec(json!({})));
    let lines = trace_lines(&outcome.trace);
    let max_iteration = lines
        .iter()
        .filter(|line| line.get("control_type").is_some())
        .map(|line| line["loop_iteration"].as_u64().expect("iteration"))
        .max()
        .expect("at least one control record");
    assert!(max_iteration <= 3);
}

// ============================================================================
// SECTION: Rejection and Cancellation
// ============================================================================

#[test]
fn schema_violation_rejects_before_any_trace_is_written() {
    let mut raw = minimal_spec();
    raw["inputs"]["prompt"] = json!("");
    let err = Engine::new().execute(&request(raw), None, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SchemaInvalid);
}

#[test]
fn cancellation_fails_the_run_with_a_skipped_record() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let outcome =
        Engine::new().execute(&request(minimal_spec()), None, Some(&cancel)).expect("execute");

    assert_eq!(outcome.final_state.status, StateStatus::Failed);
    assert_eq!(outcome.final_state.errors[0].code, ErrorCode::Cancelled);
    assert_eq!(outcome.final_state.step_index, 0);

    let lines = trace_lines(&outcome.trace);
    assert_eq!(lines.len(), 2, "header plus one skipped record");
    assert_eq!(lines[1]["result"]["status"], json!("skipped"));
    assert_eq!(lines[1]["result"]["step"], json!("Normalize"));
    verify_trace_bytes(&outcome.trace).expect("trace stays valid");
}

// ============================================================================
// SECTION: Collaborators
// ============================================================================

#[test]
fn fixture_provider_contributes_model_evidence_deterministically() {
    let provider = FixtureModelProvider::new().with_fallback(br#"{"claim": "supported"}"#.to_vec());
    let engine = Engine::new();
    let first = engine.execute(&request(minimal_spec()), Some(&provider), None).expect("execute");
    let second = engine.execute(&request(minimal_spec()), Some(&provider), None).expect("execute");

    assert_eq!(first.trace, second.trace, "fixture-backed replay is byte-identical");
    let items = first.final_state.artifacts["evidence"]["items"].as_array().expect("items");
    assert!(items.iter().any(|item| item["source"] == json!("model")));
}

#[test]
fn provider_timeout_surfaces_as_collaborator_timeout() {
    let outcome = Engine::new()
        .execute(&request(minimal_spec()), Some(&TimeoutProvider), None)
        .expect("execute");

    assert_eq!(outcome.final_state.status, StateStatus::Failed);
    assert!(
        outcome
            .final_state
            .errors
            .iter()
            .any(|entry| entry.code == ErrorCode::CollaboratorTimeout)
    );

    let lines = trace_lines(&outcome.trace);
    let last = lines.last().expect("records");
    assert_eq!(last["result"]["step"], json!("AcquireEvidence"));
    assert_eq!(last["result"]["status"], json!("failed"));
    verify_trace_bytes(&outcome.trace).expect("trace stays valid");
}

#[test]
fn malformed_model_output_fails_structured_generation() {
    let provider = FixtureModelProvider::new().with_fallback(b"not json".to_vec());
    let outcome =
        Engine::new().execute(&request(minimal_spec()), Some(&provider), None).expect("execute");

    assert_eq!(outcome.final_state.status, StateStatus::Failed);
    assert!(
        outcome
            .final_state
            .errors
            .iter()
            .any(|entry| entry.code == ErrorCode::StructuredGenerationFailed)
    );
}
