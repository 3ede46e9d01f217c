// crates/stepchain-core/tests/validate.rs
// ============================================================================
// Module: Schema Validator Tests
// Description: Tests for problem specification and step result validation.
// ============================================================================
//! ## Overview
//! Validates version gating, field rules, loop configuration rules, the
//! legacy `equals` rewrite, and step-contract enforcement.

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
use stepchain_core::ErrorCode;
use stepchain_core::StepName;
use stepchain_core::StepResult;
use stepchain_core::StepStatus;
use stepchain_core::StopOperator;
use stepchain_core::Timestamp;
use stepchain_core::hashing::hash_canonical_json;
use stepchain_core::validate::validate_problem_spec;
use stepchain_core::validate::validate_step_result;

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

fn spec_with_loop(stop_condition: Value) -> Value {
    json!({
        "version": "1.0.0",
        "id": "req-loop",
        "created_at": "2026-02-02T00:00:00Z",
        "inputs": {"prompt": "Hello world"},
        "settings": {
            "loop": {
                "enabled": true,
                "start_step": "AcquireEvidence",
                "end_step": "Verify",
                "max_iterations": 3,
                "stop_condition": stop_condition,
            },
        },
    })
}

// ============================================================================
// SECTION: Problem Specification Rules
// ============================================================================

#[test]
fn minimal_spec_is_accepted() {
    let spec = validate_problem_spec(&minimal_spec()).expect("accept");
    assert_eq!(spec.id.as_str(), "req-1");
    assert_eq!(spec.inputs.prompt, "Hello world");
    assert!(spec.settings.loop_settings.is_none());
}

#[test]
fn higher_minor_and_patch_are_accepted() {
    let mut raw = minimal_spec();
    raw["version"] = json!("1.7.2");
    assert!(validate_problem_spec(&raw).is_ok());
}

#[test]
fn higher_major_is_rejected_as_unsupported() {
    let mut raw = minimal_spec();
    raw["version"] = json!("2.0.0");
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::VersionUnsupported);
}

#[test]
fn malformed_version_is_a_schema_violation() {
    let mut raw = minimal_spec();
    raw["version"] = json!("1.0");
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::SchemaInvalid);
}

#[test]
fn empty_prompt_is_rejected() {
    let mut raw = minimal_spec();
    raw["inputs"]["prompt"] = json!("   ");
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::SchemaInvalid);
    assert!(err.violations.iter().any(|violation| violation.path == "inputs.prompt"));
}

#[test]
fn missing_prompt_is_rejected() {
    let raw = json!({
        "version": "1.0.0",
        "id": "req-1",
        "created_at": "2026-02-02T00:00:00Z",
        "inputs": {},
    });
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::SchemaInvalid);
}

#[test]
fn empty_constraint_entries_are_rejected() {
    let mut raw = minimal_spec();
    raw["inputs"]["constraints"] = json!(["keep it short", ""]);
    let err = validate_problem_spec(&raw).unwrap_err();
    assert!(err.violations.iter().any(|violation| violation.path == "inputs.constraints.1"));
}

#[test]
fn every_violation_is_enumerated() {
    let mut raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
    }));
    raw["inputs"]["prompt"] = json!("");
    raw["settings"]["loop"]["max_iterations"] = json!(0);
    let err = validate_problem_spec(&raw).unwrap_err();
    assert!(err.violations.len() >= 2, "expected both violations to be listed");
    assert!(err.violations.iter().any(|violation| violation.code == ErrorCode::SchemaInvalid));
    assert!(
        err.violations.iter().any(|violation| violation.code == ErrorCode::LoopConfigInvalid)
    );
}

// ============================================================================
// SECTION: Loop Configuration Rules
// ============================================================================

#[test]
fn valid_loop_configuration_is_accepted() {
    let raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
    }));
    let spec = validate_problem_spec(&raw).expect("accept");
    let loop_settings = spec.settings.loop_settings.expect("loop settings");
    assert_eq!(loop_settings.max_iterations, 3);
    assert_eq!(loop_settings.stop_condition.operator, Some(StopOperator::Equals));
}

#[test]
fn legacy_equals_is_rewritten_to_operator() {
    let raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "equals": "passed",
    }));
    let spec = validate_problem_spec(&raw).expect("accept");
    let condition = spec.settings.loop_settings.expect("loop settings").stop_condition;
    assert_eq!(condition.operator, Some(StopOperator::Equals));
    assert_eq!(condition.value, Some(json!("passed")));
    assert_eq!(condition.equals, None);
}

#[test]
fn operator_and_legacy_equals_together_are_rejected() {
    let raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
        "equals": "passed",
    }));
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StopConditionInvalid);
}

#[test]
fn start_step_after_end_step_is_rejected() {
    let mut raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
    }));
    raw["settings"]["loop"]["start_step"] = json!("Verify");
    raw["settings"]["loop"]["end_step"] = json!("AcquireEvidence");
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::LoopConfigInvalid);
}

#[test]
fn zero_max_iterations_is_rejected() {
    let mut raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
    }));
    raw["settings"]["loop"]["max_iterations"] = json!(0);
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::LoopConfigInvalid);
}

#[test]
fn unregistered_step_name_is_rejected() {
    let mut raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "equals",
        "value": "passed",
    }));
    raw["settings"]["loop"]["start_step"] = json!("Summon");
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::SchemaInvalid);
}

#[test]
fn stop_path_outside_artifacts_is_rejected() {
    let raw = spec_with_loop(json!({
        "path": "metadata.trace_id",
        "operator": "equals",
        "value": "x",
    }));
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StopConditionInvalid);
}

#[test]
fn float_stop_value_is_rejected() {
    let raw = spec_with_loop(json!({
        "path": "artifacts.verification.status",
        "operator": "gt",
        "value": 1.5,
    }));
    let err = validate_problem_spec(&raw).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StopConditionInvalid);
}

// ============================================================================
// SECTION: Step Result Contract
// ============================================================================

fn sample_result(status: StepStatus) -> StepResult {
    let output = json!({"value": 1});
    let hash = hash_canonical_json(&output).expect("hash");
    StepResult {
        version: "1.0.0".to_string(),
        step: StepName::Compute,
        status,
        input_hash: hash.clone(),
        output_hash: hash,
        started_at: Timestamp::parse("2026-02-02T00:00:00Z").expect("timestamp"),
        finished_at: Timestamp::parse("2026-02-02T00:00:01Z").expect("timestamp"),
        output: None,
        errors: None,
        metrics: None,
    }
}

#[test]
fn success_without_output_violates_the_contract() {
    let result = sample_result(StepStatus::Success);
    let err = validate_step_result(&result).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StepContractViolation);
}

#[test]
fn success_with_output_is_accepted() {
    let mut result = sample_result(StepStatus::Success);
    result.output = Some(json!({"value": 1}));
    assert!(validate_step_result(&result).is_ok());
}

#[test]
fn failed_without_errors_violates_the_contract() {
    let result = sample_result(StepStatus::Failed);
    let err = validate_step_result(&result).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StepContractViolation);
}

#[test]
fn skipped_with_output_violates_the_contract() {
    let mut result = sample_result(StepStatus::Skipped);
    result.output = Some(json!({}));
    let err = validate_step_result(&result).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StepContractViolation);
}

#[test]
fn skipped_without_payloads_is_accepted() {
    let result = sample_result(StepStatus::Skipped);
    assert!(validate_step_result(&result).is_ok());
}

#[test]
fn inverted_interval_violates_the_contract() {
    let mut result = sample_result(StepStatus::Skipped);
    result.started_at = Timestamp::parse("2026-02-02T00:00:02Z").expect("timestamp");
    let err = validate_step_result(&result).unwrap_err();
    assert_eq!(err.primary_code(), ErrorCode::StepContractViolation);
}
