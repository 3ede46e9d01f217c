// crates/stepchain-core/src/runtime/steps.rs
// ============================================================================
// Module: Stepchain Built-in Steps
// Description: The seven deterministic step functions of the standard registry.
// Purpose: Derive every step output solely from state, settings, and context.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! Built-in steps are pure over their declared inputs: they read the
//! reasoning state (through iteration-aware artifact resolution), optionally
//! consult the model oracle, and produce a [`StepResult`] whose
//! `input_hash`/`output_hash` are canonical hashes of the declared
//! projections. Collaborator responses are folded into the input projection
//! so replays against fixtures stay byte-identical. Steps never mutate
//! state; failures surface as failed results, never as partial artifacts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::core::errors::ErrorCode;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::StepName;
use crate::core::state::ErrorRecord;
use crate::core::state::ReasoningState;
use crate::core::step::STEP_RESULT_VERSION;
use crate::core::step::StepMetrics;
use crate::core::step::StepResult;
use crate::core::step::StepStatus;
use crate::core::time::Timestamp;
use crate::interfaces::ModelError;
use crate::runtime::registry::StepContext;
use crate::runtime::registry::StepError;
use crate::runtime::registry::StepOutcome;

// ============================================================================
// SECTION: Result Builders
// ============================================================================

/// Builds a successful step outcome from declared projections.
fn success(
    step: StepName,
    inputs: Value,
    output: Value,
    started_at: Timestamp,
    finished_at: Timestamp,
    metrics: Option<StepMetrics>,
) -> Result<StepOutcome, StepError> {
    let input_hash = hash_canonical_json(&inputs)?;
    let output_hash = hash_canonical_json(&output)?;
    Ok(StepOutcome {
        result: StepResult {
            version: STEP_RESULT_VERSION.to_string(),
            step,
            status: StepStatus::Success,
            input_hash,
            output_hash,
            started_at,
            finished_at,
            output: Some(output),
            errors: None,
            metrics,
        },
        inputs,
    })
}

/// Builds a failed step outcome from declared projections.
fn failure(
    step: StepName,
    inputs: Value,
    errors: Vec<ErrorRecord>,
    started_at: Timestamp,
    finished_at: Timestamp,
) -> Result<StepOutcome, StepError> {
    let input_hash = hash_canonical_json(&inputs)?;
    let output_hash = hash_canonical_json(&Value::Null)?;
    Ok(StepOutcome {
        result: StepResult {
            version: STEP_RESULT_VERSION.to_string(),
            step,
            status: StepStatus::Failed,
            input_hash,
            output_hash,
            started_at,
            finished_at,
            output: None,
            errors: Some(errors),
            metrics: None,
        },
        inputs,
    })
}

/// Derives latency metrics from the deterministic interval.
fn interval_metrics(started_at: &Timestamp, finished_at: &Timestamp) -> StepMetrics {
    let millis = (finished_at.instant() - started_at.instant()).whole_milliseconds();
    StepMetrics {
        tokens_in: None,
        tokens_out: None,
        latency_ms: Some(u64::try_from(millis).unwrap_or(0)),
    }
}

// ============================================================================
// SECTION: Shared Projections
// ============================================================================

/// Collapses whitespace runs into single spaces and trims the ends.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims entries and drops the empty ones.
fn trimmed_entries(entries: &[String]) -> Vec<String> {
    entries.iter().map(|entry| entry.trim().to_string()).filter(|entry| !entry.is_empty()).collect()
}

/// Returns the normalized prompt, falling back to the raw input prompt when
/// normalization has not run.
fn normalized_prompt(state: &ReasoningState, iteration: u64) -> String {
    state
        .resolve_artifact(StepName::Normalize.artifact_key(), iteration)
        .and_then(|artifact| artifact.get("prompt"))
        .and_then(Value::as_str)
        .map_or_else(|| collapse_whitespace(&state.problem.inputs.prompt), str::to_string)
}

/// Returns the acquired evidence item count for the current iteration.
fn evidence_count(state: &ReasoningState, iteration: u64) -> u64 {
    state
        .resolve_artifact(StepName::AcquireEvidence.artifact_key(), iteration)
        .and_then(|artifact| artifact.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

// ============================================================================
// SECTION: Normalize
// ============================================================================

/// Normalizes the problem inputs into the `normalization` artifact.
pub fn step_normalize(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let problem_inputs = &state.problem.inputs;
    let inputs = json!({
        "step": StepName::Normalize,
        "prompt": problem_inputs.prompt,
        "constraints": problem_inputs.constraints,
        "goals": problem_inputs.goals,
    });
    let output = json!({
        "prompt": collapse_whitespace(&problem_inputs.prompt),
        "constraints": trimmed_entries(&problem_inputs.constraints),
        "goals": trimmed_entries(&problem_inputs.goals),
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Normalize, inputs, output, started_at, finished_at, Some(metrics))
}

// ============================================================================
// SECTION: Decompose
// ============================================================================

/// Splits the normalized problem into ordered subtasks.
pub fn step_decompose(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let normalization = state
        .resolve_artifact(StepName::Normalize.artifact_key(), ctx.iteration)
        .cloned()
        .unwrap_or(Value::Null);
    let inputs = json!({
        "step": StepName::Decompose,
        "normalization": normalization,
    });

    let prompt = normalized_prompt(state, ctx.iteration);
    let goals: Vec<String> = normalization
        .get("goals")
        .and_then(Value::as_array)
        .map(|entries| {
            entries.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let mut descriptions: Vec<String> =
        if goals.is_empty() { split_sentences(&prompt) } else { goals };
    if descriptions.is_empty() {
        descriptions.push(prompt);
    }
    let subtasks: Vec<Value> = descriptions
        .iter()
        .enumerate()
        .map(|(position, description)| {
            json!({
                "id": format!("task-{}", position + 1),
                "description": description,
            })
        })
        .collect();
    let output = json!({
        "subtasks": subtasks,
        "count": subtasks.len(),
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Decompose, inputs, output, started_at, finished_at, Some(metrics))
}

/// Splits text into trimmed, non-empty sentence fragments.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// SECTION: Acquire Evidence
// ============================================================================

/// Collects evidence from the problem context and the configured oracle.
pub fn step_acquire_evidence(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let prompt = normalized_prompt(state, ctx.iteration);
    let context = &state.problem.inputs.context;

    let mut items: Vec<Value> = context
        .iter()
        .map(|(name, value)| {
            json!({
                "source": "context",
                "name": name,
                "value": value,
            })
        })
        .collect();

    let mut model_response: Option<String> = None;
    let mut metrics = StepMetrics::default();
    let mut model_failure: Option<ErrorRecord> = None;
    if let Some(provider) = ctx.provider {
        match provider.generate(&prompt, None) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                metrics.tokens_in = Some(u64::try_from(prompt.len()).unwrap_or(u64::MAX));
                metrics.tokens_out = Some(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => {
                        items.push(json!({
                            "source": "model",
                            "name": "generation",
                            "value": value,
                        }));
                    }
                    Err(err) => {
                        model_failure = Some(ErrorRecord {
                            code: ErrorCode::StructuredGenerationFailed,
                            message: format!("model output is not valid JSON: {err}"),
                            step: Some(StepName::AcquireEvidence),
                        });
                    }
                }
                model_response = Some(text);
            }
            Err(ModelError::Timeout) => {
                model_failure = Some(ErrorRecord {
                    code: ErrorCode::CollaboratorTimeout,
                    message: "model provider timed out".to_string(),
                    step: Some(StepName::AcquireEvidence),
                });
            }
            Err(ModelError::Provider(message)) => {
                model_failure = Some(ErrorRecord {
                    code: ErrorCode::StructuredGenerationFailed,
                    message: format!("model provider error: {message}"),
                    step: Some(StepName::AcquireEvidence),
                });
            }
        }
    }

    // Collaborator responses are part of the declared inputs so replays with
    // fixtures reproduce the same input hash.
    let inputs = json!({
        "step": StepName::AcquireEvidence,
        "prompt": prompt,
        "context": context,
        "model_response": model_response,
    });
    let finished_at = ctx.clock.now()?;
    if let Some(entry) = model_failure {
        return failure(StepName::AcquireEvidence, inputs, vec![entry], started_at, finished_at);
    }
    let output = json!({
        "items": items,
        "count": items.len(),
    });
    metrics.latency_ms = interval_metrics(&started_at, &finished_at).latency_ms;
    success(StepName::AcquireEvidence, inputs, output, started_at, finished_at, Some(metrics))
}

// ============================================================================
// SECTION: Compute
// ============================================================================

/// Derives one finding per subtask from the acquired evidence.
pub fn step_compute(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let decomposition = state
        .resolve_artifact(StepName::Decompose.artifact_key(), ctx.iteration)
        .cloned()
        .unwrap_or(Value::Null);
    let evidence_items = evidence_count(state, ctx.iteration);
    let inputs = json!({
        "step": StepName::Compute,
        "decomposition": decomposition,
        "evidence_count": evidence_items,
    });

    let findings: Vec<Value> = decomposition
        .get("subtasks")
        .and_then(Value::as_array)
        .map(|subtasks| {
            subtasks
                .iter()
                .map(|subtask| {
                    json!({
                        "subtask": subtask.get("id").cloned().unwrap_or(Value::Null),
                        "description": subtask.get("description").cloned().unwrap_or(Value::Null),
                        "supported": evidence_items > 0,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let output = json!({
        "findings": findings,
        "count": findings.len(),
        "evidence_count": evidence_items,
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Compute, inputs, output, started_at, finished_at, Some(metrics))
}

// ============================================================================
// SECTION: Verify
// ============================================================================

/// Evaluates every configured verification path and the aggregate status.
pub fn step_verify(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let paths = &state.problem.settings.verification_paths;
    let evidence_items = evidence_count(state, ctx.iteration);
    let inputs = json!({
        "step": StepName::Verify,
        "paths": paths,
        "evidence_count": evidence_items,
    });

    let outcomes: Vec<Value> = paths
        .iter()
        .map(|path| {
            let passed = !path.evidence_required || evidence_items > 0;
            json!({
                "name": path.name,
                "evidence_required": path.evidence_required,
                "passed": passed,
            })
        })
        .collect();
    let all_passed =
        outcomes.iter().all(|outcome| outcome.get("passed") == Some(&Value::Bool(true)));
    let output = json!({
        "paths": outcomes,
        "status": if all_passed { "passed" } else { "failed" },
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Verify, inputs, output, started_at, finished_at, Some(metrics))
}

// ============================================================================
// SECTION: Synthesize
// ============================================================================

/// Composes the final answer from computed findings and verification.
pub fn step_synthesize(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let computation = state
        .resolve_artifact(StepName::Compute.artifact_key(), ctx.iteration)
        .cloned()
        .unwrap_or(Value::Null);
    let verification_status = state
        .resolve_artifact(StepName::Verify.artifact_key(), ctx.iteration)
        .and_then(|artifact| artifact.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("failed")
        .to_string();
    let inputs = json!({
        "step": StepName::Synthesize,
        "computation": computation,
        "verification_status": verification_status,
    });

    let findings =
        computation.get("findings").and_then(Value::as_array).cloned().unwrap_or_default();
    let supported = findings
        .iter()
        .filter(|finding| finding.get("supported") == Some(&Value::Bool(true)))
        .count();
    let joined = findings
        .iter()
        .filter_map(|finding| finding.get("description").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("; ");
    let answer =
        if joined.is_empty() { normalized_prompt(state, ctx.iteration) } else { joined };
    let output = json!({
        "answer": answer,
        "supported_findings": supported,
        "total_findings": findings.len(),
        "verification_status": verification_status,
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Synthesize, inputs, output, started_at, finished_at, Some(metrics))
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Composes the structured audit report over the whole run.
pub fn step_audit(
    state: &ReasoningState,
    ctx: &mut StepContext<'_>,
) -> Result<StepOutcome, StepError> {
    let started_at = ctx.clock.now()?;
    let artifact_keys: Vec<String> = state.artifacts.keys().cloned().collect();
    let inputs = json!({
        "step": StepName::Audit,
        "artifact_keys": artifact_keys,
        "status": state.status,
    });

    let verification = state
        .resolve_artifact(StepName::Verify.artifact_key(), ctx.iteration)
        .cloned()
        .unwrap_or(Value::Null);
    let output = json!({
        "inputs": {
            "prompt": state.problem.inputs.prompt,
            "constraints": state.problem.inputs.constraints,
            "goals": state.problem.inputs.goals,
        },
        "steps": artifact_keys,
        "verification": verification,
        "timestamps": {
            "created_at": state.metadata.created_at,
            "updated_at": state.metadata.updated_at,
            "audited_at": started_at,
        },
    });
    let finished_at = ctx.clock.now()?;
    let metrics = interval_metrics(&started_at, &finished_at);
    success(StepName::Audit, inputs, output, started_at, finished_at, Some(metrics))
}
