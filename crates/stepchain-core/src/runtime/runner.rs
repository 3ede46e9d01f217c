// crates/stepchain-core/src/runtime/runner.rs
// ============================================================================
// Module: Stepchain Engine Runner
// Description: Per-request orchestration of validation, steps, loops, and traces.
// Purpose: Produce a final state and byte-reproducible trace for one problem.
// Dependencies: crate::core, crate::interfaces, crate::runtime, crate::validate, tracing
// ============================================================================

//! ## Overview
//! The runner executes one request to completion on one logical worker:
//! validate the specification, construct and hash the initial state, write
//! the header, then walk the graph, snapshotting and hashing state around
//! every step, validating each result, applying it through the state
//! manager, and committing one step record per step. After the loop
//! segment's end step it honors the loop controller's decision. Non-fatal
//! failures are folded into the state and trace; only failures that make the
//! trace untrustworthy abort the run. Cancellation is observed between steps
//! only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::errors::ErrorCode;
use crate::core::hashing::CanonicalError;
use crate::core::hashing::hash_canonical;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::StepName;
use crate::core::state::ErrorRecord;
use crate::core::state::ReasoningState;
use crate::core::state::StateStatus;
use crate::core::step::STEP_RESULT_VERSION;
use crate::core::step::StepResult;
use crate::core::step::StepStatus;
use crate::core::time::DeterministicClock;
use crate::core::time::TimestampError;
use crate::core::trace::CANONICALIZATION;
use crate::core::trace::ENGINE_VERSION;
use crate::core::trace::HASH_ALGORITHM;
use crate::core::trace::HeaderRecord;
use crate::core::trace::LoopAction;
use crate::core::trace::StepRecord;
use crate::core::trace::TRACE_VERSION;
use crate::core::trace::TraceRecord;
use crate::interfaces::CancelFlag;
use crate::interfaces::ExecuteOutcome;
use crate::interfaces::ExecuteRequest;
use crate::interfaces::ModelProvider;
use crate::runtime::apply;
use crate::runtime::apply::StateError;
use crate::runtime::controller::LoopController;
use crate::runtime::graph::ExecutionGraph;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::StepContext;
use crate::runtime::registry::StepError;
use crate::runtime::registry::StepOutcome;
use crate::runtime::registry::StepRegistry;
use crate::runtime::writer::TraceError;
use crate::runtime::writer::TraceWriter;
use crate::validate::ValidationError;
use crate::validate::validate_problem_spec;
use crate::validate::validate_step_result;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine execution errors.
///
/// Any error returned here means no trustworthy trace exists for the
/// request: either validation rejected it before the header was written, or
/// a fatal kernel fault (canonicalization, chain, state invariant) occurred
/// mid-run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Specification or result validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Canonical encoding failed.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// Trace writing failed.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// State mutation or invariant failure.
    #[error(transparent)]
    State(#[from] StateError),
    /// Deterministic clock failure.
    #[error(transparent)]
    Time(#[from] TimestampError),
    /// Step registry lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineError {
    /// Returns the taxonomy code for the error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => err.primary_code(),
            Self::Canonical(_) => ErrorCode::CanonicalizationError,
            Self::Trace(err) => err.code(),
            Self::State(err) => err.code(),
            Self::Time(_) => ErrorCode::StateInvariantViolation,
            Self::Registry(_) => ErrorCode::StepUnknown,
        }
    }
}

impl From<StepError> for EngineError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Canonical(inner) => Self::Canonical(inner),
            StepError::Time(inner) => Self::Time(inner),
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Deterministic execution engine for one problem at a time.
///
/// # Invariants
/// - Engines share no mutable state; concurrency happens across independent
///   engine instances only.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Fixed step registry.
    registry: StepRegistry,
    /// Frozen execution graph.
    graph: ExecutionGraph,
}

impl Engine {
    /// Creates an engine with the standard registry and graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: StepRegistry::standard(),
            graph: ExecutionGraph::standard(),
        }
    }

    /// Executes one request, returning the final state and trace bytes.
    ///
    /// Replaying the same request (and provider fixtures) produces
    /// byte-identical trace output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when validation rejects the specification (no
    /// header is written) or when a fatal kernel fault occurs.
    pub fn execute(
        &self,
        request: &ExecuteRequest,
        provider: Option<&dyn ModelProvider>,
        cancel: Option<&CancelFlag>,
    ) -> Result<ExecuteOutcome, EngineError> {
        let spec = validate_problem_spec(&request.problem_spec)?;
        let mut clock = DeterministicClock::new(&request.now);

        let initial = ReasoningState::initial(spec.clone(), clock.now()?);
        let problem_spec_hash = hash_canonical(&spec)?;
        let initial_state_hash = hash_canonical(&initial)?;
        let mut state = apply::start(&initial, request.trace_id.clone(), clock.now()?)?;

        let mut writer = TraceWriter::new();
        writer.write(TraceRecord::Header(HeaderRecord {
            index: 0,
            version: TRACE_VERSION.to_string(),
            trace_id: request.trace_id.clone(),
            created_at: clock.now()?,
            engine_version: ENGINE_VERSION.to_string(),
            hash_algorithm: HASH_ALGORITHM.to_string(),
            canonicalization: CANONICALIZATION.to_string(),
            problem_spec_hash,
            initial_state_hash,
            record_hash: None,
        }))?;
        tracing::debug!(trace_id = %request.trace_id, "trace header committed");

        let mut controller = spec
            .settings
            .loop_settings
            .as_ref()
            .filter(|settings| settings.enabled)
            .map(|settings| LoopController::new(settings.clone()));

        let mut position = 0_usize;
        while let Some(step_name) = self.graph.step_at(position) {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                self.record_cancellation(&mut state, &mut writer, &mut clock, step_name)?;
                break;
            }

            let iteration = controller
                .as_ref()
                .filter(|ctrl| ctrl.contains(step_name))
                .map_or(1, LoopController::iteration);
            let state_before_hash = hash_canonical(&state)?;
            let step_fn = self.registry.resolve(step_name)?;
            let outcome = {
                let mut ctx = StepContext {
                    clock: &mut clock,
                    provider,
                    iteration,
                };
                step_fn(&state, &mut ctx)?
            };
            let result = check_result(step_name, outcome, &mut clock)?;

            let next_state =
                apply::apply(&state, &result, clock.now()?, (iteration >= 2).then_some(iteration))?;
            apply::validate_invariants(&next_state)?;
            let state_after_hash = hash_canonical(&next_state)?;

            let prev_hash = writer.last_hash().cloned().ok_or(TraceError::HeaderPlacement)?;
            writer.write(TraceRecord::Step(StepRecord {
                index: writer.next_index(),
                step_index: next_state.step_index,
                result: result.clone(),
                state_before_hash,
                state_after_hash: state_after_hash.clone(),
                prev_hash,
                record_hash: None,
            }))?;
            state = next_state;
            tracing::debug!(step = %step_name, step_index = state.step_index, "step committed");

            if result.status == StepStatus::Failed {
                break;
            }

            if let Some(ctrl) = controller.as_mut()
                && ctrl.end_step() == step_name
            {
                let (action, decided_after) = ctrl.decide(&state);
                let prev_hash = writer.last_hash().cloned().ok_or(TraceError::HeaderPlacement)?;
                writer.write(TraceRecord::Control(ctrl.control_record(
                    writer.next_index(),
                    action,
                    decided_after,
                    state_after_hash,
                    prev_hash,
                )))?;
                position = if action == LoopAction::Repeat {
                    self.graph.position(ctrl.start_step())
                } else {
                    position + 1
                };
            } else {
                position += 1;
            }
        }

        if state.status == StateStatus::Running {
            state = apply::complete(&state, clock.now()?)?;
        }
        tracing::debug!(trace_id = %request.trace_id, records = writer.next_index(), "run finished");
        Ok(ExecuteOutcome {
            final_state: state,
            trace: writer.into_bytes(),
        })
    }

    /// Records cancellation: fails the state and writes a skipped record for
    /// the interrupted step.
    fn record_cancellation(
        &self,
        state: &mut ReasoningState,
        writer: &mut TraceWriter,
        clock: &mut DeterministicClock,
        step: StepName,
    ) -> Result<(), EngineError> {
        let state_before_hash = hash_canonical(state)?;
        let failed = apply::fail_with(
            state,
            ErrorCode::Cancelled,
            "cancellation requested between steps",
            Some(step),
            clock.now()?,
        )?;
        apply::validate_invariants(&failed)?;
        let state_after_hash = hash_canonical(&failed)?;

        let stamp = clock.now()?;
        let null_hash = hash_canonical_json(&Value::Null)?;
        let result = StepResult {
            version: STEP_RESULT_VERSION.to_string(),
            step,
            status: StepStatus::Skipped,
            input_hash: null_hash.clone(),
            output_hash: null_hash,
            started_at: stamp.clone(),
            finished_at: stamp,
            output: None,
            errors: None,
            metrics: None,
        };
        let prev_hash = writer.last_hash().cloned().ok_or(TraceError::HeaderPlacement)?;
        writer.write(TraceRecord::Step(StepRecord {
            index: writer.next_index(),
            step_index: failed.step_index,
            result,
            state_before_hash,
            state_after_hash,
            prev_hash,
            record_hash: None,
        }))?;
        *state = failed;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Result Checking
// ============================================================================

/// Validates a step outcome and cross-checks its declared hashes.
///
/// Contract violations and hash mismatches are non-fatal: they are folded
/// into a synthesized failed result so the run ends with a valid trace.
fn check_result(
    step: StepName,
    outcome: StepOutcome,
    clock: &mut DeterministicClock,
) -> Result<StepResult, EngineError> {
    let StepOutcome {
        result,
        inputs,
    } = outcome;

    if let Err(validation) = validate_step_result(&result) {
        let errors = validation
            .violations
            .into_iter()
            .map(|violation| ErrorRecord {
                code: violation.code,
                message: format!("{}: {}", violation.path, violation.message),
                step: Some(step),
            })
            .collect();
        return synthesize_failure(step, errors, &result, clock);
    }

    let declared_inputs = hash_canonical_json(&inputs)?;
    if declared_inputs != result.input_hash {
        let errors = vec![ErrorRecord {
            code: ErrorCode::HashMismatch,
            message: "declared input hash does not match the canonical input projection"
                .to_string(),
            step: Some(step),
        }];
        return synthesize_failure(step, errors, &result, clock);
    }
    let output_projection = result.output.clone().unwrap_or(Value::Null);
    let declared_output = hash_canonical_json(&output_projection)?;
    if declared_output != result.output_hash {
        let errors = vec![ErrorRecord {
            code: ErrorCode::HashMismatch,
            message: "declared output hash does not match the canonical output".to_string(),
            step: Some(step),
        }];
        return synthesize_failure(step, errors, &result, clock);
    }
    Ok(result)
}

/// Synthesizes a contract-valid failed result in place of a rejected one.
fn synthesize_failure(
    step: StepName,
    errors: Vec<ErrorRecord>,
    original: &StepResult,
    clock: &mut DeterministicClock,
) -> Result<StepResult, EngineError> {
    let finished_at = clock.now()?;
    Ok(StepResult {
        version: STEP_RESULT_VERSION.to_string(),
        step,
        status: StepStatus::Failed,
        input_hash: original.input_hash.clone(),
        output_hash: hash_canonical_json(&Value::Null)?,
        started_at: original.started_at.clone(),
        finished_at,
        output: None,
        errors: Some(errors),
        metrics: None,
    })
}
