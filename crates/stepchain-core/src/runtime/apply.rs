// crates/stepchain-core/src/runtime/apply.rs
// ============================================================================
// Module: Stepchain State Manager
// Description: Applies validated step results to reasoning state under invariants.
// Purpose: Make every state mutation auditable, append-only, and monotonic.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The state manager is the only code path that produces a new reasoning
//! state from an old one. Application semantics by result status: success
//! appends the output under the step's canonical artifact key and increments
//! `step_index`; failed appends errors and freezes the state; skipped
//! increments `step_index` only. Every mutation strictly advances
//! `metadata.updated_at`. Overwrites, index regressions, and terminal
//! mutations are refused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::errors::ErrorCode;
use crate::core::identifiers::STEP_ORDER;
use crate::core::identifiers::StepName;
use crate::core::identifiers::TraceId;
use crate::core::state::ErrorRecord;
use crate::core::state::ReasoningState;
use crate::core::state::StateStatus;
use crate::core::state::iteration_artifact_key;
use crate::core::step::StepResult;
use crate::core::step::StepStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// State mutation and invariant errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Artifact key already holds a value.
    #[error("artifact overwrite refused for key `{key}`")]
    ArtifactOverwrite {
        /// Artifact key that would have been overwritten.
        key: String,
    },
    /// State is terminal and frozen.
    #[error("state is terminal and cannot be mutated")]
    TerminalState,
    /// Requested lifecycle transition is not permitted.
    #[error("invalid status transition from `{from}` to `{to}`")]
    InvalidTransition {
        /// Current status wire form.
        from: &'static str,
        /// Requested status wire form.
        to: &'static str,
    },
    /// Mutation timestamp does not strictly advance `updated_at`.
    #[error("clock did not advance past the last mutation")]
    ClockNotAdvancing,
    /// Running state is missing its trace identifier.
    #[error("running state requires a trace identifier")]
    MissingTraceId,
    /// Successful result arrived without an output artifact.
    #[error("successful result for step `{step}` carries no output")]
    MissingOutput {
        /// Step that produced the result.
        step: StepName,
    },
    /// Stored artifact key does not match any registered step key.
    #[error("artifact key `{key}` does not belong to any registered step")]
    UnknownArtifactKey {
        /// Offending artifact key.
        key: String,
    },
    /// Metadata timestamps are out of order.
    #[error("metadata timestamps are out of order")]
    TimestampOrder,
}

impl StateError {
    /// Returns the taxonomy code for the error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ArtifactOverwrite {
                ..
            } => ErrorCode::ArtifactOverwrite,
            Self::MissingOutput {
                ..
            } => ErrorCode::StepContractViolation,
            Self::TerminalState
            | Self::InvalidTransition {
                ..
            }
            | Self::ClockNotAdvancing
            | Self::MissingTraceId
            | Self::UnknownArtifactKey {
                ..
            }
            | Self::TimestampOrder => ErrorCode::StateInvariantViolation,
        }
    }
}

// ============================================================================
// SECTION: Lifecycle Transitions
// ============================================================================

/// Returns the stable wire form of a status for error reporting.
const fn status_str(status: StateStatus) -> &'static str {
    match status {
        StateStatus::Pending => "pending",
        StateStatus::Running => "running",
        StateStatus::Failed => "failed",
        StateStatus::Completed => "completed",
    }
}

/// Transitions a pending state to running, binding the trace identifier.
///
/// # Errors
///
/// Returns [`StateError`] when the state is not pending or the clock did not
/// advance.
pub fn start(
    prev: &ReasoningState,
    trace_id: TraceId,
    now: Timestamp,
) -> Result<ReasoningState, StateError> {
    if prev.status != StateStatus::Pending {
        return Err(StateError::InvalidTransition {
            from: status_str(prev.status),
            to: status_str(StateStatus::Running),
        });
    }
    check_clock(prev, &now)?;
    let mut next = prev.clone();
    next.status = StateStatus::Running;
    next.metadata.trace_id = Some(trace_id);
    next.metadata.updated_at = now;
    Ok(next)
}

/// Transitions a running state to completed.
///
/// # Errors
///
/// Returns [`StateError`] when the state is not running or the clock did not
/// advance.
pub fn complete(prev: &ReasoningState, now: Timestamp) -> Result<ReasoningState, StateError> {
    if prev.status != StateStatus::Running {
        return Err(StateError::InvalidTransition {
            from: status_str(prev.status),
            to: status_str(StateStatus::Completed),
        });
    }
    check_clock(prev, &now)?;
    let mut next = prev.clone();
    next.status = StateStatus::Completed;
    next.metadata.updated_at = now;
    Ok(next)
}

/// Fails a non-terminal state with one structured error entry.
///
/// Used by the runner for failures that do not flow through a step result,
/// such as cancellation between steps.
///
/// # Errors
///
/// Returns [`StateError`] when the state is terminal or the clock did not
/// advance.
pub fn fail_with(
    prev: &ReasoningState,
    code: ErrorCode,
    message: impl Into<String>,
    step: Option<StepName>,
    now: Timestamp,
) -> Result<ReasoningState, StateError> {
    if prev.status.is_terminal() {
        return Err(StateError::TerminalState);
    }
    check_clock(prev, &now)?;
    let mut next = prev.clone();
    next.status = StateStatus::Failed;
    next.errors.push(ErrorRecord {
        code,
        message: message.into(),
        step,
    });
    next.metadata.updated_at = now;
    Ok(next)
}

// ============================================================================
// SECTION: Result Application
// ============================================================================

/// Applies a validated step result, producing the next state.
///
/// `iteration` carries the loop iteration for re-executed segment steps;
/// iterations >= 2 append under iteration-suffixed artifact keys so prior
/// keys are never overwritten.
///
/// # Errors
///
/// Returns [`StateError`] on terminal mutation, artifact overwrite, or a
/// non-advancing clock.
pub fn apply(
    prev: &ReasoningState,
    result: &StepResult,
    now: Timestamp,
    iteration: Option<u64>,
) -> Result<ReasoningState, StateError> {
    if prev.status.is_terminal() {
        return Err(StateError::TerminalState);
    }
    if prev.status != StateStatus::Running {
        return Err(StateError::InvalidTransition {
            from: status_str(prev.status),
            to: status_str(prev.status),
        });
    }
    check_clock(prev, &now)?;

    let mut next = prev.clone();
    match result.status {
        StepStatus::Success => {
            let base_key = result.step.artifact_key();
            let key = match iteration {
                Some(n) if n >= 2 => iteration_artifact_key(base_key, n),
                _ => base_key.to_string(),
            };
            if next.artifacts.contains_key(&key) {
                return Err(StateError::ArtifactOverwrite {
                    key,
                });
            }
            let Some(output) = result.output.clone() else {
                return Err(StateError::MissingOutput {
                    step: result.step,
                });
            };
            next.artifacts.insert(key, output);
            next.step_index += 1;
        }
        StepStatus::Failed => {
            let entries = result.errors.clone().unwrap_or_default();
            for entry in entries {
                next.errors.push(ErrorRecord {
                    code: entry.code,
                    message: entry.message,
                    step: entry.step.or(Some(result.step)),
                });
            }
            next.status = StateStatus::Failed;
        }
        StepStatus::Skipped => {
            next.step_index += 1;
        }
    }
    next.metadata.updated_at = now;
    Ok(next)
}

/// Requires the mutation timestamp to strictly advance `updated_at`.
fn check_clock(prev: &ReasoningState, now: &Timestamp) -> Result<(), StateError> {
    if prev.metadata.updated_at.strictly_before(now) {
        Ok(())
    } else {
        Err(StateError::ClockNotAdvancing)
    }
}

// ============================================================================
// SECTION: Invariant Validation
// ============================================================================

/// Validates the full state invariant set.
///
/// # Errors
///
/// Returns [`StateError`] describing the first violated invariant.
pub fn validate_invariants(state: &ReasoningState) -> Result<(), StateError> {
    if state.status != StateStatus::Pending && state.metadata.trace_id.is_none() {
        return Err(StateError::MissingTraceId);
    }
    if !state.metadata.created_at.not_after(&state.metadata.updated_at) {
        return Err(StateError::TimestampOrder);
    }
    for key in state.artifacts.keys() {
        if !artifact_key_is_known(key) {
            return Err(StateError::UnknownArtifactKey {
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Checks that an artifact key is a registered step key, optionally carrying
/// an iteration suffix of the form `.iter.<n>` with `n >= 2`.
fn artifact_key_is_known(key: &str) -> bool {
    STEP_ORDER.iter().any(|step| {
        let base = step.artifact_key();
        if key == base {
            return true;
        }
        key.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix(".iter."))
            .and_then(|suffix| suffix.parse::<u64>().ok())
            .is_some_and(|n| n >= 2)
    })
}
