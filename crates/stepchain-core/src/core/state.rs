// crates/stepchain-core/src/core/state.rs
// ============================================================================
// Module: Stepchain Reasoning State
// Description: Append-only reasoning state owned by the state manager.
// Purpose: Capture deterministic run evolution for replay and audit.
// Dependencies: crate::core::{errors, identifiers, problem, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The reasoning state is the single mutable value of a run. All change goes
//! through the state manager: artifacts are append-only per key, errors are
//! never removed, `step_index` never decreases, and `updated_at` strictly
//! advances on every mutation. Terminal statuses freeze the state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::ErrorCode;
use crate::core::identifiers::StepName;
use crate::core::identifiers::TraceId;
use crate::core::problem::ProblemSpec;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire version of the reasoning state model.
pub const STATE_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Lifecycle Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Transitions follow pending -> running -> {completed | failed}.
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    /// State constructed, header not yet written.
    Pending,
    /// Run in progress.
    Running,
    /// Run failed; state is frozen.
    Failed,
    /// Run completed; state is frozen.
    Completed,
}

impl StateStatus {
    /// Returns true when no further mutation is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Completed)
    }
}

// ============================================================================
// SECTION: Error Records
// ============================================================================

/// Structured error entry recorded in state or step results.
///
/// # Invariants
/// - `code` is drawn from the fixed taxonomy.
/// - Entries are never removed once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Step associated with the error, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepName>,
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Run metadata carried by the reasoning state.
///
/// # Invariants
/// - `trace_id` is present once the state is running.
/// - `updated_at` strictly advances on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    /// Trace identifier, required once running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// Optional policy profile label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_profile: Option<String>,
    /// Optional model profile label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_profile: Option<String>,
    /// State creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Reasoning State
// ============================================================================

/// Append-only reasoning state for one run.
///
/// # Invariants
/// - `step_index` is non-negative and strictly monotonic across mutations.
/// - Prior artifact keys are never overwritten; prior errors never removed.
/// - Terminal statuses freeze the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningState {
    /// Wire version of the state model.
    pub version: String,
    /// Copy of the accepted problem specification.
    pub problem: ProblemSpec,
    /// Count of applied step results.
    pub step_index: u64,
    /// Lifecycle status.
    pub status: StateStatus,
    /// Artifacts keyed by canonical step key, append-only per key.
    pub artifacts: BTreeMap<String, Value>,
    /// Recorded assumptions.
    pub assumptions: Vec<String>,
    /// Active constraints.
    pub constraints: Vec<String>,
    /// Append-only error log.
    pub errors: Vec<ErrorRecord>,
    /// Run metadata.
    pub metadata: StateMetadata,
}

impl ReasoningState {
    /// Constructs the initial pending state for an accepted specification.
    #[must_use]
    pub fn initial(problem: ProblemSpec, now: Timestamp) -> Self {
        let constraints = problem.inputs.constraints.clone();
        Self {
            version: STATE_VERSION.to_string(),
            problem,
            step_index: 0,
            status: StateStatus::Pending,
            artifacts: BTreeMap::new(),
            assumptions: Vec::new(),
            constraints,
            errors: Vec::new(),
            metadata: StateMetadata {
                trace_id: None,
                policy_profile: None,
                model_profile: None,
                created_at: now.clone(),
                updated_at: now,
            },
        }
    }

    /// Returns the artifact stored under the exact key, if any.
    #[must_use]
    pub fn artifact(&self, key: &str) -> Option<&Value> {
        self.artifacts.get(key)
    }

    /// Resolves an artifact base key within a loop iteration.
    ///
    /// Iterations >= 2 write suffixed keys; this prefers the suffixed key for
    /// the given iteration and falls back to the base key.
    #[must_use]
    pub fn resolve_artifact(&self, base_key: &str, iteration: u64) -> Option<&Value> {
        if iteration >= 2
            && let Some(value) = self.artifacts.get(&iteration_artifact_key(base_key, iteration))
        {
            return Some(value);
        }
        self.artifacts.get(base_key)
    }
}

/// Returns the iteration-suffixed artifact key for a looped step.
#[must_use]
pub fn iteration_artifact_key(base_key: &str, iteration: u64) -> String {
    format!("{base_key}.iter.{iteration}")
}
