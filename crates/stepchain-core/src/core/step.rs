// crates/stepchain-core/src/core/step.rs
// ============================================================================
// Module: Stepchain Step Results
// Description: The uniform step-result contract produced by every step.
// Purpose: Make every step invocation auditable through one validated shape.
// Dependencies: crate::core::{hashing, identifiers, state, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Every step invocation yields a [`StepResult`]: its status, canonical
//! input/output hashes, a clock-stamped interval, and exactly one of an
//! output (success) or error list (failed). Skipped results carry neither.
//! The state manager is the only consumer allowed to fold a result into the
//! reasoning state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::StepName;
use crate::core::state::ErrorRecord;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire version of the step-result model.
pub const STEP_RESULT_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Step Status
// ============================================================================

/// Outcome status of one step invocation.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step produced an output artifact.
    Success,
    /// Step failed with one or more errors.
    Failed,
    /// Step was skipped without output or errors.
    Skipped,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Optional integer metrics reported by a step.
///
/// # Invariants
/// - All metric values are non-negative integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Tokens consumed by collaborator calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u64>,
    /// Tokens produced by collaborator calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u64>,
    /// Step latency in milliseconds under the deterministic clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

// ============================================================================
// SECTION: Step Result
// ============================================================================

/// Validated output of one step invocation.
///
/// # Invariants
/// - `output` is present iff `status` is success.
/// - `errors` is present and non-empty iff `status` is failed.
/// - `started_at` is not after `finished_at`.
/// - Hashes are canonical SHA-256 digests of the declared projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Wire version of the step-result model.
    pub version: String,
    /// Registered step name.
    pub step: StepName,
    /// Outcome status.
    pub status: StepStatus,
    /// Canonical hash of the step's declared inputs.
    pub input_hash: HashDigest,
    /// Canonical hash of the `output` field value (`null` when absent).
    pub output_hash: HashDigest,
    /// Invocation start under the deterministic clock.
    pub started_at: Timestamp,
    /// Invocation finish under the deterministic clock.
    pub finished_at: Timestamp,
    /// Output artifact, present iff success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Errors, present iff failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorRecord>>,
    /// Optional integer metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<StepMetrics>,
}
