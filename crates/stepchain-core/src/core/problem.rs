// crates/stepchain-core/src/core/problem.rs
// ============================================================================
// Module: Stepchain Problem Specification
// Description: Immutable problem input model with loop and verification settings.
// Purpose: Capture one fully specified request exactly as accepted by validation.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`ProblemSpec`] is the immutable input of one engine run. It is accepted
//! only through the schema validators, hashed canonically into the trace
//! header, and copied verbatim into the reasoning state. The MAJOR component
//! of `version` gates acceptance; higher MINOR and PATCH values are accepted
//! when all required fields are understood.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RequestId;
use crate::core::identifiers::StepName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Version Gate
// ============================================================================

/// MAJOR specification version accepted by this engine.
pub const SUPPORTED_SPEC_MAJOR: u64 = 1;

// ============================================================================
// SECTION: Problem Specification
// ============================================================================

/// Immutable problem specification for one run.
///
/// # Invariants
/// - Accepted instances satisfy every rule enforced by the schema validators.
/// - The value is never mutated after acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    /// Specification version (semver string).
    pub version: String,
    /// Stable request identifier.
    pub id: RequestId,
    /// Request creation timestamp.
    pub created_at: Timestamp,
    /// Problem inputs.
    pub inputs: ProblemInputs,
    /// Engine settings.
    #[serde(default)]
    pub settings: Settings,
    /// Opaque provenance metadata, not interpreted by the kernel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Value>,
}

/// Problem inputs.
///
/// # Invariants
/// - `prompt` is non-empty after whitespace trimming.
/// - `constraints` and `goals` entries are non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemInputs {
    /// Problem prompt.
    pub prompt: String,
    /// Ordered constraint statements.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Ordered goal statements.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Opaque context mapping available to evidence acquisition.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Engine settings carried by a problem specification.
///
/// # Invariants
/// - Absent settings mean no loop and no verification paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Optional loop configuration.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_settings: Option<LoopSettings>,
    /// Verification paths evaluated by the Verify step.
    #[serde(default)]
    pub verification_paths: Vec<VerificationPath>,
}

/// Loop configuration over a contiguous graph segment.
///
/// # Invariants
/// - `start_step` is not after `end_step` in graph order (validated).
/// - `max_iterations` is strictly positive (validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Whether the loop controller is active.
    #[serde(default)]
    pub enabled: bool,
    /// First step of the looped segment.
    pub start_step: StepName,
    /// Last step of the looped segment.
    pub end_step: StepName,
    /// Maximum number of iterations.
    pub max_iterations: u64,
    /// Stop condition evaluated after each iteration.
    pub stop_condition: StopCondition,
}

/// Stop condition over a dotted artifact path.
///
/// # Invariants
/// - `path` matches `artifacts.<name>(.<key>)*` (validated).
/// - Accepted instances are normalized: `operator` and `value` are present
///   and the legacy `equals` field is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCondition {
    /// Dotted lookup path rooted at `artifacts.`.
    pub path: String,
    /// Comparison operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<StopOperator>,
    /// Expected scalar value (string, integer, or boolean).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Legacy equality shorthand, rewritten to `operator=equals` on accept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}

/// Stop-condition comparison operators.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOperator {
    /// Values are equal.
    Equals,
    /// Values are not equal.
    NotEquals,
    /// Actual is strictly greater than expected.
    Gt,
    /// Actual is greater than or equal to expected.
    Gte,
    /// Actual is strictly less than expected.
    Lt,
    /// Actual is less than or equal to expected.
    Lte,
}

impl StopOperator {
    /// Returns true for the numeric ordering operators.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

// ============================================================================
// SECTION: Verification Paths
// ============================================================================

/// One verification path evaluated by the Verify step.
///
/// # Invariants
/// - `name` is a non-empty string (validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPath {
    /// Path name, used in the verification artifact.
    pub name: String,
    /// Whether the path requires acquired evidence to pass.
    #[serde(default)]
    pub evidence_required: bool,
}
