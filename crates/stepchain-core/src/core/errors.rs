// crates/stepchain-core/src/core/errors.rs
// ============================================================================
// Module: Stepchain Error Taxonomy
// Description: Stable machine-readable error codes shared across the kernel.
// Purpose: Keep every failure classifiable under one fixed, replay-safe code set.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every failure surfaced by the kernel carries one code from this fixed
//! taxonomy. Codes are wire-stable snake_case strings; adding a code is a
//! contract change. The fatal subset marks failures that make an in-flight
//! trace untrustworthy, so the runner aborts instead of recording them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable error code taxonomy.
///
/// # Invariants
/// - Wire forms are the exact snake_case strings and never change meaning.
/// - The fatal subset is exactly the codes that imply a corrupted trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Structural schema validation failed.
    SchemaInvalid,
    /// Specification version has an unsupported MAJOR component.
    VersionUnsupported,
    /// Canonical JSON encoding or decoding failed.
    CanonicalizationError,
    /// Step name is not present in the registry.
    StepUnknown,
    /// Step result violates the step contract (for example success without output).
    StepContractViolation,
    /// State mutation violated a state invariant.
    StateInvariantViolation,
    /// Attempted overwrite of an existing artifact key.
    ArtifactOverwrite,
    /// Loop configuration failed validation.
    LoopConfigInvalid,
    /// Stop condition failed validation.
    StopConditionInvalid,
    /// Declared hash does not match the recomputed hash.
    HashMismatch,
    /// Trace record linkage (`prev_hash`) is broken.
    TraceChainBroken,
    /// Request was cancelled between steps.
    Cancelled,
    /// External collaborator timed out.
    CollaboratorTimeout,
    /// Structured generation output failed validation.
    StructuredGenerationFailed,
}

impl ErrorCode {
    /// Returns the stable wire string for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaInvalid => "schema_invalid",
            Self::VersionUnsupported => "version_unsupported",
            Self::CanonicalizationError => "canonicalization_error",
            Self::StepUnknown => "step_unknown",
            Self::StepContractViolation => "step_contract_violation",
            Self::StateInvariantViolation => "state_invariant_violation",
            Self::ArtifactOverwrite => "artifact_overwrite",
            Self::LoopConfigInvalid => "loop_config_invalid",
            Self::StopConditionInvalid => "stop_condition_invalid",
            Self::HashMismatch => "hash_mismatch",
            Self::TraceChainBroken => "trace_chain_broken",
            Self::Cancelled => "cancelled",
            Self::CollaboratorTimeout => "collaborator_timeout",
            Self::StructuredGenerationFailed => "structured_generation_failed",
        }
    }

    /// Returns true when the failure implies the trace can no longer be trusted.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::CanonicalizationError | Self::TraceChainBroken | Self::StateInvariantViolation
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
