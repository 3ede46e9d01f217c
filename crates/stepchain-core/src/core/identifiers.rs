// crates/stepchain-core/src/core/identifiers.rs
// ============================================================================
// Module: Stepchain Identifiers
// Description: Canonical opaque identifiers and the fixed step name set.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Stepchain.
//! Request and trace identifiers are opaque strings with transparent wire
//! forms. [`StepName`] is a closed enum: the set of registered steps is
//! frozen per engine version, and extending it is a MAJOR change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Stable request identifier carried by a problem specification.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a new request identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Trace identifier assigned by the caller for one engine run.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Creates a new trace identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TraceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Step Names
// ============================================================================

/// Registered step names in graph order.
///
/// # Invariants
/// - The set and its ordering are frozen per engine version.
/// - Wire forms are the PascalCase step names used by specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepName {
    /// Normalizes the problem inputs.
    Normalize,
    /// Decomposes the problem into subtasks.
    Decompose,
    /// Acquires evidence from the problem context and configured oracles.
    AcquireEvidence,
    /// Computes findings for each subtask.
    Compute,
    /// Evaluates the configured verification paths.
    Verify,
    /// Synthesizes the final answer from findings.
    Synthesize,
    /// Composes the structured audit report.
    Audit,
}

/// All registered steps in frozen graph order.
pub const STEP_ORDER: [StepName; 7] = [
    StepName::Normalize,
    StepName::Decompose,
    StepName::AcquireEvidence,
    StepName::Compute,
    StepName::Verify,
    StepName::Synthesize,
    StepName::Audit,
];

impl StepName {
    /// Returns the stable wire name of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "Normalize",
            Self::Decompose => "Decompose",
            Self::AcquireEvidence => "AcquireEvidence",
            Self::Compute => "Compute",
            Self::Verify => "Verify",
            Self::Synthesize => "Synthesize",
            Self::Audit => "Audit",
        }
    }

    /// Returns the canonical short artifact key written by the step.
    #[must_use]
    pub const fn artifact_key(self) -> &'static str {
        match self {
            Self::Normalize => "normalization",
            Self::Decompose => "decomposition",
            Self::AcquireEvidence => "evidence",
            Self::Compute => "computation",
            Self::Verify => "verification",
            Self::Synthesize => "synthesis",
            Self::Audit => "audit",
        }
    }

    /// Returns the step's position in the frozen graph order.
    #[must_use]
    pub fn position(self) -> usize {
        STEP_ORDER.iter().position(|step| *step == self).unwrap_or(STEP_ORDER.len())
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
