// crates/stepchain-core/src/runtime/registry.rs
// ============================================================================
// Module: Stepchain Step Registry
// Description: Fixed mapping from step names to deterministic step functions.
// Purpose: Give every step one uniform, resolvable execution contract.
// Dependencies: crate::core, crate::interfaces, crate::runtime::steps, thiserror
// ============================================================================

//! ## Overview
//! The registry maps each registered [`StepName`] to a deterministic function
//! `(state, ctx) -> StepOutcome`. Steps derive everything from the provided
//! state and context, hash their declared input projection and output
//! canonically, and stamp their interval from the deterministic clock. The
//! registered set is frozen per engine version.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::CanonicalError;
use crate::core::identifiers::STEP_ORDER;
use crate::core::identifiers::StepName;
use crate::core::state::ReasoningState;
use crate::core::step::StepResult;
use crate::core::time::DeterministicClock;
use crate::core::time::TimestampError;
use crate::interfaces::ModelProvider;
use crate::runtime::steps;

// ============================================================================
// SECTION: Step Context
// ============================================================================

/// Execution context handed to step functions.
///
/// # Invariants
/// - The clock is the run's single deterministic clock.
/// - `iteration` is 1 outside loop segments and the current iteration inside.
pub struct StepContext<'a> {
    /// Deterministic clock for the run.
    pub clock: &'a mut DeterministicClock,
    /// Optional model oracle consulted by evidence acquisition.
    pub provider: Option<&'a dyn ModelProvider>,
    /// Current loop iteration for artifact resolution (1-based).
    pub iteration: u64,
}

/// Result of one step invocation: the contract value plus the declared input
/// projection the runner re-hashes to cross-check `input_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Step result under the uniform contract.
    pub result: StepResult,
    /// Canonical input projection declared by the step.
    pub inputs: Value,
}

/// Internal step execution errors.
///
/// These are kernel faults (encoding or clock failures), not step-level
/// outcomes; domain failures surface as failed step results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// Canonical encoding failed.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// Deterministic clock failed to render a timestamp.
    #[error(transparent)]
    Time(#[from] TimestampError),
}

/// Deterministic step function signature.
pub type StepFn = fn(&ReasoningState, &mut StepContext<'_>) -> Result<StepOutcome, StepError>;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry lookup errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Step name is not registered.
    #[error("step `{0}` is not registered")]
    Unknown(StepName),
}

/// Fixed mapping from step names to step functions.
///
/// # Invariants
/// - The standard registry covers exactly the frozen step set.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    /// Registered step functions.
    entries: BTreeMap<StepName, StepFn>,
}

impl StepRegistry {
    /// Builds the standard registry for this engine version.
    #[must_use]
    pub fn standard() -> Self {
        let mut entries: BTreeMap<StepName, StepFn> = BTreeMap::new();
        entries.insert(StepName::Normalize, steps::step_normalize as StepFn);
        entries.insert(StepName::Decompose, steps::step_decompose as StepFn);
        entries.insert(StepName::AcquireEvidence, steps::step_acquire_evidence as StepFn);
        entries.insert(StepName::Compute, steps::step_compute as StepFn);
        entries.insert(StepName::Verify, steps::step_verify as StepFn);
        entries.insert(StepName::Synthesize, steps::step_synthesize as StepFn);
        entries.insert(StepName::Audit, steps::step_audit as StepFn);
        Self {
            entries,
        }
    }

    /// Resolves a step name to its registered function.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] when the step is not registered.
    pub fn resolve(&self, step: StepName) -> Result<StepFn, RegistryError> {
        self.entries.get(&step).copied().ok_or(RegistryError::Unknown(step))
    }

    /// Returns the registered step names in graph order.
    #[must_use]
    pub fn names(&self) -> Vec<StepName> {
        STEP_ORDER.iter().copied().filter(|step| self.entries.contains_key(step)).collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
