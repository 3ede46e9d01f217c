// crates/stepchain-core/src/runtime/graph.rs
// ============================================================================
// Module: Stepchain Execution Graph
// Description: The frozen topological ordering of registered steps.
// Purpose: Resolve execution positions deterministically for the runner.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! The execution graph is a static, acyclic ordering of the registered step
//! names. The ordering is frozen per engine version; adding or reordering a
//! step is a MAJOR change. The loop controller re-enters the graph only at
//! positions the graph itself resolves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::STEP_ORDER;
use crate::core::identifiers::StepName;

// ============================================================================
// SECTION: Execution Graph
// ============================================================================

/// Frozen topological ordering of the registered steps.
///
/// # Invariants
/// - The ordering equals [`STEP_ORDER`] and never changes at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionGraph;

impl ExecutionGraph {
    /// Returns the standard graph for this engine version.
    #[must_use]
    pub const fn standard() -> Self {
        Self
    }

    /// Returns the number of steps in the graph.
    #[must_use]
    pub const fn len(&self) -> usize {
        STEP_ORDER.len()
    }

    /// Returns true when the graph has no steps (never, for this version).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        STEP_ORDER.is_empty()
    }

    /// Returns the step at an execution position.
    #[must_use]
    pub fn step_at(&self, position: usize) -> Option<StepName> {
        STEP_ORDER.get(position).copied()
    }

    /// Returns the execution position of a step.
    #[must_use]
    pub fn position(&self, step: StepName) -> usize {
        step.position()
    }

    /// Returns the position following `position`, if any.
    #[must_use]
    pub fn next(&self, position: usize) -> Option<usize> {
        let next = position.checked_add(1)?;
        (next < STEP_ORDER.len()).then_some(next)
    }
}
