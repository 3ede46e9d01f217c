// crates/stepchain-core/src/runtime/controller.rs
// ============================================================================
// Module: Stepchain Loop Controller
// Description: Stop/repeat/exhaustion decisions for the configured loop segment.
// Purpose: Issue exactly one control record per decision point without mutating state.
// Dependencies: crate::core, crate::runtime::condition, tracing
// ============================================================================

//! ## Overview
//! The loop controller activates when `settings.loop.enabled` is set. After
//! the segment's `end_step` executes, the controller evaluates the stop
//! condition against the post-state and decides: stop (condition satisfied),
//! repeat (budget remaining), or max-iterations-reached (budget exhausted).
//! Exhaustion does not fail the run; the verification artifact carries the
//! truth. The controller never mutates the reasoning state; it only shapes
//! control records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::hashing::HashDigest;
use crate::core::identifiers::StepName;
use crate::core::problem::LoopSettings;
use crate::core::state::ReasoningState;
use crate::core::trace::ControlRecord;
use crate::core::trace::ControlType;
use crate::core::trace::LoopAction;
use crate::runtime::condition::evaluate_stop_condition;

// ============================================================================
// SECTION: Loop Controller
// ============================================================================

/// Controller for one configured loop segment.
///
/// # Invariants
/// - `iteration` starts at 1 and never exceeds `max_iterations`.
/// - The controller holds only normalized, validated settings.
#[derive(Debug, Clone)]
pub struct LoopController {
    /// Validated and normalized loop settings.
    settings: LoopSettings,
    /// Current iteration, 1-based.
    iteration: u64,
}

impl LoopController {
    /// Creates a controller from accepted loop settings.
    #[must_use]
    pub const fn new(settings: LoopSettings) -> Self {
        Self {
            settings,
            iteration: 1,
        }
    }

    /// Returns the current iteration (1-based).
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Returns the first step of the looped segment.
    #[must_use]
    pub const fn start_step(&self) -> StepName {
        self.settings.start_step
    }

    /// Returns the last step of the looped segment.
    #[must_use]
    pub const fn end_step(&self) -> StepName {
        self.settings.end_step
    }

    /// Returns true when the step lies within the looped segment.
    #[must_use]
    pub fn contains(&self, step: StepName) -> bool {
        let position = step.position();
        position >= self.settings.start_step.position()
            && position <= self.settings.end_step.position()
    }

    /// Decides the action after the end step of the current iteration.
    ///
    /// Returns the action together with the iteration the decision was made
    /// after. A repeat decision advances the internal iteration counter.
    pub fn decide(&mut self, state: &ReasoningState) -> (LoopAction, u64) {
        let decided_after = self.iteration;
        let satisfied =
            evaluate_stop_condition(&self.settings.stop_condition, state, decided_after);
        let action = if satisfied {
            LoopAction::Stop
        } else if self.iteration < self.settings.max_iterations {
            self.iteration += 1;
            LoopAction::Repeat
        } else {
            LoopAction::MaxIterationsReached
        };
        tracing::debug!(
            iteration = decided_after,
            max_iterations = self.settings.max_iterations,
            satisfied,
            "loop decision"
        );
        (action, decided_after)
    }

    /// Shapes the control record for a decision.
    #[must_use]
    pub fn control_record(
        &self,
        index: u64,
        action: LoopAction,
        loop_iteration: u64,
        state_hash: HashDigest,
        prev_hash: HashDigest,
    ) -> ControlRecord {
        ControlRecord {
            index,
            control_type: ControlType::Loop,
            action,
            loop_iteration,
            start_step: self.settings.start_step,
            end_step: self.settings.end_step,
            stop_condition: self.settings.stop_condition.clone(),
            state_hash,
            prev_hash,
            record_hash: None,
        }
    }
}
