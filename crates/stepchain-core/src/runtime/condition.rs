// crates/stepchain-core/src/runtime/condition.rs
// ============================================================================
// Module: Stepchain Stop-Condition Evaluation
// Description: Dotted-path lookup and fail-closed operator evaluation.
// Purpose: Convert post-state artifact values into loop stop decisions.
// Dependencies: crate::core, bigdecimal, serde_json
// ============================================================================

//! ## Overview
//! Stop conditions address the post-state through a narrow dotted-path
//! grammar rooted at `artifacts.`. A missing node is treated as absent and
//! the condition fails closed. Equality operators are permitted across
//! types; ordering operators require both sides numeric and compare through
//! decimal-aware arithmetic so integer and float encodings order
//! consistently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Number;
use serde_json::Value;

use crate::core::problem::StopCondition;
use crate::core::problem::StopOperator;
use crate::core::state::ReasoningState;

// ============================================================================
// SECTION: Condition Evaluation
// ============================================================================

/// Evaluates a normalized stop condition against the post-state.
///
/// Returns false (not satisfied) whenever the addressed node is absent, the
/// condition is not normalized, or operand types do not fit the operator.
#[must_use]
pub fn evaluate_stop_condition(
    condition: &StopCondition,
    state: &ReasoningState,
    iteration: u64,
) -> bool {
    let Some(operator) = condition.operator else {
        return false;
    };
    let Some(expected) = condition.value.as_ref() else {
        return false;
    };
    let Some(actual) = resolve_path(&condition.path, state, iteration) else {
        return false;
    };
    match operator {
        StopOperator::Equals => values_equal(actual, expected),
        StopOperator::NotEquals => !values_equal(actual, expected),
        StopOperator::Gt | StopOperator::Gte | StopOperator::Lt | StopOperator::Lte => {
            compare_ordering(operator, actual, expected)
        }
    }
}

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Resolves a dotted path rooted at `artifacts.` against the state.
///
/// The artifact segment prefers the current iteration's suffixed key and
/// falls back to the base key, so repeated loop segments read their freshest
/// outcome.
fn resolve_path<'a>(path: &str, state: &'a ReasoningState, iteration: u64) -> Option<&'a Value> {
    let mut segments = path.split('.');
    if segments.next() != Some("artifacts") {
        return None;
    }
    let base_key = segments.next()?;
    let mut node = state.resolve_artifact(base_key, iteration)?;
    for segment in segments {
        node = node.get(segment)?;
    }
    Some(node)
}

// ============================================================================
// SECTION: Value Comparison
// ============================================================================

/// Compares values for equality with decimal-aware numeric handling.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left_num), Value::Number(right_num)) => {
            decimal_cmp(left_num, right_num).is_some_and(Ordering::is_eq)
        }
        _ => left == right,
    }
}

/// Compares numeric values with an ordering operator, failing closed on any
/// non-numeric operand.
fn compare_ordering(operator: StopOperator, left: &Value, right: &Value) -> bool {
    let (Value::Number(left_num), Value::Number(right_num)) = (left, right) else {
        return false;
    };
    let Some(ordering) = decimal_cmp(left_num, right_num) else {
        return false;
    };
    match operator {
        StopOperator::Gt => ordering.is_gt(),
        StopOperator::Gte => ordering.is_ge(),
        StopOperator::Lt => ordering.is_lt(),
        StopOperator::Lte => ordering.is_le(),
        StopOperator::Equals | StopOperator::NotEquals => false,
    }
}

/// Orders numeric JSON values using decimal-aware comparison.
fn decimal_cmp(left: &Number, right: &Number) -> Option<Ordering> {
    let left = decimal_from_number(left)?;
    let right = decimal_from_number(right)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    let rendered = number.to_string();
    BigDecimal::from_str(&rendered).ok()
}
