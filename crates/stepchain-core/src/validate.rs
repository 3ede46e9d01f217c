// crates/stepchain-core/src/validate.rs
// ============================================================================
// Module: Stepchain Schema Validators
// Description: Pure validators for problem specifications and step results.
// Purpose: Gate every value entering the kernel behind explicit, total rules.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Validators are pure functions: they consult nothing outside their inputs
//! and either return an accepted typed value or a [`ValidationError`] that
//! enumerates every violated rule. Each violation carries a stable code from
//! the fixed taxonomy, a dotted field path, and a message. Accepting a
//! problem specification also normalizes it: the legacy `equals` shorthand
//! in stop conditions is rewritten to `operator=equals`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::errors::ErrorCode;
use crate::core::hashing::HashDigest;
use crate::core::problem::LoopSettings;
use crate::core::problem::ProblemSpec;
use crate::core::problem::SUPPORTED_SPEC_MAJOR;
use crate::core::problem::StopCondition;
use crate::core::problem::StopOperator;
use crate::core::step::StepResult;
use crate::core::step::StepStatus;

// ============================================================================
// SECTION: Violations
// ============================================================================

/// One violated validation rule.
///
/// # Invariants
/// - `code` is drawn from the fixed taxonomy.
/// - `path` is a dotted field path into the validated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Stable error code.
    pub code: ErrorCode,
    /// Dotted field path.
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validation failure enumerating every violated rule.
///
/// # Invariants
/// - Contains at least one violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {} rule(s) violated", .violations.len())]
pub struct ValidationError {
    /// All violated rules, in field order.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns the code of the first violation.
    #[must_use]
    pub fn primary_code(&self) -> ErrorCode {
        self.violations.first().map_or(ErrorCode::SchemaInvalid, |violation| violation.code)
    }
}

/// Converts collected violations into a result.
fn finish(violations: Vec<Violation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            violations,
        })
    }
}

// ============================================================================
// SECTION: Semver Gate
// ============================================================================

/// Parses a strict numeric semver triple.
fn parse_semver(text: &str) -> Option<(u64, u64, u64)> {
    let mut parts = text.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next()?.parse().ok()?;
    let patch: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Checks a version field against the supported MAJOR gate.
fn check_version(version: &str, path: &str, violations: &mut Vec<Violation>) {
    match parse_semver(version) {
        None => violations.push(Violation::new(
            ErrorCode::SchemaInvalid,
            path,
            format!("`{version}` is not a numeric semver triple"),
        )),
        Some((major, _, _)) if major != SUPPORTED_SPEC_MAJOR => {
            violations.push(Violation::new(
                ErrorCode::VersionUnsupported,
                path,
                format!("major version {major} is not supported (expected {SUPPORTED_SPEC_MAJOR})"),
            ));
        }
        Some(_) => {}
    }
}

// ============================================================================
// SECTION: Problem Specification Validation
// ============================================================================

/// Validates a raw problem specification, returning the accepted and
/// normalized typed value.
///
/// # Errors
///
/// Returns [`ValidationError`] enumerating every violated rule.
pub fn validate_problem_spec(value: &Value) -> Result<ProblemSpec, ValidationError> {
    let mut spec: ProblemSpec =
        serde_json::from_value(value.clone()).map_err(|err| ValidationError {
            violations: vec![Violation::new(ErrorCode::SchemaInvalid, "$", err.to_string())],
        })?;

    let mut violations = Vec::new();
    check_version(&spec.version, "version", &mut violations);
    if spec.id.as_str().is_empty() {
        violations.push(Violation::new(ErrorCode::SchemaInvalid, "id", "must be non-empty"));
    }
    if spec.inputs.prompt.trim().is_empty() {
        violations.push(Violation::new(
            ErrorCode::SchemaInvalid,
            "inputs.prompt",
            "must be non-empty after whitespace trim",
        ));
    }
    check_string_entries(&spec.inputs.constraints, "inputs.constraints", &mut violations);
    check_string_entries(&spec.inputs.goals, "inputs.goals", &mut violations);

    for (position, path) in spec.settings.verification_paths.iter().enumerate() {
        if path.name.trim().is_empty() {
            violations.push(Violation::new(
                ErrorCode::SchemaInvalid,
                format!("settings.verification_paths.{position}.name"),
                "must be non-empty",
            ));
        }
    }

    if let Some(loop_settings) = spec.settings.loop_settings.take() {
        let normalized = validate_loop_settings(loop_settings, &mut violations);
        spec.settings.loop_settings = Some(normalized);
    }

    finish(violations)?;
    Ok(spec)
}

/// Checks that every entry of a string sequence is non-empty.
fn check_string_entries(entries: &[String], path: &str, violations: &mut Vec<Violation>) {
    for (position, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            violations.push(Violation::new(
                ErrorCode::SchemaInvalid,
                format!("{path}.{position}"),
                "entries must be non-empty",
            ));
        }
    }
}

// ============================================================================
// SECTION: Loop Configuration Validation
// ============================================================================

/// Validates loop settings and normalizes the stop condition.
fn validate_loop_settings(
    mut settings: LoopSettings,
    violations: &mut Vec<Violation>,
) -> LoopSettings {
    if settings.start_step.position() > settings.end_step.position() {
        violations.push(Violation::new(
            ErrorCode::LoopConfigInvalid,
            "settings.loop.start_step",
            format!(
                "start step {} is after end step {} in graph order",
                settings.start_step, settings.end_step
            ),
        ));
    }
    if settings.max_iterations == 0 {
        violations.push(Violation::new(
            ErrorCode::LoopConfigInvalid,
            "settings.loop.max_iterations",
            "must be strictly positive",
        ));
    }
    settings.stop_condition = normalize_stop_condition(settings.stop_condition, violations);
    settings
}

/// Normalizes and validates a stop condition.
fn normalize_stop_condition(
    mut condition: StopCondition,
    violations: &mut Vec<Violation>,
) -> StopCondition {
    const PATH_FIELD: &str = "settings.loop.stop_condition.path";
    const VALUE_FIELD: &str = "settings.loop.stop_condition.value";
    const OPERATOR_FIELD: &str = "settings.loop.stop_condition.operator";

    if !stop_path_is_valid(&condition.path) {
        violations.push(Violation::new(
            ErrorCode::StopConditionInvalid,
            PATH_FIELD,
            "path must match `artifacts.<name>(.<key>)*`",
        ));
    }

    match (condition.operator, condition.equals.take()) {
        (Some(_), Some(_)) => {
            violations.push(Violation::new(
                ErrorCode::StopConditionInvalid,
                OPERATOR_FIELD,
                "`operator` and legacy `equals` are mutually exclusive",
            ));
        }
        (None, Some(legacy)) => {
            condition.operator = Some(StopOperator::Equals);
            condition.value = Some(legacy);
        }
        (None, None) => {
            violations.push(Violation::new(
                ErrorCode::StopConditionInvalid,
                OPERATOR_FIELD,
                "an operator (or legacy `equals`) is required",
            ));
        }
        (Some(_), None) => {}
    }

    match condition.value.as_ref() {
        None => {
            if condition.operator.is_some() && !violations.iter().any(|v| v.path == OPERATOR_FIELD)
            {
                violations.push(Violation::new(
                    ErrorCode::StopConditionInvalid,
                    VALUE_FIELD,
                    "a comparison value is required",
                ));
            }
        }
        Some(value) => {
            if !stop_value_is_scalar(value) {
                violations.push(Violation::new(
                    ErrorCode::StopConditionInvalid,
                    VALUE_FIELD,
                    "value must be a string, integer, or boolean",
                ));
            }
        }
    }
    condition
}

/// Checks the narrow dotted-path grammar rooted at `artifacts.`.
fn stop_path_is_valid(path: &str) -> bool {
    let mut segments = path.split('.');
    if segments.next() != Some("artifacts") {
        return false;
    }
    let mut rest = 0_usize;
    for segment in segments {
        if segment.is_empty()
            || !segment.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        {
            return false;
        }
        rest += 1;
    }
    rest >= 1
}

/// Checks that a stop-condition value is a supported scalar.
fn stop_value_is_scalar(value: &Value) -> bool {
    match value {
        Value::String(_) | Value::Bool(_) => true,
        Value::Number(number) => number.as_i64().is_some() || number.as_u64().is_some(),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

// ============================================================================
// SECTION: Step Result Validation
// ============================================================================

/// Validates a step result against the step contract.
///
/// # Errors
///
/// Returns [`ValidationError`] enumerating every violated rule.
pub fn validate_step_result(result: &StepResult) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    check_version(&result.version, "version", &mut violations);

    match result.status {
        StepStatus::Success => {
            if result.output.is_none() {
                violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "output",
                    "success requires an output",
                ));
            }
            if result.errors.is_some() {
                violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "errors",
                    "success must not carry errors",
                ));
            }
        }
        StepStatus::Failed => {
            if result.output.is_some() {
                violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "output",
                    "failed must not carry an output",
                ));
            }
            match result.errors.as_ref() {
                None => violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "errors",
                    "failed requires at least one error",
                )),
                Some(errors) if errors.is_empty() => violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "errors",
                    "failed requires at least one error",
                )),
                Some(errors) => {
                    for (position, entry) in errors.iter().enumerate() {
                        if entry.message.trim().is_empty() {
                            violations.push(Violation::new(
                                ErrorCode::StepContractViolation,
                                format!("errors.{position}.message"),
                                "error messages must be non-empty",
                            ));
                        }
                    }
                }
            }
        }
        StepStatus::Skipped => {
            if result.output.is_some() || result.errors.is_some() {
                violations.push(Violation::new(
                    ErrorCode::StepContractViolation,
                    "status",
                    "skipped carries neither output nor errors",
                ));
            }
        }
    }

    if !result.started_at.not_after(&result.finished_at) {
        violations.push(Violation::new(
            ErrorCode::StepContractViolation,
            "started_at",
            "must not be after finished_at",
        ));
    }
    for (digest, path) in
        [(&result.input_hash, "input_hash"), (&result.output_hash, "output_hash")]
    {
        if !HashDigest::is_well_formed(digest.as_str()) {
            violations.push(Violation::new(
                ErrorCode::SchemaInvalid,
                path,
                "must be 64 lowercase hex digits",
            ));
        }
    }

    finish(violations)
}
