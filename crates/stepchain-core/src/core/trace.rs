// crates/stepchain-core/src/core/trace.rs
// ============================================================================
// Module: Stepchain Trace Records
// Description: Hash-chained header, step, and control trace records.
// Purpose: Define the append-only NDJSON trace with tamper-evident linkage.
// Dependencies: crate::core::{hashing, identifiers, problem, step, time}, serde
// ============================================================================

//! ## Overview
//! A trace is an ordered sequence of records: one header at index 0, one step
//! record per executed step, and one control record per loop decision. Every
//! record carries a strictly monotonic `index`, the previous record's hash as
//! `prev_hash` (absent on the header), and its own `record_hash`: the SHA-256
//! of the canonical JSON of the record constructed *without* the
//! `record_hash` field. Sealing works on the value level, never by string
//! surgery on encoded output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::CanonicalError;
use crate::core::hashing::HashDigest;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::hashing::to_canonical_value;
use crate::core::identifiers::StepName;
use crate::core::identifiers::TraceId;
use crate::core::problem::StopCondition;
use crate::core::step::StepResult;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire version of the trace record model.
pub const TRACE_VERSION: &str = "1.0.0";

/// Engine version stamped into trace headers.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hash algorithm label stamped into trace headers.
pub const HASH_ALGORITHM: &str = "sha256";

/// Canonicalization label stamped into trace headers.
pub const CANONICALIZATION: &str = "json-c14n-v1";

// ============================================================================
// SECTION: Header Records
// ============================================================================

/// Trace header, always at index 0.
///
/// # Invariants
/// - `problem_spec_hash` and `initial_state_hash` are canonical hashes of
///   the accepted specification and the pending initial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    /// Record index, always 0.
    pub index: u64,
    /// Wire version of the trace record model.
    pub version: String,
    /// Trace identifier.
    pub trace_id: TraceId,
    /// Header creation timestamp under the deterministic clock.
    pub created_at: Timestamp,
    /// Engine version producing the trace.
    pub engine_version: String,
    /// Hash algorithm label.
    pub hash_algorithm: String,
    /// Canonicalization label.
    pub canonicalization: String,
    /// Canonical hash of the accepted problem specification.
    pub problem_spec_hash: HashDigest,
    /// Canonical hash of the pending initial state.
    pub initial_state_hash: HashDigest,
    /// Record hash, computed by sealing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hash: Option<HashDigest>,
}

// ============================================================================
// SECTION: Step Records
// ============================================================================

/// Record of one executed step.
///
/// # Invariants
/// - `state_after_hash` equals the canonical hash of applying `result` to
///   the state hashed as `state_before_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Record index within the trace.
    pub index: u64,
    /// State `step_index` after applying the result.
    pub step_index: u64,
    /// Validated step result.
    pub result: StepResult,
    /// Canonical state hash before the step.
    pub state_before_hash: HashDigest,
    /// Canonical state hash after applying the result.
    pub state_after_hash: HashDigest,
    /// Hash of the previous trace record.
    pub prev_hash: HashDigest,
    /// Record hash, computed by sealing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hash: Option<HashDigest>,
}

// ============================================================================
// SECTION: Control Records
// ============================================================================

/// Control record kinds.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    /// Loop decision record.
    Loop,
}

/// Action decided by the loop controller.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
    /// Re-enter the looped segment at `start_step`.
    Repeat,
    /// Stop condition satisfied; continue past `end_step`.
    Stop,
    /// Iteration budget exhausted; continue past `end_step`.
    MaxIterationsReached,
}

/// Record of one loop decision.
///
/// # Invariants
/// - Exactly one control record exists per loop decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    /// Record index within the trace.
    pub index: u64,
    /// Control record kind.
    pub control_type: ControlType,
    /// Decided action.
    pub action: LoopAction,
    /// Iteration the decision was made after (1-based).
    pub loop_iteration: u64,
    /// First step of the looped segment.
    pub start_step: StepName,
    /// Last step of the looped segment.
    pub end_step: StepName,
    /// Normalized stop condition in force.
    pub stop_condition: StopCondition,
    /// Canonical state hash at decision time.
    pub state_hash: HashDigest,
    /// Hash of the previous trace record.
    pub prev_hash: HashDigest,
    /// Record hash, computed by sealing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hash: Option<HashDigest>,
}

// ============================================================================
// SECTION: Trace Record Union
// ============================================================================

/// One trace record of any kind.
///
/// # Invariants
/// - Kinds are structurally distinct on the wire (untagged decoding is
///   unambiguous).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceRecord {
    /// Header record at index 0.
    Header(HeaderRecord),
    /// Step record.
    Step(StepRecord),
    /// Control record.
    Control(ControlRecord),
}

impl TraceRecord {
    /// Returns the record index.
    #[must_use]
    pub const fn index(&self) -> u64 {
        match self {
            Self::Header(record) => record.index,
            Self::Step(record) => record.index,
            Self::Control(record) => record.index,
        }
    }

    /// Returns the previous-record hash, absent on the header.
    #[must_use]
    pub const fn prev_hash(&self) -> Option<&HashDigest> {
        match self {
            Self::Header(_) => None,
            Self::Step(record) => Some(&record.prev_hash),
            Self::Control(record) => Some(&record.prev_hash),
        }
    }

    /// Returns the sealed record hash, if sealing has happened.
    #[must_use]
    pub const fn record_hash(&self) -> Option<&HashDigest> {
        match self {
            Self::Header(record) => record.record_hash.as_ref(),
            Self::Step(record) => record.record_hash.as_ref(),
            Self::Control(record) => record.record_hash.as_ref(),
        }
    }

    /// Replaces the record-hash slot.
    fn set_record_hash(&mut self, digest: Option<HashDigest>) {
        match self {
            Self::Header(record) => record.record_hash = digest,
            Self::Step(record) => record.record_hash = digest,
            Self::Control(record) => record.record_hash = digest,
        }
    }

    /// Seals the record: computes `record_hash` over the record value with
    /// the `record_hash` field absent, then stores it.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] when the record cannot be encoded.
    pub fn seal(mut self) -> Result<(Self, HashDigest), CanonicalError> {
        self.set_record_hash(None);
        let projection = to_canonical_value(&self)?;
        let digest = hash_canonical_json(&projection)?;
        self.set_record_hash(Some(digest.clone()));
        Ok((self, digest))
    }

    /// Encodes the sealed record as one LF-terminated NDJSON line.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] when the record cannot be encoded.
    pub fn to_line_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        let value = to_canonical_value(self)?;
        let mut bytes = canonical_json_bytes(&value)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
