// crates/stepchain-core/src/runtime/verify.rs
// ============================================================================
// Module: Stepchain Trace Verification
// Description: Offline integrity verification of hash-chained trace bytes.
// Purpose: Detect tampering, broken linkage, and non-canonical trace lines.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! The verifier replays a trace's integrity rules without re-executing the
//! run: every line must be canonical JSON, indices must be 0, 1, 2, ... with
//! the header first, and each record's `prev_hash` must equal the
//! *recomputed* hash of its predecessor. A tampered record therefore
//! surfaces as a broken chain on the record that follows it; the final
//! record's stored `record_hash` is checked against its recomputed value at
//! end of stream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::trace::TraceRecord;
use crate::runtime::writer::TraceError;

// ============================================================================
// SECTION: Trace Summary
// ============================================================================

/// Summary of a successfully verified trace.
///
/// # Invariants
/// - `records` equals the sum of the header, step, and control counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSummary {
    /// Total record count including the header.
    pub records: usize,
    /// Step record count.
    pub step_records: usize,
    /// Control record count.
    pub control_records: usize,
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies trace bytes end to end.
///
/// # Errors
///
/// Returns [`TraceError`] describing the first integrity violation.
pub fn verify_trace_bytes(bytes: &[u8]) -> Result<TraceSummary, TraceError> {
    if bytes.is_empty() {
        return Err(TraceError::Empty);
    }
    let Some(body) = bytes.strip_suffix(b"\n") else {
        return Err(TraceError::Malformed {
            line: 0,
            message: "trace must end with a line feed".to_string(),
        });
    };

    let mut summary = TraceSummary {
        records: 0,
        step_records: 0,
        control_records: 0,
    };
    let mut previous_recomputed = None;
    let mut last_stored = None;

    for (line_number, line) in body.split(|byte| *byte == b'\n').enumerate() {
        if line.is_empty() {
            return Err(TraceError::Malformed {
                line: line_number,
                message: "blank trace line".to_string(),
            });
        }
        let value: Value =
            serde_json::from_slice(line).map_err(|err| TraceError::Malformed {
                line: line_number,
                message: err.to_string(),
            })?;
        if canonical_json_bytes(&value)? != line {
            return Err(TraceError::Malformed {
                line: line_number,
                message: "line is not canonical json".to_string(),
            });
        }
        let record: TraceRecord =
            serde_json::from_value(value.clone()).map_err(|err| TraceError::Malformed {
                line: line_number,
                message: err.to_string(),
            })?;

        let expected_index = u64::try_from(line_number).unwrap_or(u64::MAX);
        if record.index() != expected_index {
            return Err(TraceError::NonMonotonicIndex {
                expected: expected_index,
                found: record.index(),
            });
        }
        let is_header = matches!(record, TraceRecord::Header(_));
        if is_header != (line_number == 0) {
            return Err(TraceError::HeaderPlacement);
        }
        if record.prev_hash() != previous_recomputed.as_ref() {
            return Err(TraceError::ChainBroken {
                index: record.index(),
            });
        }

        let recomputed = {
            let mut projection = value;
            if let Some(map) = projection.as_object_mut() {
                map.remove("record_hash");
            }
            hash_canonical_json(&projection)?
        };
        previous_recomputed = Some(recomputed.clone());
        last_stored = Some((record.index(), record.record_hash().cloned(), recomputed));

        match record {
            TraceRecord::Header(_) => {}
            TraceRecord::Step(_) => summary.step_records += 1,
            TraceRecord::Control(_) => summary.control_records += 1,
        }
        summary.records += 1;
    }

    if let Some((index, stored, recomputed)) = last_stored
        && stored.as_ref() != Some(&recomputed)
    {
        return Err(TraceError::RecordHashMismatch {
            index,
        });
    }
    Ok(summary)
}
