// crates/stepchain-core/src/runtime/writer.rs
// ============================================================================
// Module: Stepchain Trace Writer
// Description: Append-only NDJSON writer with hash-chain enforcement.
// Purpose: Commit sealed trace records in order, one canonical line each.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The writer exclusively owns the trace sink for one run. Records are
//! committed as one canonical JSON object per line, LF-terminated, with no
//! blank lines and no trailing whitespace. A record becomes observable only
//! after its `record_hash` is computed and its bytes are appended. The
//! writer rejects any record whose `prev_hash` does not match the prior
//! `record_hash` and any non-monotonic `index`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::errors::ErrorCode;
use crate::core::hashing::CanonicalError;
use crate::core::hashing::HashDigest;
use crate::core::trace::TraceRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Trace writing and verification errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// `prev_hash` does not match the prior record hash.
    #[error("trace chain broken at index {index}")]
    ChainBroken {
        /// Index of the offending record.
        index: u64,
    },
    /// Record index is not the next expected index.
    #[error("non-monotonic trace index: expected {expected}, found {found}")]
    NonMonotonicIndex {
        /// Expected next index.
        expected: u64,
        /// Index carried by the record.
        found: u64,
    },
    /// Header record is missing or misplaced.
    #[error("header must be exactly the first trace record")]
    HeaderPlacement,
    /// Stored record hash does not match its recomputed value.
    #[error("record hash mismatch at index {index}")]
    RecordHashMismatch {
        /// Index of the offending record.
        index: u64,
    },
    /// Trace bytes are empty.
    #[error("trace contains no records")]
    Empty,
    /// Trace line cannot be decoded as a record.
    #[error("malformed trace line {line}: {message}")]
    Malformed {
        /// Zero-based line number.
        line: usize,
        /// Decoding failure description.
        message: String,
    },
    /// Canonical encoding failed while sealing a record.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

impl TraceError {
    /// Returns the taxonomy code for the error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ChainBroken {
                ..
            }
            | Self::NonMonotonicIndex {
                ..
            }
            | Self::HeaderPlacement
            | Self::Empty => ErrorCode::TraceChainBroken,
            Self::RecordHashMismatch {
                ..
            } => ErrorCode::HashMismatch,
            Self::Malformed {
                ..
            } => ErrorCode::SchemaInvalid,
            Self::Canonical(_) => ErrorCode::CanonicalizationError,
        }
    }
}

// ============================================================================
// SECTION: Trace Writer
// ============================================================================

/// Append-only trace writer owning one run's sink.
///
/// # Invariants
/// - Record indices are assigned 0, 1, 2, ... with no gaps.
/// - Every committed line is canonical JSON terminated by a single LF.
#[derive(Debug, Clone, Default)]
pub struct TraceWriter {
    /// Committed trace bytes.
    buffer: Vec<u8>,
    /// Next expected record index.
    next_index: u64,
    /// Hash of the last committed record.
    last_hash: Option<HashDigest>,
}

impl TraceWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next expected record index.
    #[must_use]
    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Returns the hash of the last committed record.
    #[must_use]
    pub const fn last_hash(&self) -> Option<&HashDigest> {
        self.last_hash.as_ref()
    }

    /// Seals and commits one record, returning its record hash.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] on index, placement, or linkage violations and
    /// on canonical encoding failures.
    pub fn write(&mut self, record: TraceRecord) -> Result<HashDigest, TraceError> {
        if record.index() != self.next_index {
            return Err(TraceError::NonMonotonicIndex {
                expected: self.next_index,
                found: record.index(),
            });
        }
        let is_header = matches!(record, TraceRecord::Header(_));
        if is_header != (self.next_index == 0) {
            return Err(TraceError::HeaderPlacement);
        }
        if record.prev_hash() != self.last_hash.as_ref() {
            return Err(TraceError::ChainBroken {
                index: record.index(),
            });
        }
        let (sealed, digest) = record.seal()?;
        let line = sealed.to_line_bytes()?;
        self.buffer.extend_from_slice(&line);
        self.last_hash = Some(digest.clone());
        self.next_index += 1;
        Ok(digest)
    }

    /// Consumes the writer, returning the committed trace bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
