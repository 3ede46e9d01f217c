// crates/stepchain-core/src/core/time.rs
// ============================================================================
// Module: Stepchain Time Model
// Description: RFC 3339 UTC timestamps and the caller-seeded deterministic clock.
// Purpose: Keep every timestamp in state and trace records fully replayable.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! The kernel never reads wall-clock time. Callers seed a
//! [`DeterministicClock`] with an RFC 3339 UTC timestamp; every subsequent
//! `now()` advances by a fixed one-millisecond step. Timestamps keep their
//! exact string wire form (the form is what gets hashed) alongside the parsed
//! instant used for ordering checks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing and rendering errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Value is not a valid RFC 3339 date-time.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
    /// Value carries a non-UTC offset.
    #[error("timestamp offset must be utc: {0}")]
    NotUtc(String),
    /// Instant could not be rendered back to RFC 3339.
    #[error("timestamp could not be formatted: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Canonical RFC 3339 UTC timestamp.
///
/// # Invariants
/// - The wire form is the exact string supplied at construction.
/// - The offset is always UTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    /// Exact RFC 3339 wire form.
    value: String,
    /// Parsed instant used for ordering checks.
    instant: OffsetDateTime,
}

impl Timestamp {
    /// Parses an RFC 3339 UTC timestamp, preserving its exact wire form.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the value is not RFC 3339 or not UTC.
    pub fn parse(value: impl Into<String>) -> Result<Self, TimestampError> {
        let value = value.into();
        let instant = OffsetDateTime::parse(&value, &Rfc3339)
            .map_err(|err| TimestampError::Parse(format!("{value}: {err}")))?;
        if !instant.offset().is_utc() {
            return Err(TimestampError::NotUtc(value));
        }
        Ok(Self {
            value,
            instant,
        })
    }

    /// Returns the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the parsed instant.
    #[must_use]
    pub const fn instant(&self) -> OffsetDateTime {
        self.instant
    }

    /// Returns true when `self` is not after `other`.
    #[must_use]
    pub fn not_after(&self, other: &Self) -> bool {
        self.instant <= other.instant
    }

    /// Returns true when `self` is strictly before `other`.
    #[must_use]
    pub fn strictly_before(&self, other: &Self) -> bool {
        self.instant < other.instant
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.value
    }
}

// ============================================================================
// SECTION: Deterministic Clock
// ============================================================================

/// Clock step applied between successive `now()` calls.
const CLOCK_STEP_MS: i64 = 1;

/// Caller-seeded monotonic clock.
///
/// # Invariants
/// - The first `now()` returns the seed instant exactly.
/// - Successive calls advance by exactly one millisecond.
#[derive(Debug, Clone)]
pub struct DeterministicClock {
    /// Seed instant supplied by the caller.
    seed: OffsetDateTime,
    /// Number of `now()` calls already served.
    ticks: i64,
}

impl DeterministicClock {
    /// Creates a clock seeded at the provided timestamp.
    #[must_use]
    pub const fn new(seed: &Timestamp) -> Self {
        Self {
            seed: seed.instant(),
            ticks: 0,
        }
    }

    /// Returns the next timestamp and advances the clock.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the advanced instant cannot be rendered.
    pub fn now(&mut self) -> Result<Timestamp, TimestampError> {
        let instant = self.seed + Duration::milliseconds(self.ticks * CLOCK_STEP_MS);
        self.ticks += 1;
        let value =
            instant.format(&Rfc3339).map_err(|err| TimestampError::Format(err.to_string()))?;
        Ok(Timestamp {
            value,
            instant,
        })
    }
}
