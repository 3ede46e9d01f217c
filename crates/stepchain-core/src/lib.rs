// crates/stepchain-core/src/lib.rs
// ============================================================================
// Module: Stepchain Core
// Description: Deterministic multi-step reasoning kernel with hash-chained traces.
// Purpose: Execute a fixed step graph over append-only state and emit replayable traces.
// Dependencies: bigdecimal, serde, serde_json, sha2, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! Stepchain executes a fully specified problem through a fixed sequence of
//! named steps, validates every step result against a canonical contract,
//! applies it to an append-only [`ReasoningState`], and emits a tamper-evident
//! NDJSON trace whose bytes are reproducible from the inputs alone. The
//! kernel never reads wall-clock time and never tolerates non-canonical JSON;
//! replaying a request with the same spec, trace identifier, and clock seed
//! produces byte-identical trace output.
//!
//! External collaborators (HTTP surface, persistence, idempotency cache,
//! model providers) appear only as the contracts in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod validate;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::errors::ErrorCode;
pub use crate::core::hashing;
pub use crate::core::hashing::HashDigest;
pub use crate::core::identifiers::RequestId;
pub use crate::core::identifiers::StepName;
pub use crate::core::identifiers::TraceId;
pub use crate::core::problem::LoopSettings;
pub use crate::core::problem::ProblemInputs;
pub use crate::core::problem::ProblemSpec;
pub use crate::core::problem::Settings;
pub use crate::core::problem::StopCondition;
pub use crate::core::problem::StopOperator;
pub use crate::core::problem::VerificationPath;
pub use crate::core::state::ErrorRecord;
pub use crate::core::state::ReasoningState;
pub use crate::core::state::StateMetadata;
pub use crate::core::state::StateStatus;
pub use crate::core::step::StepMetrics;
pub use crate::core::step::StepResult;
pub use crate::core::step::StepStatus;
pub use crate::core::time::DeterministicClock;
pub use crate::core::time::Timestamp;
pub use crate::core::time::TimestampError;
pub use crate::core::trace::CANONICALIZATION;
pub use crate::core::trace::ControlRecord;
pub use crate::core::trace::ENGINE_VERSION;
pub use crate::core::trace::HASH_ALGORITHM;
pub use crate::core::trace::HeaderRecord;
pub use crate::core::trace::LoopAction;
pub use crate::core::trace::StepRecord;
pub use crate::core::trace::TRACE_VERSION;
pub use crate::core::trace::TraceRecord;
pub use crate::interfaces::CancelFlag;
pub use crate::interfaces::ExecuteOutcome;
pub use crate::interfaces::ExecuteRequest;
pub use crate::interfaces::FixtureModelProvider;
pub use crate::interfaces::IdempotencyCache;
pub use crate::interfaces::InMemoryIdempotencyCache;
pub use crate::interfaces::InMemoryTraceStore;
pub use crate::interfaces::ModelError;
pub use crate::interfaces::ModelProvider;
pub use crate::interfaces::TraceStore;
pub use crate::validate::ValidationError;
pub use crate::validate::Violation;
