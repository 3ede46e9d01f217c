// crates/stepchain-core/src/interfaces/mod.rs
// ============================================================================
// Module: Stepchain Collaborator Interfaces
// Description: Contract surfaces for model providers, trace storage, and caching.
// Purpose: Keep external collaborators behind deterministic, replay-safe seams.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The kernel integrates with external systems only through these contracts.
//! Implementations must be deterministic under replay: a model provider
//! backed by a fixture returns the same bytes for the same prompt, a trace
//! store is idempotent by `(trace_id, index)`, and an idempotency cache
//! returns responses byte-identical to the originals. The in-memory
//! implementations here exist for tests, examples, and embedding hosts; the
//! production HTTP, relational, and cache backends live outside this crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::TraceId;
use crate::core::state::ReasoningState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Execute Request
// ============================================================================

/// One execution request from the hosting surface.
///
/// # Invariants
/// - `now` seeds the deterministic clock; replaying with the same request
///   produces byte-identical trace output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Raw problem specification, validated by the engine.
    pub problem_spec: Value,
    /// Stable trace identifier for the run.
    pub trace_id: TraceId,
    /// Clock seed.
    pub now: Timestamp,
}

/// Result of one execution request.
///
/// # Invariants
/// - `trace` is the concatenation of sealed NDJSON record bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// Final reasoning state including the full error history.
    pub final_state: ReasoningState,
    /// Complete trace bytes.
    pub trace: Vec<u8>,
}

// ============================================================================
// SECTION: Model Provider
// ============================================================================

/// Model provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Provider call exceeded the caller-configured deadline.
    #[error("model provider timed out")]
    Timeout,
    /// Provider reported an error.
    #[error("model provider error: {0}")]
    Provider(String),
}

/// Deterministic oracle consulted by evidence acquisition.
pub trait ModelProvider {
    /// Generates bytes for a prompt, optionally constrained by a schema.
    ///
    /// Implementations must be deterministic under replay: any
    /// nondeterminism has to be captured in the step's `input_hash` by the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when generation fails or times out.
    fn generate(&self, prompt: &str, schema: Option<&Value>) -> Result<Vec<u8>, ModelError>;
}

/// In-memory fixture provider with per-prompt canned responses.
///
/// # Invariants
/// - Identical prompts always yield identical bytes.
#[derive(Debug, Clone, Default)]
pub struct FixtureModelProvider {
    /// Canned responses keyed by exact prompt.
    responses: BTreeMap<String, Vec<u8>>,
    /// Fallback response for prompts without a dedicated fixture.
    fallback: Option<Vec<u8>>,
}

impl FixtureModelProvider {
    /// Creates an empty fixture provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a canned response for an exact prompt.
    #[must_use]
    pub fn with_response(mut self, prompt: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(prompt.into(), bytes.into());
        self
    }

    /// Sets the fallback response for unmatched prompts.
    #[must_use]
    pub fn with_fallback(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.fallback = Some(bytes.into());
        self
    }
}

impl ModelProvider for FixtureModelProvider {
    fn generate(&self, prompt: &str, _schema: Option<&Value>) -> Result<Vec<u8>, ModelError> {
        if let Some(bytes) = self.responses.get(prompt) {
            return Ok(bytes.clone());
        }
        self.fallback
            .clone()
            .ok_or_else(|| ModelError::Provider(format!("no fixture for prompt: {prompt}")))
    }
}

// ============================================================================
// SECTION: Trace Store
// ============================================================================

/// Trace store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceStoreError {
    /// A different record was already stored for this `(trace_id, index)`.
    #[error("trace store conflict for {trace_id} at index {index}")]
    Conflict {
        /// Trace identifier of the conflicting append.
        trace_id: String,
        /// Record index of the conflicting append.
        index: u64,
    },
    /// Store reported an error.
    #[error("trace store error: {0}")]
    Store(String),
}

/// Append-only record storage, idempotent by `(trace_id, index)`.
pub trait TraceStore {
    /// Appends one sealed record line.
    ///
    /// Re-appending identical bytes for the same `(trace_id, index)` is a
    /// no-op; differing bytes are a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`TraceStoreError`] on conflict or storage failure.
    fn append(
        &mut self,
        trace_id: &TraceId,
        index: u64,
        record_bytes: &[u8],
    ) -> Result<(), TraceStoreError>;
}

/// In-memory trace store for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTraceStore {
    /// Stored record lines keyed by trace identifier and index.
    records: BTreeMap<(String, u64), Vec<u8>>,
}

impl InMemoryTraceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concatenated record bytes for a trace, in index order.
    #[must_use]
    pub fn trace_bytes(&self, trace_id: &TraceId) -> Vec<u8> {
        let mut bytes = Vec::new();
        for ((stored_id, _), line) in &self.records {
            if stored_id == trace_id.as_str() {
                bytes.extend_from_slice(line);
            }
        }
        bytes
    }
}

impl TraceStore for InMemoryTraceStore {
    fn append(
        &mut self,
        trace_id: &TraceId,
        index: u64,
        record_bytes: &[u8],
    ) -> Result<(), TraceStoreError> {
        let key = (trace_id.as_str().to_string(), index);
        if let Some(existing) = self.records.get(&key) {
            if existing == record_bytes {
                return Ok(());
            }
            return Err(TraceStoreError::Conflict {
                trace_id: trace_id.as_str().to_string(),
                index,
            });
        }
        self.records.insert(key, record_bytes.to_vec());
        Ok(())
    }
}

// ============================================================================
// SECTION: Idempotency Cache
// ============================================================================

/// Response cache keyed by trace identifier.
pub trait IdempotencyCache {
    /// Returns the cached response bytes, byte-identical to the original.
    fn get(&self, trace_id: &TraceId) -> Option<Vec<u8>>;

    /// Stores response bytes with a time-to-live in seconds.
    ///
    /// Expiry is enforced by the hosting backend; the kernel only requires
    /// that unexpired reads return the original bytes unchanged.
    fn put(&mut self, trace_id: &TraceId, response_bytes: Vec<u8>, ttl_seconds: u64);
}

/// In-memory idempotency cache for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyCache {
    /// Cached responses with their declared time-to-live.
    entries: BTreeMap<String, (Vec<u8>, u64)>,
}

impl InMemoryIdempotencyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyCache for InMemoryIdempotencyCache {
    fn get(&self, trace_id: &TraceId) -> Option<Vec<u8>> {
        self.entries.get(trace_id.as_str()).map(|(bytes, _)| bytes.clone())
    }

    fn put(&mut self, trace_id: &TraceId, response_bytes: Vec<u8>, ttl_seconds: u64) {
        self.entries.insert(trace_id.as_str().to_string(), (response_bytes, ttl_seconds));
    }
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cooperative cancellation flag checked between steps.
///
/// # Invariants
/// - Cancellation is observed only at step boundaries, never mid-step.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    /// Shared cancellation bit.
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a new, uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
