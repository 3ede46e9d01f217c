// crates/stepchain-core/src/core/hashing.rs
// ============================================================================
// Module: Stepchain Canonical Hashing
// Description: The json-c14n-v1 canonical JSON encoding and SHA-256 digests.
// Purpose: Give every value exactly one byte form so hashes are replay-stable.
// Dependencies: serde, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! `json-c14n-v1` maps any JSON-shaped value to a unique byte sequence:
//! UTF-8, object keys sorted by raw byte order, array order preserved,
//! standard short escapes plus lowercase `\u00xx` for remaining control
//! codes, integer values emitted with no fractional part, non-finite numbers
//! rejected, no inter-token whitespace. Decoding rejects duplicate object
//! keys. SHA-256 over the emitted bytes, rendered as 64 lowercase hex
//! digits, is the only hashing path anywhere in the kernel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lowercase hex alphabet used for digests and escape sequences.
const HEX_LOWER: [u8; 16] = *b"0123456789abcdef";

/// Length of a rendered SHA-256 digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Canonical encoding and decoding errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalError {
    /// Input contains a duplicate object key.
    #[error("canonicalization error: duplicate object key `{key}`")]
    DuplicateKey {
        /// Decoded duplicate key.
        key: String,
    },
    /// Input contains a non-finite number.
    #[error("canonicalization error: non-finite number")]
    NonFiniteNumber,
    /// Input bytes are not valid JSON.
    #[error("canonicalization error: {0}")]
    Parse(String),
    /// Value could not be projected into the JSON data model.
    #[error("canonicalization error: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Hash Digests
// ============================================================================

/// SHA-256 digest rendered as 64 lowercase hex digits.
///
/// # Invariants
/// - Always exactly [`DIGEST_HEX_LEN`] lowercase ASCII hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the value is a well-formed lowercase hex digest.
    #[must_use]
    pub fn is_well_formed(value: &str) -> bool {
        value.len() == DIGEST_HEX_LEN
            && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Parses a digest from its hex wire form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::is_well_formed(value).then(|| Self(value.to_string()))
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hashes raw bytes with SHA-256.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> HashDigest {
    let digest = Sha256::digest(data);
    let mut rendered = String::with_capacity(DIGEST_HEX_LEN);
    for byte in digest {
        rendered.push(char::from(HEX_LOWER[usize::from(byte >> 4)]));
        rendered.push(char::from(HEX_LOWER[usize::from(byte & 0x0f)]));
    }
    HashDigest(rendered)
}

/// Hashes the canonical encoding of a JSON value.
///
/// # Errors
///
/// Returns [`CanonicalError`] when the value cannot be canonically encoded.
pub fn hash_canonical_json(value: &Value) -> Result<HashDigest, CanonicalError> {
    Ok(hash_bytes(&canonical_json_bytes(value)?))
}

/// Projects a serializable value into the JSON data model and hashes it.
///
/// # Errors
///
/// Returns [`CanonicalError`] when projection or encoding fails.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<HashDigest, CanonicalError> {
    hash_canonical_json(&to_canonical_value(value)?)
}

/// Projects a serializable value into a [`Value`] for canonical encoding.
///
/// # Errors
///
/// Returns [`CanonicalError`] when the value does not fit the JSON model
/// (for example non-string map keys).
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, CanonicalError> {
    serde_json::to_value(value).map_err(|err| CanonicalError::Serialize(err.to_string()))
}

// ============================================================================
// SECTION: Canonical Encoding
// ============================================================================

/// Encodes a JSON value to its unique json-c14n-v1 byte form.
///
/// # Errors
///
/// Returns [`CanonicalError::NonFiniteNumber`] for non-finite numbers.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::new();
    emit_value(value, &mut out)?;
    Ok(out)
}

/// Emits one JSON value into the output buffer.
fn emit_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => emit_number(number, out)?,
        Value::String(text) => emit_string(text, out),
        Value::Array(items) => {
            out.push(b'[');
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    out.push(b',');
                }
                emit_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|left, right| left.0.as_bytes().cmp(right.0.as_bytes()));
            out.push(b'{');
            for (position, (key, item)) in entries.iter().enumerate() {
                if position > 0 {
                    out.push(b',');
                }
                emit_string(key, out);
                out.push(b':');
                emit_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// Emits a number, normalizing integral values to no fractional part.
fn emit_number(number: &Number, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    if let Some(int) = number.as_i64() {
        out.extend_from_slice(int.to_string().as_bytes());
        return Ok(());
    }
    if let Some(int) = number.as_u64() {
        out.extend_from_slice(int.to_string().as_bytes());
        return Ok(());
    }
    let Some(float) = number.as_f64() else {
        return Err(CanonicalError::NonFiniteNumber);
    };
    if !float.is_finite() {
        return Err(CanonicalError::NonFiniteNumber);
    }
    // Display for f64 yields the shortest round-trip form and drops `.0`.
    out.extend_from_slice(format!("{float}").as_bytes());
    Ok(())
}

/// Emits a string with canonical escape sequences.
fn emit_string(text: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for &byte in text.as_bytes() {
        match byte {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x00..=0x1f => {
                out.extend_from_slice(b"\\u00");
                out.push(HEX_LOWER[usize::from(byte >> 4)]);
                out.push(HEX_LOWER[usize::from(byte & 0x0f)]);
            }
            _ => out.push(byte),
        }
    }
    out.push(b'"');
}

// ============================================================================
// SECTION: Canonical Decoding
// ============================================================================

/// Decodes JSON text for canonical re-encoding, rejecting duplicate keys.
///
/// # Errors
///
/// Returns [`CanonicalError`] on malformed JSON, a leading BOM, or duplicate
/// object keys anywhere in the document.
pub fn decode_canonical_json(bytes: &[u8]) -> Result<Value, CanonicalError> {
    if bytes.starts_with(&[0xef, 0xbb, 0xbf]) {
        return Err(CanonicalError::Parse("leading byte-order mark".to_string()));
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| CanonicalError::Parse(err.to_string()))?;
    let mut scanner = DuplicateKeyScanner::new(bytes);
    scanner.check_value()?;
    Ok(value)
}

/// Scanner that walks already-well-formed JSON text looking for duplicate
/// object keys, which `serde_json` would otherwise resolve last-wins.
struct DuplicateKeyScanner<'a> {
    /// Input bytes, already validated as JSON by the parser.
    bytes: &'a [u8],
    /// Cursor into the input.
    pos: usize,
}

impl<'a> DuplicateKeyScanner<'a> {
    /// Creates a scanner over the input bytes.
    const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
        }
    }

    /// Returns the current byte without consuming it.
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Skips insignificant whitespace.
    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Walks one JSON value.
    fn check_value(&mut self) -> Result<(), CanonicalError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.check_object(),
            Some(b'[') => self.check_array(),
            Some(b'"') => self.skip_string().map(|_| ()),
            Some(_) => {
                // Scalars were already validated by the parser.
                while let Some(byte) = self.peek() {
                    if matches!(byte, b',' | b']' | b'}' | b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                    self.pos += 1;
                }
                Ok(())
            }
            None => Err(CanonicalError::Parse("unexpected end of input".to_string())),
        }
    }

    /// Walks an object, rejecting duplicate decoded keys.
    fn check_object(&mut self) -> Result<(), CanonicalError> {
        self.pos += 1;
        let mut keys: Vec<String> = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_whitespace();
            let raw = self.skip_string()?;
            let key: String = serde_json::from_str(raw)
                .map_err(|err| CanonicalError::Parse(err.to_string()))?;
            if keys.contains(&key) {
                return Err(CanonicalError::DuplicateKey {
                    key,
                });
            }
            keys.push(key);
            self.skip_whitespace();
            if self.peek() == Some(b':') {
                self.pos += 1;
            }
            self.check_value()?;
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(CanonicalError::Parse("malformed object".to_string())),
            }
        }
    }

    /// Walks an array.
    fn check_array(&mut self) -> Result<(), CanonicalError> {
        self.pos += 1;
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.check_value()?;
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(CanonicalError::Parse("malformed array".to_string())),
            }
        }
    }

    /// Skips a string token, returning its raw form including quotes.
    fn skip_string(&mut self) -> Result<&'a str, CanonicalError> {
        let start = self.pos;
        if self.peek() != Some(b'"') {
            return Err(CanonicalError::Parse("expected string".to_string()));
        }
        self.pos += 1;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'\\' => self.pos += 1,
                b'"' => {
                    let raw = &self.bytes[start .. self.pos];
                    return std::str::from_utf8(raw)
                        .map_err(|err| CanonicalError::Parse(err.to_string()));
                }
                _ => {}
            }
        }
        Err(CanonicalError::Parse("unterminated string".to_string()))
    }
}
