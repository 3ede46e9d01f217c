// crates/stepchain-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Verifies json-c14n-v1 canonical encoding and hashing behavior.
// ============================================================================
//! ## Overview
//! Ensures canonical JSON hashing is deterministic across key ordering and
//! numeric normalization, escapes control codes, and rejects duplicate keys.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stepchain_core::hashing::CanonicalError;
use stepchain_core::hashing::HashDigest;
use stepchain_core::hashing::canonical_json_bytes;
use stepchain_core::hashing::decode_canonical_json;
use stepchain_core::hashing::hash_bytes;
use stepchain_core::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Ordering and Normalization
// ============================================================================

#[test]
fn canonical_hash_is_order_independent_for_maps() {
    let mut map_a = Map::new();
    map_a.insert("b".to_string(), json!(2));
    map_a.insert("a".to_string(), json!(1));

    let mut map_b = Map::new();
    map_b.insert("a".to_string(), json!(1));
    map_b.insert("b".to_string(), json!(2));

    let hash_a = hash_canonical_json(&Value::Object(map_a)).expect("hash a");
    let hash_b = hash_canonical_json(&Value::Object(map_b)).expect("hash b");

    assert_eq!(hash_a, hash_b);
}

#[test]
fn canonical_hash_normalizes_numeric_representation() {
    let hash_a = hash_canonical_json(&json!(1.0)).expect("hash a");
    let hash_b = hash_canonical_json(&json!(1)).expect("hash b");
    assert_eq!(hash_a, hash_b);
}

#[test]
fn canonical_bytes_sort_keys_by_raw_byte_order() {
    let value = json!({"epoch": 3, "bond": 2, "amount": 1});
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert_eq!(bytes, br#"{"amount":1,"bond":2,"epoch":3}"#);
}

#[test]
fn canonical_bytes_preserve_array_order() {
    let value = json!({"items": ["b", "a", "c"]});
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert_eq!(bytes, br#"{"items":["b","a","c"]}"#);
}

#[test]
fn canonical_bytes_have_no_whitespace() {
    let value = json!({"a": [1, 2], "b": {"c": true}});
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert!(!bytes.iter().any(|byte| matches!(byte, b' ' | b'\t' | b'\n' | b'\r')));
}

#[test]
fn integral_float_emits_without_fractional_part() {
    let bytes = canonical_json_bytes(&json!({"n": 5.0})).expect("canonical bytes");
    assert_eq!(bytes, br#"{"n":5}"#);
}

// ============================================================================
// SECTION: String Escapes
// ============================================================================

#[test]
fn control_codes_escape_with_lowercase_hex() {
    let value = json!("\u{0001}\u{001f}");
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert_eq!(bytes, br#""\u0001\u001f""#);
}

#[test]
fn short_escapes_are_used_for_common_controls() {
    let value = json!("a\nb\tc");
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert_eq!(bytes, br#""a\nb\tc""#);
}

#[test]
fn unicode_text_passes_through_as_utf8() {
    let value = json!({"text": "héllo wörld"});
    let bytes = canonical_json_bytes(&value).expect("canonical bytes");
    assert_eq!(bytes, "{\"text\":\"héllo wörld\"}".as_bytes());
}

// ============================================================================
// SECTION: Decoding and Duplicate Keys
// ============================================================================

#[test]
fn decode_rejects_duplicate_keys() {
    let err = decode_canonical_json(br#"{"a":1,"a":2}"#).unwrap_err();
    assert!(matches!(err, CanonicalError::DuplicateKey { key } if key == "a"));
}

#[test]
fn decode_rejects_duplicate_keys_at_depth() {
    let err = decode_canonical_json(br#"{"outer":{"x":1,"x":2}}"#).unwrap_err();
    assert!(matches!(err, CanonicalError::DuplicateKey { key } if key == "x"));
}

#[test]
fn decode_rejects_escaped_duplicate_keys() {
    // `\u0061` decodes to `a`; duplicate detection compares decoded keys.
    let err = decode_canonical_json(br#"{"a":1,"\u0061":2}"#.as_slice()).unwrap_err();
    assert!(matches!(err, CanonicalError::DuplicateKey { .. }));
}

#[test]
fn decode_rejects_byte_order_mark() {
    let err = decode_canonical_json(b"\xEF\xBB\xBF{}").unwrap_err();
    assert!(matches!(err, CanonicalError::Parse(_)));
}

#[test]
fn decode_then_encode_is_idempotent() {
    let input = br#"{ "z" : 1 , "a" : [true, null, "x"] }"#;
    let decoded = decode_canonical_json(input).expect("decode");
    let canonical = canonical_json_bytes(&decoded).expect("encode");
    let redecoded = decode_canonical_json(&canonical).expect("redecode");
    assert_eq!(canonical_json_bytes(&redecoded).expect("re-encode"), canonical);
}

// ============================================================================
// SECTION: Golden SHA-256 Tests (Known-Value Verification)
// ============================================================================

#[test]
fn golden_hash_empty_object() {
    // SHA-256 of "{}" = 44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a
    let digest = hash_canonical_json(&json!({})).expect("hash");
    assert_eq!(
        digest.as_str(),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn golden_hash_empty_array() {
    // SHA-256 of "[]" = 4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945
    let digest = hash_canonical_json(&json!([])).expect("hash");
    assert_eq!(
        digest.as_str(),
        "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
    );
}

#[test]
fn golden_hash_integer_one() {
    // SHA-256 of "1" = 6b86b273ff34fce19d6b804eff5a3f5747ada4eaa22f1d49c01e52ddb7875b4b
    let digest = hash_canonical_json(&json!(1)).expect("hash");
    assert_eq!(
        digest.as_str(),
        "6b86b273ff34fce19d6b804eff5a3f5747ada4eaa22f1d49c01e52ddb7875b4b"
    );
}

#[test]
fn golden_hash_boolean_true() {
    // SHA-256 of "true" = b5bea41b6c623f7c09f1bf24dcae58ebab3c0cdd90ad966bc43a45b44867e12b
    let digest = hash_canonical_json(&json!(true)).expect("hash");
    assert_eq!(
        digest.as_str(),
        "b5bea41b6c623f7c09f1bf24dcae58ebab3c0cdd90ad966bc43a45b44867e12b"
    );
}

#[test]
fn golden_hash_null() {
    let digest = hash_canonical_json(&json!(null)).expect("hash");
    assert_eq!(
        digest.as_str(),
        "74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b"
    );
}

#[test]
fn golden_hash_bytes_direct() {
    // SHA-256 of "test" = 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
    let digest = hash_bytes(b"test");
    assert_eq!(
        digest.as_str(),
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
}

#[test]
fn golden_hash_empty_bytes() {
    // SHA-256 of empty input = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
    let digest = hash_bytes(b"");
    assert_eq!(
        digest.as_str(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

// ============================================================================
// SECTION: Digest Form
// ============================================================================

#[test]
fn digests_are_64_lowercase_hex_digits() {
    let digest = hash_bytes(b"stepchain");
    assert_eq!(digest.as_str().len(), 64);
    assert!(!digest.as_str().chars().any(char::is_uppercase));
    assert!(HashDigest::is_well_formed(digest.as_str()));
}

#[test]
fn digest_parse_rejects_malformed_values() {
    assert!(HashDigest::parse("abc").is_none());
    assert!(HashDigest::parse(&"A".repeat(64)).is_none());
    assert!(HashDigest::parse(&"a".repeat(64)).is_some());
}

#[test]
fn hash_consistency_across_calls() {
    let value = json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}});
    let hash1 = hash_canonical_json(&value).expect("hash1");
    let hash2 = hash_canonical_json(&value).expect("hash2");
    assert_eq!(hash1, hash2, "hash must be deterministic");
}
