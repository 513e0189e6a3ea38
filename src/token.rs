//! Best-effort user id extraction from a bearer token.
//!
//! The payload segment is decoded without verifying the signature. The
//! result is only used to key local storage when the token endpoint does not
//! return a user id; the server stays the sole judge of token validity.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value as JsonValue;

/// Standard alphabet, padding optional.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claim names that carry the user id, in lookup order.
const USER_ID_CLAIMS: [&str; 2] = ["uid", "user_id"];

/// Decode the user id claim from `token`, or `None` on any failure.
#[must_use]
pub fn decode_user_id(token: &str) -> Option<String> {
    let claims = decode_payload(token)?;
    USER_ID_CLAIMS
        .iter()
        .find_map(|name| claim_as_string(claims.get(*name)?))
}

/// Decode the middle segment of a three-part token into a JSON object.
fn decode_payload(token: &str) -> Option<serde_json::Map<String, JsonValue>> {
    let mut parts = token.trim().split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    parts.next()?;
    if parts.next().is_some() || payload.is_empty() {
        return None;
    }

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT_STANDARD.decode(standard).ok()?;
    match serde_json::from_slice::<JsonValue>(&bytes).ok()? {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

// Numeric ids are common (`"user_id": 7`) and stored as their decimal text.
fn claim_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
