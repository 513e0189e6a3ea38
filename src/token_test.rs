use super::*;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

#[test]
fn decodes_uid_claim() {
    let token = make_token(&serde_json::json!({ "uid": "abc-123" }));
    assert_eq!(decode_user_id(&token).as_deref(), Some("abc-123"));
}

#[test]
fn decodes_numeric_user_id_claim() {
    let token = make_token(&serde_json::json!({ "token_type": "access", "user_id": 42 }));
    assert_eq!(decode_user_id(&token).as_deref(), Some("42"));
}

#[test]
fn prefers_uid_over_user_id() {
    let token = make_token(&serde_json::json!({ "uid": "u", "user_id": 9 }));
    assert_eq!(decode_user_id(&token).as_deref(), Some("u"));
}

#[test]
fn url_safe_characters_are_reversed() {
    // `?` and `>` runs encode to `_` and `-` in the URL-safe alphabet.
    let token = make_token(&serde_json::json!({ "uid": "???>>>" }));
    assert!(token.contains('_') || token.contains('-'));
    assert_eq!(decode_user_id(&token).as_deref(), Some("???>>>"));
}

#[test]
fn padded_payload_is_accepted() {
    let header = URL_SAFE_NO_PAD.encode(b"{}");
    let body = base64::engine::general_purpose::STANDARD.encode(br#"{"uid":"p"}"#);
    let token = format!("{header}.{body}.sig");
    assert_eq!(decode_user_id(&token).as_deref(), Some("p"));
}

#[test]
fn missing_claim_is_none() {
    let token = make_token(&serde_json::json!({ "sub": "someone" }));
    assert_eq!(decode_user_id(&token), None);
}

#[test]
fn empty_claim_is_none() {
    let token = make_token(&serde_json::json!({ "uid": "" }));
    assert_eq!(decode_user_id(&token), None);
}

#[test]
fn malformed_tokens_are_none() {
    assert_eq!(decode_user_id(""), None);
    assert_eq!(decode_user_id("opaque"), None);
    assert_eq!(decode_user_id("a.b"), None);
    assert_eq!(decode_user_id("a..c"), None);
    assert_eq!(decode_user_id("a.b.c.d"), None);
    assert_eq!(decode_user_id("a.!!!.c"), None);
}

#[test]
fn non_object_payload_is_none() {
    let header = URL_SAFE_NO_PAD.encode(b"{}");
    let body = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
    assert_eq!(decode_user_id(&format!("{header}.{body}.sig")), None);
}
