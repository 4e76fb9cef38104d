//! Object key derivation.
//!
//! Keys degrade through two tiers and never fail:
//! `{org_id}/{cluster_id}/{YYYYMMDDHHMMSS}-{request_id}` when the envelope
//! carries a usable identity document, otherwise the bare request id.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{Envelope, ObjectKey, RequestContext};

/// Timestamp layout used in identity-scoped keys (second resolution).
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Derive the object key for `envelope` at the current time.
pub fn derive_key(envelope: &Envelope, ctx: &RequestContext) -> ObjectKey {
    derive_key_at(envelope, ctx, Utc::now())
}

/// Derive the object key for `envelope` as of `now`.
pub fn derive_key_at(envelope: &Envelope, ctx: &RequestContext, now: DateTime<Utc>) -> ObjectKey {
    let fallback = || ObjectKey::from(ctx.request_id().to_string());

    let Some(encoded) = envelope.b64_identity.as_deref() else {
        debug!("No identity document, keying by request_id");
        return fallback();
    };

    let identity = match decode_identity(encoded) {
        Ok(identity) => identity,
        Err(reason) => {
            warn!(%reason, "Failed to load identity doc, falling back to request_id");
            return fallback();
        }
    };

    let ts = now.format(KEY_TIMESTAMP_FORMAT);

    match scope_of(&identity) {
        Some((org_id, cluster_id)) => {
            ObjectKey::from(format!("{org_id}/{cluster_id}/{ts}-{}", ctx.request_id()))
        }
        None => {
            warn!("Failed to generate a key with identity, falling back to request_id");
            fallback()
        }
    }
}

fn decode_identity(encoded: &str) -> Result<Value, String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {e}"))
}

/// Extract `(org_id, cluster_id)` from `identity.internal.org_id` and
/// `identity.system.cluster_id`.
fn scope_of(doc: &Value) -> Option<(String, String)> {
    let identity = doc.get("identity")?;
    let org_id = key_segment(identity.get("internal")?.get("org_id")?)?;
    let cluster_id = key_segment(identity.get("system")?.get("cluster_id")?)?;
    Some((org_id, cluster_id))
}

/// Strings and numbers become path segments; anything else is unusable.
fn key_segment(value: &Value) -> Option<String> {
    let segment = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!segment.is_empty() && !segment.contains('/')).then_some(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn envelope(b64_identity: Option<String>) -> Envelope {
        Envelope {
            request_id: "r1".to_string(),
            url: "http://x".to_string(),
            service: "svcA".to_string(),
            b64_identity,
            extra: Default::default(),
        }
    }

    fn encode(doc: &Value) -> String {
        STANDARD.encode(serde_json::to_vec(doc).unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn test_no_identity_uses_request_id() {
        let ctx = RequestContext::new("r1");
        assert_eq!(derive_key_at(&envelope(None), &ctx, now()).as_str(), "r1");
    }

    #[test]
    fn test_identity_scoped_key() {
        let doc = json!({
            "entitlements": {},
            "identity": {
                "internal": {"auth_type": "uhc-auth", "org_id": "6340056"},
                "account_number": "1460290",
                "system": {"cluster_id": "8203d669-c7c9-429d-b57f-94c6598556db"},
                "type": "System"
            }
        });
        let ctx = RequestContext::new("r1");
        let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
        assert_eq!(
            key.as_str(),
            "6340056/8203d669-c7c9-429d-b57f-94c6598556db/20240307090502-r1"
        );
    }

    #[test]
    fn test_numeric_org_id_is_accepted() {
        let doc = json!({"identity": {"internal": {"org_id": 42}, "system": {"cluster_id": "c"}}});
        let ctx = RequestContext::new("r9");
        let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
        assert_eq!(key.as_str(), "42/c/20240307090502-r9");
    }

    #[test]
    fn test_malformed_base64_falls_back() {
        let ctx = RequestContext::new("r1");
        let key = derive_key_at(&envelope(Some("%%%not-base64".to_string())), &ctx, now());
        assert_eq!(key.as_str(), "r1");
    }

    #[test]
    fn test_non_json_identity_falls_back() {
        let ctx = RequestContext::new("r1");
        let encoded = STANDARD.encode(b"not json");
        let key = derive_key_at(&envelope(Some(encoded)), &ctx, now());
        assert_eq!(key.as_str(), "r1");
    }

    #[test]
    fn test_missing_cluster_id_falls_back() {
        let doc = json!({"identity": {"internal": {"org_id": "o"}, "system": {}}});
        let ctx = RequestContext::new("r1");
        let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
        assert_eq!(key.as_str(), "r1");
    }

    #[test]
    fn test_missing_identity_section_falls_back() {
        let doc = json!({"entitlements": {}});
        let ctx = RequestContext::new("r1");
        let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
        assert_eq!(key.as_str(), "r1");
    }

    #[test]
    fn test_unusable_segments_fall_back() {
        for org in [json!(""), json!("a/b"), json!(null), json!({"x": 1})] {
            let doc = json!({
                "identity": {"internal": {"org_id": org}, "system": {"cluster_id": "c"}}
            });
            let ctx = RequestContext::new("r1");
            let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
            assert_eq!(key.as_str(), "r1");
        }
    }

    #[test]
    fn test_key_uses_context_request_id() {
        let doc = json!({"identity": {"internal": {"org_id": "o"}, "system": {"cluster_id": "c"}}});
        let ctx = RequestContext::new("ctx-id");
        let key = derive_key_at(&envelope(Some(encode(&doc))), &ctx, now());
        assert_eq!(key.as_str(), "o/c/20240307090502-ctx-id");
    }

    #[test]
    fn test_live_timestamp_has_fourteen_digits() {
        let doc = json!({"identity": {"internal": {"org_id": "o"}, "system": {"cluster_id": "c"}}});
        let ctx = RequestContext::new("r1");
        let key = derive_key(&envelope(Some(encode(&doc))), &ctx);

        let rest = key.as_str().strip_prefix("o/c/").unwrap();
        let (ts, id) = rest.split_once('-').unwrap();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(id, "r1");
    }
}
