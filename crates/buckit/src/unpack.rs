//! Turning raw queue messages into routable envelopes.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use buckit_core::emit;
use buckit_core::metrics::events::EnvelopeDecoded;
use snafu::prelude::*;
use tracing::{info, warn};

use crate::envelope::{Envelope, RequestContext};
use crate::error::{DecodeSnafu, MissingFieldSnafu, UnknownServiceSnafu, UnpackError};

/// Static service → bucket routing table, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketMap(HashMap<String, String>);

impl BucketMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(entries)
    }

    /// Load a JSON object of `service: bucket` pairs.
    ///
    /// Any failure (unreadable file, invalid JSON, non-string values) yields
    /// an empty map so the service still starts; every message will then
    /// fail to unpack.
    pub fn load(path: &Path) -> Self {
        let parsed = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<HashMap<String, String>>(&bytes).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(entries) => {
                info!(path = %path.display(), services = entries.len(), "Loaded bucket map");
                Self(entries)
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    %error,
                    "Failed to load bucket map, using an empty map"
                );
                Self::default()
            }
        }
    }

    /// Overlay `other` on top of this map.
    pub fn extend(&mut self, other: HashMap<String, String>) {
        self.0.extend(other);
    }

    pub fn bucket_for(&self, service: &str) -> Option<&str> {
        self.0.get(service).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A message that decoded and routed successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    pub url: String,
    pub bucket: String,
    pub envelope: Envelope,
    pub ctx: RequestContext,
}

/// Decode `raw` and route it through `buckets`.
pub fn unpack(raw: &[u8], buckets: &BucketMap) -> Result<Unpacked, UnpackError> {
    let start = Instant::now();
    let decoded = serde_json::from_slice::<Envelope>(raw);
    emit!(EnvelopeDecoded {
        duration: start.elapsed(),
    });
    let envelope = decoded.context(DecodeSnafu)?;

    // The request id is the last-resort object key, so it must not be blank
    ensure!(
        !envelope.request_id.trim().is_empty(),
        MissingFieldSnafu {
            field: "request_id"
        }
    );

    let ctx = RequestContext::new(envelope.request_id.clone());

    let bucket = buckets
        .bucket_for(&envelope.service)
        .with_context(|| UnknownServiceSnafu {
            service: envelope.service.clone(),
            request_id: envelope.request_id.clone(),
        })?
        .to_string();

    Ok(Unpacked {
        url: envelope.url.clone(),
        bucket,
        envelope,
        ctx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn buckets() -> BucketMap {
        BucketMap::new(HashMap::from([("svcA".to_string(), "bucket1".to_string())]))
    }

    #[test]
    fn test_unpack_routes_known_service() {
        let raw = br#"{"request_id":"r1","url":"http://x","service":"svcA"}"#;
        let unpacked = unpack(raw, &buckets()).unwrap();

        assert_eq!(unpacked.url, "http://x");
        assert_eq!(unpacked.bucket, "bucket1");
        assert_eq!(unpacked.envelope.request_id, "r1");
        assert_eq!(unpacked.ctx.request_id(), "r1");
    }

    #[test]
    fn test_unpack_unknown_service() {
        let raw = br#"{"request_id":"r2","url":"http://x","service":"svcB"}"#;
        let err = unpack(raw, &buckets()).unwrap_err();

        match err {
            UnpackError::UnknownService {
                service,
                request_id,
            } => {
                assert_eq!(service, "svcB");
                assert_eq!(request_id, "r2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpack_missing_required_fields() {
        for raw in [
            br#"{"url":"http://x","service":"svcA"}"#.as_slice(),
            br#"{"request_id":"r1","service":"svcA"}"#.as_slice(),
            br#"{"request_id":"r1","url":"http://x"}"#.as_slice(),
        ] {
            let err = unpack(raw, &buckets()).unwrap_err();
            assert!(matches!(err, UnpackError::Decode { .. }));
        }
    }

    #[test]
    fn test_unpack_rejects_non_json() {
        let err = unpack(b"not json", &buckets()).unwrap_err();
        assert!(matches!(err, UnpackError::Decode { .. }));

        let err = unpack(b"", &buckets()).unwrap_err();
        assert!(matches!(err, UnpackError::Decode { .. }));
    }

    #[test]
    fn test_unpack_rejects_non_string_request_id() {
        let raw = br#"{"request_id":7,"url":"http://x","service":"svcA"}"#;
        assert!(unpack(raw, &buckets()).is_err());
    }

    #[test]
    fn test_unpack_rejects_blank_request_id() {
        for raw in [
            br#"{"request_id":"","url":"http://x","service":"svcA"}"#.as_slice(),
            br#"{"request_id":"   ","url":"http://x","service":"svcA"}"#.as_slice(),
        ] {
            let err = unpack(raw, &buckets()).unwrap_err();
            assert!(matches!(
                err,
                UnpackError::MissingField {
                    field: "request_id"
                }
            ));
        }
    }

    #[test]
    fn test_empty_map_rejects_everything() {
        let raw = br#"{"request_id":"r1","url":"http://x","service":"svcA"}"#;
        let err = unpack(raw, &BucketMap::default()).unwrap_err();
        assert!(matches!(err, UnpackError::UnknownService { .. }));
    }

    #[test]
    fn test_load_bucket_map_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"advisor": "insights-upload-perm", "qpc": "qpc-upload"}}"#).unwrap();

        let map = BucketMap::load(file.path());
        assert_eq!(map.len(), 2);
        assert_eq!(map.bucket_for("qpc"), Some("qpc-upload"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let map = BucketMap::load(Path::new("/nonexistent/bucket_map.json"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_load_invalid_json_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"advisor": 3}}"#).unwrap();

        assert!(BucketMap::load(file.path()).is_empty());
    }

    #[test]
    fn test_extend_overrides_entries() {
        let mut map = buckets();
        map.extend(HashMap::from([
            ("svcA".to_string(), "override".to_string()),
            ("svcC".to_string(), "bucket3".to_string()),
        ]));
        assert_eq!(map.bucket_for("svcA"), Some("override"));
        assert_eq!(map.bucket_for("svcC"), Some("bucket3"));
    }
}
