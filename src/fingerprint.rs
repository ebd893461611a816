//! Stable request fingerprint used as the cache key.
//!
//! SHA-256 over a canonical JSON encoding: fixed field order, history ordered by
//! timestamp and then by the entry's own encoding. Two requests that differ only in
//! JSON key order or history order share a fingerprint.

use crate::request::AnalysisRequest;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const CACHE_KEY_PREFIX: &str = "risk_score:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the result is cached.
    pub fn cache_key(&self) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Struct fields always serialize in declaration order, so the encoding is deterministic.
fn canonical<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

pub fn fingerprint(request: &AnalysisRequest) -> Fingerprint {
    let mut history: Vec<(i64, String, Value)> = request
        .login_history
        .iter()
        .map(|entry| {
            let value = canonical(entry);
            (entry.timestamp, value.to_string(), value)
        })
        .collect();
    history.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let doc = json!({
        "userId": request.user_id,
        "currentSession": canonical(&request.current_session),
        "loginHistory": history.into_iter().map(|(_, _, v)| v).collect::<Vec<_>>(),
    });

    let digest = Sha256::digest(doc.to_string().as_bytes());
    Fingerprint(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_does_not_matter() {
        let a: AnalysisRequest = serde_json::from_str(
            r#"{"userId":"u1","currentSession":{"ip":"1.2.3.4","userAgent":"ua","timestamp":5}}"#,
        )
        .unwrap();
        let b: AnalysisRequest = serde_json::from_str(
            r#"{"currentSession":{"timestamp":5,"userAgent":"ua","ip":"1.2.3.4"},"userId":"u1","loginHistory":[]}"#,
        )
        .unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).as_str().len(), 64);
        assert!(fingerprint(&a).cache_key().starts_with("risk_score:"));
    }

    #[test]
    fn user_id_changes_fingerprint() {
        let mut a: AnalysisRequest = serde_json::from_str(
            r#"{"userId":"u1","currentSession":{"ip":"1.2.3.4","userAgent":"ua","timestamp":5}}"#,
        )
        .unwrap();
        let before = fingerprint(&a);
        a.user_id = "u2".into();
        assert_ne!(before, fingerprint(&a));
    }
}
