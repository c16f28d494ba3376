//! Deterministic request fingerprints used as cache keys.
//!
//! A fingerprint joins `(adapter, METHOD, path, query, body)` with
//! [`SEPARATOR`]. Query parameters and bodies are serialized as JSON, which
//! escapes control characters, so the separator can only appear in the
//! adapter name or the path. The registry rejects adapter names containing
//! it and [`CacheFingerprint::new`] rejects such paths, leaving the request
//! uncacheable instead of risking a collision.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::RequestDescriptor;
use crate::{BifrostError, Result};

/// Component separator (ASCII unit separator).
pub const SEPARATOR: char = '\u{1f}';
const SEPARATOR_STR: &str = "\u{1f}";

/// Cache identity of one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    /// Build a fingerprint from its components.
    ///
    /// `method` is compared case-insensitively. An empty query map and an
    /// absent body both contribute an empty component.
    pub fn new(
        adapter: &str,
        method: &str,
        path: &str,
        query: &BTreeMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<Self> {
        if adapter.contains(SEPARATOR) || path.contains(SEPARATOR) {
            return Err(BifrostError::InvalidInput(
                "fingerprint component contains the key separator".into(),
            ));
        }

        let query = if query.is_empty() {
            String::new()
        } else {
            serde_json::to_string(query)?
        };
        let body = match body {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        let method = method.to_ascii_uppercase();
        let parts: [&str; 5] = [adapter, &method, path, &query, &body];
        Ok(Self(parts.join(SEPARATOR_STR)))
    }

    /// Fingerprint of a request addressed to `adapter`.
    pub fn for_request(adapter: &str, request: &RequestDescriptor) -> Result<Self> {
        Self::new(
            adapter,
            request.method.as_str(),
            &request.path,
            &request.query,
            request.body.as_ref(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The adapter component.
    pub fn adapter(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }

    /// Whether this fingerprint was derived for `adapter`.
    pub fn belongs_to(&self, adapter: &str) -> bool {
        self.0
            .strip_prefix(adapter)
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// Shortened, printable form for log lines.
    pub(crate) fn log_key(&self) -> String {
        self.to_string().chars().take(50).collect()
    }
}

impl fmt::Display for CacheFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace(SEPARATOR, "|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fp(adapter: &str, method: &str, path: &str) -> CacheFingerprint {
        CacheFingerprint::new(adapter, method, path, &BTreeMap::new(), None).unwrap()
    }

    #[test]
    fn deterministic() {
        let q = params(&[("city", "oslo")]);
        let body = json!({"a": 1});
        let k1 = CacheFingerprint::new("svc", "GET", "/x", &q, Some(&body)).unwrap();
        let k2 = CacheFingerprint::new("svc", "GET", "/x", &q, Some(&body)).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn method_case_is_ignored() {
        assert_eq!(fp("svc", "GET", "/x"), fp("svc", "get", "/x"));
    }

    #[test]
    fn each_component_changes_the_key() {
        let base = fp("svc", "GET", "/x");
        assert_ne!(base, fp("other", "GET", "/x"));
        assert_ne!(base, fp("svc", "POST", "/x"));
        assert_ne!(base, fp("svc", "GET", "/y"));

        let with_query =
            CacheFingerprint::new("svc", "GET", "/x", &params(&[("a", "1")]), None).unwrap();
        let other_query =
            CacheFingerprint::new("svc", "GET", "/x", &params(&[("a", "2")]), None).unwrap();
        assert_ne!(base, with_query);
        assert_ne!(with_query, other_query);

        let with_body =
            CacheFingerprint::new("svc", "GET", "/x", &BTreeMap::new(), Some(&json!(1))).unwrap();
        assert_ne!(base, with_body);
    }

    #[test]
    fn query_insertion_order_is_irrelevant() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());
        let b = params(&[("a", "1"), ("b", "2")]);
        assert_eq!(
            CacheFingerprint::new("svc", "GET", "/x", &a, None).unwrap(),
            CacheFingerprint::new("svc", "GET", "/x", &b, None).unwrap()
        );
    }

    #[test]
    fn separator_in_path_is_rejected() {
        let path = format!("/x{SEPARATOR}y");
        assert!(CacheFingerprint::new("svc", "GET", &path, &BTreeMap::new(), None).is_err());
    }

    #[test]
    fn adapter_prefix_does_not_match_longer_names() {
        let key = fp("svc2", "GET", "/x");
        assert!(key.belongs_to("svc2"));
        assert!(!key.belongs_to("svc"));
        assert_eq!(key.adapter(), "svc2");
    }

    #[test]
    fn display_uses_pipes() {
        assert_eq!(fp("svc", "get", "/x").to_string(), "svc|GET|/x||");
    }
}
