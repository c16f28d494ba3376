//! Upstream responses and the normalized outcome envelope

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw successful answer from an upstream backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamResponse {
    pub status: u16,
    pub data: serde_json::Value,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// Normalized outcome of a dispatch, returned for every call.
///
/// Exactly one of `data` / `error` is set, depending on `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status_code: u16,
    pub adapter_name: String,
    pub timestamp: DateTime<Utc>,
    /// Upstream response headers, lowercase names. Repeated headers are
    /// joined with ", ". Empty for cache hits and failures.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl AdapterResponse {
    pub fn success(
        adapter_name: impl Into<String>,
        data: serde_json::Value,
        status_code: u16,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code,
            adapter_name: adapter_name.into(),
            timestamp: Utc::now(),
            headers: BTreeMap::new(),
        }
    }

    pub fn failure(
        adapter_name: impl Into<String>,
        error: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code,
            adapter_name: adapter_name.into(),
            timestamp: Utc::now(),
            headers: BTreeMap::new(),
        }
    }

    /// Attach upstream headers.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in headers {
            self.headers
                .entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        self
    }
}
