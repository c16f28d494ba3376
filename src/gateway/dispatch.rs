//! Gateway - composes registry, cache, retry and transport around one call
//!
//! # Dispatch flow
//!
//! ```text
//! gateway.execute("svc", GET /ping)
//!          │
//!          ▼
//!   registry.resolve ──► unknown: failure envelope, 404
//!          │
//!          ▼ GET only
//!   cache.get(fingerprint) ──► hit: success envelope, 200, no network
//!          │ miss / non-GET
//!          ▼
//!   retry.execute(adapter policy, transport.send)
//!          │
//!          ├─► Ok: cache.put if cacheable, success envelope (upstream status)
//!          └─► Err: failure envelope (upstream status or 500)
//! ```
//!
//! Every path ends in an [`AdapterResponse`]; transport errors never escape.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, instrument, warn};

use crate::cache::{CacheFingerprint, CacheStats, ResponseCache};
use crate::registry::AdapterRegistry;
use crate::retry::{RetryLayer, RetryStats};
use crate::telemetry;
use crate::transport::{OutboundRequest, Transport, merge_headers};
use crate::types::{AdapterResponse, Method, RequestDescriptor};

/// The dispatch engine.
///
/// Cheap to share behind an `Arc`; all mutable state (cache store, counters)
/// is internally synchronized.
pub struct Gateway {
    registry: Arc<AdapterRegistry>,
    cache: Arc<ResponseCache>,
    retry: Arc<RetryLayer>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub(crate) fn new(
        registry: Arc<AdapterRegistry>,
        cache: Arc<ResponseCache>,
        retry: Arc<RetryLayer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            cache,
            retry,
            transport,
        }
    }

    /// Dispatch `request` to the adapter named `adapter_name`.
    #[instrument(
        skip(self, request),
        fields(adapter = adapter_name, method = %request.method, path = %request.path)
    )]
    pub async fn execute(&self, adapter_name: &str, request: &RequestDescriptor) -> AdapterResponse {
        let start = Instant::now();
        let response = self.dispatch(adapter_name, request).await;

        let status = if response.success { "ok" } else { "error" };
        let label = if self.registry.is_healthy(adapter_name) {
            adapter_name.to_owned()
        } else {
            telemetry::UNKNOWN_ADAPTER.to_owned()
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "adapter" => label.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "adapter" => label,
        )
        .record(start.elapsed().as_secs_f64());

        response
    }

    async fn dispatch(&self, adapter_name: &str, request: &RequestDescriptor) -> AdapterResponse {
        let adapter = match self.registry.resolve(adapter_name) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(error = %e, "unknown adapter");
                return AdapterResponse::failure(adapter_name, e.to_string(), 404);
            }
        };

        let fingerprint = if request.method.is_safe() {
            match CacheFingerprint::for_request(adapter_name, request) {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!(error = %e, "request is uncacheable");
                    None
                }
            }
        } else {
            None
        };

        if let Some(data) = fingerprint.as_ref().and_then(|key| self.cache.get(key)) {
            debug!("returning cached response");
            return AdapterResponse::success(adapter_name, data, 200);
        }

        let headers = match merge_headers(adapter.headers(), &request.headers) {
            Ok(headers) => headers,
            Err(e) => return AdapterResponse::failure(adapter_name, e.to_string(), 400),
        };
        let outbound = OutboundRequest {
            method: request.method,
            url: adapter.url_for(&request.path),
            headers,
            query: request.query.clone(),
            body: request.body.clone(),
            timeout: adapter.timeout(),
        };

        debug!(url = %outbound.url, "sending upstream request");
        let result = self
            .retry
            .execute(adapter.retry_policy(), adapter_name, || {
                self.transport.send(&outbound)
            })
            .await;

        match result {
            Ok(upstream) => {
                if let Some(key) = fingerprint {
                    if self.cache.should_cache(request.method.as_str(), upstream.status) {
                        self.cache.put(key, upstream.data.clone());
                    }
                }
                AdapterResponse::success(adapter_name, upstream.data, upstream.status)
                    .with_headers(upstream.headers)
            }
            Err(e) => {
                let status = e.status().unwrap_or(500);
                error!(status, error = %e, "upstream request failed");
                AdapterResponse::failure(adapter_name, e.to_string(), status)
            }
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn retry(&self) -> &RetryLayer {
        &self.retry
    }

    /// Registered adapter names, sorted.
    pub fn adapters(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn is_healthy(&self, adapter_name: &str) -> bool {
        self.registry.is_healthy(adapter_name)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop every cached response for `adapter_name`.
    pub fn invalidate_adapter_cache(&self, adapter_name: &str) -> usize {
        self.cache.invalidate_adapter(adapter_name)
    }

    /// Drop the cached response for one request, identified by its parts.
    pub fn invalidate(
        &self,
        adapter_name: &str,
        method: Method,
        path: &str,
        query: &BTreeMap<String, String>,
    ) {
        match CacheFingerprint::new(adapter_name, method.as_str(), path, query, None) {
            Ok(key) => self.cache.invalidate(&key),
            Err(e) => debug!(error = %e, "nothing to invalidate"),
        }
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.retry.stats()
    }

    pub fn reset_retry_stats(&self) {
        self.retry.reset_stats();
    }
}
