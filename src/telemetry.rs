//! Telemetry metric name constants.
//!
//! Centralised metric names for bifrost operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `adapter`: logical adapter name (e.g. "weather-api"); names that are
//!   not registered are reported as [`UNKNOWN_ADAPTER`]
//! - `status`: outcome: "ok" or "error"

/// Total calls dispatched through the gateway, cache hits included.
///
/// Labels: `adapter`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// End-to-end dispatch duration in seconds.
///
/// Labels: `adapter`.
pub const REQUEST_DURATION_SECONDS: &str = "bifrost_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `adapter`.
pub const RETRIES_TOTAL: &str = "bifrost_retries_total";

/// Total response cache hits.
///
/// Labels: `adapter`.
pub const CACHE_HITS_TOTAL: &str = "bifrost_cache_hits_total";

/// Total response cache misses, expired entries included.
///
/// Labels: `adapter`.
pub const CACHE_MISSES_TOTAL: &str = "bifrost_cache_misses_total";

/// Entries evicted because the cache was full.
pub const CACHE_EVICTIONS_TOTAL: &str = "bifrost_cache_evictions_total";

/// `adapter` label value for calls naming an unregistered adapter.
pub const UNKNOWN_ADAPTER: &str = "unknown";
