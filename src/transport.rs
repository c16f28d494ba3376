//! Outbound HTTP transport.
//!
//! The dispatch pipeline talks to the network only through the
//! [`Transport`] trait, so tests and embedders can substitute their own.
//! [`HttpTransport`] is the reqwest-backed implementation: it maps client
//! failures onto socket-style error codes and non-2xx answers onto
//! [`BifrostError::Upstream`] so retry policies can classify them.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::types::{Method, UpstreamResponse};
use crate::{BifrostError, Result};

/// A fully resolved request, ready to put on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

/// Capability to perform one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` once. Success means a 2xx status; anything else is an
    /// error the retry layer can classify.
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse>;
}

/// Transport backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS roots, pool sizing).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse> {
        let mut builder = self
            .http
            .request(request.method.into(), &request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, request.timeout))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, request.timeout))?;
        let data = parse_body(&text);

        if status.is_success() {
            Ok(UpstreamResponse {
                status: status.as_u16(),
                data,
                headers,
            })
        } else {
            Err(BifrostError::Upstream {
                status: status.as_u16(),
                message: format!("Request failed with status code {}", status.as_u16()),
                body: (!data.is_null()).then_some(data),
            })
        }
    }
}

/// Merge per-request headers over an adapter's precomputed set.
pub(crate) fn merge_headers(
    base: &HeaderMap,
    overrides: &BTreeMap<String, String>,
) -> Result<HeaderMap> {
    let mut headers = base.clone();
    for (name, value) in overrides {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BifrostError::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BifrostError::InvalidInput(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// JSON when possible, otherwise the raw text; empty bodies become null.
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> BifrostError {
    if err.is_timeout() {
        return BifrostError::Transport {
            code: "ETIMEDOUT".into(),
            message: format!("timeout of {}ms exceeded", timeout.as_millis()),
        };
    }

    let message = error_chain(err);
    let code = io_error_code(err).unwrap_or_else(|| {
        if message.contains("dns error") || message.contains("failed to lookup address") {
            "ENOTFOUND"
        } else if err.is_connect() {
            "ECONNREFUSED"
        } else if err.is_body() || err.is_decode() {
            "ECONNRESET"
        } else {
            "EREQUEST"
        }
    });

    BifrostError::Transport {
        code: code.into(),
        message,
    }
}

fn io_error_code(err: &reqwest::Error) -> Option<&'static str> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
                io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
                io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                    Some("ENETUNREACH")
                }
                _ => None,
            };
        }
        source = cause.source();
    }
    None
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
