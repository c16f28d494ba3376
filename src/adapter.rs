//! Adapter descriptors and their compiled, ready-to-call form.
//!
//! An [`AdapterDescriptor`] is plain configuration. Registering it with the
//! [`AdapterRegistry`](crate::registry::AdapterRegistry) validates it once
//! and produces an [`Adapter`]: the base URL is parsed and the default
//! headers are merged with the authentication header into a single
//! [`HeaderMap`] that every call reuses as-is.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::cache::SEPARATOR;
use crate::retry::RetryPolicy;
use crate::{BifrostError, Result};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header used by [`AuthSpec::ApiKey`] when none is configured.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// How requests to an adapter authenticate.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthSpec {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        header_name: String,
        key: String,
    },
}

impl AuthSpec {
    pub fn bearer(token: impl Into<String>) -> Self {
        AuthSpec::Bearer {
            token: token.into(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthSpec::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// API key sent in the `X-API-Key` header.
    pub fn api_key(key: impl Into<String>) -> Self {
        AuthSpec::ApiKey {
            header_name: DEFAULT_API_KEY_HEADER.to_string(),
            key: key.into(),
        }
    }

    /// The header this scheme injects, if any.
    pub fn header(&self) -> Result<Option<(HeaderName, HeaderValue)>> {
        let (name, value) = match self {
            AuthSpec::None => return Ok(None),
            AuthSpec::Bearer { token } => (AUTHORIZATION, format!("Bearer {token}")),
            AuthSpec::Basic { username, password } => (
                AUTHORIZATION,
                format!("Basic {}", BASE64.encode(format!("{username}:{password}"))),
            ),
            AuthSpec::ApiKey { header_name, key } => (parse_header_name(header_name)?, key.clone()),
        };
        let mut value = parse_header_value(name.as_str(), &value)?;
        value.set_sensitive(true);
        Ok(Some((name, value)))
    }

    fn kind(&self) -> &'static str {
        match self {
            AuthSpec::None => "none",
            AuthSpec::Bearer { .. } => "bearer",
            AuthSpec::Basic { .. } => "basic",
            AuthSpec::ApiKey { .. } => "api-key",
        }
    }
}

// Credentials never reach logs.
impl std::fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSpec")
            .field("type", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Identity and connection settings for one upstream backend.
///
/// ```rust
/// # use bifrost::adapter::{AdapterDescriptor, AuthSpec};
/// # use std::time::Duration;
/// let descriptor = AdapterDescriptor::new("weather-api", "https://api.weatherapi.com/v1")
///     .timeout(Duration::from_secs(10))
///     .auth(AuthSpec::api_key("secret"));
/// assert_eq!(descriptor.name, "weather-api");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterDescriptor {
    /// Unique registry key.
    pub name: String,
    /// URL prefix every request path is joined to.
    pub base_url: String,
    /// Per-attempt timeout. Default: 30s.
    pub timeout: Duration,
    /// Sent with every request; later entries override earlier ones.
    /// Default: `Content-Type: application/json`.
    pub default_headers: Vec<(String, String)>,
    pub auth: AuthSpec,
    pub retry_policy: RetryPolicy,
}

impl AdapterDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            default_headers: vec![(CONTENT_TYPE.to_string(), "application/json".to_string())],
            auth: AuthSpec::None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn auth(mut self, auth: AuthSpec) -> Self {
        self.auth = auth;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// A validated adapter with its request headers precomputed.
#[derive(Debug, Clone)]
pub struct Adapter {
    descriptor: AdapterDescriptor,
    base_url: Url,
    headers: HeaderMap,
}

impl Adapter {
    /// Validate `descriptor` and precompute its headers.
    ///
    /// Fails with [`BifrostError::Configuration`] on an empty or
    /// separator-containing name, a non-HTTP(S) base URL, a zero timeout,
    /// or any header that is not valid on the wire.
    pub fn compile(descriptor: AdapterDescriptor) -> Result<Self> {
        let name = &descriptor.name;
        if name.trim().is_empty() {
            return Err(BifrostError::Configuration(
                "adapter name must not be empty".into(),
            ));
        }
        if name.contains(SEPARATOR) || name.chars().any(char::is_control) {
            return Err(BifrostError::Configuration(format!(
                "adapter name {name:?} contains control characters"
            )));
        }

        let base_url = Url::parse(&descriptor.base_url).map_err(|e| {
            BifrostError::Configuration(format!(
                "adapter '{name}': invalid base URL {:?}: {e}",
                descriptor.base_url
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(BifrostError::Configuration(format!(
                "adapter '{name}': base URL must be http or https"
            )));
        }
        if descriptor.timeout.is_zero() {
            return Err(BifrostError::Configuration(format!(
                "adapter '{name}': timeout must be greater than zero"
            )));
        }

        let mut headers = HeaderMap::new();
        for (key, value) in &descriptor.default_headers {
            let key = parse_header_name(key).map_err(|e| scoped(name, e))?;
            let value = parse_header_value(key.as_str(), value).map_err(|e| scoped(name, e))?;
            headers.insert(key, value);
        }
        if let Some((key, value)) = descriptor.auth.header().map_err(|e| scoped(name, e))? {
            headers.insert(key, value);
        }

        Ok(Self {
            descriptor,
            base_url,
            headers,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    /// Default and authentication headers, merged.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.descriptor.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.descriptor.retry_policy
    }

    /// Join `path` onto the base URL with exactly one slash between them.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

fn scoped(adapter: &str, err: BifrostError) -> BifrostError {
    match err {
        BifrostError::Configuration(msg) => {
            BifrostError::Configuration(format!("adapter '{adapter}': {msg}"))
        }
        other => other,
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| BifrostError::Configuration(format!("invalid header name {name:?}: {e}")))
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| BifrostError::Configuration(format!("invalid value for header {name}: {e}")))
}
