//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (explicit)
//! 2. `~/.bifrost/config.toml` (user)
//! 3. `/etc/bifrost/config.toml` (system)
//!
//! Credentials may be written inline or referenced through an environment
//! variable (`token_env`, `password_env`, `key_env`). A referenced variable
//! that is unset fails the load, so misconfiguration surfaces at startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapter::{AdapterDescriptor, AuthSpec, DEFAULT_API_KEY_HEADER};
use crate::cache::CacheConfig;
use crate::retry::{BackoffStrategy, RetryPolicy};
use crate::{BifrostError, Result};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub cache: CacheSection,
    /// Process-wide default retry policy.
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterSection>,
}

/// Fallbacks for adapters that leave a setting out.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Per-call timeout in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retries() -> u32 {
    3
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entry time-to-live in milliseconds (default: 300000).
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Maximum cached entries (default: 1000).
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: default_ttl_ms(),
            max_size: default_max_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_ms() -> u64 {
    300_000
}

fn default_max_size() -> usize {
    1_000
}

/// Retry settings; every field is optional and overrides the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySection {
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub backoff: Option<BackoffStrategy>,
    pub max_delay_ms: Option<u64>,
    pub retryable_status_codes: Option<Vec<u16>>,
    pub retryable_error_codes: Option<Vec<String>>,
}

impl RetrySection {
    /// Overlay the fields set here onto `base`.
    pub fn apply(&self, mut base: RetryPolicy) -> RetryPolicy {
        if let Some(enabled) = self.enabled {
            base.enabled = enabled;
        }
        if let Some(n) = self.max_retries {
            base.max_retries = n;
        }
        if let Some(ms) = self.base_delay_ms {
            base.base_delay = Duration::from_millis(ms);
        }
        if let Some(strategy) = self.backoff {
            base.backoff = strategy;
        }
        if let Some(ms) = self.max_delay_ms {
            base.max_delay = Duration::from_millis(ms);
        }
        if let Some(codes) = &self.retryable_status_codes {
            base = base.retryable_status_codes(codes.iter().copied());
        }
        if let Some(codes) = &self.retryable_error_codes {
            base = base.retryable_error_codes(codes.iter().cloned());
        }
        base
    }
}

/// One upstream backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterSection {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
    /// Shorthand for `retry.max_retries`.
    pub retries: Option<u32>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Authentication as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthSection {
    #[default]
    None,
    Bearer {
        token: Option<String>,
        token_env: Option<String>,
    },
    Basic {
        username: String,
        password: Option<String>,
        password_env: Option<String>,
    },
    ApiKey {
        key: Option<String>,
        key_env: Option<String>,
        #[serde(default = "default_api_key_header")]
        header_name: String,
    },
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

impl AuthSection {
    fn resolve(&self, adapter: &str) -> Result<AuthSpec> {
        Ok(match self {
            AuthSection::None => AuthSpec::None,
            AuthSection::Bearer { token, token_env } => AuthSpec::Bearer {
                token: secret(adapter, "token", token, token_env)?,
            },
            AuthSection::Basic {
                username,
                password,
                password_env,
            } => AuthSpec::Basic {
                username: username.clone(),
                password: secret(adapter, "password", password, password_env)?,
            },
            AuthSection::ApiKey {
                key,
                key_env,
                header_name,
            } => AuthSpec::ApiKey {
                header_name: header_name.clone(),
                key: secret(adapter, "key", key, key_env)?,
            },
        })
    }
}

/// Inline value first, then the named environment variable.
fn secret(
    adapter: &str,
    field: &str,
    inline: &Option<String>,
    env_var: &Option<String>,
) -> Result<String> {
    if let Some(value) = inline {
        return Ok(value.clone());
    }
    match env_var {
        Some(var) => std::env::var(var).map_err(|_| {
            BifrostError::Configuration(format!(
                "adapter '{adapter}': environment variable {var} for auth {field} is not set"
            ))
        }),
        None => Err(BifrostError::Configuration(format!(
            "adapter '{adapter}': auth {field} is missing (set `{field}` or `{field}_env`)"
        ))),
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.bifrost/config.toml`
    /// 3. `/etc/bifrost/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            BifrostError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            BifrostError::Configuration(msg) => {
                BifrostError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            BifrostError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(BifrostError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bifrost").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/bifrost/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(BifrostError::Configuration(
            "No config file found. Create ~/.bifrost/config.toml or /etc/bifrost/config.toml"
                .to_string(),
        ))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .enabled(self.cache.enabled)
            .ttl(Duration::from_millis(self.cache.ttl_ms))
            .max_size(self.cache.max_size)
    }

    /// The process-wide retry policy: built-in defaults, then `[defaults]`,
    /// then `[retry]`.
    pub fn default_retry_policy(&self) -> RetryPolicy {
        self.retry
            .apply(RetryPolicy::new().max_retries(self.defaults.retries))
    }

    /// Resolve every `[adapters.*]` table into a descriptor.
    pub fn adapter_descriptors(&self) -> Result<Vec<AdapterDescriptor>> {
        let default_policy = self.default_retry_policy();
        self.adapters
            .iter()
            .map(|(name, section)| {
                let mut policy = default_policy.clone();
                if let Some(n) = section.retries {
                    policy.max_retries = n;
                }
                let policy = section.retry.apply(policy);
                let timeout = section.timeout_ms.unwrap_or(self.defaults.timeout_ms);

                let mut descriptor = AdapterDescriptor::new(name, &section.base_url)
                    .timeout(Duration::from_millis(timeout))
                    .auth(section.auth.resolve(name)?)
                    .retry_policy(policy);
                for (key, value) in &section.headers {
                    descriptor = descriptor.header(key, value);
                }
                Ok(descriptor)
            })
            .collect()
    }
}
