//! Bifrost - request-dispatch gateway for upstream HTTP APIs
//!
//! Callers address backends by a logical adapter name. The gateway owns
//! each adapter's base URL, timeout, headers and credentials, caches
//! successful GET responses, and retries transient failures according to
//! the adapter's [`RetryPolicy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use bifrost::{AdapterDescriptor, AuthSpec, Bifrost, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let gateway = Bifrost::builder()
//!         .adapter(
//!             AdapterDescriptor::new("weather-api", "https://api.weatherapi.com/v1")
//!                 .auth(AuthSpec::api_key("your-key")),
//!         )
//!         .build()?;
//!
//!     let response = gateway
//!         .execute("weather-api", &RequestDescriptor::get("/current.json").query("q", "Oslo"))
//!         .await;
//!
//!     println!("{} {:?}", response.status_code, response.data);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod retry;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use adapter::{Adapter, AdapterDescriptor, AuthSpec};
pub use cache::{CacheConfig, CacheFingerprint, CacheStats, ResponseCache};
pub use config::Config;
pub use error::{BifrostError, Result};
pub use gateway::{Bifrost, Gateway, GatewayBuilder};
pub use registry::AdapterRegistry;
pub use retry::{BackoffStrategy, RetryLayer, RetryPolicy, RetryStats};
pub use transport::{HttpTransport, OutboundRequest, Transport};
pub use types::{AdapterResponse, Method, RequestDescriptor, UpstreamResponse};
