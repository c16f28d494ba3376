//! Bifrost error types

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    // Registry errors
    #[error("Adapter '{0}' not found")]
    AdapterNotFound(String),

    #[error("adapter '{0}' is already registered")]
    DuplicateAdapter(String),

    // Network errors
    /// Connection, DNS or timeout failure before a response was received.
    ///
    /// `code` follows the conventional socket error names (`ECONNRESET`,
    /// `ECONNREFUSED`, `ENOTFOUND`, `ETIMEDOUT`, `ECONNABORTED`, `ENETUNREACH`)
    /// so retry policies can match on it.
    #[error("transport error ({code}): {message}")]
    Transport { code: String, message: String },

    /// Upstream answered with a non-success status.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BifrostError {
    /// Socket-style error code carried by a transport failure.
    pub fn code(&self) -> Option<&str> {
        match self {
            BifrostError::Transport { code, .. } => Some(code),
            _ => None,
        }
    }

    /// HTTP status associated with the failure, if one is known.
    pub fn status(&self) -> Option<u16> {
        match self {
            BifrostError::Upstream { status, .. } => Some(*status),
            BifrostError::AdapterNotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Whether the failure reads as a timeout.
    ///
    /// Matches the `ECONNABORTED` code as well as any message mentioning
    /// "timeout", which is how most HTTP stacks report an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            BifrostError::Transport { code, message } => {
                code == "ECONNABORTED" || code == "ETIMEDOUT" || message.contains("timeout")
            }
            BifrostError::Upstream { message, .. } => message.contains("timeout"),
            _ => false,
        }
    }
}

/// Result type alias for Bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;
