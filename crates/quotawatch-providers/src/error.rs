//! Error types for quotawatch-providers

use thiserror::Error;

/// Failure fetching or decoding a provider quota response
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credential rejected (HTTP 401)
    #[error("unauthorized: invalid credential")]
    Unauthorized,

    /// Credential lacks access (HTTP 403)
    #[error("forbidden: credential revoked or missing scope")]
    Forbidden,

    /// Provider is throttling us (HTTP 429)
    #[error("rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited {
        /// Seconds from the `retry-after` header, if present
        retry_after_secs: Option<u64>,
    },

    /// Provider-side failure (HTTP 5xx)
    #[error("server error: HTTP {0}")]
    Server(u16),

    /// Any other non-success status
    #[error("unexpected status: HTTP {0}")]
    UnexpectedStatus(u16),

    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("network error: {0}")]
    Network(String),

    /// Empty, oversized or undecodable body
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be built
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether retrying with the same credential is pointless
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProviderError>;
