//! Error taxonomy for the tick cache
//!
//! Only `CacheError::Configuration` ever crosses the engine's public
//! boundary: it is raised at construction time so a misconfigured or
//! unreachable warm tier is caught at startup. Every other variant is
//! absorbed internally and surfaces to callers as a cache miss, a `false`
//! return, or a degraded health status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid or missing configuration, or a warm tier that cannot be
    /// reached at construction time. Fatal.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Network failure, timeout, or error response from the warm tier
    /// during steady-state operation. Callers never see this directly.
    #[error("warm tier error: {0}")]
    WarmTier(String),

    /// Malformed payload retrieved from the warm tier. Treated as a miss.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::WarmTier(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
