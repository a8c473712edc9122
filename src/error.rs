//! Error types for the proxyman crate.

use thiserror::Error;

/// Errors surfaced by the proxy pool and its collaborators.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The backing store could not be reached or a transaction against it failed.
    #[error("Proxy store unavailable: {0}")]
    StoreUnavailable(String),

    /// The proxy source could not be fetched or returned nothing usable.
    #[error("Proxy source unavailable: {0}")]
    SourceUnavailable(String),

    /// Selection was attempted on a pool with no records.
    #[error("No proxy available in pool")]
    PoolEmpty,

    /// A fetched entry did not match `host:port:username:password`.
    #[error("Malformed proxy entry: {0}")]
    MalformedEntry(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(feature = "redis")]
impl From<redis::RedisError> for PoolError {
    fn from(err: redis::RedisError) -> Self {
        PoolError::StoreUnavailable(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for PoolError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PoolError::StoreUnavailable("operation timed out".to_string())
    }
}
