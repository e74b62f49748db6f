use thiserror::Error;

/// Errors produced by the caching layer and by [`CacheStore`](super::CacheStore)
/// implementations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A path pattern failed to compile when the matcher was built.
    #[error("invalid cache path pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The cache backend failed to read, write or invalidate an entry.
    #[error("cache backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A payload could not be converted to or from the cached value type.
    #[error("cache value encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    /// Wraps any backend error.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}
