//! Request-level response caching.
//!
//! [`ServerCache`] sits in a middleware [`Pipeline`](crate::middleware::Pipeline)
//! in front of the handlers whose JSON responses should be reused. For each
//! request it decides, through a [`Matcher`], whether to serve a stored value,
//! drop one, or capture the response about to be emitted. Storage itself is
//! delegated to a [`CacheStore`]; this layer has no eviction, TTL, or size
//! bounds of its own.
//!
//! ## Default policy
//!
//! With [`Matcher::patterns`], a request whose path matches any pattern is
//! handled by method:
//!
//! | Method        | read | write | invalidate |
//! |---------------|------|-------|------------|
//! | `GET`         | yes  | yes   | no         |
//! | anything else | no   | no    | yes        |
//!
//! Unmatched requests pass straight through. [`Matcher::custom`] replaces the
//! table entirely, e.g. to treat `POST /search` as a read.
//!
//! ## Response headers
//!
//! Every response through the layer carries [`X_CACHE`]: `HIT` when it was
//! served from the store, `MISS` otherwise.

mod config;
mod decision;
mod error;
pub mod key;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use decision::{DecideFn, Decision, Matcher};
pub use error::CacheError;
pub use key::{DEFAULT_KEY_PREFIX, KeyFn};
pub use middleware::ServerCache;
pub use store::{CacheStore, InMemoryStore};

/// Response header reporting whether the cache served the response.
pub const X_CACHE: &str = "X-Cache";

/// Value of the [`X_CACHE`] header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }

    /// Reads the status back from a response, if the header is present.
    pub fn of(response: &crate::Response) -> Option<Self> {
        match response.headers().get(X_CACHE)? {
            "HIT" => Some(Self::Hit),
            "MISS" => Some(Self::Miss),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
