//! The backend seam — where cached values actually live.

use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

use super::CacheError;
use crate::middleware::BoxFuture;

/// A key-value backend the cache layer reads from, writes to, and
/// invalidates.
///
/// The layer owns no storage and enforces no TTL or eviction; those belong
/// to the implementation. Values are opaque to the layer: it only needs to
/// emit them as JSON on a hit and to build them from a captured JSON payload.
///
/// # Contract
///
/// - `read` returns `Ok(None)` for an absent key.
/// - `invalidate` on an absent key succeeds and does nothing.
/// - Errors from `read` and `invalidate` fail the request; errors from
///   `write` are logged and dropped.
pub trait CacheStore: Send + Sync + 'static {
    /// The stored value type.
    type Value: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Looks up `key`, returning `Ok(None)` when nothing is stored.
    ///
    /// Awaited before downstream runs; an error fails the request with a `500`.
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Self::Value>, CacheError>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Runs in a detached task after the response is built. Errors are logged
    /// and never reach the client.
    fn write<'a>(&'a self, key: &'a str, value: Self::Value) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Drops whatever is stored under `key`. Must succeed for an absent key.
    ///
    /// Awaited before any read; an error fails the request with a `500`.
    fn invalidate<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CacheError>>;
}

/// A process-local [`CacheStore`] backed by a `HashMap`.
///
/// Entries live until invalidated; there is no expiry or size bound.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::{CacheStore, InMemoryStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = InMemoryStore::<serde_json::Value>::new();
/// store.write("__key_:/foo", serde_json::json!({"id": 1})).await.unwrap();
/// assert_eq!(store.read("__key_:/foo").await.unwrap(), Some(serde_json::json!({"id": 1})));
///
/// store.invalidate("__key_:/foo").await.unwrap();
/// assert_eq!(store.read("__key_:/foo").await.unwrap(), None);
/// # });
/// ```
pub struct InMemoryStore<T = serde_json::Value> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheStore for InMemoryStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Value = T;

    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<T>, CacheError>> {
        Box::pin(async move { Ok(self.entries.read().await.get(key).cloned()) })
    }

    fn write<'a>(&'a self, key: &'a str, value: T) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn invalidate<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
            Ok(())
        })
    }
}
