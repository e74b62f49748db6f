//! The caching middleware.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{
    CacheConfig, CacheError, CacheStatus, CacheStore, Matcher, X_CACHE,
    key::{self, KeyFn},
};
use crate::{
    Response, StatusCode,
    context::{Context, JsonHook},
    middleware::{BoxFuture, Middleware, MiddlewareHandler, Next, from_middleware},
};

/// Middleware that serves, invalidates, and captures cached responses.
///
/// Per request it:
///
/// 1. resolves a [`Decision`](super::Decision) from the [`Matcher`]; a
///    passthrough decision goes straight downstream without deriving a key;
/// 2. awaits [`CacheStore::invalidate`] when the decision says so, before
///    anything else;
/// 3. on a read, returns the stored value as JSON with `X-Cache: HIT` without
///    calling downstream; a stored value that serializes to `null` counts as
///    absent;
/// 4. on a write, registers a one-shot hook on the request's [`Context`] so the
///    first non-null payload passed to [`Context::json`] is written to the store
///    in a detached task. Stacked cache layers each register their own hook;
/// 5. otherwise forwards to downstream and stamps `X-Cache: MISS`.
///
/// Read and invalidate failures become a `500`; write failures are only logged.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::cache::{InMemoryStore, Matcher, ServerCache};
/// use rttp_cache::middleware::Pipeline;
/// use rttp_cache::Context;
///
/// # fn main() -> Result<(), rttp_cache::cache::CacheError> {
/// let store = Arc::new(InMemoryStore::<serde_json::Value>::new());
/// let cache = ServerCache::new(store, Matcher::patterns(["^/users"])?);
///
/// let pipeline = Pipeline::new(|mut ctx: Context| async move {
///     ctx.json(&serde_json::json!({"id": 5}))
/// })
/// .layer(cache.into_handler());
/// # Ok(())
/// # }
/// ```
pub struct ServerCache<S: CacheStore> {
    store: Arc<S>,
    matcher: Arc<Matcher>,
    key_fn: KeyFn,
}

impl<S: CacheStore> ServerCache<S> {
    /// Creates the middleware with the default `__key_:` + path key derivation.
    pub fn new(store: Arc<S>, matcher: Matcher) -> Self {
        Self {
            store,
            matcher: Arc::new(matcher),
            key_fn: Arc::new(key::default_key),
        }
    }

    /// Builds the middleware from a [`CacheConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pattern`] if a configured pattern does not compile.
    pub fn from_config(store: Arc<S>, config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self {
            store,
            matcher: Arc::new(config.matcher()?),
            key_fn: config.key_fn(),
        })
    }

    /// Replaces the key derivation.
    ///
    /// Use this when responses vary on more than the path, e.g. the query
    /// string, a header, or a principal stored in the request extensions.
    #[must_use]
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Wraps the middleware for [`Pipeline::layer`](crate::middleware::Pipeline::layer).
    pub fn into_handler(self) -> MiddlewareHandler {
        from_middleware(Arc::new(self))
    }
}

impl<S: CacheStore> Middleware for ServerCache<S> {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        let store = Arc::clone(&self.store);
        let matcher = Arc::clone(&self.matcher);
        let key_fn = Arc::clone(&self.key_fn);

        Box::pin(async move {
            let decision = matcher.resolve(&ctx);
            if decision.is_passthrough() {
                return mark_miss(next.run(ctx).await);
            }

            let key = key_fn(&ctx);

            debug!(
                method = %ctx.request().method(),
                path = %ctx.request().path(),
                %key,
                ?decision,
                "cache decision"
            );

            if decision.invalidate {
                if let Err(e) = store.invalidate(&key).await {
                    return backend_failure("invalidate", &key, &e);
                }
            }

            if decision.read {
                match store.read(&key).await {
                    Ok(Some(value)) => match serde_json::to_value(&value) {
                        Ok(serde_json::Value::Null) => debug!(%key, "cached null; treated as miss"),
                        Ok(payload) => {
                            return match Response::json(StatusCode::Ok, &payload) {
                                Ok(response) => {
                                    debug!(%key, "cache hit");
                                    response.header(X_CACHE, CacheStatus::Hit.as_str())
                                }
                                Err(e) => backend_failure("read", &key, &CacheError::Encode(e)),
                            };
                        }
                        Err(e) => return backend_failure("read", &key, &CacheError::Encode(e)),
                    },
                    Ok(None) => debug!(%key, "cache miss"),
                    Err(e) => return backend_failure("read", &key, &e),
                }
            }

            if decision.write {
                ctx.on_json(capture(store, key));
            }

            mark_miss(next.run(ctx).await)
        })
    }
}

// Downstream may already have set its own X-Cache value.
fn mark_miss(mut response: Response) -> Response {
    if !response.headers().contains(X_CACHE) {
        response.set_header(X_CACHE, CacheStatus::Miss.as_str());
    }
    response
}

// Hands the first emitted payload to the store without holding up the response.
fn capture<S: CacheStore>(store: Arc<S>, key: String) -> JsonHook {
    Box::new(move |payload: &serde_json::Value| {
        if payload.is_null() {
            debug!(%key, "null payload; not cached");
            return;
        }

        let value = match serde_json::from_value::<S::Value>(payload.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(%key, error = %e, "response payload does not fit the cached value type; not cached");
                return;
            }
        };

        tokio::spawn(async move {
            match store.write(&key, value).await {
                Ok(()) => debug!(%key, "response cached"),
                Err(e) => warn!(%key, error = %e, "cache write failed"),
            }
        });
    })
}

fn backend_failure(operation: &'static str, key: &str, err: &CacheError) -> Response {
    error!(operation, %key, error = %err, "cache backend failed");
    Response::new(StatusCode::InternalServerError)
        .header(X_CACHE, CacheStatus::Miss.as_str())
        .body("Internal Server Error")
}
