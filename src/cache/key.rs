//! Cache key derivation.
//!
//! The default key is the request path behind a fixed prefix. It ignores the
//! method on purpose: a `POST /users/5` must invalidate exactly the entry a
//! `GET /users/5` populated. Query strings and headers are ignored too, so
//! routes whose responses vary on them need a custom [`KeyFn`].

use std::sync::Arc;

use crate::context::Context;

/// Prefix used by [`default_key`].
pub const DEFAULT_KEY_PREFIX: &str = "__key_:";

/// Maps a request to its cache key.
pub type KeyFn = Arc<dyn Fn(&Context) -> String + Send + Sync + 'static>;

/// Derives `"__key_:" + path`.
///
/// # Examples
///
/// ```
/// use rttp_cache::{Context, Request};
/// use rttp_cache::cache::key::default_key;
///
/// let (request, _) = Request::parse(b"GET /users/5?expand=1 HTTP/1.1\r\n\r\n").unwrap();
/// assert_eq!(default_key(&Context::new(request)), "__key_:/users/5");
/// ```
pub fn default_key(ctx: &Context) -> String {
    format!("{DEFAULT_KEY_PREFIX}{}", ctx.request().path())
}

/// Returns a [`KeyFn`] deriving `prefix + path`.
pub fn prefixed(prefix: impl Into<String>) -> KeyFn {
    let prefix = prefix.into();
    Arc::new(move |ctx: &Context| format!("{prefix}{}", ctx.request().path()))
}
