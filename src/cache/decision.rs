//! Action resolution — which cache operations apply to a request.

use std::{fmt, sync::Arc};

use regex::Regex;

use super::CacheError;
use crate::{Method, context::Context};

/// The cache operations that apply to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    /// Serve a stored value when one exists.
    pub read: bool,
    /// Capture the first JSON payload emitted downstream.
    pub write: bool,
    /// Drop the stored value before doing anything else.
    pub invalidate: bool,
}

impl Decision {
    /// No cache involvement at all.
    pub const NONE: Self = Self {
        read: false,
        write: false,
        invalidate: false,
    };

    /// The default policy for a request whose path matched: `GET` reads and
    /// refreshes, every other method invalidates.
    pub fn for_method(method: &Method) -> Self {
        let is_get = *method == Method::Get;
        Self {
            read: is_get,
            write: is_get,
            invalidate: !is_get,
        }
    }

    /// Returns `true` when the cache layer has nothing to do for the request.
    pub fn is_passthrough(&self) -> bool {
        !self.read && !self.write && !self.invalidate
    }
}

/// Custom decision function for [`Matcher::Custom`].
pub type DecideFn = Arc<dyn Fn(&Context) -> Decision + Send + Sync + 'static>;

/// Decides which requests the cache layer acts on.
///
/// Built once at setup and shared read-only by every request.
#[derive(Clone)]
pub enum Matcher {
    /// Path patterns compiled into one alternation. `None` for an empty list,
    /// which matches nothing.
    Patterns(Option<Regex>),
    /// A caller-supplied function whose decision is used verbatim.
    Custom(DecideFn),
}

impl Matcher {
    /// Compiles `patterns` into a single alternation matched against the
    /// request path.
    ///
    /// Fragments are joined with `|` as-is: they are neither escaped nor
    /// anchored, so `"users"` matches `/api/users/5` as well as `/users`. Use
    /// `^` and `$` explicitly to pin a pattern to the whole path. Because the
    /// join is textual, a fragment with an unbalanced group can swallow its
    /// neighbours; keep each fragment self-contained.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pattern`] if the joined expression does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::cache::Matcher;
    ///
    /// assert!(Matcher::patterns(["^/users", "^/posts/\\d+$"]).is_ok());
    /// assert!(Matcher::patterns(["^/users("]).is_err());
    /// ```
    pub fn patterns<I, P>(patterns: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let fragments: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect();

        if fragments.is_empty() {
            return Ok(Self::Patterns(None));
        }

        Ok(Self::Patterns(Some(Regex::new(&fragments.join("|"))?)))
    }

    /// Wraps a decision function that takes full responsibility for the
    /// read/write/invalidate split.
    pub fn custom<F>(decide: F) -> Self
    where
        F: Fn(&Context) -> Decision + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(decide))
    }

    /// Resolves the decision for `ctx`.
    pub fn resolve(&self, ctx: &Context) -> Decision {
        match self {
            Self::Patterns(regex) => {
                let request = ctx.request();
                match regex {
                    Some(regex) if regex.is_match(request.path()) => {
                        Decision::for_method(request.method())
                    }
                    _ => Decision::NONE,
                }
            }
            Self::Custom(decide) => decide(ctx),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patterns(regex) => f
                .debug_tuple("Patterns")
                .field(&regex.as_ref().map(Regex::as_str))
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
