//! Declarative cache configuration.

use std::sync::Arc;

use serde::Deserialize;

use super::{
    CacheError, Matcher,
    key::{self, KeyFn},
};

/// Pattern-based cache settings, typically deserialized from the host
/// application's configuration file.
///
/// ```
/// use rttp_cache::cache::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(
///     r#"{ "patterns": ["^/users", "^/posts"], "key_prefix": "v2:" }"#,
/// ).unwrap();
/// assert_eq!(config.patterns.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Path pattern fragments; see [`Matcher::patterns`].
    pub patterns: Vec<String>,
    /// Replaces the default `__key_:` prefix when set.
    pub key_prefix: Option<String>,
}

impl CacheConfig {
    /// Compiles the configured patterns.
    pub fn matcher(&self) -> Result<Matcher, CacheError> {
        Matcher::patterns(&self.patterns)
    }

    /// Key derivation honouring `key_prefix`.
    pub fn key_fn(&self) -> KeyFn {
        match &self.key_prefix {
            Some(prefix) => key::prefixed(prefix.clone()),
            None => {
                let default: KeyFn = Arc::new(key::default_key);
                default
            }
        }
    }
}
