//! # rttp-cache
//!
//! Request-level response caching middleware for the rttp HTTP framework.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rttp_cache::cache::{CacheStatus, InMemoryStore, Matcher, ServerCache};
//! use rttp_cache::middleware::Pipeline;
//! use rttp_cache::{Context, Request};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryStore::<serde_json::Value>::new());
//!     let cache = ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/users"])?);
//!
//!     let pipeline = Pipeline::new(|mut ctx: Context| async move {
//!         ctx.json(&serde_json::json!({"id": 5, "name": "ada"}))
//!     })
//!     .layer(cache.into_handler());
//!
//!     let (request, _) = Request::parse(b"GET /users/5 HTTP/1.1\r\n\r\n")?;
//!     let response = pipeline.handle(request).await;
//!     assert_eq!(CacheStatus::of(&response), Some(CacheStatus::Miss));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Context;
pub use http::{Headers, Method, Request, Response, StatusCode};
