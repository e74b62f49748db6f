//! Middleware pipeline — composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses (a cache hit), and response decoration (the
//! `X-Cache` header) without coupling handlers to infrastructure concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`Pipeline`] — an ordered middleware stack in front of an endpoint handler.
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, context::Context};

/// A pinned, boxed, `Send` future — the return type of every async seam in
/// this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased, reference-counted middleware function.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::Response;
/// use rttp_cache::{context::Context, middleware::{BoxFuture, MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler =
///     Arc::new(|ctx: Context, next: Next| -> BoxFuture<'static, Response> {
///         Box::pin(async move { next.run(ctx).await })
///     });
/// ```
pub type MiddlewareHandler =
    Arc<dyn Fn(Context, Next) -> BoxFuture<'static, Response> + Send + Sync + 'static>;

/// The terminal handler of a [`Pipeline`], invoked once every middleware has
/// delegated.
pub type Endpoint = Arc<dyn Fn(Context) -> BoxFuture<'static, Response> + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Endpoint,
    // Position of the middleware invoked by the next `run` call.
    index: usize,
}

impl Next {
    /// Creates a cursor positioned at the start of `middlewares`, falling
    /// through to `endpoint` once they are exhausted.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>, endpoint: Endpoint) -> Self {
        Self {
            middlewares,
            endpoint,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain, or the endpoint when none
    /// remain, and returns its response.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and
///   return a modified copy.
///
/// Middleware is shared across Tokio tasks, so implementations must be
/// `Send + Sync` and return a `'static` future that owns what it needs.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response>;
}

/// An ordered middleware stack in front of an endpoint handler.
///
/// Middleware runs in the order it was added; the first layer sees the
/// request first and the response last.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::{Context, Request, StatusCode};
/// use rttp_cache::middleware::{LoggerMiddleware, Pipeline, from_middleware};
///
/// # async fn example(request: Request) {
/// let pipeline = Pipeline::new(|mut ctx: Context| async move {
///     ctx.json(&serde_json::json!({"ok": true}))
/// })
/// .layer(from_middleware(Arc::new(LoggerMiddleware)));
///
/// let response = pipeline.handle(request).await;
/// assert_eq!(response.status(), StatusCode::Ok);
/// # }
/// ```
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Endpoint,
}

impl Pipeline {
    /// Creates a pipeline with no middleware that dispatches to `endpoint`.
    pub fn new<H, F>(endpoint: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let endpoint: Endpoint = Arc::new(move |ctx: Context| -> BoxFuture<'static, Response> {
            Box::pin(endpoint(ctx))
        });
        Self {
            middlewares: Arc::from(Vec::new()),
            endpoint,
        }
    }

    /// Appends a middleware to the end of the stack.
    #[must_use]
    pub fn layer(self, middleware: MiddlewareHandler) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(middleware);
        Self {
            middlewares: middlewares.into(),
            endpoint: self.endpoint,
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs `request` through the stack and returns the final response.
    pub async fn handle(&self, request: Request) -> Response {
        let next = Next::new(Arc::clone(&self.middlewares), Arc::clone(&self.endpoint));
        next.run(Context::new(request)).await
    }
}

/// Built-in middleware that logs each request's method, path, status,
/// cache outcome, and duration.
///
/// Emits a single `tracing::info!` record after the downstream handler
/// completes. It never short-circuits.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();
            let cache = response.headers().get("x-cache").unwrap_or("-");

            tracing::info!(%method, %path, status, cache, ?duration, "request handled");

            response
        })
    }
}
