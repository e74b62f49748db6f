//! Per-request context — request access, typed extensions, and JSON emission.
//!
//! Handlers emit structured responses through [`Context::json`]. A middleware
//! may register one-shot [`JsonHook`]s with [`Context::on_json`] to observe the
//! first payload emitted for this request; this is how the cache layer captures
//! responses without touching any state shared between requests.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use serde::Serialize;

use crate::{Request, Response, StatusCode};

/// One-shot observer of the first JSON payload emitted for a request.
pub type JsonHook = Box<dyn FnOnce(&serde_json::Value) + Send + Sync + 'static>;

/// Type-erased request extensions map — used to inject per-request state
/// (an authenticated principal, a tenant id) without handlers and middleware
/// knowing about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Per-request context handed through the middleware pipeline.
///
/// A `Context` is created once per request by
/// [`Pipeline::handle`](crate::middleware::Pipeline::handle) and dropped when
/// the response is produced, together with any hook registered on it.
pub struct Context {
    request: Request,
    extensions: Extensions,
    json_hooks: Vec<JsonHook>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            extensions: Extensions::new(),
            json_hooks: Vec::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Deserializes the request body as JSON.
    pub fn body_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Registers a hook that receives the first payload passed to
    /// [`json`](Self::json) or [`json_with_status`](Self::json_with_status).
    ///
    /// Hooks stack: every hook registered before the first payload sees that
    /// payload once, in registration order.
    pub fn on_json(&mut self, hook: JsonHook) {
        self.json_hooks.push(hook);
    }

    /// Returns `true` while a registered hook is still waiting for a payload.
    pub fn has_json_hook(&self) -> bool {
        !self.json_hooks.is_empty()
    }

    /// Emits `value` as a `200 OK` JSON response.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::{Context, Request, StatusCode};
    ///
    /// let (request, _) = Request::parse(b"GET /users/5 HTTP/1.1\r\n\r\n").unwrap();
    /// let mut ctx = Context::new(request);
    ///
    /// let response = ctx.json(&serde_json::json!({"id": 5}));
    /// assert_eq!(response.status(), StatusCode::Ok);
    /// assert_eq!(response.payload(), br#"{"id":5}"#);
    /// ```
    pub fn json<T>(&mut self, value: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        self.json_with_status(StatusCode::Ok, value)
    }

    /// Emits `value` as a JSON response with the given status.
    ///
    /// The payload is handed to the pending hooks, if any, before the response
    /// is built. A payload that fails to serialize yields a `500` and is not
    /// handed to the hook.
    pub fn json_with_status<T>(&mut self, status: StatusCode, value: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(path = %self.request.path(), error = %e, "failed to serialize JSON response");
                return Response::new(StatusCode::InternalServerError)
                    .body("Internal Server Error");
            }
        };

        for hook in self.json_hooks.drain(..) {
            hook(&payload);
        }

        Response::json(status, &payload).unwrap_or_else(|e| {
            tracing::error!(path = %self.request.path(), error = %e, "failed to encode JSON response");
            Response::new(StatusCode::InternalServerError).body("Internal Server Error")
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("json_hooks", &self.json_hooks.len())
            .finish_non_exhaustive()
    }
}
