//! End-to-end caching scenarios driven through a `Pipeline`.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use rttp_cache::cache::{
    CacheConfig, CacheStatus, CacheStore, Decision, InMemoryStore, Matcher, ServerCache,
};
use rttp_cache::middleware::{LoggerMiddleware, Pipeline, from_middleware};
use rttp_cache::{Context, Request, Response, StatusCode};
use serde_json::{Value, json};

fn request(method: &str, target: &str) -> Request {
    let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let (req, _) = Request::parse(raw.as_bytes()).unwrap();
    req
}

fn request_with_body(method: &str, target: &str, body: &str) -> Request {
    let raw = format!(
        "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let (req, _) = Request::parse(raw.as_bytes()).unwrap();
    req
}

// Detached cache writes need the test task to yield before they land.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

struct Harness {
    store: Arc<InMemoryStore<Value>>,
    calls: Arc<AtomicUsize>,
    pipeline: Pipeline,
}

impl Harness {
    // Downstream answers every request with `{"id": <last path segment>}`.
    fn new(cache: impl FnOnce(Arc<InMemoryStore<Value>>) -> ServerCache<InMemoryStore<Value>>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pipeline = Pipeline::new(move |mut ctx: Context| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let id = ctx
                    .request()
                    .path()
                    .rsplit('/')
                    .next()
                    .and_then(|s| s.parse::<u64>().ok());
                ctx.json(&json!({ "id": id }))
            }
        })
        .layer(from_middleware(Arc::new(LoggerMiddleware)))
        .layer(cache(Arc::clone(&store)).into_handler());

        Self {
            store,
            calls,
            pipeline,
        }
    }

    fn with_patterns(patterns: &[&str]) -> Self {
        let matcher = Matcher::patterns(patterns.iter().copied()).unwrap();
        Self::new(move |store| ServerCache::new(store, matcher))
    }

    async fn send(&self, method: &str, target: &str) -> Response {
        let response = self.pipeline.handle(request(method, target)).await;
        settle().await;
        response
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn get_is_miss_then_hit() {
    let h = Harness::with_patterns(&["^/foo"]);

    let first = h.send("GET", "/foo/1").await;
    assert_eq!(CacheStatus::of(&first), Some(CacheStatus::Miss));
    assert_eq!(first.payload(), br#"{"id":1}"#);
    assert_eq!(h.calls(), 1);

    let second = h.send("GET", "/foo/1").await;
    assert_eq!(CacheStatus::of(&second), Some(CacheStatus::Hit));
    assert_eq!(second.status(), StatusCode::Ok);
    assert_eq!(second.payload(), first.payload());
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn users_scenario_invalidates_on_post() {
    let h = Harness::with_patterns(&["^/users"]);

    let res = h.send("GET", "/users/5").await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    assert!(h.store.contains("__key_:/users/5").await);

    let res = h.send("POST", "/users/5").await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    assert!(!h.store.contains("__key_:/users/5").await);
    assert_eq!(h.calls(), 2);

    let res = h.send("GET", "/users/5").await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    assert_eq!(h.calls(), 3);
}

#[tokio::test]
async fn mutating_methods_never_hit() {
    let h = Harness::with_patterns(&["^/users"]);
    for method in ["POST", "PUT", "PATCH", "DELETE"] {
        h.send("GET", "/users/7").await;
        assert!(h.store.contains("__key_:/users/7").await);

        let res = h.send(method, "/users/7").await;
        assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss), "{method}");
        assert!(h.store.is_empty().await, "{method} left a stale entry");
    }
}

#[tokio::test]
async fn unmatched_paths_pass_through() {
    let h = Harness::with_patterns(&["^/users"]);

    for _ in 0..2 {
        let res = h.send("GET", "/posts/1").await;
        assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    }
    assert_eq!(h.calls(), 2);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn invalidating_an_empty_key_is_harmless() {
    let h = Harness::with_patterns(&["^/users"]);
    let res = h.send("DELETE", "/users/404").await;
    assert_eq!(res.status(), StatusCode::Ok);
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
}

#[tokio::test]
async fn only_first_payload_is_captured() {
    let store = Arc::new(InMemoryStore::<Value>::new());
    let pipeline = Pipeline::new(|mut ctx: Context| async move {
        let _draft = ctx.json(&json!({"draft": true}));
        ctx.json(&json!({"final": true}))
    })
    .layer(
        ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/report"]).unwrap())
            .into_handler(),
    );

    let res = pipeline.handle(request("GET", "/report")).await;
    settle().await;
    assert_eq!(res.payload(), br#"{"final":true}"#);

    let res = pipeline.handle(request("GET", "/report")).await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Hit));
    assert_eq!(res.payload(), br#"{"draft":true}"#);
}

#[tokio::test]
async fn non_json_responses_are_not_cached() {
    let store = Arc::new(InMemoryStore::<Value>::new());
    let pipeline = Pipeline::new(|_ctx: Context| async {
        Response::new(StatusCode::Found).header("Location", "/login")
    })
    .layer(ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/"]).unwrap()).into_handler());

    for _ in 0..2 {
        let res = pipeline.handle(request("GET", "/account")).await;
        settle().await;
        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn post_search_as_read_only() {
    #[derive(serde::Deserialize)]
    struct Search {
        q: String,
    }

    let store = Arc::new(InMemoryStore::<Value>::new());
    store
        .write("__key_:/search", json!({"results": ["cached"]}))
        .await
        .unwrap();

    let matcher = Matcher::custom(|ctx: &Context| {
        if ctx.request().path() == "/search" {
            Decision {
                read: true,
                write: false,
                invalidate: false,
            }
        } else {
            Decision::NONE
        }
    });
    let pipeline = Pipeline::new(|mut ctx: Context| async move {
        let q = ctx.body_json::<Search>().map(|s| s.q).unwrap_or_default();
        ctx.json(&json!({ "results": [q] }))
    })
    .layer(ServerCache::new(Arc::clone(&store), matcher).into_handler());

    let res = pipeline
        .handle(request_with_body("POST", "/search", r#"{"q":"rust"}"#))
        .await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Hit));
    assert_eq!(res.payload(), br#"{"results":["cached"]}"#);

    store.invalidate("__key_:/search").await.unwrap();
    let res = pipeline
        .handle(request_with_body("POST", "/search", r#"{"q":"rust"}"#))
        .await;
    settle().await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Miss));
    assert_eq!(res.payload(), br#"{"results":["rust"]}"#);
    assert!(store.is_empty().await, "read-only decision must not write");
}

#[tokio::test]
async fn key_fn_can_use_request_extensions() {
    struct Tenant(String);

    let store = Arc::new(InMemoryStore::<Value>::new());
    let cache = ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/me"]).unwrap())
        .key_fn(|ctx: &Context| {
            let tenant = ctx
                .extensions()
                .get::<Tenant>()
                .map_or("anonymous", |t| t.0.as_str());
            format!("{tenant}:{}", ctx.request().path())
        });

    // Stands in for an auth layer that resolves the tenant from a header.
    let tenant_layer = Arc::new(|mut ctx: Context, next: rttp_cache::middleware::Next| {
        let tenant = ctx.request().headers().get("x-tenant").unwrap_or("").to_owned();
        ctx.extensions_mut().insert(Tenant(tenant));
        let fut: rttp_cache::middleware::BoxFuture<'static, Response> =
            Box::pin(async move { next.run(ctx).await });
        fut
    });

    let pipeline = Pipeline::new(|mut ctx: Context| async move {
        let tenant = ctx.request().headers().get("x-tenant").unwrap_or("").to_owned();
        ctx.json(&json!({ "tenant": tenant }))
    })
    .layer(tenant_layer)
    .layer(cache.into_handler());

    for tenant in ["acme", "globex"] {
        let raw = format!("GET /me HTTP/1.1\r\nX-Tenant: {tenant}\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        pipeline.handle(req).await;
        settle().await;
    }

    assert!(store.contains("acme:/me").await);
    assert!(store.contains("globex:/me").await);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn configured_cache_behaves_like_programmatic_one() {
    let config: CacheConfig =
        serde_json::from_str(r#"{ "patterns": ["^/users"], "key_prefix": "v2:" }"#).unwrap();
    let h = Harness::new(|store| ServerCache::from_config(store, &config).unwrap());

    h.send("GET", "/users/9").await;
    assert!(h.store.contains("v2:/users/9").await);

    let res = h.send("GET", "/users/9").await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Hit));
    assert_eq!(res.payload(), br#"{"id":9}"#);
}

#[tokio::test]
async fn null_payload_never_becomes_a_hit() {
    let store = Arc::new(InMemoryStore::<Value>::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = Pipeline::new(move |mut ctx: Context| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.json(&json!(null))
        }
    })
    .layer(ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/foo"]).unwrap()).into_handler());

    let first = pipeline.handle(request("GET", "/foo")).await;
    settle().await;
    let second = pipeline.handle(request("GET", "/foo")).await;
    settle().await;

    assert_eq!(CacheStatus::of(&first), Some(CacheStatus::Miss));
    assert_eq!(CacheStatus::of(&second), Some(CacheStatus::Miss));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // A null written by some other producer is still treated as absent.
    store.write("__key_:/foo", Value::Null).await.unwrap();
    let third = pipeline.handle(request("GET", "/foo")).await;
    assert_eq!(CacheStatus::of(&third), Some(CacheStatus::Miss));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stacked_caches_both_capture() {
    let outer = Arc::new(InMemoryStore::<Value>::new());
    let inner = Arc::new(InMemoryStore::<Value>::new());
    let layer = |store: &Arc<InMemoryStore<Value>>| {
        ServerCache::new(Arc::clone(store), Matcher::patterns(["^/foo"]).unwrap()).into_handler()
    };
    let pipeline = Pipeline::new(|mut ctx: Context| async move { ctx.json(&json!({"id": 1})) })
        .layer(layer(&outer))
        .layer(layer(&inner));

    let res = pipeline.handle(request("GET", "/foo")).await;
    settle().await;

    assert_eq!(res.payload(), br#"{"id":1}"#);
    assert_eq!(outer.len().await, 1);
    assert_eq!(inner.len().await, 1);

    // Clearing the inner store leaves the outer layer serving hits.
    inner.invalidate("__key_:/foo").await.unwrap();
    let res = pipeline.handle(request("GET", "/foo")).await;
    assert_eq!(CacheStatus::of(&res), Some(CacheStatus::Hit));
}
