//! Walks a user resource through MISS → HIT → invalidate → MISS and prints
//! each response in HTTP/1.1 wire format.
//!
//! ```text
//! RUST_LOG=rttp_cache=debug cargo run --example cached_users
//! ```

use std::sync::Arc;

use rttp_cache::cache::{InMemoryStore, Matcher, ServerCache};
use rttp_cache::middleware::{LoggerMiddleware, Pipeline, from_middleware};
use rttp_cache::{Context, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(InMemoryStore::<User>::new());
    let cache = ServerCache::new(Arc::clone(&store), Matcher::patterns(["^/users/\\d+$"])?);

    let pipeline = Pipeline::new(|mut ctx: Context| async move {
        let id = ctx
            .request()
            .path()
            .trim_start_matches("/users/")
            .parse::<u64>()
            .unwrap_or_default();

        if *ctx.request().method() == Method::Get {
            ctx.json(&User {
                id,
                name: format!("user-{id}"),
            })
        } else {
            ctx.json_with_status(StatusCode::Accepted, &serde_json::json!({ "updated": id }))
        }
    })
    .layer(from_middleware(Arc::new(LoggerMiddleware)))
    .layer(cache.into_handler());

    for raw in [
        "GET /users/5 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        "GET /users/5 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        "PUT /users/5 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        "GET /users/5 HTTP/1.1\r\nHost: localhost\r\n\r\n",
    ] {
        let (request, _) = Request::parse(raw.as_bytes())?;
        let response = pipeline.handle(request).await;
        println!("{}\n", String::from_utf8_lossy(&response.into_bytes()));

        // Give the detached cache write a chance to land before the next request.
        tokio::task::yield_now().await;
    }

    println!("entries cached: {}", store.len().await);
    Ok(())
}
