//! HTTP surface: every contract as `GET /<path>` and `POST /<path>`, plus
//! an OpenAPI document and HTML pages for browsing.
//!
//! Endpoints:
//! - GET  /documentation/json  - OpenAPI 3 document
//! - GET  /slang/              - Contracts grouped by directory
//! - GET  /slang/<path>        - Contract text with an execute button
//! - GET  /<path>              - Execute with query parameters
//! - POST /<path>              - Execute with a JSON body
//!
//! Errors are JSON: `{"message": ["..."]}`.

mod handlers;
mod openapi;
mod pages;
mod state;


use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use twinroom_core::{Engine, ExecutionPayload};

use self::handlers::{
    handle_get, handle_listing, handle_not_found, handle_openapi, handle_page, handle_post,
};
use self::state::AppState;
use crate::registry::Registry;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub(crate) const DOCS_PATH: &str = "/documentation/json";
pub(crate) const PAGE_PREFIX: &str = "/slang/";

/// Construct a JSON error response with the given status code and messages.
fn json_error(status: StatusCode, messages: Vec<String>) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "message": messages })))
}

/// What to serve and how.
pub struct ServeOptions {
    /// OpenAPI title, normally the binary name.
    pub title: String,
    /// Preferred port; falls back to an ephemeral port on bind failure.
    pub port: u16,
    pub request_timeout: Duration,
    /// Base payload for one route, already composed by the caller.
    pub pinned: Option<(String, ExecutionPayload)>,
}

/// Build the router. Contracts whose paths cannot be routed are skipped with
/// a warning.
pub(crate) fn router(
    registry: Registry,
    engine: Arc<dyn Engine>,
    options: &ServeOptions,
) -> Router {
    let openapi = openapi::document(&options.title, &registry);

    let mut taken: HashSet<String> = [DOCS_PATH.to_string(), "/slang".to_string()]
        .into_iter()
        .collect();
    let mut pages = Vec::new();
    let mut routes = Vec::new();
    for contract in registry.iter() {
        let route = contract.route();
        if !routable(&route) {
            log::warn!("{}: path cannot be served over HTTP, skipping", route);
            continue;
        }
        let exec_path = format!("/{}", route);
        let page_path = format!("{}{}", PAGE_PREFIX, route);
        if !taken.insert(exec_path.clone()) {
            log::warn!("{}: route already registered, skipping", exec_path);
            continue;
        }
        routes.push(exec_path);
        if taken.insert(page_path.clone()) {
            pages.push(page_path);
        }
    }

    let state = Arc::new(AppState {
        registry,
        engine,
        pinned: options.pinned.clone(),
        openapi,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut app = Router::new()
        .route(DOCS_PATH, get(handle_openapi))
        .route(PAGE_PREFIX, get(handle_listing))
        .route("/slang", get(handle_listing));
    for path in &pages {
        app = app.route(path, get(handle_page));
    }
    for path in &routes {
        app = app.route(path, get(handle_get).post(handle_post));
    }

    app.fallback(handle_not_found)
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            options.request_timeout,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Whether every segment of `route` is a literal path segment.
fn routable(route: &str) -> bool {
    !route.is_empty()
        && route.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(':')
                && !segment.starts_with('*')
                && !segment.contains(['{', '}', '?', '#'])
        })
}

/// Start the HTTP server and block until Ctrl+C.
pub async fn start_server(
    registry: Registry,
    engine: Arc<dyn Engine>,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = registry.len();
    let app = router(registry, engine, &options);

    let preferred = format!("0.0.0.0:{}", options.port);
    let listener = match tokio::net::TcpListener::bind(&preferred).await {
        Ok(listener) => listener,
        Err(e) => {
            log::warn!("could not bind {}: {}; using an ephemeral port", preferred, e);
            tokio::net::TcpListener::bind("127.0.0.1:0").await?
        }
    };
    let addr: SocketAddr = listener.local_addr()?;
    let base = format!("http://localhost:{}", addr.port());
    log::info!("serving {} contract(s)", count);
    eprintln!("Listening on {}", addr);
    eprintln!("Contracts: {}{}", base, PAGE_PREFIX);
    eprintln!("OpenAPI document: {}{}", base, DOCS_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}

/// Run [`start_server`] on a fresh multi-thread runtime.
pub fn serve_blocking(
    registry: Registry,
    engine: Arc<dyn Engine>,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(start_server(registry, engine, options))
}
