//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the sitemap handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Run each tree walk on a blocking thread, cancelled if the request is dropped
//! - Map the routing completion onto an HTTP response
//! - Swap in rebuilt sitemaps on configuration change
//!
//! # Response Mapping
//! - pipeline finalized → status set by the tree (default 200), JSON pipeline
//! - redirect → 301 (permanent) / 302 with `Location`
//! - continuation → 202
//! - nothing handled → 404
//! - failure → generic 500 (cancellation → 503)
//!
//! # Caching
//! A pipeline carrying a cache key is rendered once and kept in a
//! [`PipelineCache`] for its `expires_secs`, with the response status as the
//! validity token. The key doubles as the `ETag`, and a matching
//! `If-None-Match` on a live entry gets 304.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::{ServerConfig, SitemapConfig};
use crate::environment::RequestEnvironment;
use crate::http::request::{self, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::shutdown::wait_for_shutdown;
use crate::lifecycle::CancelToken;
use crate::observability::metrics;
use crate::pipeline::{Dispatch, InMemoryCache, PipelineCache};
use crate::routing::{Completion, Sitemap, SitemapError};

/// Reports whether a cacheable pipeline came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sitemap: Arc<ArcSwap<Sitemap>>,
    pub max_body_size: usize,
    pub cache: Arc<dyn PipelineCache>,
}

/// HTTP adapter serving a sitemap.
pub struct HttpServer {
    router: Router,
    sitemap: Arc<ArcSwap<Sitemap>>,
}

impl HttpServer {
    /// Create a new HTTP server around a built sitemap, caching in memory.
    pub fn new(config: &ServerConfig, sitemap: Sitemap) -> Self {
        Self::with_cache(config, sitemap, Arc::new(InMemoryCache::new()))
    }

    pub fn with_cache(config: &ServerConfig, sitemap: Sitemap, cache: Arc<dyn PipelineCache>) -> Self {
        let sitemap = Arc::new(ArcSwap::from_pointee(sitemap));
        let state = AppState {
            sitemap: sitemap.clone(),
            max_body_size: config.max_body_size,
            cache,
        };
        let router = Self::build_router(config, state);
        Self { router, sitemap }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(sitemap_handler))
            .route("/", any(sitemap_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.request_timeout_secs),
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared handle to the sitemap in use.
    pub fn sitemap(&self) -> Arc<ArcSwap<Sitemap>> {
        self.sitemap.clone()
    }

    /// Run the server until `shutdown` fires or Ctrl+C arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Rebuild and swap in the sitemap for every configuration received.
///
/// A configuration that fails to build leaves the current sitemap in place.
pub async fn apply_config_updates(
    sitemap: Arc<ArcSwap<Sitemap>>,
    mut updates: mpsc::UnboundedReceiver<SitemapConfig>,
) {
    while let Some(config) = updates.recv().await {
        match Sitemap::from_config(&config) {
            Ok(rebuilt) => {
                sitemap.store(Arc::new(rebuilt));
                metrics::record_reload(true);
                tracing::info!("Sitemap reloaded");
            }
            Err(e) => {
                metrics::record_reload(false);
                tracing::error!(error = %e, "Failed to rebuild sitemap, keeping current one");
            }
        }
    }
}

/// Routes every request through the sitemap.
async fn sitemap_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();
    let if_none_match = parts
        .headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            metrics::record_request(&method, "rejected", 413, start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let env = request::environment(&parts, &body);

    // Dropping this future (client gone, timeout) cancels the walk at the next node.
    let cancel = CancelToken::new();
    let cancel_on_drop = cancel.drop_guard();
    let sitemap = state.sitemap.load_full();
    let span = tracing::Span::current();

    let routed = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut env = env;
        let result = sitemap.process(&mut env, cancel);
        (result, env)
    })
    .await;
    cancel_on_drop.disarm();

    let (outcome, response) = match routed {
        Ok((Ok(completion), env)) => {
            completion_response(completion, &env, state.cache.as_ref(), if_none_match.as_deref())
        }
        Ok((Err(error), _)) => error_response(&error),
        Err(e) => {
            tracing::error!(error = %e, "Routing task failed");
            ("error", generic_failure())
        }
    };
    metrics::record_request(&method, outcome, response.status().as_u16(), start_time);
    response
}

fn generic_failure() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Request processing failed").into_response()
}

fn error_response(error: &SitemapError) -> (&'static str, Response) {
    if error.is_cancelled() {
        tracing::info!("Request cancelled");
        return ("cancelled", (StatusCode::SERVICE_UNAVAILABLE, "Request cancelled").into_response());
    }
    tracing::error!(
        error = %error,
        location = ?error.location().map(|l| l.as_str()),
        "Request processing failed"
    );
    ("error", generic_failure())
}

fn completion_response(
    completion: Completion,
    env: &RequestEnvironment,
    cache: &dyn PipelineCache,
    if_none_match: Option<&str>,
) -> (&'static str, Response) {
    let (outcome, mut response) = match &completion {
        Completion::Dispatch {
            dispatch: Dispatch::Redirect { target, kind },
        } => {
            let Ok(location) = HeaderValue::from_str(target) else {
                tracing::error!(target = %target, "Redirect target is not a valid header value");
                return ("error", generic_failure());
            };
            let status = StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::FOUND);
            ("redirect", (status, [(header::LOCATION, location)]).into_response())
        }
        Completion::Dispatch {
            dispatch: Dispatch::Continuation { .. },
        } => ("continuation", (StatusCode::ACCEPTED, Json(&completion)).into_response()),
        Completion::Pipeline { pipeline } => {
            let status = env
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::OK);
            let response = match pipeline.cache_key.as_deref() {
                Some(key) => cached_response(
                    cache,
                    key,
                    pipeline.expires_secs,
                    status,
                    &completion,
                    if_none_match,
                ),
                None => (status, Json(&completion)).into_response(),
            };
            ("pipeline", response)
        }
        Completion::Unhandled => (
            "unhandled",
            (StatusCode::NOT_FOUND, "No pipeline matched the request").into_response(),
        ),
    };

    for (name, value) in env.response_headers() {
        match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
    (outcome, response)
}

/// Serve a cacheable pipeline from `cache`, rendering and storing it on a miss.
fn cached_response(
    cache: &dyn PipelineCache,
    key: &str,
    expires_secs: Option<u64>,
    status: StatusCode,
    completion: &Completion,
    if_none_match: Option<&str>,
) -> Response {
    let etag = format!("\"{key}\"");
    let validity = status.as_str();

    let (body, cache_state) = match cache.lookup(key, validity) {
        Some(_) if if_none_match == Some(etag.as_str()) => {
            tracing::debug!(cache_key = %key, "Client copy is current");
            return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
        }
        Some(cached) => (cached.to_vec(), "hit"),
        None => {
            let rendered = match serde_json::to_vec(completion) {
                Ok(rendered) => rendered,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to render pipeline");
                    return generic_failure();
                }
            };
            cache.store(key, validity, rendered.clone(), expires_secs.map(Duration::from_secs));
            (rendered, "miss")
        }
    };
    tracing::debug!(cache_key = %key, cache = cache_state, "Cacheable pipeline served");

    let mut response = (
        status,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response();
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(cache_state));
    if let Some(secs) = expires_secs {
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={secs}")) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}
