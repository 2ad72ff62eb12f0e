//! Axum middleware and per-request [`Locals`] store.
//!
//! ```rust,ignore
//! let config = Arc::new(CorrelationConfig::default());
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(middleware::from_fn_with_state(config, correlation_middleware));
//! ```
//!
//! Besides the request headers and the [`CorrelationId`] extension, the
//! middleware writes the identifier into [`Locals`] under the configured key,
//! so handlers that already keep loosely-typed per-request values there find
//! it alongside them.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::Instrument as _;

use crate::{
    config::CorrelationConfig,
    id::CorrelationId,
    propagate::{self, RequestFacade},
};

/// Shared, string-keyed per-request store.
///
/// Cloning is cheap and every clone sees the same map, so a value set by the
/// middleware is visible to the handler and vice versa. Read it with
/// `Extension<Locals>`.
#[derive(Clone, Debug, Default)]
pub struct Locals(Arc<RwLock<HashMap<String, Value>>>);

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// String value under `key`; `None` when missing or not a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_owned))
    }
}

/// Return the identifier stored in `locals` under the configured key.
///
/// Empty when the entry is missing or holds something other than a string.
pub fn extract_id_from_locals(config: &CorrelationConfig, locals: &Locals) -> String {
    locals.get_str(config.key()).unwrap_or_default()
}

/// Request adapter that also records the identifier in [`Locals`].
struct AxumRequest<'a> {
    req: &'a mut Request,
    key: &'a str,
}

impl RequestFacade for AxumRequest<'_> {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.req.header(name)
    }

    fn set_request_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.req.set_request_header(name, value);
    }

    fn set_context(&mut self, id: CorrelationId) {
        // Reuse a store installed further out so its values are kept.
        let locals = self
            .req
            .extensions()
            .get::<Locals>()
            .cloned()
            .unwrap_or_default();
        locals.insert(self.key, id.as_str());
        self.req.extensions_mut().insert(locals);
        self.req.set_context(id);
    }
}

/// Axum middleware that resolves the correlation ID for every request.
///
/// Layer order matters: apply this **inside** `tower_http::TraceLayer` so the
/// request span is already open when the correlation span is entered.
pub async fn correlation_middleware(
    State(config): State<Arc<CorrelationConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let id = propagate::resolve(
        &config,
        &mut AxumRequest {
            req: &mut req,
            key: config.key(),
        },
    );

    // Every log line from the handler carries the id.
    let span = tracing::debug_span!("correlation", id = %id);
    let mut response = next.run(req).instrument(span).await;

    propagate::publish(&id, &mut response);
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::id::extract_id;

    async fn echo_locals(
        State(config): State<Arc<CorrelationConfig>>,
        Extension(locals): Extension<Locals>,
    ) -> String {
        extract_id_from_locals(&config, &locals)
    }

    async fn echo_context(
        State(config): State<Arc<CorrelationConfig>>,
        req: Request<Body>,
    ) -> String {
        extract_id(&config, req.extensions())
    }

    fn app(config: Arc<CorrelationConfig>) -> Router {
        Router::new()
            .route("/locals", get(echo_locals))
            .route("/context", get(echo_context))
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&config),
                correlation_middleware,
            ))
            .with_state(config)
    }

    async fn body_string(resp: Response) -> String {
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_uses_generator_everywhere() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = Arc::new(CorrelationConfig::new().with_generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "G1".to_owned()
        }));

        let resp = app(Arc::clone(&config))
            .oneshot(Request::get("/locals").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-correlation-id"], "G1");
        assert_eq!(body_string(resp).await, "G1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let resp = app(config)
            .oneshot(Request::get("/context").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(resp).await, "G1");
    }

    #[tokio::test]
    async fn existing_header_is_echoed_under_custom_key() {
        let config = Arc::new(CorrelationConfig::new().with_key("Trace-Id"));

        let resp = app(config)
            .oneshot(
                Request::get("/locals")
                    .header("Trace-Id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers()["trace-id"], "abc-123");
        assert_eq!(body_string(resp).await, "abc-123");
    }

    #[tokio::test]
    async fn empty_header_is_replaced() {
        let config = Arc::new(CorrelationConfig::new().with_generator(|| "fresh".to_owned()));

        let resp = app(config)
            .oneshot(
                Request::get("/context")
                    .header("x-correlation-id", "")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers()["x-correlation-id"], "fresh");
        assert_eq!(body_string(resp).await, "fresh");
    }

    #[tokio::test]
    async fn handler_status_passes_through_with_header() {
        let config = Arc::new(CorrelationConfig::new().with_generator(|| "G2".to_owned()));

        let resp = app(config)
            .oneshot(Request::get("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.headers()["x-correlation-id"], "G2");
    }

    #[tokio::test]
    async fn outer_locals_are_reused() {
        let config = Arc::new(CorrelationConfig::new().with_generator(|| "G3".to_owned()));
        let outer = Locals::new();
        outer.insert("tenant", "acme");

        let resp = app(config)
            .layer(Extension(outer.clone()))
            .oneshot(Request::get("/locals").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(body_string(resp).await, "G3");
        assert_eq!(outer.get_str("tenant").as_deref(), Some("acme"));
        assert_eq!(outer.get_str("X-Correlation-ID").as_deref(), Some("G3"));
    }

    // -----------------------------------------------------------------------
    // Locals lookups
    // -----------------------------------------------------------------------

    #[test]
    fn extract_from_locals_returns_stored_string() {
        let config = CorrelationConfig::default();
        let locals = Locals::new();
        locals.insert(config.key(), "test-correlation-id");
        assert_eq!(extract_id_from_locals(&config, &locals), "test-correlation-id");
    }

    #[test]
    fn extract_from_locals_is_empty_when_missing() {
        let config = CorrelationConfig::default();
        assert_eq!(extract_id_from_locals(&config, &Locals::new()), "");
    }

    #[test]
    fn extract_from_locals_is_empty_for_non_string() {
        let config = CorrelationConfig::default();
        let locals = Locals::new();
        locals.insert(config.key(), json!(12345));
        assert_eq!(extract_id_from_locals(&config, &locals), "");
    }

    #[test]
    fn locals_clones_share_state() {
        let a = Locals::new();
        let b = a.clone();
        b.insert("k", "v");
        assert_eq!(a.get("k"), Some(json!("v")));
    }
}
