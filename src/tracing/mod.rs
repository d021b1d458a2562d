//! Request tracing plumbing.
//!
//! Every request gets an ID, either taken from the caller's `x-request-id`
//! header or freshly assigned. The ID travels through request extensions, a
//! task-local (so error envelopes can embed it), the tracing span, and the
//! response headers.

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use http::Request;
use std::{cell::RefCell, fmt, future::Future};
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{MakeSpan, TraceLayer},
};
use uuid::Uuid;

// Re-export tracing macros for use across the crate
pub use tracing::{debug, error, info, trace, warn};

/// Header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identifier attached to a single HTTP request.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn generate() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

/// Run `future` with `request_id` visible through [`current_request_id`].
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

/// The request ID of the current task, if one is in scope.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Builds the per-request span carrying the request ID, method and URI.
#[derive(Clone, Default)]
pub struct HttpSpanMaker;

impl<B> MakeSpan<B> for HttpSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        // The extension is set by request_id_middleware; the header fallback
        // covers layer orderings where the trace layer runs first
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| id_from_headers(request.headers()))
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %request_id,
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

/// HTTP trace layer that treats 5xx responses as failures.
pub fn configure_http_tracing() -> TraceLayer<SharedClassifier<StatusInRangeAsFailures>, HttpSpanMaker>
{
    let classifier = StatusInRangeAsFailures::new(500..=599).into_make_classifier();
    TraceLayer::new(classifier).make_span_with(HttpSpanMaker)
}

fn id_from_headers(headers: &HeaderMap) -> Option<RequestId> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(RequestId::new)
}

fn id_header_value(request_id: &RequestId) -> HeaderValue {
    // The value either passed to_str() on the way in or is a UUID, so it is
    // always a valid header value
    HeaderValue::from_str(request_id.as_str())
        .expect("request ID contains only valid header characters")
}

/// Middleware threading a request ID through the whole request lifecycle.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = id_from_headers(request.headers()).unwrap_or_default();

    request
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), id_header_value(&request_id));
    request.extensions_mut().insert(request_id.clone());

    let mut response =
        scope_request_id(request_id.clone(), async move { next.run(request).await }).await;

    response
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), id_header_value(&request_id));

    response
}
