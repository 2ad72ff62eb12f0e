//! Bridging to `tower_http`'s request-id extension.
//!
//! Some stacks read the [`RequestId`] extension (for example from a
//! `TraceLayer` span maker, or `PropagateRequestIdLayer`).
//! [`CorrelationLayer::with_request_id`](crate::CorrelationLayer::with_request_id)
//! runs the normal propagation and also stores the identifier there, so an
//! empty inbound header is replaced exactly as on every other path.

use http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::RequestId;

use crate::{id::CorrelationId, propagate::RequestFacade};

/// Read the `tower_http` [`RequestId`] extension as a string.
///
/// Empty when the extension is missing or its value is not valid UTF-8.
pub fn extract_request_id(extensions: &http::Extensions) -> String {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(str::to_owned)
        .unwrap_or_default()
}

/// Request adapter that mirrors the context entry into a [`RequestId`].
pub(crate) struct RequestIdRequest<'a, B>(pub(crate) &'a mut Request<B>);

impl<B> RequestFacade for RequestIdRequest<'_, B> {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.0.header(name)
    }

    fn set_request_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.0.set_request_header(name, value);
    }

    fn set_context(&mut self, id: CorrelationId) {
        if let Some(value) = id.header_value() {
            self.0.extensions_mut().insert(RequestId::new(value));
        }
        self.0.set_context(id);
    }
}
