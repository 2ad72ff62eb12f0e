//! Host-independent propagation logic.
//!
//! Every propagator does the same thing:
//!
//! 1. Read the configured header from the inbound request
//! 2. If it is missing or empty, call the generator (exactly once)
//! 3. Store the identifier in the request context and request headers
//! 4. Run the next stage
//! 5. Write the identifier to the response headers
//!
//! [`resolve`] covers steps 1–3 and [`publish`] covers step 5. Hosts plug in
//! through [`RequestFacade`] / [`ResponseFacade`]; `http::Request` and
//! `http::Response` implement them directly, and framework adapters wrap the
//! request to add their own per-request store.

use http::{HeaderName, HeaderValue, Request, Response};
use tracing::{debug, warn};

use crate::{config::CorrelationConfig, id::CorrelationId};

/// The request-side capabilities a propagator needs from its host.
pub trait RequestFacade {
    /// Inbound header value, if present.
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue>;

    fn set_request_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Attach the identifier to the forward-propagating context.
    fn set_context(&mut self, id: CorrelationId);
}

/// The response-side capability a propagator needs from its host.
pub trait ResponseFacade {
    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue);
}

impl<B> RequestFacade for Request<B> {
    fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers().get(name)
    }

    fn set_request_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }

    fn set_context(&mut self, id: CorrelationId) {
        self.extensions_mut().insert(id);
    }
}

impl<B> ResponseFacade for Response<B> {
    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }
}

/// Resolve the request's identifier and publish it to the request side.
///
/// Total: a value that cannot be encoded as a header is kept in the context
/// but not written to the headers.
pub fn resolve<R>(config: &CorrelationConfig, req: &mut R) -> CorrelationId
where
    R: RequestFacade + ?Sized,
{
    let header = config.header_name();
    let id = match req.header(header).filter(|v| !v.is_empty()) {
        Some(existing) => CorrelationId::from_header(header.clone(), existing.clone()),
        None => {
            let generated = config.generate();
            debug!(header = %header, id = %generated, "generated correlation id");
            CorrelationId::new(header.clone(), generated)
        }
    };

    if let Some(value) = header_value(&id) {
        req.set_request_header(header.clone(), value);
    }
    req.set_context(id.clone());
    id
}

/// Write the identifier to the response headers.
pub fn publish<R>(id: &CorrelationId, res: &mut R)
where
    R: ResponseFacade + ?Sized,
{
    if let Some(value) = header_value(id) {
        res.set_response_header(id.key().clone(), value);
    }
}

pub(crate) fn header_value(id: &CorrelationId) -> Option<HeaderValue> {
    let value = id.header_value();
    if value.is_none() {
        warn!(header = %id.key(), "correlation id is not a valid header value; not forwarded");
    }
    value
}
