//! Tower middleware for any `http::Request` → `http::Response` service.
//!
//! ```rust,ignore
//! let config = Arc::new(CorrelationConfig::default());
//! let svc = ServiceBuilder::new()
//!     .layer(CorrelationLayer::new(Arc::clone(&config)))
//!     .service(inner);
//! ```
//!
//! The inner service sees the identifier in the request headers and as a
//! [`CorrelationId`](crate::CorrelationId) extension; the response leaves with
//! the same header set. Errors from the inner service pass through untouched.

use std::{
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::future::BoxFuture;
use http::{Request, Response};
use tower::{Layer, Service};
use tracing::Instrument as _;

use crate::{config::CorrelationConfig, interop::RequestIdRequest, propagate};

/// Applies [`CorrelationService`] to the wrapped service.
#[derive(Clone, Debug)]
pub struct CorrelationLayer {
    config: Arc<CorrelationConfig>,
    request_id: bool,
}

impl CorrelationLayer {
    pub fn new(config: Arc<CorrelationConfig>) -> Self {
        Self {
            config,
            request_id: false,
        }
    }

    /// Also store the identifier as a `tower_http` [`RequestId`] extension,
    /// for stacks that read it from there (e.g. `PropagateRequestIdLayer` or
    /// a `TraceLayer` span maker).
    ///
    /// [`RequestId`]: tower_http::request_id::RequestId
    pub fn with_request_id(mut self) -> Self {
        self.request_id = true;
        self
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            config: Arc::clone(&self.config),
            request_id: self.request_id,
        }
    }
}

/// Resolves the correlation ID before calling the inner service and stamps it
/// on the response afterwards.
#[derive(Clone, Debug)]
pub struct CorrelationService<S> {
    inner: S,
    config: Arc<CorrelationConfig>,
    request_id: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let id = if self.request_id {
            propagate::resolve(&self.config, &mut RequestIdRequest(&mut req))
        } else {
            propagate::resolve(&self.config, &mut req)
        };

        let span = tracing::debug_span!("correlation", id = %id);
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let mut response = fut.await?;
                propagate::publish(&id, &mut response);
                Ok(response)
            }
            .instrument(span),
        )
    }
}
