//! Correlation ID propagation for tower and axum services.
//!
//! Every inbound request gets a correlation ID. The ID is:
//!
//! - Accepted from the caller if they already send the configured header
//!   (`X-Correlation-ID` by default)
//! - Freshly generated otherwise (uppercase UUID v4 by default)
//! - Written back into the request headers, so anything that forwards the
//!   request carries it too
//! - Stored as a [`CorrelationId`] extension so handlers can read it
//! - Echoed in the response headers
//! - Attached to a [`tracing`] span so every log line for the request has it
//!
//! Pick the adapter that matches the stack:
//!
//! | Stack | Adapter |
//! |---|---|
//! | any tower service over `http` types | [`CorrelationLayer`] |
//! | axum, with a per-request [`Locals`] store | [`web::correlation_middleware`] |
//! | stacks reading `tower_http`'s `RequestId` | [`CorrelationLayer::with_request_id`] |
//!
//! and [`outbound::CorrelationExt`] to forward the ID on `reqwest` calls.

pub mod config;
pub mod error;
pub mod id;
pub mod interop;
pub mod layer;
pub mod outbound;
pub mod propagate;
pub mod web;

pub use config::{CorrelationConfig, Settings, DEFAULT_KEY};
pub use error::{AppError, ConfigError};
pub use id::{current_key, extract_id, CorrelationId};
pub use layer::{CorrelationLayer, CorrelationService};
pub use web::{correlation_middleware, extract_id_from_locals, Locals};
