//! Error types.
//!
//! The propagation path itself never fails: bad input is ignored and the last
//! good configuration stays in effect. Errors only surface from the two places
//! that genuinely can fail:
//!
//! - [`ConfigError`] — loading a settings file at startup
//! - [`AppError`] — handlers in the demo server, converted into an HTTP
//!   response automatically via [`IntoResponse`]
//!
//! # Example
//!
//! ```rust,ignore
//! async fn relay(
//!     State(state): State<AppState>,
//!     Extension(id): Extension<CorrelationId>,
//! ) -> Result<Json<Value>, AppError> {
//!     let upstream = state.client.get(url).correlated(&id).send().await?;
//!     Ok(Json(json!({ "upstream_status": upstream.status().as_u16() })))
//! }
//! ```

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failure to load or validate a [`Settings`](crate::config::Settings) file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing settings TOML")]
    Parse(#[from] toml::de::Error),

    #[error("invalid correlation header name `{0}`")]
    InvalidHeader(String),
}

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers.
///
/// Any type that implements `Into<anyhow::Error>` (which includes `io::Error`,
/// `reqwest::Error`, and [`ConfigError`]) converts via the blanket [`From`]
/// implementation.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "handler error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn into_response_returns_500_with_json_error_body() {
        let err: AppError = anyhow::anyhow!("upstream unreachable").into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "upstream unreachable");
    }

    #[tokio::test]
    async fn config_error_message_survives_conversion() {
        let app_err: AppError = ConfigError::InvalidHeader("bad header".into()).into();
        let response = app_err.into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            json["error"].as_str().unwrap().contains("bad header"),
            "error text not propagated: {:?}",
            json
        );
    }

    #[test]
    fn read_error_keeps_io_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("/nope.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file missing"),
        };
        assert_eq!(err.to_string(), "reading /nope.toml");
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert!(source.to_string().contains("file missing"));
    }
}
