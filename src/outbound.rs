//! Forwarding the identifier to downstream services.
//!
//! A service that calls another service should send the same identifier it
//! received, so both hops log under one ID:
//!
//! ```rust,ignore
//! async fn handler(Extension(id): Extension<CorrelationId>, State(client): State<reqwest::Client>) {
//!     client.get(url).correlated(&id).send().await?;
//! }
//! ```

use reqwest::RequestBuilder;

use crate::{id::CorrelationId, propagate::header_value};

/// Adds the correlation header to an outgoing `reqwest` request.
pub trait CorrelationExt {
    /// Set the header named by the id's key. Values that cannot be encoded
    /// as a header are skipped.
    fn correlated(self, id: &CorrelationId) -> Self;
}

impl CorrelationExt for RequestBuilder {
    fn correlated(self, id: &CorrelationId) -> Self {
        match header_value(id) {
            Some(value) => self.header(id.key().clone(), value),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderName;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn forwards_header_to_downstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/downstream"))
            .and(header("trace-id", "abc-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let id = CorrelationId::new(HeaderName::from_static("trace-id"), "abc-123");
        let resp = reqwest::Client::new()
            .get(format!("{}/downstream", server.uri()))
            .correlated(&id)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn unencodable_value_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let id = CorrelationId::new(HeaderName::from_static("x-correlation-id"), "a\nb");
        let resp = reqwest::Client::new()
            .get(server.uri())
            .correlated(&id)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("x-correlation-id"));
    }
}
