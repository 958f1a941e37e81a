// SPDX-License-Identifier: MIT OR Apache-2.0
//! The pluggable outbound-HTTP seam.

use async_trait::async_trait;
use lgw_error::{ErrorCode, GatewayError};
use std::time::Duration;

/// One outbound request, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method (`GET` or `POST`).
    pub method: &'static str,
    /// Absolute URL including query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body, for `POST`.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// A raw response: status plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes outbound vendor requests.
///
/// Implementations return `Err` only for transport-level failures (connect,
/// TLS, timeout); a served non-2xx response is an `Ok` response that the
/// caller classifies.  This is the interface point the Björn Lundén TLS
/// contract requires: an alternate executor (an out-of-process curl
/// runner, say) implements this trait and nothing above the seam changes.
#[async_trait]
pub trait VendorTransport: Send + Sync {
    /// Perform the request.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, GatewayError>;
}

/// Default transport over a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VendorTransport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, GatewayError> {
        let mut builder = match request.method {
            "POST" => self.client.post(&request.url),
            _ => self.client.get(&request.url),
        };
        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            GatewayError::new(ErrorCode::UpstreamStatus, "transport failure")
                .with_context("url", &request.url)
                .with_source(e)
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                GatewayError::new(ErrorCode::UpstreamStatus, "failed reading response body")
                    .with_source(e)
            })?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_classification() {
        let ok = TransportResponse {
            status: 204,
            body: vec![],
        };
        assert!(ok.is_success());
        let not_found = TransportResponse {
            status: 404,
            body: b"missing".to_vec(),
        };
        assert!(!not_found.is_success());
        assert_eq!(not_found.body_text(), "missing");
    }
}
