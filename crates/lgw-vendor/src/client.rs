// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-vendor HTTP client.

use crate::page::{PaginationDialect, RawPage};
use crate::transport::{TransportRequest, VendorTransport};
use lgw_core::{ListQuery, Provider};
use lgw_error::{ErrorCode, GatewayError};
use lgw_ratelimit::TokenBucket;
use lgw_retry::{RetryPolicy, http_should_retry, retry_with_policy};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Production endpoint for a vendor.
pub fn default_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Fortnox => "https://api.fortnox.se/3",
        Provider::Visma => "https://eaccountingapi.vismaonline.com/v2",
        Provider::Briox => "https://api.briox.se/v1",
        Provider::Bokio => "https://api.bokio.se/v1",
        Provider::Bjornlunden => "https://apigateway.bjornlunden.se/v1",
        Provider::SieUpload => "",
    }
}

/// Decrypted credentials for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredentials {
    /// Bearer token (or static API token).
    pub access_token: String,
    /// Vendor-scoped company identifier: Bokio company id, Björn Lundén
    /// user key.
    pub company_id: Option<String>,
    /// OAuth client id, sent as a header by Briox.
    pub client_id: Option<String>,
}

impl AccessCredentials {
    /// Credentials carrying only a bearer token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            company_id: None,
            client_id: None,
        }
    }
}

/// HTTP client for one vendor.
///
/// Every request acquires a token from the vendor's bucket and runs under
/// the shared retry driver with the standard classification (retry 429 and
/// 5xx, never 401/403/404, never decode errors).
pub struct VendorClient {
    provider: Provider,
    base_url: String,
    dialect: PaginationDialect,
    transport: Arc<dyn VendorTransport>,
    bucket: TokenBucket,
    retry: RetryPolicy,
    timeout: Duration,
}

impl VendorClient {
    /// Build a client for `provider` against `base_url`.
    pub fn new(
        provider: Provider,
        base_url: impl Into<String>,
        transport: Arc<dyn VendorTransport>,
        bucket: TokenBucket,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            dialect: PaginationDialect::for_provider(provider),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            transport,
            bucket,
            retry,
            timeout,
        }
    }

    /// The vendor this client talks to.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The vendor's pagination dialect.
    pub fn dialect(&self) -> PaginationDialect {
        self.dialect
    }

    // -- Request plumbing -------------------------------------------------

    fn headers(&self, credentials: &AccessCredentials) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                "Authorization".to_owned(),
                format!("Bearer {}", credentials.access_token),
            ),
            ("Accept".to_owned(), "application/json".to_owned()),
        ];
        match self.provider {
            Provider::Briox => {
                if let Some(client_id) = &credentials.client_id {
                    headers.push(("clientId".to_owned(), client_id.clone()));
                }
            }
            Provider::Bjornlunden => {
                if let Some(user_key) = &credentials.company_id {
                    headers.push(("User-Key".to_owned(), user_key.clone()));
                }
            }
            _ => {}
        }
        headers
    }

    fn url(
        &self,
        credentials: &AccessCredentials,
        path: &str,
        params: &[(String, String)],
    ) -> String {
        let mut url = self.base_url.clone();
        // Bokio scopes every resource under the company.
        if self.provider == Provider::Bokio {
            if let Some(company_id) = &credentials.company_id {
                url.push_str("/companies/");
                url.push_str(company_id);
            }
        }
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if !params.is_empty() {
            url.push('?');
            let encoded: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect();
            url.push_str(&encoded.join("&"));
        }
        url
    }

    async fn execute(
        &self,
        credentials: &AccessCredentials,
        method: &'static str,
        path: &str,
        params: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.url(credentials, path, params);
        let mut headers = self.headers(credentials);
        if body.is_some() {
            headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        }

        retry_with_policy(
            self.retry,
            |err: &GatewayError| match err.code {
                ErrorCode::UpstreamStatus => http_should_retry(err.upstream_status()),
                _ => false,
            },
            || {
                let request = TransportRequest {
                    method,
                    url: url.clone(),
                    headers: headers.clone(),
                    body: body.clone(),
                    timeout: self.timeout,
                };
                async move {
                    self.bucket.acquire().await;
                    let response = self.transport.execute(request).await?;
                    if response.is_success() {
                        Ok(response.body)
                    } else {
                        Err(GatewayError::upstream(response.status, response.body_text())
                            .with_context("vendor", self.provider.as_str()))
                    }
                }
            },
        )
        .await
    }

    fn decode_json(&self, body: &[u8]) -> Result<Value, GatewayError> {
        serde_json::from_slice(body).map_err(|e| {
            GatewayError::new(ErrorCode::UpstreamDecode, "vendor returned invalid JSON")
                .with_context("vendor", self.provider.as_str())
                .with_source(e)
        })
    }

    // -- Public surface ---------------------------------------------------

    /// Single GET returning the raw JSON value.
    pub async fn get_value(
        &self,
        credentials: &AccessCredentials,
        path: &str,
    ) -> Result<Value, GatewayError> {
        let body = self.execute(credentials, "GET", path, &[], None).await?;
        self.decode_json(&body)
    }

    /// Single GET deserialized into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        credentials: &AccessCredentials,
        path: &str,
    ) -> Result<T, GatewayError> {
        let value = self.get_value(credentials, path).await?;
        serde_json::from_value(value).map_err(|e| {
            GatewayError::new(ErrorCode::UpstreamDecode, "vendor payload shape mismatch")
                .with_context("vendor", self.provider.as_str())
                .with_source(e)
        })
    }

    /// Single GET returning the raw body bytes (SIE exports).
    pub async fn get_binary(
        &self,
        credentials: &AccessCredentials,
        path: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        self.execute(credentials, "GET", path, &[], None).await
    }

    /// One page, with paging translated into the vendor's dialect.
    pub async fn get_page(
        &self,
        credentials: &AccessCredentials,
        path: &str,
        list_key: Option<&str>,
        query: &ListQuery,
    ) -> Result<RawPage, GatewayError> {
        let params = self.dialect.page_params(query);
        let body = self.execute(credentials, "GET", path, &params, None).await?;
        let value = self.decode_json(&body)?;
        self.dialect.parse_page(&value, list_key, query)
    }

    /// Loop [`Self::get_page`] until exhausted and concatenate the items.
    pub async fn get_all(
        &self,
        credentials: &AccessCredentials,
        path: &str,
        list_key: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<Value>, GatewayError> {
        const MAX_PAGES: u32 = 500;
        let mut out = Vec::new();
        let mut page_query = query.clone();
        page_query.page = 1;
        loop {
            let page = self
                .get_page(credentials, path, list_key, &page_query)
                .await?;
            let fetched = page.items.len();
            out.extend(page.items);
            if !page.has_more || fetched == 0 {
                break;
            }
            page_query.page += 1;
            if page_query.page > MAX_PAGES {
                warn!(
                    vendor = %self.provider,
                    path,
                    "aborting pagination after {MAX_PAGES} pages"
                );
                break;
            }
        }
        Ok(out)
    }

    /// POST a JSON body, for vendors that permit writes.
    pub async fn post(
        &self,
        credentials: &AccessCredentials,
        path: &str,
        body: &Value,
    ) -> Result<Value, GatewayError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| GatewayError::internal("failed to encode request body").with_source(e))?;
        let response = self
            .execute(credentials, "POST", path, &[], Some(bytes))
            .await?;
        self.decode_json(&response)
    }
}

/// Percent-encode one query component.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> VendorClient {
        VendorClient::new(
            provider,
            "https://api.example.test/v1/",
            Arc::new(crate::transport::ReqwestTransport::new()),
            TokenBucket::new(100, Duration::from_secs(1)),
            RetryPolicy::default(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn bearer_header_always_present() {
        let c = client(Provider::Fortnox);
        let headers = c.headers(&AccessCredentials::bearer("T"));
        assert!(headers.contains(&("Authorization".into(), "Bearer T".into())));
    }

    #[test]
    fn briox_adds_client_id_header() {
        let c = client(Provider::Briox);
        let creds = AccessCredentials {
            access_token: "T".into(),
            company_id: None,
            client_id: Some("my-client".into()),
        };
        let headers = c.headers(&creds);
        assert!(headers.contains(&("clientId".into(), "my-client".into())));
    }

    #[test]
    fn bjornlunden_adds_user_key_header() {
        let c = client(Provider::Bjornlunden);
        let creds = AccessCredentials {
            access_token: "T".into(),
            company_id: Some("user-key-1".into()),
            client_id: None,
        };
        let headers = c.headers(&creds);
        assert!(headers.contains(&("User-Key".into(), "user-key-1".into())));
    }

    #[test]
    fn bokio_paths_are_company_scoped() {
        let c = client(Provider::Bokio);
        let creds = AccessCredentials {
            access_token: "T".into(),
            company_id: Some("C-42".into()),
            client_id: None,
        };
        let url = c.url(&creds, "/invoices", &[]);
        assert_eq!(url, "https://api.example.test/v1/companies/C-42/invoices");
    }

    #[test]
    fn query_params_are_encoded() {
        let c = client(Provider::Fortnox);
        let url = c.url(
            &AccessCredentials::bearer("T"),
            "/invoices",
            &[("lastmodified".into(), "2024-03-01 10:30".into())],
        );
        assert!(url.ends_with("/invoices?lastmodified=2024-03-01%2010%3A30"));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let c = client(Provider::Visma);
        let url = c.url(&AccessCredentials::bearer("T"), "customers", &[]);
        assert_eq!(url, "https://api.example.test/v1/customers");
    }

    #[test]
    fn default_base_urls_are_https() {
        for p in [
            Provider::Fortnox,
            Provider::Visma,
            Provider::Briox,
            Provider::Bokio,
            Provider::Bjornlunden,
        ] {
            assert!(default_base_url(p).starts_with("https://"));
        }
    }
}
