// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-vendor OAuth flows.
//!
//! Three credential flavors:
//!
//! - Authorization-code with refresh tokens (Fortnox, Visma, Briox): the
//!   driver builds the authorize URL, exchanges the callback code, and
//!   refreshes with the refresh-token grant.
//! - Client-credentials (Björn Lundén): there is no refresh token; a
//!   "refresh" is a fresh grant.
//! - Static token (Bokio): tokens never expire and refresh is a no-op.
//!
//! Token-endpoint calls run under the shared retry driver with the
//! standard classification, so a 5xx from the identity provider retries
//! while 401/403 surface immediately.

#![deny(unsafe_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lgw_config::VendorCredentials;
use lgw_core::{AuthFlow, ConsentToken, Provider};
use lgw_error::{ErrorCode, GatewayError};
use lgw_retry::{RetryPolicy, http_should_retry, retry_with_policy};
use lgw_vendor::{TransportRequest, VendorTransport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ---------------------------------------------------------------------------
// TokenBundle
// ---------------------------------------------------------------------------

/// The outcome of a token-endpoint call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    /// Access token.
    pub access_token: String,
    /// Refresh token, where the grant returns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Computed absolute expiry from `expires_in`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl TokenBundle {
    fn from_response(body: &Value, now: DateTime<Utc>) -> Result<Self, GatewayError> {
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::new(
                    ErrorCode::UpstreamDecode,
                    "token response missing access_token",
                )
            })?
            .to_owned();
        let token_expires_at = body
            .get("expires_in")
            .and_then(Value::as_i64)
            .map(|secs| now + ChronoDuration::seconds(secs));
        let scopes = body.get("scope").and_then(Value::as_str).map(|s| {
            s.split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<String>>()
        });
        Ok(Self {
            access_token,
            refresh_token: body
                .get("refresh_token")
                .and_then(Value::as_str)
                .map(str::to_owned),
            token_expires_at,
            scopes,
        })
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// The production authorize endpoint for an authorization-code vendor.
fn default_authorize_url(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Fortnox => Some("https://apps.fortnox.se/oauth-v1/auth"),
        Provider::Visma => Some("https://identity.vismaonline.com/connect/authorize"),
        Provider::Briox => Some("https://apps.briox.se/oauth/authorize"),
        _ => None,
    }
}

/// The production token endpoint for a vendor with a token grant.
fn default_token_url(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Fortnox => Some("https://apps.fortnox.se/oauth-v1/token"),
        Provider::Visma => Some("https://identity.vismaonline.com/connect/token"),
        Provider::Briox => Some("https://apps.briox.se/oauth/token"),
        Provider::Bjornlunden => Some("https://apigateway.bjornlunden.se/token"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// OAuthDriver
// ---------------------------------------------------------------------------

/// Executes the vendor OAuth flows over the shared transport.
pub struct OAuthDriver {
    transport: Arc<dyn VendorTransport>,
    retry: RetryPolicy,
    timeout: Duration,
    token_url_overrides: HashMap<Provider, String>,
}

impl OAuthDriver {
    /// Build against the production endpoints.
    pub fn new(transport: Arc<dyn VendorTransport>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            retry,
            timeout,
            token_url_overrides: HashMap::new(),
        }
    }

    /// Override a vendor's token endpoint (tests, staging).
    pub fn with_token_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        self.token_url_overrides.insert(provider, url.into());
        self
    }

    fn token_url(&self, provider: Provider) -> Result<String, GatewayError> {
        if let Some(url) = self.token_url_overrides.get(&provider) {
            return Ok(url.clone());
        }
        default_token_url(provider)
            .map(str::to_owned)
            .ok_or_else(|| {
                GatewayError::new(
                    ErrorCode::ResourceNotSupported,
                    format!("vendor '{provider}' has no token endpoint"),
                )
            })
    }

    // -- Authorize URL ----------------------------------------------------

    /// Build the end-user authorization URL.
    ///
    /// Only authorization-code vendors have one; the rest answer
    /// *not-supported*.
    pub fn authorize_url(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        state: &str,
        scopes: &str,
    ) -> Result<String, GatewayError> {
        let base = default_authorize_url(provider).ok_or_else(|| {
            GatewayError::new(
                ErrorCode::ResourceNotSupported,
                format!("vendor '{provider}' does not use an authorization URL"),
            )
        })?;
        let redirect_uri = credentials.redirect_uri.as_deref().ok_or_else(|| {
            GatewayError::new(
                ErrorCode::VendorNotConfigured,
                format!("no redirect URI configured for '{provider}'"),
            )
        })?;
        Ok(format!(
            "{base}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code&access_type=offline",
            form_encode(&credentials.client_id),
            form_encode(redirect_uri),
            form_encode(scopes),
            form_encode(state),
        ))
    }

    // -- Grants -----------------------------------------------------------

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        code: &str,
    ) -> Result<TokenBundle, GatewayError> {
        let mut form = vec![
            ("grant_type".to_owned(), "authorization_code".to_owned()),
            ("code".to_owned(), code.to_owned()),
        ];
        if let Some(redirect_uri) = &credentials.redirect_uri {
            form.push(("redirect_uri".to_owned(), redirect_uri.clone()));
        }
        self.token_request(provider, credentials, form).await
    }

    /// Refresh with the refresh-token grant.
    pub async fn refresh_grant(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        refresh_token: &str,
    ) -> Result<TokenBundle, GatewayError> {
        let form = vec![
            ("grant_type".to_owned(), "refresh_token".to_owned()),
            ("refresh_token".to_owned(), refresh_token.to_owned()),
        ];
        self.token_request(provider, credentials, form).await
    }

    /// A fresh client-credentials grant (Björn Lundén).
    pub async fn client_credentials_grant(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
    ) -> Result<TokenBundle, GatewayError> {
        let form = vec![("grant_type".to_owned(), "client_credentials".to_owned())];
        self.token_request(provider, credentials, form).await
    }

    /// Refresh stored tokens according to the vendor's credential flavor.
    ///
    /// Authorization-code vendors need the stored refresh token; for
    /// client-credentials vendors the refresh is a fresh grant; static
    /// tokens come back unchanged.
    pub async fn refresh_tokens(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        stored: &ConsentToken,
    ) -> Result<TokenBundle, GatewayError> {
        match provider.auth_flow() {
            AuthFlow::AuthorizationCode => {
                let refresh_token = stored.refresh_token.as_deref().ok_or_else(|| {
                    GatewayError::new(
                        ErrorCode::TokenRefreshFailed,
                        "no refresh token stored; re-authorization required",
                    )
                })?;
                self.refresh_grant(provider, credentials, refresh_token).await
            }
            AuthFlow::ClientCredentials => {
                self.client_credentials_grant(provider, credentials).await
            }
            AuthFlow::StaticToken | AuthFlow::None => Ok(TokenBundle {
                access_token: stored.access_token.clone(),
                refresh_token: stored.refresh_token.clone(),
                token_expires_at: None,
                scopes: stored.scopes.clone(),
            }),
        }
    }

    /// Revoke a token at the vendor, where a revoke endpoint exists.
    ///
    /// Vendors without one make this a local no-op; the consent transition
    /// is what actually cuts access through the gateway.
    pub async fn revoke(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        token: &str,
    ) -> Result<(), GatewayError> {
        let Ok(token_url) = self.token_url(provider) else {
            return Ok(());
        };
        let revoke_url = token_url.replace("/token", "/revoke");
        let form = vec![("token".to_owned(), token.to_owned())];
        // Best effort: revoke endpoints are flaky across vendors and the
        // consent state machine is authoritative.
        match self.post_form(provider, credentials, &revoke_url, form).await {
            Ok(_) => Ok(()),
            Err(err) if err.upstream_status() == Some(404) => Ok(()),
            Err(err) => Err(err),
        }
    }

    // -- Plumbing ----------------------------------------------------------

    async fn token_request(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        form: Vec<(String, String)>,
    ) -> Result<TokenBundle, GatewayError> {
        let url = self.token_url(provider)?;
        let body = self.post_form(provider, credentials, &url, form).await?;
        let bundle = TokenBundle::from_response(&body, Utc::now())?;
        info!(vendor = %provider, "token grant succeeded");
        Ok(bundle)
    }

    async fn post_form(
        &self,
        provider: Provider,
        credentials: &VendorCredentials,
        url: &str,
        form: Vec<(String, String)>,
    ) -> Result<Value, GatewayError> {
        let encoded: Vec<String> = form
            .iter()
            .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
            .collect();
        let body = encoded.join("&").into_bytes();

        let basic = BASE64.encode(format!(
            "{}:{}",
            credentials.client_id,
            credentials.client_secret.as_deref().unwrap_or_default()
        ));
        let headers = vec![
            ("Authorization".to_owned(), format!("Basic {basic}")),
            (
                "Content-Type".to_owned(),
                "application/x-www-form-urlencoded".to_owned(),
            ),
            ("Accept".to_owned(), "application/json".to_owned()),
        ];

        let response = retry_with_policy(
            self.retry,
            |err: &GatewayError| match err.code {
                ErrorCode::UpstreamStatus => http_should_retry(err.upstream_status()),
                _ => false,
            },
            || {
                let request = TransportRequest {
                    method: "POST",
                    url: url.to_owned(),
                    headers: headers.clone(),
                    body: Some(body.clone()),
                    timeout: self.timeout,
                };
                async {
                    let response = self.transport.execute(request).await?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(GatewayError::upstream(response.status, response.body_text())
                            .with_context("vendor", provider.as_str()))
                    }
                }
            },
        )
        .await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            GatewayError::new(ErrorCode::UpstreamDecode, "token endpoint returned invalid JSON")
                .with_source(e)
        })
    }
}

/// Percent-encode one form component.
fn form_encode(s: &str) -> String {
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
    use serde_json::json;

    fn creds() -> VendorCredentials {
        VendorCredentials {
            client_id: "client-1".into(),
            client_secret: Some("secret".into()),
            redirect_uri: Some("https://example.test/callback".into()),
        }
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let driver = OAuthDriver::new(
            Arc::new(lgw_vendor::ReqwestTransport::new()),
            RetryPolicy::default(),
            Duration::from_secs(5),
        );
        let url = driver
            .authorize_url(Provider::Fortnox, &creds(), "state-1", "bookkeeping")
            .unwrap();
        assert!(url.starts_with("https://apps.fortnox.se/oauth-v1/auth?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=state-1"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.test%2Fcallback"));
    }

    #[test]
    fn authorize_url_not_applicable_for_client_credentials_vendors() {
        let driver = OAuthDriver::new(
            Arc::new(lgw_vendor::ReqwestTransport::new()),
            RetryPolicy::default(),
            Duration::from_secs(5),
        );
        for provider in [Provider::Bokio, Provider::Bjornlunden] {
            let err = driver
                .authorize_url(provider, &creds(), "s", "scope")
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ResourceNotSupported);
        }
    }

    #[test]
    fn token_bundle_parses_expiry_and_scopes() {
        let now = Utc::now();
        let bundle = TokenBundle::from_response(
            &json!({
                "access_token": "A",
                "refresh_token": "R",
                "expires_in": 3600,
                "scope": "bookkeeping companyinformation"
            }),
            now,
        )
        .unwrap();
        assert_eq!(bundle.access_token, "A");
        assert_eq!(bundle.refresh_token.as_deref(), Some("R"));
        assert_eq!(
            bundle.token_expires_at,
            Some(now + ChronoDuration::seconds(3600))
        );
        assert_eq!(
            bundle.scopes,
            Some(vec!["bookkeeping".to_owned(), "companyinformation".to_owned()])
        );
    }

    #[test]
    fn token_bundle_requires_access_token() {
        let err = TokenBundle::from_response(&json!({"expires_in": 60}), Utc::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamDecode);
    }

    #[test]
    fn form_encoding() {
        assert_eq!(form_encode("a b&c"), "a%20b%26c");
        assert_eq!(form_encode("plain-value_1.0~x"), "plain-value_1.0~x");
    }
}
