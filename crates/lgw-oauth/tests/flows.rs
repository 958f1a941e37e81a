// SPDX-License-Identifier: MIT OR Apache-2.0
//! OAuth grant flows against a mock identity provider.

use chrono::Utc;
use lgw_config::VendorCredentials;
use lgw_core::{ConsentToken, Provider};
use lgw_error::ErrorCode;
use lgw_oauth::OAuthDriver;
use lgw_retry::RetryPolicy;
use lgw_vendor::ReqwestTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn creds() -> VendorCredentials {
    VendorCredentials {
        client_id: "client-1".into(),
        client_secret: Some("secret".into()),
        redirect_uri: Some("https://example.test/callback".into()),
    }
}

fn driver(provider: Provider, token_url: String) -> OAuthDriver {
    OAuthDriver::new(
        Arc::new(ReqwestTransport::new()),
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        Duration::from_secs(5),
    )
    .with_token_url(provider, token_url)
}

fn stored_token(provider: Provider, refresh: Option<&str>) -> ConsentToken {
    ConsentToken {
        consent_id: Uuid::new_v4(),
        provider,
        access_token: "old-access".into(),
        refresh_token: refresh.map(str::to_owned),
        token_expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
        company_id: None,
        scopes: None,
        encrypted_at: None,
    }
}

#[tokio::test]
async fn code_exchange_posts_form_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header_exists("Authorization"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let d = driver(Provider::Fortnox, format!("{}/token", server.uri()));
    let bundle = d
        .exchange_code(Provider::Fortnox, &creds(), "abc123")
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "A1");
    assert_eq!(bundle.refresh_token.as_deref(), Some("R1"));
    assert!(bundle.token_expires_at.is_some());
}

#[tokio::test]
async fn refresh_uses_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let d = driver(Provider::Fortnox, format!("{}/token", server.uri()));
    let bundle = d
        .refresh_tokens(
            Provider::Fortnox,
            &creds(),
            &stored_token(Provider::Fortnox, Some("R0")),
        )
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "A2");
    assert_eq!(bundle.refresh_token.as_deref(), Some("R2"));
}

#[tokio::test]
async fn refresh_without_refresh_token_requires_reauthorization() {
    let server = MockServer::start().await;
    let d = driver(Provider::Fortnox, format!("{}/token", server.uri()));
    let err = d
        .refresh_tokens(
            Provider::Fortnox,
            &creds(),
            &stored_token(Provider::Fortnox, None),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenRefreshFailed);
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn bjornlunden_refresh_is_a_fresh_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "BL1",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    let d = driver(Provider::Bjornlunden, format!("{}/token", server.uri()));
    let bundle = d
        .refresh_tokens(
            Provider::Bjornlunden,
            &creds(),
            &stored_token(Provider::Bjornlunden, None),
        )
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "BL1");
    assert!(bundle.refresh_token.is_none());
}

#[tokio::test]
async fn bokio_refresh_is_a_no_op() {
    let server = MockServer::start().await;
    // No mock mounted: a network call would fail the test.
    let d = driver(Provider::Bokio, format!("{}/token", server.uri()));
    let stored = ConsentToken {
        token_expires_at: None,
        ..stored_token(Provider::Bokio, None)
    };
    let bundle = d
        .refresh_tokens(Provider::Bokio, &creds(), &stored)
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "old-access");
    assert!(bundle.token_expires_at.is_none());
}

#[tokio::test]
async fn token_endpoint_5xx_is_retried() {
    struct Flaky(std::sync::atomic::AtomicU32);
    impl wiremock::Respond for Flaky {
        fn respond(&self, _: &wiremock::Request) -> ResponseTemplate {
            if self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                ResponseTemplate::new(502)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "A3"}))
            }
        }
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(Flaky(std::sync::atomic::AtomicU32::new(0)))
        .expect(2)
        .mount(&server)
        .await;

    let d = driver(Provider::Visma, format!("{}/token", server.uri()));
    let bundle = d
        .refresh_tokens(
            Provider::Visma,
            &creds(),
            &stored_token(Provider::Visma, Some("R0")),
        )
        .await
        .unwrap();
    assert_eq!(bundle.access_token, "A3");
}

#[tokio::test]
async fn token_endpoint_401_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
        .expect(1)
        .mount(&server)
        .await;

    let d = driver(Provider::Fortnox, format!("{}/token", server.uri()));
    let err = d
        .exchange_code(Provider::Fortnox, &creds(), "code")
        .await
        .unwrap_err();
    assert_eq!(err.upstream_status(), Some(401));
}
