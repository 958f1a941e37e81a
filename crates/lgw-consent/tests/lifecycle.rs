// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent lifecycle end to end: create → OTC → exchange → accepted, ETag
//! concurrency, single-use codes, tenant isolation, SIE uploads, the
//! on-path refresh, and the sweeps.

use chrono::{Duration, Utc};
use lgw_config::GatewayConfig;
use lgw_consent::{
    ConsentService, CreateConsentRequest, ExchangeTokenRequest, PatchConsentRequest,
};
use lgw_core::{ConsentStatus, Provider};
use lgw_error::ErrorCode;
use lgw_oauth::OAuthDriver;
use lgw_retry::RetryPolicy;
use lgw_store::{ConsentFilter, DatabaseAdapter, MemoryStore};
use lgw_vault::TokenVault;
use lgw_vendor::ReqwestTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn config(extra: &[(&str, &str)]) -> Arc<GatewayConfig> {
    let mut pairs = vec![
        ("LGW_DATABASE_URL".to_owned(), "memory".to_owned()),
        ("LGW_TOKEN_ENCRYPTION_KEY".to_owned(), KEY.to_owned()),
        ("FORTNOX_CLIENT_ID".to_owned(), "fx".to_owned()),
        ("FORTNOX_CLIENT_SECRET".to_owned(), "fx-secret".to_owned()),
    ];
    for (k, v) in extra {
        pairs.push((k.to_string(), v.to_string()));
    }
    Arc::new(
        GatewayConfig::from_lookup(|name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
        .unwrap(),
    )
}

fn service_with(
    store: Arc<MemoryStore>,
    config: Arc<GatewayConfig>,
    token_url: Option<(Provider, String)>,
) -> ConsentService {
    let mut oauth = OAuthDriver::new(
        Arc::new(ReqwestTransport::new()),
        RetryPolicy {
            max_attempts: 2,
            initial_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(2),
        },
        StdDuration::from_secs(5),
    );
    if let Some((provider, url)) = token_url {
        oauth = oauth.with_token_url(provider, url);
    }
    ConsentService::new(
        store,
        Arc::new(TokenVault::from_key_hex(Some(KEY)).unwrap()),
        Arc::new(oauth),
        config,
    )
}

fn service(store: Arc<MemoryStore>) -> ConsentService {
    service_with(store, config(&[]), None)
}

fn create_request() -> CreateConsentRequest {
    CreateConsentRequest {
        name: "X".into(),
        provider: Provider::Fortnox,
        org_number: None,
        company_name: None,
        expires_at: None,
    }
}

#[tokio::test]
async fn create_accept_flow() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));

    // Create: status starts at 0.
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    assert_eq!(consent.status, ConsentStatus::Created);

    // OTC: 16 hex chars.
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();
    assert_eq!(otc.code.len(), 16);

    // Exchange: stores tokens and transitions to Accepted.
    let accepted = svc
        .exchange_token(ExchangeTokenRequest {
            code: otc.code.clone(),
            consent_id: consent.id,
            provider: Provider::Fortnox,
            access_token: "T".into(),
            refresh_token: Some("R".into()),
            expires_in: Some(3600),
            scopes: None,
            company_id: None,
        })
        .await
        .unwrap();
    assert_eq!(accepted.status, ConsentStatus::Accepted);
    assert_ne!(accepted.etag, consent.etag);

    // Tokens are ciphered at rest.
    let at_rest = store.get_consent_tokens(consent.id).await.unwrap().unwrap();
    assert_ne!(at_rest.access_token, "T");
    assert!(at_rest.encrypted_at.is_some());

    // Follow-up read sees status 1.
    let read = svc.get("tenant-a", consent.id).await.unwrap();
    assert_eq!(read.status, ConsentStatus::Accepted);
}

#[tokio::test]
async fn stale_if_match_is_rejected_and_does_not_persist() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();

    // A successful patch regenerates the etag, making the old one stale.
    let patched = svc
        .patch(
            "tenant-a",
            consent.id,
            Some(&consent.etag),
            PatchConsentRequest {
                company_name: Some("Bolaget AB".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(patched.etag, consent.etag);

    let err = svc
        .patch(
            "tenant-a",
            consent.id,
            Some(&consent.etag),
            PatchConsentRequest {
                name: Some("Y".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EtagMismatch);
    assert_eq!(err.http_status(), 412);

    // The rejected write did not land.
    let read = svc.get("tenant-a", consent.id).await.unwrap();
    assert_eq!(read.name, "X");
}

#[tokio::test]
async fn otc_is_single_use_across_the_accept_path() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();

    let exchange = ExchangeTokenRequest {
        code: otc.code.clone(),
        consent_id: consent.id,
        provider: Provider::Fortnox,
        access_token: "T".into(),
        refresh_token: None,
        expires_in: None,
        scopes: None,
        company_id: None,
    };
    svc.exchange_token(exchange.clone()).await.unwrap();

    // The same code a second time fails as auth.
    let err = svc.exchange_token(exchange).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OtcInvalid);
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn mismatched_consent_id_is_a_validation_error() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let other = svc.create("tenant-a", create_request()).await.unwrap();
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();

    let err = svc
        .exchange_token(ExchangeTokenRequest {
            code: otc.code,
            consent_id: other.id,
            provider: Provider::Fortnox,
            access_token: "T".into(),
            refresh_token: None,
            expires_in: None,
            scopes: None,
            company_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn cross_tenant_access_reads_as_not_found() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();

    let err = svc.get("tenant-b", consent.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.http_status(), 404);

    let err = svc.delete("tenant-b", consent.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // Listing is tenant-scoped.
    assert!(svc.list("tenant-b", ConsentFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn resolver_rejects_unaccepted_consents() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();

    let err = svc
        .resolve_credentials("tenant-a", consent.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConsentNotAccepted);
    assert_eq!(err.http_status(), 403);
}

#[tokio::test]
async fn resolver_returns_plaintext_credentials() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();
    svc.exchange_token(ExchangeTokenRequest {
        code: otc.code,
        consent_id: consent.id,
        provider: Provider::Fortnox,
        access_token: "plain-T".into(),
        refresh_token: Some("R".into()),
        expires_in: Some(3600),
        scopes: None,
        company_id: None,
    })
    .await
    .unwrap();

    let access = svc
        .resolve_credentials("tenant-a", consent.id, None)
        .await
        .unwrap();
    assert_eq!(access.token.access_token, "plain-T");
    assert_eq!(access.consent.status, ConsentStatus::Accepted);
}

#[tokio::test]
async fn resolver_refreshes_expired_tokens_on_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-T",
            "refresh_token": "fresh-R",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        Arc::clone(&store),
        config(&[]),
        Some((Provider::Fortnox, format!("{}/token", server.uri()))),
    );
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();
    // Already-expired token with a refresh token.
    svc.exchange_token(ExchangeTokenRequest {
        code: otc.code,
        consent_id: consent.id,
        provider: Provider::Fortnox,
        access_token: "stale-T".into(),
        refresh_token: Some("R0".into()),
        expires_in: Some(-60),
        scopes: None,
        company_id: None,
    })
    .await
    .unwrap();

    let access = svc
        .resolve_credentials("tenant-a", consent.id, None)
        .await
        .unwrap();
    assert_eq!(access.token.access_token, "fresh-T");
    // The refreshed pair was persisted ciphered.
    let at_rest = store.get_consent_tokens(consent.id).await.unwrap().unwrap();
    assert_ne!(at_rest.access_token, "fresh-T");
}

#[tokio::test]
async fn bearer_fallback_only_in_self_hosted_mode() {
    // Hosted: no fallback.
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    svc.patch(
        "tenant-a",
        consent.id,
        None,
        PatchConsentRequest {
            status: Some(ConsentStatus::Accepted),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let err = svc
        .resolve_credentials("tenant-a", consent.id, Some("raw-bearer"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenMissing);

    // Self-hosted: the bearer is accepted.
    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        Arc::clone(&store),
        config(&[("LGW_MODE", "self_hosted")]),
        None,
    );
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    svc.patch(
        "tenant-a",
        consent.id,
        None,
        PatchConsentRequest {
            status: Some(ConsentStatus::Accepted),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let access = svc
        .resolve_credentials("tenant-a", consent.id, Some("raw-bearer"))
        .await
        .unwrap();
    assert_eq!(access.token.access_token, "raw-bearer");
}

#[tokio::test]
async fn sie_upload_populates_company_and_accepts() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc
        .create(
            "tenant-a",
            CreateConsentRequest {
                name: "Upload".into(),
                provider: Provider::SieUpload,
                org_number: None,
                company_name: None,
                expires_at: None,
            },
        )
        .await
        .unwrap();

    let sie = "#FNAMN \"Uppladdat AB\"\n#ORGNR 556000-2222\n#SIETYP 4\n#RAR 0 20240101 20241231\n#UB 0 1930 100.00\n#RES 0 3001 -100.00\n";
    let uploads = svc
        .sie_upload(
            "tenant-a",
            consent.id,
            vec![(Some("2024.se".into()), sie.as_bytes().to_vec())],
        )
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].fiscal_year, 2024);

    let read = svc.get("tenant-a", consent.id).await.unwrap();
    assert_eq!(read.status, ConsentStatus::Accepted);
    assert_eq!(read.company_name.as_deref(), Some("Uppladdat AB"));
    assert_eq!(read.org_number.as_deref(), Some("556000-2222"));

    // Full payload is readable back with KPIs attached.
    let record = svc
        .get_sie_data("tenant-a", consent.id, uploads[0].upload_id)
        .await
        .unwrap();
    assert_eq!(record.kpis.net_sales, 100.0);
    assert!(record.raw_content.contains("#FNAMN"));
}

#[tokio::test]
async fn sie_upload_rejected_for_api_consents() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let err = svc
        .sie_upload("tenant-a", consent.id, vec![(None, b"#FNAMN \"X\"".to_vec())])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn purge_and_inactivity_sweeps() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::clone(&store));

    // Fresh Created consent survives the purge.
    let fresh = svc.create("tenant-a", create_request()).await.unwrap();
    // Aged Created consent gets purged.
    let mut aged = svc.create("tenant-a", create_request()).await.unwrap();
    aged.created_at = Utc::now() - Duration::days(31);
    store.upsert_consent(aged.clone()).await.unwrap();
    // Old Accepted consent goes inactive, then ages out.
    let mut dormant = svc.create("tenant-a", create_request()).await.unwrap();
    dormant.status = ConsentStatus::Accepted;
    dormant.updated_at = Utc::now() - Duration::days(200);
    store.upsert_consent(dormant.clone()).await.unwrap();

    let marked = svc.mark_inactive_consents(Utc::now()).await.unwrap();
    assert_eq!(marked, 1);

    let purged = svc.purge_stale_consents(Utc::now()).await.unwrap();
    assert_eq!(purged, 1);
    assert!(store.get_consent(aged.id).await.unwrap().is_none());
    assert!(store.get_consent(fresh.id).await.unwrap().is_some());

    // Once the inactive consent ages past 180 days it purges too.
    let purged = svc
        .purge_stale_consents(Utc::now() + Duration::days(181))
        .await
        .unwrap();
    assert!(purged >= 1);
    assert!(store.get_consent(dormant.id).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_sweep_refreshes_expiring_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "swept-T",
            "refresh_token": "swept-R",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        Arc::clone(&store),
        config(&[]),
        Some((Provider::Fortnox, format!("{}/token", server.uri()))),
    );
    let consent = svc.create("tenant-a", create_request()).await.unwrap();
    let otc = svc.create_otc("tenant-a", consent.id).await.unwrap();
    svc.exchange_token(ExchangeTokenRequest {
        code: otc.code,
        consent_id: consent.id,
        provider: Provider::Fortnox,
        access_token: "T".into(),
        refresh_token: Some("R".into()),
        expires_in: Some(600),
        scopes: None,
        company_id: None,
    })
    .await
    .unwrap();

    // Expiring within 30 minutes: refreshed.
    let refreshed = svc
        .refresh_expiring_tokens(Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(refreshed, 1);

    let access = svc
        .resolve_credentials("tenant-a", consent.id, None)
        .await
        .unwrap();
    assert_eq!(access.token.access_token, "swept-T");
}
