// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HTTP surface end to end over the in-memory adapter: auth, the
//! consent lifecycle scenarios, tenant isolation, and error envelopes.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use lgw_config::GatewayConfig;
use lgw_consent::ConsentService;
use lgw_core::ApiKey;
use lgw_gateway::Gateway;
use lgw_oauth::OAuthDriver;
use lgw_ratelimit::RateLimiterRegistry;
use lgw_retry::RetryPolicy;
use lgw_server::{AppState, auth::hash_api_key, build_app};
use lgw_store::{DatabaseAdapter, MemoryStore};
use lgw_sync::SyncEngine;
use lgw_vault::TokenVault;
use lgw_vendor::ReqwestTransport;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::util::ServiceExt;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

async fn app() -> Router {
    let pairs = [
        ("LGW_DATABASE_URL", "memory"),
        ("LGW_TOKEN_ENCRYPTION_KEY", KEY),
        ("FORTNOX_CLIENT_ID", "fx"),
        ("FORTNOX_CLIENT_SECRET", "fx-secret"),
        ("FORTNOX_REDIRECT_URI", "https://example.test/cb"),
    ];
    let config = Arc::new(
        GatewayConfig::from_lookup(|name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
        .unwrap(),
    );

    let store: Arc<dyn DatabaseAdapter> = Arc::new(MemoryStore::new());
    for tenant in ["tenant-a", "tenant-b"] {
        store
            .upsert_api_key(ApiKey {
                key_hash: hash_api_key(&format!("key-{tenant}")),
                tenant_id: tenant.to_owned(),
                expires_at: None,
                revoked_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let transport = Arc::new(ReqwestTransport::new());
    let retry = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    let timeout = Duration::from_secs(10);
    let oauth = Arc::new(OAuthDriver::new(Arc::clone(&transport) as _, retry, timeout));
    let gateway = Arc::new(Gateway::new(
        Arc::clone(&transport) as _,
        Arc::new(RateLimiterRegistry::with_defaults()),
        retry,
        timeout,
    ));
    let consents = Arc::new(ConsentService::new(
        Arc::clone(&store),
        Arc::new(TokenVault::from_key_hex(Some(KEY)).unwrap()),
        Arc::clone(&oauth),
        Arc::clone(&config),
    ));
    let sync = Arc::new(SyncEngine::new(Arc::clone(&store), Arc::clone(&gateway)));

    build_app(Arc::new(AppState {
        config,
        store,
        consents,
        gateway,
        sync,
        oauth,
        started_at: Instant::now(),
    }))
}

fn request(method: &str, uri: &str, tenant_key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = tenant_key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_api_key_is_401() {
    let app = app().await;
    let response = app
        .oneshot(request("GET", "/api/v1/consents", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "API_KEY_MISSING");
}

#[tokio::test]
async fn unknown_api_key_is_401() {
    let app = app().await;
    let response = app
        .oneshot(request("GET", "/api/v1/consents", Some("nope"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_accept_scenario() {
    let app = app().await;

    // Create: 201 with status 0 and an ETag header.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "X", "provider": "fortnox"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key(header::ETAG));
    let consent = json_body(response).await;
    assert_eq!(consent["status"], 0);
    assert_eq!(consent["tenantId"], "tenant-a");
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    // OTC: 201 with a 16-hex code.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/consents/{consent_id}/otc"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let otc = json_body(response).await;
    let code = otc["code"].as_str().unwrap().to_owned();
    assert_eq!(code.len(), 16);
    assert_eq!(otc["consentId"].as_str().unwrap(), consent_id);

    // Token exchange (public): 200, consent transitions to Accepted.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents/auth/token",
            None,
            Some(json!({
                "code": code,
                "consentId": consent_id,
                "provider": "fortnox",
                "accessToken": "T",
                "refreshToken": "R"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Follow-up GET sees status 1.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let read = json_body(response).await;
    assert_eq!(read["status"], 1);

    // Re-using the same code fails as 401.
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/consents/auth/token",
            None,
            Some(json!({
                "code": otc["code"],
                "consentId": consent_id,
                "provider": "fortnox",
                "accessToken": "T2"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "OTC_INVALID");
}

#[tokio::test]
async fn etag_concurrency_scenario() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "X", "provider": "fortnox"})),
        ))
        .await
        .unwrap();
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_owned();
    let consent = json_body(response).await;
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    // First patch with the current etag succeeds and rotates it.
    let response = app
        .clone()
        .oneshot({
            let mut req = request(
                "PATCH",
                &format!("/api/v1/consents/{consent_id}"),
                Some("key-tenant-a"),
                Some(json!({"companyName": "Bolaget AB"})),
            );
            req.headers_mut()
                .insert(header::IF_MATCH, etag.parse().unwrap());
            req
        })
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_etag = response.headers()[header::ETAG].to_str().unwrap().to_owned();
    assert_ne!(new_etag, etag);

    // Stale If-Match: 412, and the write does not land.
    let response = app
        .clone()
        .oneshot({
            let mut req = request(
                "PATCH",
                &format!("/api/v1/consents/{consent_id}"),
                Some("key-tenant-a"),
                Some(json!({"name": "Y"})),
            );
            req.headers_mut()
                .insert(header::IF_MATCH, etag.parse().unwrap());
            req
        })
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    let read = json_body(response).await;
    assert_eq!(read["name"], "X");
}

#[tokio::test]
async fn cross_tenant_reads_are_404() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "X", "provider": "fortnox"})),
        ))
        .await
        .unwrap();
    let consent = json_body(response).await;
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}"),
            Some("key-tenant-b"),
            None,
        ))
        .await
        .unwrap();
    // Not-found rather than forbidden: no existence leak.
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn data_plane_rejects_unaccepted_consents() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "X", "provider": "fortnox"})),
        ))
        .await
        .unwrap();
    let consent = json_body(response).await;
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}/sales-invoices"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "CONSENT_NOT_ACCEPTED");
}

#[tokio::test]
async fn unconfigured_vendor_is_501_on_auth_routes() {
    let app = app().await;
    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/auth/visma/url",
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VENDOR_NOT_CONFIGURED");
}

#[tokio::test]
async fn auth_url_for_configured_vendor() {
    let app = app().await;
    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/auth/fortnox/url?state=s1",
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("client_id=fx"));
    assert!(url.contains("state=s1"));
}

#[tokio::test]
async fn unknown_resource_type_is_400() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "X", "provider": "fortnox"})),
        ))
        .await
        .unwrap();
    let consent = json_body(response).await;
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}/widgets"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sie_upload_consent_flow() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/consents",
            Some("key-tenant-a"),
            Some(json!({"name": "Upload", "provider": "sie-upload"})),
        ))
        .await
        .unwrap();
    let consent = json_body(response).await;
    let consent_id = consent["id"].as_str().unwrap().to_owned();

    let sie = "#FNAMN \"Uppladdat AB\"\n#ORGNR 556000-2222\n#SIETYP 4\n#RAR 0 20240101 20241231\n#UB 0 1930 100.00\n#RES 0 3001 -100.00\n";
    let boundary = "XBOUNDARYX";
    let multipart_body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"2024.se\"\r\nContent-Type: application/octet-stream\r\n\r\n{sie}\r\n--{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/consents/{consent_id}/sie-upload"))
        .header(header::AUTHORIZATION, "Bearer key-tenant-a")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let uploads = body["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 1);
    let upload_id = uploads[0]["uploadId"].as_str().unwrap().to_owned();

    // Consent picked up the company fields and is Accepted.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    let read = json_body(response).await;
    assert_eq!(read["status"], 1);
    assert_eq!(read["companyName"], "Uppladdat AB");

    // Listing and full payload.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}/sie"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    let listing = json_body(response).await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/consents/{consent_id}/sie/{upload_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = json_body(response).await;
    assert_eq!(record["kpis"]["netSales"], 100.0);
    assert!(record["rawContent"].as_str().unwrap().contains("#FNAMN"));
}

#[tokio::test]
async fn connections_and_entity_listing() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/connections",
            Some("key-tenant-a"),
            Some(json!({"provider": "fortnox", "displayName": "Huvudbok"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let connection = json_body(response).await;
    let connection_id = connection["connectionId"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/connections/{connection_id}/entities/invoice"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["totalCount"], 0);
    assert_eq!(page["hasMore"], false);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/connections/{connection_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/connections/{connection_id}"),
            Some("key-tenant-a"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
