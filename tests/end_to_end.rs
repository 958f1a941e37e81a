// SPDX-License-Identifier: MIT OR Apache-2.0
//! Whole-stack flow: consent lifecycle, credential resolution, gateway
//! dispatch against a mock vendor, sync into the canonical store, and the
//! cross-crate invariants that hold it together.

use chrono::Utc;
use lgw_config::GatewayConfig;
use lgw_consent::{ConsentService, CreateConsentRequest, ExchangeTokenRequest};
use lgw_core::{
    CanonicalDto, ConsentStatus, Connection, EntityType, ListQuery, Provider, ResourceType,
    content_hash,
};
use lgw_gateway::Gateway;
use lgw_oauth::OAuthDriver;
use lgw_ratelimit::RateLimiterRegistry;
use lgw_retry::RetryPolicy;
use lgw_store::{DatabaseAdapter, EntityQuery, MemoryStore};
use lgw_sync::{SyncEngine, SyncJob};
use lgw_vault::TokenVault;
use lgw_vendor::{AccessCredentials, ReqwestTransport};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

struct Stack {
    store: Arc<MemoryStore>,
    consents: ConsentService,
    gateway: Arc<Gateway>,
    sync: SyncEngine,
}

fn stack(fortnox_base: &str) -> Stack {
    let pairs = [
        ("LGW_DATABASE_URL", "memory"),
        ("LGW_TOKEN_ENCRYPTION_KEY", KEY),
        ("FORTNOX_CLIENT_ID", "fx"),
        ("FORTNOX_CLIENT_SECRET", "fx-secret"),
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

    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(ReqwestTransport::new());
    let retry = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    let timeout = Duration::from_secs(5);

    let mut overrides = HashMap::new();
    overrides.insert(Provider::Fortnox, fortnox_base.to_owned());
    let gateway = Arc::new(Gateway::with_base_urls(
        Arc::clone(&transport) as _,
        Arc::new(RateLimiterRegistry::with_defaults()),
        retry,
        timeout,
        &overrides,
    ));

    let consents = ConsentService::new(
        Arc::clone(&store) as Arc<dyn DatabaseAdapter>,
        Arc::new(TokenVault::from_key_hex(Some(KEY)).unwrap()),
        Arc::new(OAuthDriver::new(Arc::clone(&transport) as _, retry, timeout)),
        config,
    );
    let sync = SyncEngine::new(
        Arc::clone(&store) as Arc<dyn DatabaseAdapter>,
        Arc::clone(&gateway),
    );

    Stack {
        store,
        consents,
        gateway,
        sync,
    }
}

#[tokio::test]
async fn consent_to_vendor_data_to_canonical_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(header("Authorization", "Bearer vendor-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MetaInformation": {"@TotalPages": 1, "@CurrentPage": 1, "@TotalResources": 1},
            "Invoices": [{
                "DocumentNumber": "1001",
                "CustomerName": "Kund AB",
                "InvoiceDate": "2024-03-05",
                "Total": 125.0,
                "Balance": 0.0,
                "Booked": true,
                "Sent": true,
                "Cancelled": false,
                "LastModified": "2024-03-06T08:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    let stack = stack(&server.uri());

    // Consent lifecycle: create → OTC → exchange → Accepted.
    let consent = stack
        .consents
        .create(
            "tenant-a",
            CreateConsentRequest {
                name: "Huvudbok".into(),
                provider: Provider::Fortnox,
                org_number: None,
                company_name: None,
                expires_at: None,
            },
        )
        .await
        .unwrap();
    let otc = stack
        .consents
        .create_otc("tenant-a", consent.id)
        .await
        .unwrap();
    let accepted = stack
        .consents
        .exchange_token(ExchangeTokenRequest {
            code: otc.code,
            consent_id: consent.id,
            provider: Provider::Fortnox,
            access_token: "vendor-token".into(),
            refresh_token: Some("R".into()),
            expires_in: Some(3600),
            scopes: None,
            company_id: None,
        })
        .await
        .unwrap();
    assert_eq!(accepted.status, ConsentStatus::Accepted);

    // Resolution hands back plaintext credentials from ciphered storage.
    let access = stack
        .consents
        .resolve_credentials("tenant-a", consent.id, None)
        .await
        .unwrap();
    assert_eq!(access.token.access_token, "vendor-token");

    // Gateway dispatch maps the vendor payload to the canonical DTO.
    let credentials = AccessCredentials::bearer(access.token.access_token.clone());
    let page = stack
        .gateway
        .list(
            Provider::Fortnox,
            &credentials,
            ResourceType::SalesInvoices,
            &ListQuery::default(),
        )
        .await
        .unwrap();
    let CanonicalDto::SalesInvoice(invoice) = &page.data[0] else {
        panic!("wrong DTO");
    };
    assert_eq!(invoice.id, "1001");
    assert_eq!(invoice.status.to_string(), "paid");

    // Sync pulls the same rows into the canonical store.
    let now = Utc::now();
    let connection_id = Uuid::new_v4();
    stack
        .store
        .upsert_connection(Connection {
            connection_id,
            provider: Provider::Fortnox,
            display_name: "Huvudbok".into(),
            organization_number: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
            metadata: json!({}),
        })
        .await
        .unwrap();
    let progress = stack
        .sync
        .execute_sync(SyncJob {
            connection_id,
            provider: Provider::Fortnox,
            credentials,
            entity_types: Some(vec![EntityType::Invoice]),
            include_sie: false,
            sie_options: None,
        })
        .await
        .unwrap();
    assert_eq!(progress.entity_results[0].inserted, 1);

    let rows = stack
        .store
        .get_entities(connection_id, EntityType::Invoice, EntityQuery::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].external_id, "1001");
    assert_eq!(rows[0].counterparty_name.as_deref(), Some("Kund AB"));

    // The stored hash equals an independent recomputation over rawData.
    assert_eq!(rows[0].content_hash, content_hash(&rows[0].raw_data));
}

#[tokio::test]
async fn hash_stability_against_permuted_vendor_payloads() {
    // The same record with keys permuted at every depth hashes identically.
    let a = json!({
        "DocumentNumber": "7",
        "Rows": [{"Account": 1930, "Debit": 10.0}],
        "Customer": {"Name": "AB", "Number": "42"}
    });
    let b = json!({
        "Customer": {"Number": "42", "Name": "AB"},
        "Rows": [{"Debit": 10.0, "Account": 1930}],
        "DocumentNumber": "7"
    });
    assert_eq!(content_hash(&a), content_hash(&b));
}
