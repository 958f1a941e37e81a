// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gateway dispatch against a mock vendor: listing, detail 404 handling,
//! unsupported resources, writes, and entry hydration.

use lgw_core::{CanonicalDto, ListQuery, Provider, ResourceType};
use lgw_error::ErrorCode;
use lgw_gateway::Gateway;
use lgw_ratelimit::RateLimiterRegistry;
use lgw_retry::RetryPolicy;
use lgw_vendor::{AccessCredentials, ReqwestTransport};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(provider: Provider, base: &str) -> Gateway {
    let mut overrides = HashMap::new();
    overrides.insert(provider, base.to_owned());
    Gateway::with_base_urls(
        Arc::new(ReqwestTransport::new()),
        Arc::new(RateLimiterRegistry::with_defaults()),
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        Duration::from_secs(5),
        &overrides,
    )
}

#[tokio::test]
async fn list_maps_fortnox_invoices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MetaInformation": {"@TotalPages": 1, "@CurrentPage": 1, "@TotalResources": 1},
            "Invoices": [{
                "DocumentNumber": "1001",
                "CustomerName": "Test AB",
                "Total": 125.0,
                "Balance": 0.0,
                "Booked": true,
                "Sent": true,
                "Cancelled": false
            }]
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let page = gw
        .list(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::SalesInvoices,
            &ListQuery::default(),
        )
        .await
        .unwrap();

    assert_eq!(page.total_count, 1);
    let CanonicalDto::SalesInvoice(invoice) = &page.data[0] else {
        panic!("wrong DTO");
    };
    assert_eq!(invoice.id, "1001");
    assert_eq!(invoice.status.to_string(), "paid");
    // _raw is still attached inside the process.
    assert!(invoice.raw.is_some());
}

#[tokio::test]
async fn detail_404_becomes_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let result = gw
        .get(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::Customers,
            "404",
        )
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn detail_unwraps_fortnox_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Customer": {"CustomerNumber": "42", "Name": "Kund AB", "Type": "COMPANY"}
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let dto = gw
        .get(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::Customers,
            "42",
        )
        .await
        .unwrap()
        .unwrap();
    let CanonicalDto::Customer(customer) = dto else {
        panic!("wrong DTO");
    };
    assert_eq!(customer.name, "Kund AB");
}

#[tokio::test]
async fn other_upstream_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let err = gw
        .get(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::Customers,
            "1",
        )
        .await
        .unwrap_err();
    assert_eq!(err.upstream_status(), Some(403));
}

#[tokio::test]
async fn unsupported_resource_is_not_supported() {
    let server = MockServer::start().await;
    let gw = gateway_for(Provider::Bokio, &server.uri());
    let err = gw
        .list(
            Provider::Bokio,
            &AccessCredentials::bearer("T"),
            ResourceType::Journals,
            &ListQuery::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotSupported);
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn create_rejected_for_read_only_vendor() {
    let server = MockServer::start().await;
    let gw = gateway_for(Provider::Bokio, &server.uri());
    let err = gw
        .create(
            Provider::Bokio,
            &AccessCredentials::bearer("T"),
            ResourceType::SalesInvoices,
            &json!({}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::WriteNotSupported);
}

#[tokio::test]
async fn create_maps_created_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "Customer": {"CustomerNumber": "77", "Name": "Ny AB", "Type": "COMPANY"}
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let dto = gw
        .create(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::Customers,
            &json!({"Customer": {"Name": "Ny AB"}}),
        )
        .await
        .unwrap();
    let CanonicalDto::Customer(customer) = dto else {
        panic!("wrong DTO");
    };
    assert_eq!(customer.id, "77");
}

#[tokio::test]
async fn singleton_bypasses_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companyinformation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CompanyInformation": {"CompanyName": "Bolaget AB", "OrganizationNumber": "556000-1111"}
        })))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let dto = gw
        .singleton(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::CompanyInformation,
        )
        .await
        .unwrap();
    let CanonicalDto::CompanyInformation(info) = dto else {
        panic!("wrong DTO");
    };
    assert_eq!(info.name, "Bolaget AB");
}

#[tokio::test]
async fn voucher_hydration_fetches_details_and_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vouchers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MetaInformation": {"@TotalPages": 1, "@CurrentPage": 1},
            "Vouchers": [
                {"VoucherSeries": "A", "VoucherNumber": 1, "TransactionDate": "2024-01-10"},
                {"VoucherSeries": "A", "VoucherNumber": 2, "TransactionDate": "2024-01-11"}
            ]
        })))
        .mount(&server)
        .await;
    // Detail exists for A-1, fails for A-2: hydration degrades gracefully.
    Mock::given(method("GET"))
        .and(path("/vouchers/A/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Voucher": {
                "VoucherSeries": "A",
                "VoucherNumber": 1,
                "TransactionDate": "2024-01-10",
                "VoucherRows": [
                    {"Account": 1930, "Debit": 50.0, "Credit": 0.0},
                    {"Account": 3001, "Debit": 0.0, "Credit": 50.0}
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vouchers/A/2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gw = gateway_for(Provider::Fortnox, &server.uri());
    let query = ListQuery {
        include_entries: true,
        ..Default::default()
    };
    let page = gw
        .list(
            Provider::Fortnox,
            &AccessCredentials::bearer("T"),
            ResourceType::Journals,
            &query,
        )
        .await
        .unwrap();

    assert_eq!(page.data.len(), 2);
    let CanonicalDto::Journal(first) = &page.data[0] else {
        panic!("wrong DTO");
    };
    assert_eq!(first.entries.len(), 2);
    assert!(first.is_balanced());
    // The failed detail keeps the unhydrated item.
    let CanonicalDto::Journal(second) = &page.data[1] else {
        panic!("wrong DTO");
    };
    assert!(second.entries.is_empty());
}
