// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bokio resource table and mappers.
//!
//! Bokio is read-only through the gateway; every path is company-scoped by
//! the vendor client.

use crate::descriptor::ResourceDescriptor;
use crate::util::{date_field, f64_field, money_field, req_str_field, str_field};
use lgw_core::{
    CanonicalDto, CompanyInformation, Customer, CustomerKind, DocumentStatus, ResourceType,
    SalesInvoice,
};
use lgw_error::GatewayError;
use serde_json::Value;

/// Descriptor lookup for Bokio.
pub fn descriptor(resource: ResourceType) -> Option<&'static ResourceDescriptor> {
    match resource {
        ResourceType::SalesInvoices => Some(&SALES_INVOICES),
        ResourceType::Customers => Some(&CUSTOMERS),
        ResourceType::CompanyInformation => Some(&COMPANY_INFORMATION),
        _ => None,
    }
}

static SALES_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SalesInvoices,
    list_path: "/invoices",
    detail_path: "/invoices/{id}",
    list_key: Some("items"),
    detail_key: None,
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_sales_invoice,
    sub_resources: &[],
};

static CUSTOMERS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Customers,
    list_path: "/customers",
    detail_path: "/customers/{id}",
    list_key: Some("items"),
    detail_key: None,
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_customer,
    sub_resources: &[],
};

static COMPANY_INFORMATION: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::CompanyInformation,
    list_path: "/details",
    detail_path: "/details",
    list_key: None,
    detail_key: None,
    id_field: "organisationNumber",
    singleton: true,
    paginated: false,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_company_information,
    sub_resources: &[],
};

// ---------------------------------------------------------------------------
// Mappers
// ---------------------------------------------------------------------------

fn map_sales_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let status = match str_field(raw, "status").as_deref() {
        Some("paid") => DocumentStatus::Paid,
        Some("cancelled") => DocumentStatus::Cancelled,
        Some("credited") => DocumentStatus::Credited,
        Some("draft") => DocumentStatus::Draft,
        Some("sent") => DocumentStatus::Sent,
        Some(_) | None => DocumentStatus::Unknown,
    };
    Ok(CanonicalDto::SalesInvoice(SalesInvoice {
        id: req_str_field(raw, "id")?,
        invoice_number: str_field(raw, "invoiceNumber"),
        customer_number: str_field(raw, "customerId"),
        customer_name: str_field(raw, "customerName"),
        invoice_date: date_field(raw, "invoiceDate"),
        due_date: date_field(raw, "dueDate"),
        total: money_field(raw, "totalAmount", "currency"),
        balance: f64_field(raw, "remainingAmount")
            .map(|r| lgw_core::Money::new(r, str_field(raw, "currency").as_deref())),
        status,
        raw: Some(raw.clone()),
    }))
}

fn map_customer(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let kind = match str_field(raw, "customerType").as_deref() {
        Some("private") => CustomerKind::Private,
        _ => CustomerKind::Company,
    };
    Ok(CanonicalDto::Customer(Customer {
        id: req_str_field(raw, "id")?,
        customer_number: str_field(raw, "customerNumber"),
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "organisationNumber"),
        email: str_field(raw, "email"),
        kind,
        raw: Some(raw.clone()),
    }))
}

fn map_company_information(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::CompanyInformation(CompanyInformation {
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "organisationNumber"),
        address: str_field(raw, "address"),
        city: str_field(raw, "city"),
        zip_code: str_field(raw, "postalCode"),
        email: str_field(raw, "email"),
        currency: str_field(raw, "currency"),
        raw: Some(raw.clone()),
    }))
}
