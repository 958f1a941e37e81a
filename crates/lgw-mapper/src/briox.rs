// SPDX-License-Identifier: MIT OR Apache-2.0
//! Briox resource table and mappers.
//!
//! Briox nests collections under `data` and scopes journals beneath a
//! fiscal-year path segment.

use crate::descriptor::ResourceDescriptor;
use crate::util::{
    account_field, date_field, derive_sales_invoice_status, f64_field, money_field, req_str_field,
    str_field,
};
use lgw_core::{
    AccountKind, AccountingAccount, CanonicalDto, CompanyInformation, Customer, CustomerKind,
    Journal, JournalEntry, ResourceType, SalesInvoice, Supplier,
};
use lgw_error::GatewayError;
use serde_json::Value;

/// Descriptor lookup for Briox.
pub fn descriptor(resource: ResourceType) -> Option<&'static ResourceDescriptor> {
    match resource {
        ResourceType::SalesInvoices => Some(&SALES_INVOICES),
        ResourceType::Customers => Some(&CUSTOMERS),
        ResourceType::Suppliers => Some(&SUPPLIERS),
        ResourceType::Journals => Some(&JOURNALS),
        ResourceType::AccountingAccounts => Some(&ACCOUNTS),
        ResourceType::CompanyInformation => Some(&COMPANY_INFORMATION),
        _ => None,
    }
}

static SALES_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SalesInvoices,
    list_path: "/invoices",
    detail_path: "/invoices/{id}",
    list_key: Some("invoices"),
    detail_key: Some("invoice"),
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: true,
    resolve_detail_path: None,
    map: map_sales_invoice,
    sub_resources: &[],
};

static CUSTOMERS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Customers,
    list_path: "/customers",
    detail_path: "/customers/{id}",
    list_key: Some("customers"),
    detail_key: Some("customer"),
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: true,
    resolve_detail_path: None,
    map: map_customer,
    sub_resources: &[],
};

static SUPPLIERS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Suppliers,
    list_path: "/suppliers",
    detail_path: "/suppliers/{id}",
    list_key: Some("suppliers"),
    detail_key: Some("supplier"),
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_supplier,
    sub_resources: &[],
};

static JOURNALS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Journals,
    // Journals sit under the fiscal year; `{year}` resolves at dispatch.
    list_path: "/journals/{year}",
    detail_path: "/journals/{id}",
    list_key: Some("journals"),
    detail_key: Some("journal"),
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: true,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_journal,
    sub_resources: &[],
};

static ACCOUNTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::AccountingAccounts,
    list_path: "/accounts",
    detail_path: "/accounts/{id}",
    list_key: Some("accounts"),
    detail_key: Some("account"),
    id_field: "number",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_account,
    sub_resources: &[],
};

static COMPANY_INFORMATION: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::CompanyInformation,
    list_path: "/settings/company",
    detail_path: "/settings/company",
    list_key: None,
    detail_key: Some("company"),
    id_field: "orgNumber",
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
    let balance = f64_field(raw, "balance");
    let status = derive_sales_invoice_status(
        str_field(raw, "status").as_deref() == Some("cancelled"),
        str_field(raw, "status").as_deref() == Some("credited"),
        balance.is_some_and(|b| b.abs() < 0.005),
        str_field(raw, "status").as_deref() == Some("booked"),
        str_field(raw, "status").as_deref() == Some("sent"),
    );
    Ok(CanonicalDto::SalesInvoice(SalesInvoice {
        id: req_str_field(raw, "id")?,
        invoice_number: str_field(raw, "invoiceNumber"),
        customer_number: str_field(raw, "customerNumber"),
        customer_name: str_field(raw, "customerName"),
        invoice_date: date_field(raw, "invoiceDate"),
        due_date: date_field(raw, "dueDate"),
        total: money_field(raw, "total", "currency"),
        balance: balance.map(|b| lgw_core::Money::new(b, str_field(raw, "currency").as_deref())),
        status,
        raw: Some(raw.clone()),
    }))
}

fn map_customer(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let kind = match str_field(raw, "type").as_deref() {
        Some("private") => CustomerKind::Private,
        _ => CustomerKind::Company,
    };
    Ok(CanonicalDto::Customer(Customer {
        id: req_str_field(raw, "id")?,
        customer_number: str_field(raw, "customerNumber"),
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "orgNumber"),
        email: str_field(raw, "email"),
        kind,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Supplier(Supplier {
        id: req_str_field(raw, "id")?,
        supplier_number: str_field(raw, "supplierNumber"),
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "orgNumber"),
        email: str_field(raw, "email"),
        raw: Some(raw.clone()),
    }))
}

fn map_journal(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let entries = raw
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(JournalEntry {
                        account_number: account_field(row, "account")?,
                        account_name: str_field(row, "accountName"),
                        debit: f64_field(row, "debit").unwrap_or(0.0),
                        credit: f64_field(row, "credit").unwrap_or(0.0),
                        transaction_date: date_field(row, "date"),
                        description: str_field(row, "text"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CanonicalDto::Journal(Journal {
        id: req_str_field(raw, "id")?,
        series: str_field(raw, "series"),
        number: str_field(raw, "number"),
        journal_date: date_field(raw, "date"),
        description: str_field(raw, "text"),
        entries,
        raw: Some(raw.clone()),
    }))
}

fn map_account(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let number = account_field(raw, "number").ok_or_else(|| {
        GatewayError::new(
            lgw_error::ErrorCode::UpstreamDecode,
            "account row missing 'number'",
        )
    })?;
    Ok(CanonicalDto::AccountingAccount(AccountingAccount {
        number,
        name: str_field(raw, "name").unwrap_or_default(),
        kind: AccountKind::from_account_number(number),
        balance: f64_field(raw, "balance"),
        active: raw.get("active").and_then(Value::as_bool),
        raw: Some(raw.clone()),
    }))
}

fn map_company_information(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::CompanyInformation(CompanyInformation {
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "orgNumber"),
        address: str_field(raw, "address"),
        city: str_field(raw, "city"),
        zip_code: str_field(raw, "zipCode"),
        email: str_field(raw, "email"),
        currency: str_field(raw, "currency"),
        raw: Some(raw.clone()),
    }))
}
