// SPDX-License-Identifier: MIT OR Apache-2.0
//! Björn Lundén resource table and mappers.

use crate::descriptor::ResourceDescriptor;
use crate::util::{
    account_field, date_field, derive_supplier_invoice_status, f64_field, money_field,
    req_str_field, str_field,
};
use lgw_core::{
    AccountKind, AccountingAccount, CanonicalDto, CompanyInformation, Customer, CustomerKind,
    DocumentStatus, ResourceType, SalesInvoice, Supplier, SupplierInvoice,
};
use lgw_error::GatewayError;
use serde_json::Value;

/// Descriptor lookup for Björn Lundén.
pub fn descriptor(resource: ResourceType) -> Option<&'static ResourceDescriptor> {
    match resource {
        ResourceType::SalesInvoices => Some(&SALES_INVOICES),
        ResourceType::SupplierInvoices => Some(&SUPPLIER_INVOICES),
        ResourceType::Customers => Some(&CUSTOMERS),
        ResourceType::Suppliers => Some(&SUPPLIERS),
        ResourceType::AccountingAccounts => Some(&ACCOUNTS),
        ResourceType::CompanyInformation => Some(&COMPANY_INFORMATION),
        _ => None,
    }
}

static SALES_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SalesInvoices,
    list_path: "/customerinvoice",
    detail_path: "/customerinvoice/{id}",
    list_key: None,
    detail_key: None,
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_sales_invoice,
    sub_resources: &[],
};

static SUPPLIER_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SupplierInvoices,
    list_path: "/supplierinvoice",
    detail_path: "/supplierinvoice/{id}",
    list_key: None,
    detail_key: None,
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_supplier_invoice,
    sub_resources: &[],
};

static CUSTOMERS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Customers,
    list_path: "/customer",
    detail_path: "/customer/{id}",
    list_key: None,
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

static SUPPLIERS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Suppliers,
    list_path: "/supplier",
    detail_path: "/supplier/{id}",
    list_key: None,
    detail_key: None,
    id_field: "id",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_supplier,
    sub_resources: &[],
};

static ACCOUNTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::AccountingAccounts,
    list_path: "/account",
    detail_path: "/account/{id}",
    list_key: None,
    detail_key: None,
    id_field: "accountNo",
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
    list_path: "/company",
    detail_path: "/company",
    list_key: None,
    detail_key: None,
    id_field: "orgNo",
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
    let remaining = f64_field(raw, "remainingAmount").or_else(|| f64_field(raw, "balance"));
    let status = match remaining {
        Some(r) if r.abs() < 0.005 => DocumentStatus::Paid,
        Some(_) => DocumentStatus::Unpaid,
        None => DocumentStatus::Unknown,
    };
    Ok(CanonicalDto::SalesInvoice(SalesInvoice {
        id: req_str_field(raw, "id")?,
        invoice_number: str_field(raw, "invoiceNo"),
        customer_number: str_field(raw, "customerNo"),
        customer_name: str_field(raw, "customerName"),
        invoice_date: date_field(raw, "invoiceDate"),
        due_date: date_field(raw, "dueDate"),
        total: money_field(raw, "totalAmount", "currencyCode"),
        balance: remaining
            .map(|r| lgw_core::Money::new(r, str_field(raw, "currencyCode").as_deref())),
        status,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let remaining = f64_field(raw, "remainingAmount").or_else(|| f64_field(raw, "balance"));
    Ok(CanonicalDto::SupplierInvoice(SupplierInvoice {
        id: req_str_field(raw, "id")?,
        supplier_number: str_field(raw, "supplierNo"),
        supplier_name: str_field(raw, "supplierName"),
        invoice_number: str_field(raw, "invoiceNo"),
        invoice_date: date_field(raw, "invoiceDate"),
        due_date: date_field(raw, "dueDate"),
        total: money_field(raw, "totalAmount", "currencyCode"),
        balance: remaining
            .map(|r| lgw_core::Money::new(r, str_field(raw, "currencyCode").as_deref())),
        status: derive_supplier_invoice_status(remaining),
        raw: Some(raw.clone()),
    }))
}

fn map_customer(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let kind = match str_field(raw, "customerType").as_deref() {
        Some("private") | Some("PRIVATE") => CustomerKind::Private,
        _ => CustomerKind::Company,
    };
    Ok(CanonicalDto::Customer(Customer {
        id: req_str_field(raw, "id")?,
        customer_number: str_field(raw, "customerNo"),
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "orgNo"),
        email: str_field(raw, "email"),
        kind,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Supplier(Supplier {
        id: req_str_field(raw, "id")?,
        supplier_number: str_field(raw, "supplierNo"),
        name: str_field(raw, "name").unwrap_or_default(),
        org_number: str_field(raw, "orgNo"),
        email: str_field(raw, "email"),
        raw: Some(raw.clone()),
    }))
}

fn map_account(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let number = account_field(raw, "accountNo").ok_or_else(|| {
        GatewayError::new(
            lgw_error::ErrorCode::UpstreamDecode,
            "account row missing 'accountNo'",
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
        org_number: str_field(raw, "orgNo"),
        address: str_field(raw, "address"),
        city: str_field(raw, "city"),
        zip_code: str_field(raw, "zipCode"),
        email: str_field(raw, "email"),
        currency: str_field(raw, "currencyCode"),
        raw: Some(raw.clone()),
    }))
}
