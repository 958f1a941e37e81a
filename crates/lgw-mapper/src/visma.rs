// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visma eEkonomi resource table and mappers.
//!
//! Visma answers OData-paged envelopes (`{ Meta, Data }`) with PascalCase
//! fields and GUID identifiers.

use crate::descriptor::ResourceDescriptor;
use crate::util::{
    account_field, bool_field, date_field, derive_sales_invoice_status,
    derive_supplier_invoice_status, f64_field, money_field, req_str_field, str_field,
};
use lgw_core::{
    AccountKind, AccountingAccount, CanonicalDto, CompanyInformation, Customer, CustomerKind,
    ResourceType, SalesInvoice, Supplier, SupplierInvoice,
};
use lgw_error::GatewayError;
use serde_json::Value;

/// Descriptor lookup for Visma eEkonomi.
pub fn descriptor(resource: ResourceType) -> Option<&'static ResourceDescriptor> {
    match resource {
        ResourceType::SalesInvoices => Some(&SALES_INVOICES),
        ResourceType::SupplierInvoices => Some(&SUPPLIER_INVOICES),
        ResourceType::Customers => Some(&CUSTOMERS),
        ResourceType::Suppliers => Some(&SUPPLIERS),
        ResourceType::AccountingAccounts => Some(&ACCOUNTS),
        ResourceType::CompanyInformation => Some(&COMPANY_INFORMATION),
        ResourceType::BalanceSheet => Some(&BALANCE_SHEET),
        ResourceType::IncomeStatement => Some(&INCOME_STATEMENT),
        _ => None,
    }
}

static SALES_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SalesInvoices,
    list_path: "/customerinvoices",
    detail_path: "/customerinvoices/{id}",
    list_key: None,
    detail_key: None,
    id_field: "Id",
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

static SUPPLIER_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SupplierInvoices,
    list_path: "/supplierinvoices",
    detail_path: "/supplierinvoices/{id}",
    list_key: None,
    detail_key: None,
    id_field: "Id",
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
    list_path: "/customers",
    detail_path: "/customers/{id}",
    list_key: None,
    detail_key: None,
    id_field: "Id",
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
    list_key: None,
    detail_key: None,
    id_field: "Id",
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

static ACCOUNTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::AccountingAccounts,
    list_path: "/accounts",
    detail_path: "/accounts/{id}",
    list_key: None,
    detail_key: None,
    id_field: "Number",
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
    list_path: "/companysettings",
    detail_path: "/companysettings",
    list_key: None,
    detail_key: None,
    id_field: "CompanyName",
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

static BALANCE_SHEET: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::BalanceSheet,
    list_path: "/balancesheet",
    detail_path: "/balancesheet",
    list_key: None,
    detail_key: None,
    id_field: "FiscalYear",
    singleton: true,
    paginated: false,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_report,
    sub_resources: &[],
};

static INCOME_STATEMENT: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::IncomeStatement,
    list_path: "/incomestatement",
    detail_path: "/incomestatement",
    list_key: None,
    detail_key: None,
    id_field: "FiscalYear",
    singleton: true,
    paginated: false,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_report,
    sub_resources: &[],
};

// ---------------------------------------------------------------------------
// Mappers
// ---------------------------------------------------------------------------

// Report aggregates pass through as structured JSON.
fn map_report(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Aggregate(raw.clone()))
}

fn map_sales_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let remaining = f64_field(raw, "RemainingAmount");
    let status = derive_sales_invoice_status(
        bool_field(raw, "IsCancelled").unwrap_or(false),
        bool_field(raw, "IsCreditInvoice").unwrap_or(false),
        remaining.is_some_and(|r| r.abs() < 0.005),
        bool_field(raw, "IsBooked").unwrap_or(true),
        true,
    );
    Ok(CanonicalDto::SalesInvoice(SalesInvoice {
        id: req_str_field(raw, "Id")?,
        invoice_number: str_field(raw, "InvoiceNumber"),
        customer_number: str_field(raw, "CustomerNumber"),
        customer_name: str_field(raw, "InvoiceCustomerName")
            .or_else(|| str_field(raw, "CustomerName")),
        invoice_date: date_field(raw, "InvoiceDate"),
        due_date: date_field(raw, "DueDate"),
        total: money_field(raw, "TotalAmount", "CurrencyCode"),
        balance: remaining
            .map(|r| lgw_core::Money::new(r, str_field(raw, "CurrencyCode").as_deref())),
        status,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let remaining = f64_field(raw, "RemainingAmount");
    Ok(CanonicalDto::SupplierInvoice(SupplierInvoice {
        id: req_str_field(raw, "Id")?,
        supplier_number: str_field(raw, "SupplierNumber"),
        supplier_name: str_field(raw, "SupplierName"),
        invoice_number: str_field(raw, "InvoiceNumber"),
        invoice_date: date_field(raw, "InvoiceDate"),
        due_date: date_field(raw, "DueDate"),
        total: money_field(raw, "TotalAmount", "CurrencyCode"),
        balance: remaining
            .map(|r| lgw_core::Money::new(r, str_field(raw, "CurrencyCode").as_deref())),
        status: derive_supplier_invoice_status(remaining),
        raw: Some(raw.clone()),
    }))
}

fn map_customer(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let kind = if bool_field(raw, "IsPrivatePerson").unwrap_or(false) {
        CustomerKind::Private
    } else {
        CustomerKind::Company
    };
    Ok(CanonicalDto::Customer(Customer {
        id: req_str_field(raw, "Id")?,
        customer_number: str_field(raw, "CustomerNumber"),
        name: str_field(raw, "Name").unwrap_or_default(),
        org_number: str_field(raw, "CorporateIdentityNumber"),
        email: str_field(raw, "EmailAddress"),
        kind,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Supplier(Supplier {
        id: req_str_field(raw, "Id")?,
        supplier_number: str_field(raw, "SupplierNumber"),
        name: str_field(raw, "Name").unwrap_or_default(),
        org_number: str_field(raw, "CorporateIdentityNumber"),
        email: str_field(raw, "EmailAddress"),
        raw: Some(raw.clone()),
    }))
}

fn map_account(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let number = account_field(raw, "Number").ok_or_else(|| {
        GatewayError::new(
            lgw_error::ErrorCode::UpstreamDecode,
            "account row missing 'Number'",
        )
    })?;
    Ok(CanonicalDto::AccountingAccount(AccountingAccount {
        number,
        name: str_field(raw, "Name").unwrap_or_default(),
        kind: AccountKind::from_account_number(number),
        balance: f64_field(raw, "Balance"),
        active: bool_field(raw, "IsActive"),
        raw: Some(raw.clone()),
    }))
}

fn map_company_information(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::CompanyInformation(CompanyInformation {
        name: str_field(raw, "Name").unwrap_or_default(),
        org_number: str_field(raw, "CorporateIdentityNumber"),
        address: str_field(raw, "Address1"),
        city: str_field(raw, "City"),
        zip_code: str_field(raw, "PostalCode"),
        email: str_field(raw, "Email"),
        currency: str_field(raw, "CurrencyCode"),
        raw: Some(raw.clone()),
    }))
}
