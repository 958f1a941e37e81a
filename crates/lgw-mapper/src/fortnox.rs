// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fortnox resource table and mappers.
//!
//! Fortnox wraps lists under a plural key (`Invoices`) and single objects
//! under the singular (`Invoice`).  Vouchers are addressed by
//! `series/number`; the composite id on the canonical surface is the two
//! joined with a dash.

use crate::descriptor::{ResourceDescriptor, SubResource};
use crate::util::{
    account_field, bool_field, date_field, derive_sales_invoice_status,
    derive_supplier_invoice_status, f64_field, money_field, req_str_field, str_field,
};
use lgw_core::{
    AccountKind, AccountingAccount, CanonicalDto, CompanyInformation, Customer, CustomerKind,
    Journal, JournalEntry, Payment, ResourceType, SalesInvoice, Supplier, SupplierInvoice,
};
use lgw_error::GatewayError;
use serde_json::Value;

/// Descriptor lookup for Fortnox.
pub fn descriptor(resource: ResourceType) -> Option<&'static ResourceDescriptor> {
    match resource {
        ResourceType::SalesInvoices => Some(&SALES_INVOICES),
        ResourceType::SupplierInvoices => Some(&SUPPLIER_INVOICES),
        ResourceType::Customers => Some(&CUSTOMERS),
        ResourceType::Suppliers => Some(&SUPPLIERS),
        ResourceType::Journals => Some(&JOURNALS),
        ResourceType::AccountingAccounts => Some(&ACCOUNTS),
        ResourceType::CompanyInformation => Some(&COMPANY_INFORMATION),
        ResourceType::Payments => Some(&PAYMENTS),
        ResourceType::Attachments => Some(&ATTACHMENTS),
        _ => None,
    }
}

static SALES_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SalesInvoices,
    list_path: "/invoices",
    detail_path: "/invoices/{id}",
    list_key: Some("Invoices"),
    detail_key: Some("Invoice"),
    id_field: "DocumentNumber",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: true,
    resolve_detail_path: None,
    map: map_sales_invoice,
    sub_resources: &[SubResource {
        segment: "payments",
        path_template: "/invoicepayments?invoicenumber={id}",
        list_key: Some("InvoicePayments"),
        map: map_payment,
        supports_create: true,
    }],
};

static SUPPLIER_INVOICES: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::SupplierInvoices,
    list_path: "/supplierinvoices",
    detail_path: "/supplierinvoices/{id}",
    list_key: Some("SupplierInvoices"),
    detail_key: Some("SupplierInvoice"),
    id_field: "GivenNumber",
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
    list_key: Some("Customers"),
    detail_key: Some("Customer"),
    id_field: "CustomerNumber",
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
    list_key: Some("Suppliers"),
    detail_key: Some("Supplier"),
    id_field: "SupplierNumber",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: true,
    resolve_detail_path: None,
    map: map_supplier,
    sub_resources: &[],
};

static JOURNALS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Journals,
    list_path: "/vouchers",
    detail_path: "/vouchers/{id}",
    list_key: Some("Vouchers"),
    detail_key: Some("Voucher"),
    id_field: "VoucherNumber",
    singleton: false,
    paginated: true,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: true,
    supports_create: false,
    resolve_detail_path: Some(resolve_voucher_path),
    map: map_voucher,
    sub_resources: &[],
};

static ACCOUNTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::AccountingAccounts,
    list_path: "/accounts",
    detail_path: "/accounts/{id}",
    list_key: Some("Accounts"),
    detail_key: Some("Account"),
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
    list_path: "/companyinformation",
    detail_path: "/companyinformation",
    list_key: None,
    detail_key: Some("CompanyInformation"),
    id_field: "OrganizationNumber",
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

static PAYMENTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Payments,
    list_path: "/invoicepayments",
    detail_path: "/invoicepayments/{id}",
    list_key: Some("InvoicePayments"),
    detail_key: Some("InvoicePayment"),
    id_field: "Number",
    singleton: false,
    paginated: true,
    supports_last_modified: true,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: true,
    resolve_detail_path: None,
    map: map_payment,
    sub_resources: &[],
};

static ATTACHMENTS: ResourceDescriptor = ResourceDescriptor {
    resource: ResourceType::Attachments,
    list_path: "/archive",
    detail_path: "/archive/{id}",
    list_key: Some("Files"),
    detail_key: None,
    id_field: "Id",
    singleton: false,
    paginated: false,
    supports_last_modified: false,
    year_scoped: false,
    supports_entry_hydration: false,
    supports_create: false,
    resolve_detail_path: None,
    map: map_passthrough,
    sub_resources: &[],
};

// ---------------------------------------------------------------------------
// Mappers
// ---------------------------------------------------------------------------

fn resolve_voucher_path(id: &str) -> Option<String> {
    let (series, number) = id.split_once('-')?;
    Some(format!("/vouchers/{series}/{number}"))
}

fn map_sales_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let balance = f64_field(raw, "Balance");
    let paid = bool_field(raw, "FullyPaid").unwrap_or(false)
        || balance.is_some_and(|b| b.abs() < 0.005);
    let credited = str_field(raw, "CreditInvoiceReference")
        .is_some_and(|r| r != "0");
    let status = derive_sales_invoice_status(
        bool_field(raw, "Cancelled").unwrap_or(false),
        credited,
        paid,
        bool_field(raw, "Booked").unwrap_or(false),
        bool_field(raw, "Sent").unwrap_or(false),
    );
    Ok(CanonicalDto::SalesInvoice(SalesInvoice {
        id: req_str_field(raw, "DocumentNumber")?,
        invoice_number: str_field(raw, "DocumentNumber"),
        customer_number: str_field(raw, "CustomerNumber"),
        customer_name: str_field(raw, "CustomerName"),
        invoice_date: date_field(raw, "InvoiceDate"),
        due_date: date_field(raw, "DueDate"),
        total: money_field(raw, "Total", "Currency"),
        balance: balance.map(|b| lgw_core::Money::new(b, str_field(raw, "Currency").as_deref())),
        status,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier_invoice(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let balance = f64_field(raw, "Balance");
    Ok(CanonicalDto::SupplierInvoice(SupplierInvoice {
        id: req_str_field(raw, "GivenNumber")?,
        supplier_number: str_field(raw, "SupplierNumber"),
        supplier_name: str_field(raw, "SupplierName"),
        invoice_number: str_field(raw, "InvoiceNumber"),
        invoice_date: date_field(raw, "InvoiceDate"),
        due_date: date_field(raw, "DueDate"),
        total: money_field(raw, "Total", "Currency"),
        balance: balance.map(|b| lgw_core::Money::new(b, str_field(raw, "Currency").as_deref())),
        status: derive_supplier_invoice_status(balance),
        raw: Some(raw.clone()),
    }))
}

fn map_customer(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let kind = match str_field(raw, "Type").as_deref() {
        Some("PRIVATE") => CustomerKind::Private,
        _ => CustomerKind::Company,
    };
    Ok(CanonicalDto::Customer(Customer {
        id: req_str_field(raw, "CustomerNumber")?,
        customer_number: str_field(raw, "CustomerNumber"),
        name: str_field(raw, "Name").unwrap_or_default(),
        org_number: str_field(raw, "OrganisationNumber"),
        email: str_field(raw, "Email"),
        kind,
        raw: Some(raw.clone()),
    }))
}

fn map_supplier(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Supplier(Supplier {
        id: req_str_field(raw, "SupplierNumber")?,
        supplier_number: str_field(raw, "SupplierNumber"),
        name: str_field(raw, "Name").unwrap_or_default(),
        org_number: str_field(raw, "OrganisationNumber"),
        email: str_field(raw, "Email"),
        raw: Some(raw.clone()),
    }))
}

fn map_voucher(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    let series = req_str_field(raw, "VoucherSeries")?;
    let number = req_str_field(raw, "VoucherNumber")?;
    let entries = raw
        .get("VoucherRows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(JournalEntry {
                        account_number: account_field(row, "Account")?,
                        account_name: str_field(row, "Description"),
                        debit: f64_field(row, "Debit").unwrap_or(0.0),
                        credit: f64_field(row, "Credit").unwrap_or(0.0),
                        transaction_date: date_field(row, "TransactionDate"),
                        description: str_field(row, "TransactionInformation"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CanonicalDto::Journal(Journal {
        id: format!("{series}-{number}"),
        series: Some(series),
        number: Some(number),
        journal_date: date_field(raw, "TransactionDate"),
        description: str_field(raw, "Description"),
        entries,
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
        name: str_field(raw, "Description").unwrap_or_default(),
        kind: AccountKind::from_account_number(number),
        balance: f64_field(raw, "BalanceCarriedForward"),
        active: bool_field(raw, "Active"),
        raw: Some(raw.clone()),
    }))
}

fn map_company_information(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::CompanyInformation(CompanyInformation {
        name: str_field(raw, "CompanyName").unwrap_or_default(),
        org_number: str_field(raw, "OrganizationNumber"),
        address: str_field(raw, "Address"),
        city: str_field(raw, "City"),
        zip_code: str_field(raw, "ZipCode"),
        email: str_field(raw, "Email"),
        currency: str_field(raw, "Currency"),
        raw: Some(raw.clone()),
    }))
}

fn map_payment(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Payment(Payment {
        id: req_str_field(raw, "Number")?,
        invoice_id: str_field(raw, "InvoiceNumber"),
        payment_date: date_field(raw, "PaymentDate"),
        amount: money_field(raw, "Amount", "CurrencyCode"),
        raw: Some(raw.clone()),
    }))
}

fn map_passthrough(raw: &Value) -> Result<CanonicalDto, GatewayError> {
    Ok(CanonicalDto::Aggregate(raw.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgw_core::DocumentStatus;
    use serde_json::json;

    #[test]
    fn paid_when_balance_zero_even_if_booked_and_sent() {
        let raw = json!({
            "DocumentNumber": "1001",
            "Cancelled": false,
            "Booked": true,
            "Sent": true,
            "FullyPaid": false,
            "Balance": 0.0,
            "Total": 125.0
        });
        let CanonicalDto::SalesInvoice(invoice) = map_sales_invoice(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Paid);
    }

    #[test]
    fn cancelled_beats_paid() {
        let raw = json!({
            "DocumentNumber": "1002",
            "Cancelled": true,
            "FullyPaid": true,
            "Balance": 0.0,
            "Total": 10.0
        });
        let CanonicalDto::SalesInvoice(invoice) = map_sales_invoice(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Cancelled);
    }

    #[test]
    fn credit_reference_marks_credited() {
        let raw = json!({
            "DocumentNumber": "1003",
            "Cancelled": false,
            "CreditInvoiceReference": "1004",
            "Booked": true,
            "Balance": 50.0,
            "Total": 50.0
        });
        let CanonicalDto::SalesInvoice(invoice) = map_sales_invoice(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Credited);
    }

    #[test]
    fn open_booked_invoice_is_booked() {
        let raw = json!({
            "DocumentNumber": "1005",
            "Booked": true,
            "Sent": true,
            "Balance": 125.0,
            "Total": 125.0,
            "Currency": "EUR"
        });
        let CanonicalDto::SalesInvoice(invoice) = map_sales_invoice(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Booked);
        assert_eq!(invoice.total.currency_code, "EUR");
        assert_eq!(invoice.balance.as_ref().unwrap().value, 125.0);
        assert!(invoice.raw.is_some());
    }

    #[test]
    fn supplier_invoice_status_by_balance() {
        let paid = json!({"GivenNumber": "7", "Balance": 0.0, "Total": 10.0});
        let CanonicalDto::SupplierInvoice(invoice) = map_supplier_invoice(&paid).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Paid);

        let unpaid = json!({"GivenNumber": "8", "Balance": 10.0, "Total": 10.0});
        let CanonicalDto::SupplierInvoice(invoice) = map_supplier_invoice(&unpaid).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(invoice.status, DocumentStatus::Unpaid);
    }

    #[test]
    fn customer_kind_from_type_field() {
        let private = json!({"CustomerNumber": "1", "Name": "Anna", "Type": "PRIVATE"});
        let CanonicalDto::Customer(customer) = map_customer(&private).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(customer.kind, CustomerKind::Private);

        let company = json!({"CustomerNumber": "2", "Name": "AB", "Type": "COMPANY"});
        let CanonicalDto::Customer(customer) = map_customer(&company).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(customer.kind, CustomerKind::Company);
    }

    #[test]
    fn voucher_maps_to_balanced_journal() {
        let raw = json!({
            "VoucherSeries": "A",
            "VoucherNumber": 12,
            "TransactionDate": "2024-01-15",
            "Description": "Faktura 1001",
            "VoucherRows": [
                {"Account": 1510, "Debit": 125.0, "Credit": 0.0},
                {"Account": 3001, "Debit": 0.0, "Credit": 100.0},
                {"Account": 2611, "Debit": 0.0, "Credit": 25.0}
            ]
        });
        let CanonicalDto::Journal(journal) = map_voucher(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(journal.id, "A-12");
        assert_eq!(journal.entries.len(), 3);
        assert!(journal.is_balanced());
    }

    #[test]
    fn account_kind_follows_bas() {
        let raw = json!({"Number": 1930, "Description": "Bank", "Active": true});
        let CanonicalDto::AccountingAccount(account) = map_account(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(account.kind, Some(AccountKind::Asset));
        let raw = json!({"Number": 8310, "Description": "Ränteintäkter"});
        let CanonicalDto::AccountingAccount(account) = map_account(&raw).unwrap() else {
            panic!("wrong DTO");
        };
        assert_eq!(account.kind, None);
    }

    #[test]
    fn missing_id_is_a_decode_error() {
        assert!(map_sales_invoice(&json!({"Total": 1.0})).is_err());
    }
}
