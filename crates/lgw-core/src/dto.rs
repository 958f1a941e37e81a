// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canonical DTO set.
//!
//! Every DTO carries an optional `_raw` hook holding the untouched vendor
//! payload.  The gateway strips `_raw` at the egress boundary; inside the
//! process it is available for diagnostics and for mappers that need a second
//! look at the source record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A monetary amount with its currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Numeric value in the currency's major unit.
    pub value: f64,
    /// ISO 4217 currency code; vendors that omit one get `SEK`.
    pub currency_code: String,
}

impl Money {
    /// Default currency when a vendor payload does not state one.
    pub const DEFAULT_CURRENCY: &'static str = "SEK";

    /// An amount in Swedish kronor.
    pub fn sek(value: f64) -> Self {
        Self {
            value,
            currency_code: Self::DEFAULT_CURRENCY.into(),
        }
    }

    /// An amount in the given currency, falling back to `SEK` when `None`.
    pub fn new(value: f64, currency_code: Option<&str>) -> Self {
        Self {
            value,
            currency_code: currency_code.unwrap_or(Self::DEFAULT_CURRENCY).into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Statuses and kinds
// ---------------------------------------------------------------------------

/// Normalized document status shared by sales and supplier invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Not yet sent or booked.
    Draft,
    /// Sent to the counterparty.
    Sent,
    /// Booked into the ledger.
    Booked,
    /// Fully paid (or zero balance).
    Paid,
    /// Credited by a credit note.
    Credited,
    /// Cancelled.
    Cancelled,
    /// Open with a positive remaining balance.
    Unpaid,
    /// The vendor payload did not allow a derivation.
    Unknown,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Booked => "booked",
            Self::Paid => "paid",
            Self::Credited => "credited",
            Self::Cancelled => "cancelled",
            Self::Unpaid => "unpaid",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Customer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerKind {
    /// A company counterparty.
    Company,
    /// A private individual.
    Private,
}

/// BAS account class derived from the first digit of the account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// BAS class 1.
    Asset,
    /// BAS class 2.
    Liability,
    /// BAS class 3.
    Revenue,
    /// BAS classes 4 through 7.
    Expense,
}

impl AccountKind {
    /// Derive the account class from a BAS account number.
    ///
    /// Returns `None` for class 8 (financial items and taxes) and anything
    /// outside 1000..=9999.
    pub fn from_account_number(number: u32) -> Option<Self> {
        match number / 1000 {
            1 => Some(Self::Asset),
            2 => Some(Self::Liability),
            3 => Some(Self::Revenue),
            4..=7 => Some(Self::Expense),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Normalized outgoing (customer) invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoice {
    /// Vendor-scoped identifier.
    pub id: String,
    /// Human invoice number, where distinct from the id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    /// Customer register number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    /// Customer display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Invoice date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    /// Due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Invoice total.
    pub total: Money,
    /// Remaining balance, when the vendor reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Money>,
    /// Derived status.
    pub status: DocumentStatus,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Normalized incoming (supplier) invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInvoice {
    /// Vendor-scoped identifier.
    pub id: String,
    /// Supplier register number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_number: Option<String>,
    /// Supplier display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
    /// The supplier's own invoice number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    /// Invoice date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    /// Due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Invoice total.
    pub total: Money,
    /// Remaining balance, when the vendor reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Money>,
    /// Derived status (`paid`, `unpaid`, or `unknown`).
    pub status: DocumentStatus,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Normalized customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Vendor-scoped identifier.
    pub id: String,
    /// Customer register number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    /// Display name.
    pub name: String,
    /// Swedish organization number, where present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Billing email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Company or private individual.
    #[serde(rename = "type")]
    pub kind: CustomerKind,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Normalized supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    /// Vendor-scoped identifier.
    pub id: String,
    /// Supplier register number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_number: Option<String>,
    /// Display name.
    pub name: String,
    /// Swedish organization number, where present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// One row of a journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// BAS account number.
    pub account_number: u32,
    /// Account name, where the vendor includes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Debit amount (zero when the row is a credit).
    pub debit: f64,
    /// Credit amount (zero when the row is a debit).
    pub credit: f64,
    /// Row-level transaction date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,
    /// Row description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized journal (voucher) with its entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    /// Vendor-scoped identifier.
    pub id: String,
    /// Voucher series, where the vendor uses one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Voucher number within the series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Journal date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_date: Option<NaiveDate>,
    /// Header description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entry rows; debits and credits must balance.
    pub entries: Vec<JournalEntry>,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Journal {
    /// Whether `Σ debit == Σ credit` within a rounding tolerance of 0.01.
    pub fn is_balanced(&self) -> bool {
        let debit: f64 = self.entries.iter().map(|e| e.debit).sum();
        let credit: f64 = self.entries.iter().map(|e| e.credit).sum();
        (debit - credit).abs() < 0.01
    }
}

/// Normalized chart-of-accounts row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingAccount {
    /// BAS account number.
    pub number: u32,
    /// Account name.
    pub name: String,
    /// Class derived from the first BAS digit.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AccountKind>,
    /// Current balance, where the vendor reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    /// Whether the account is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Normalized company master data (singleton resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInformation {
    /// Legal name.
    pub name: String,
    /// Swedish organization number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// Contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Accounting currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Normalized payment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Vendor-scoped identifier.
    pub id: String,
    /// The invoice this payment settles, where the vendor links one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    /// Payment date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    /// Paid amount.
    pub amount: Money,
    /// Untouched vendor payload; stripped at egress.
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

// ---------------------------------------------------------------------------
// CanonicalDto
// ---------------------------------------------------------------------------

/// A value from the canonical DTO set, as produced by a resource mapper.
///
/// Serialises untagged: the wire shape is the DTO itself, not a wrapper.
/// `Aggregate` covers singleton report resources (balance sheet, income
/// statement, trial balances) whose canonical shape is the vendor aggregate
/// passed through as structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalDto {
    /// Sales invoice.
    SalesInvoice(SalesInvoice),
    /// Supplier invoice.
    SupplierInvoice(SupplierInvoice),
    /// Customer.
    Customer(Customer),
    /// Supplier.
    Supplier(Supplier),
    /// Journal.
    Journal(Journal),
    /// Chart-of-accounts row.
    AccountingAccount(AccountingAccount),
    /// Company information.
    CompanyInformation(CompanyInformation),
    /// Payment.
    Payment(Payment),
    /// Report aggregates and attachment metadata (passthrough).
    Aggregate(Value),
}

impl CanonicalDto {
    /// Remove the `_raw` vendor payload ahead of egress.
    pub fn strip_raw(&mut self) {
        match self {
            Self::SalesInvoice(d) => d.raw = None,
            Self::SupplierInvoice(d) => d.raw = None,
            Self::Customer(d) => d.raw = None,
            Self::Supplier(d) => d.raw = None,
            Self::Journal(d) => d.raw = None,
            Self::AccountingAccount(d) => d.raw = None,
            Self::CompanyInformation(d) => d.raw = None,
            Self::Payment(d) => d.raw = None,
            Self::Aggregate(v) => {
                if let Value::Object(map) = v {
                    map.remove("_raw");
                }
            }
        }
    }

    /// The `_raw` vendor payload, if still attached.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            Self::SalesInvoice(d) => d.raw.as_ref(),
            Self::SupplierInvoice(d) => d.raw.as_ref(),
            Self::Customer(d) => d.raw.as_ref(),
            Self::Supplier(d) => d.raw.as_ref(),
            Self::Journal(d) => d.raw.as_ref(),
            Self::AccountingAccount(d) => d.raw.as_ref(),
            Self::CompanyInformation(d) => d.raw.as_ref(),
            Self::Payment(d) => d.raw.as_ref(),
            Self::Aggregate(v) => v.get("_raw"),
        }
    }
}
