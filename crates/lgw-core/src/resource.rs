// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closed enums for the resources the gateway exposes and the entity types
//! the sync engine materializes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

/// Canonical business resources addressable through the data plane.
///
/// Each maps to a vendor-specific endpoint via the resource descriptor
/// registry; absence of a mapping means the vendor does not support the
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    /// Outgoing (customer) invoices.
    SalesInvoices,
    /// Incoming (supplier) invoices.
    SupplierInvoices,
    /// Customer register.
    Customers,
    /// Supplier register.
    Suppliers,
    /// Journals / vouchers.
    Journals,
    /// Chart of accounts.
    AccountingAccounts,
    /// Company master data (singleton).
    CompanyInformation,
    /// Invoice payments.
    Payments,
    /// Document attachments (passthrough only).
    Attachments,
    /// Balance-sheet aggregate (singleton).
    BalanceSheet,
    /// Income-statement aggregate (singleton).
    IncomeStatement,
    /// Trial balances.
    TrialBalances,
}

impl ResourceType {
    /// All resource types, in declaration order.
    pub const ALL: &'static [ResourceType] = &[
        Self::SalesInvoices,
        Self::SupplierInvoices,
        Self::Customers,
        Self::Suppliers,
        Self::Journals,
        Self::AccountingAccounts,
        Self::CompanyInformation,
        Self::Payments,
        Self::Attachments,
        Self::BalanceSheet,
        Self::IncomeStatement,
        Self::TrialBalances,
    ];

    /// Stable wire tag (the URL path segment).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesInvoices => "sales-invoices",
            Self::SupplierInvoices => "supplier-invoices",
            Self::Customers => "customers",
            Self::Suppliers => "suppliers",
            Self::Journals => "journals",
            Self::AccountingAccounts => "accounting-accounts",
            Self::CompanyInformation => "company-information",
            Self::Payments => "payments",
            Self::Attachments => "attachments",
            Self::BalanceSheet => "balance-sheet",
            Self::IncomeStatement => "income-statement",
            Self::TrialBalances => "trial-balances",
        }
    }

    /// Parse a URL path segment into a resource type.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Entity types the sync engine pulls into the canonical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Customer invoice.
    #[default]
    Invoice,
    /// Payment on a customer invoice.
    InvoicePayment,
    /// Customer.
    Customer,
    /// Supplier.
    Supplier,
    /// Supplier invoice.
    SupplierInvoice,
    /// Payment on a supplier invoice.
    SupplierInvoicePayment,
    /// Recurring contract.
    Contract,
    /// Order.
    Order,
    /// Employee.
    Employee,
    /// Fixed asset.
    Asset,
    /// Company master data.
    CompanyInfo,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: &'static [EntityType] = &[
        Self::Invoice,
        Self::InvoicePayment,
        Self::Customer,
        Self::Supplier,
        Self::SupplierInvoice,
        Self::SupplierInvoicePayment,
        Self::Contract,
        Self::Order,
        Self::Employee,
        Self::Asset,
        Self::CompanyInfo,
    ];

    /// Stable wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::InvoicePayment => "invoice_payment",
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::SupplierInvoice => "supplier_invoice",
            Self::SupplierInvoicePayment => "supplier_invoice_payment",
            Self::Contract => "contract",
            Self::Order => "order",
            Self::Employee => "employee",
            Self::Asset => "asset",
            Self::CompanyInfo => "company_info",
        }
    }

    /// Parse a wire tag into an entity type.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.as_str() == s)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
