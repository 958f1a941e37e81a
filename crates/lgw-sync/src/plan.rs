// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-vendor fetch plans for the sync engine.
//!
//! The sync engine pulls more entity types than the data plane exposes
//! (contracts, orders, employees, assets have no canonical resource), so it
//! carries its own `(provider, entityType) → endpoint` table rather than
//! reusing the resource registry.

use lgw_core::{EntityType, Provider};

/// How to pull one entity type from one vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// List (or singleton) path.
    pub path: &'static str,
    /// JSON key the collection lives under, where the envelope needs one.
    pub list_key: Option<&'static str>,
    /// One object, not a collection.
    pub singleton: bool,
    /// JSON key a singleton object lives under.
    pub detail_key: Option<&'static str>,
    /// Candidate fields for the vendor identifier, first match wins.
    pub id_fields: &'static [&'static str],
    /// Whether the endpoint honors modified-since filtering.
    pub supports_modified: bool,
}

/// The fetch plan for `(provider, entity_type)`, if the vendor exposes it.
pub fn fetch_plan(provider: Provider, entity_type: EntityType) -> Option<FetchPlan> {
    use EntityType::*;
    match provider {
        Provider::Fortnox => match entity_type {
            Invoice => Some(plan("/invoices", Some("Invoices"), &["DocumentNumber"], true)),
            InvoicePayment => Some(plan(
                "/invoicepayments",
                Some("InvoicePayments"),
                &["Number"],
                true,
            )),
            Customer => Some(plan("/customers", Some("Customers"), &["CustomerNumber"], true)),
            Supplier => Some(plan("/suppliers", Some("Suppliers"), &["SupplierNumber"], true)),
            SupplierInvoice => Some(plan(
                "/supplierinvoices",
                Some("SupplierInvoices"),
                &["GivenNumber"],
                true,
            )),
            SupplierInvoicePayment => Some(plan(
                "/supplierinvoicepayments",
                Some("SupplierInvoicePayments"),
                &["Number"],
                true,
            )),
            Contract => Some(plan("/contracts", Some("Contracts"), &["DocumentNumber"], false)),
            Order => Some(plan("/orders", Some("Orders"), &["DocumentNumber"], true)),
            Employee => Some(plan("/employees", Some("Employees"), &["EmployeeId"], false)),
            Asset => Some(plan("/assets", Some("Assets"), &["Id", "Number"], false)),
            CompanyInfo => Some(singleton(
                "/companyinformation",
                Some("CompanyInformation"),
                &["OrganizationNumber"],
            )),
        },
        Provider::Visma => match entity_type {
            Invoice => Some(plan("/customerinvoices", None, &["Id"], true)),
            Customer => Some(plan("/customers", None, &["Id"], true)),
            Supplier => Some(plan("/suppliers", None, &["Id"], true)),
            SupplierInvoice => Some(plan("/supplierinvoices", None, &["Id"], true)),
            CompanyInfo => Some(singleton("/companysettings", None, &["CompanyName"])),
            _ => None,
        },
        Provider::Briox => match entity_type {
            Invoice => Some(plan("/invoices", Some("invoices"), &["id"], true)),
            Customer => Some(plan("/customers", Some("customers"), &["id"], true)),
            Supplier => Some(plan("/suppliers", Some("suppliers"), &["id"], true)),
            CompanyInfo => Some(singleton("/settings/company", Some("company"), &["orgNumber"])),
            _ => None,
        },
        Provider::Bokio => match entity_type {
            Invoice => Some(plan("/invoices", Some("items"), &["id"], false)),
            Customer => Some(plan("/customers", Some("items"), &["id"], false)),
            CompanyInfo => Some(singleton("/details", None, &["organisationNumber"])),
            _ => None,
        },
        Provider::Bjornlunden => match entity_type {
            Invoice => Some(plan("/customerinvoice", None, &["id"], true)),
            Customer => Some(plan("/customer", None, &["id"], false)),
            Supplier => Some(plan("/supplier", None, &["id"], false)),
            SupplierInvoice => Some(plan("/supplierinvoice", None, &["id"], true)),
            CompanyInfo => Some(singleton("/company", None, &["orgNo"])),
            _ => None,
        },
        Provider::SieUpload => None,
    }
}

/// The vendor path for an SIE export, where the vendor offers one.
pub fn sie_export_path(provider: Provider, fiscal_year: i32, sie_type: u8) -> Option<String> {
    match provider {
        Provider::Fortnox => Some(format!("/sie/{sie_type}?financialyear={fiscal_year}")),
        Provider::Bjornlunden => Some(format!("/sie?year={fiscal_year}&type={sie_type}")),
        _ => None,
    }
}

const fn plan(
    path: &'static str,
    list_key: Option<&'static str>,
    id_fields: &'static [&'static str],
    supports_modified: bool,
) -> FetchPlan {
    FetchPlan {
        path,
        list_key,
        singleton: false,
        detail_key: None,
        id_fields,
        supports_modified,
    }
}

const fn singleton(
    path: &'static str,
    detail_key: Option<&'static str>,
    id_fields: &'static [&'static str],
) -> FetchPlan {
    FetchPlan {
        path,
        list_key: None,
        singleton: true,
        detail_key,
        id_fields,
        supports_modified: false,
    }
}
