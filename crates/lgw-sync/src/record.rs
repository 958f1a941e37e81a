// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalization of raw vendor rows into canonical entity records.
//!
//! Only the indexed columns are normalized; the full vendor payload rides
//! along in `rawData` and the content hash covers it.  Field candidates
//! span the vendors' casings so one extractor serves all five.

use crate::plan::FetchPlan;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lgw_core::{CanonicalEntityRecord, EntityType, Provider};
use serde_json::Value;

const DOCUMENT_DATE_KEYS: &[&str] = &[
    "InvoiceDate",
    "invoiceDate",
    "TransactionDate",
    "date",
    "DocumentDate",
    "PaymentDate",
    "paymentDate",
];
const DUE_DATE_KEYS: &[&str] = &["DueDate", "dueDate"];
const AMOUNT_KEYS: &[&str] = &["Total", "TotalAmount", "totalAmount", "total", "Amount", "amount"];
const CURRENCY_KEYS: &[&str] = &["Currency", "CurrencyCode", "currency", "currencyCode"];
const COUNTERPARTY_NUMBER_KEYS: &[&str] = &[
    "CustomerNumber",
    "customerNumber",
    "customerNo",
    "SupplierNumber",
    "supplierNumber",
    "supplierNo",
];
const COUNTERPARTY_NAME_KEYS: &[&str] = &[
    "CustomerName",
    "customerName",
    "SupplierName",
    "supplierName",
    "InvoiceCustomerName",
    "Name",
    "name",
];
const STATUS_KEYS: &[&str] = &["status", "Status", "InvoiceState"];
const MODIFIED_KEYS: &[&str] = &[
    "LastModified",
    "lastModified",
    "ModifiedUtc",
    "modifiedUtc",
    "updatedAt",
    "modified",
];

/// Build a canonical record from one raw vendor row.
///
/// Returns `None` when no candidate id field yields a value; such rows are
/// counted as skipped by the engine.
pub fn build_record(
    provider: Provider,
    entity_type: EntityType,
    plan: &FetchPlan,
    raw: Value,
) -> Option<CanonicalEntityRecord> {
    let external_id = plan
        .id_fields
        .iter()
        .find_map(|key| string_of(&raw, key))?;

    let mut record = CanonicalEntityRecord::new(external_id, entity_type, provider, raw);
    record.document_date = first_date(&record.raw_data, DOCUMENT_DATE_KEYS);
    record.due_date = first_date(&record.raw_data, DUE_DATE_KEYS);
    record.amount = first_f64(&record.raw_data, AMOUNT_KEYS);
    if let Some(currency) = first_string(&record.raw_data, CURRENCY_KEYS) {
        record.currency = currency;
    }
    record.counterparty_number = first_string(&record.raw_data, COUNTERPARTY_NUMBER_KEYS);
    record.counterparty_name = first_string(&record.raw_data, COUNTERPARTY_NAME_KEYS);
    record.status = first_string(&record.raw_data, STATUS_KEYS);
    record.last_modified = first_timestamp(&record.raw_data, MODIFIED_KEYS);
    record.fiscal_year = record.document_date.map(|d| d.year());
    Some(record)
}

fn string_of(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_of(raw, key))
}

fn first_f64(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn first_date(raw: &Value, keys: &[&str]) -> Option<NaiveDate> {
    first_string(raw, keys)
        .and_then(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(&s), "%Y-%m-%d").ok())
}

fn first_timestamp(raw: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    let s = first_string(raw, keys)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // Some vendors drop the timezone; read as UTC.
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
