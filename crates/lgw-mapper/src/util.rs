// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field-extraction helpers shared by the vendor mappers.
//!
//! Vendors are loose with JSON types: numbers arrive as strings, dates as
//! `YYYY-MM-DD` or full ISO timestamps.  These helpers normalize without
//! guessing.

use chrono::NaiveDate;
use lgw_core::{DocumentStatus, Money};
use lgw_error::{ErrorCode, GatewayError};
use serde_json::Value;

/// String field; numbers are rendered, null and absence are `None`.
pub fn str_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Required string field; absence is an upstream-decode error.
pub fn req_str_field(raw: &Value, key: &str) -> Result<String, GatewayError> {
    str_field(raw, key).ok_or_else(|| {
        GatewayError::new(
            ErrorCode::UpstreamDecode,
            format!("vendor payload missing field '{key}'"),
        )
    })
}

/// Numeric field; numeric strings are parsed.
pub fn f64_field(raw: &Value, key: &str) -> Option<f64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field; `"true"`/`"false"` strings are accepted.
pub fn bool_field(raw: &Value, key: &str) -> Option<bool> {
    match raw.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "TRUE" => Some(true),
            "false" | "FALSE" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Date field: `YYYY-MM-DD`, or the date prefix of an ISO timestamp.
pub fn date_field(raw: &Value, key: &str) -> Option<NaiveDate> {
    let s = str_field(raw, key)?;
    let prefix = s.get(..10).unwrap_or(&s);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Account number field (integer or numeric string).
pub fn account_field(raw: &Value, key: &str) -> Option<u32> {
    f64_field(raw, key).map(|f| f as u32)
}

/// Monetary amount with the vendor's currency field, defaulting to `SEK`.
pub fn money_field(raw: &Value, amount_key: &str, currency_key: &str) -> Money {
    Money::new(
        f64_field(raw, amount_key).unwrap_or(0.0),
        str_field(raw, currency_key).as_deref(),
    )
}

/// The sales-invoice status precedence shared by the vendor mappers:
/// `cancelled > credited > paid > booked > sent > draft`.
pub fn derive_sales_invoice_status(
    cancelled: bool,
    credited: bool,
    paid: bool,
    booked: bool,
    sent: bool,
) -> DocumentStatus {
    if cancelled {
        DocumentStatus::Cancelled
    } else if credited {
        DocumentStatus::Credited
    } else if paid {
        DocumentStatus::Paid
    } else if booked {
        DocumentStatus::Booked
    } else if sent {
        DocumentStatus::Sent
    } else {
        DocumentStatus::Draft
    }
}

/// The supplier-invoice status rule: zero remaining balance is `paid`,
/// positive is `unpaid`, anything else is `unknown`.
pub fn derive_supplier_invoice_status(balance: Option<f64>) -> DocumentStatus {
    match balance {
        Some(b) if b.abs() < 0.005 => DocumentStatus::Paid,
        Some(b) if b > 0.0 => DocumentStatus::Unpaid,
        _ => DocumentStatus::Unknown,
    }
}
