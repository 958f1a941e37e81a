// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsed SIE structure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AccountGroup
// ---------------------------------------------------------------------------

/// BAS account group derived from the first digit of the account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountGroup {
    /// Class 1.
    Asset,
    /// Class 2 (liabilities and equity).
    Liability,
    /// Class 3.
    Revenue,
    /// Classes 4 through 7.
    Expense,
    /// Class 8 (financial items and taxes).
    Financial,
}

impl AccountGroup {
    /// Derive the group from a BAS account number.
    pub fn from_account_number(number: u32) -> Option<Self> {
        match number / 1000 {
            1 => Some(Self::Asset),
            2 => Some(Self::Liability),
            3 => Some(Self::Revenue),
            4..=7 => Some(Self::Expense),
            8 => Some(Self::Financial),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// File-level metadata from the `#`-directives at the head of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieMetadata {
    /// Company name (`#FNAMN`).
    pub company_name: String,
    /// Swedish organization number (`#ORGNR`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Accounting currency (`#VALUTA`); `SEK` when absent.
    pub currency: String,
    /// SIE type 1 through 4 (`#SIETYP`).
    pub sie_type: u8,
    /// Fiscal year start (`#RAR 0`).
    pub fiscal_year_start: NaiveDate,
    /// Fiscal year end (`#RAR 0`).
    pub fiscal_year_end: NaiveDate,
    /// Last-transaction date for partial-year files (`#OMFATTN`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omfattn_date: Option<NaiveDate>,
    /// Generating program (`#PROGRAM`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Generation date (`#GEN`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<NaiveDate>,
    /// Prior fiscal year (`#RAR -1`), when the file carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_year_start: Option<NaiveDate>,
    /// Prior fiscal year end (`#RAR -1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_year_end: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// One `#KONTO` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieAccount {
    /// BAS account number.
    pub account_number: u32,
    /// Account name.
    pub account_name: String,
    /// Group derived from the first digit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_group: Option<AccountGroup>,
}

/// One `#DIM` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieDimension {
    /// Dimension number.
    pub number: u32,
    /// Dimension name.
    pub name: String,
}

/// One flattened transaction row: a `#TRANS` inside a `#VER` block,
/// carrying the verification header fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieTransaction {
    /// Verification series.
    pub series: String,
    /// Verification number within the series.
    pub number: String,
    /// Row date (the verification date unless the row overrides it).
    pub date: NaiveDate,
    /// Verification text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// BAS account number.
    pub account_number: u32,
    /// Signed amount; debits positive, credits negative.
    pub amount: f64,
}

/// Which balance directive a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    /// `#IB` opening balance.
    Opening,
    /// `#UB` closing balance.
    Closing,
    /// `#RES` income-statement balance.
    Result,
}

/// One `#IB`/`#UB`/`#RES` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieBalance {
    /// Directive the row came from.
    pub kind: BalanceKind,
    /// Year index: 0 is the current year, -1 the previous.
    pub year_index: i8,
    /// BAS account number.
    pub account_number: u32,
    /// Signed amount as stored in the file.
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// SieDocument
// ---------------------------------------------------------------------------

/// A fully parsed SIE file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieDocument {
    /// File-level metadata.
    pub metadata: SieMetadata,
    /// Chart-of-accounts rows.
    pub accounts: Vec<SieAccount>,
    /// Dimensions.
    pub dimensions: Vec<SieDimension>,
    /// Flattened transaction rows (SIE type 4 only).
    pub transactions: Vec<SieTransaction>,
    /// IB/UB/RES balance rows.
    pub balances: Vec<SieBalance>,
    /// Normalized UTF-8 source text, preserved for re-export.
    pub raw_content: String,
}

impl SieDocument {
    /// Sum of balance rows of `kind` and `year_index` over an inclusive
    /// account range.
    pub fn balance_sum(
        &self,
        kind: BalanceKind,
        year_index: i8,
        range: std::ops::RangeInclusive<u32>,
    ) -> f64 {
        self.balances
            .iter()
            .filter(|b| {
                b.kind == kind && b.year_index == year_index && range.contains(&b.account_number)
            })
            .map(|b| b.amount)
            .sum()
    }

    /// Whether any balance row exists for `kind` and `year_index`.
    pub fn has_balance_rows(&self, kind: BalanceKind, year_index: i8) -> bool {
        self.balances
            .iter()
            .any(|b| b.kind == kind && b.year_index == year_index)
    }

    /// The fiscal year of the file, taken from the start date.
    pub fn fiscal_year(&self) -> i32 {
        use chrono::Datelike;
        self.metadata.fiscal_year_start.year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_group_covers_class_8() {
        assert_eq!(
            AccountGroup::from_account_number(8310),
            Some(AccountGroup::Financial)
        );
        assert_eq!(
            AccountGroup::from_account_number(1930),
            Some(AccountGroup::Asset)
        );
        assert_eq!(AccountGroup::from_account_number(9100), None);
    }

    #[test]
    fn balance_sum_filters_kind_year_and_range() {
        let doc = SieDocument {
            metadata: SieMetadata {
                company_name: "Test AB".into(),
                org_number: None,
                currency: "SEK".into(),
                sie_type: 4,
                fiscal_year_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                fiscal_year_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                omfattn_date: None,
                program: None,
                generated_at: None,
                prior_year_start: None,
                prior_year_end: None,
            },
            accounts: vec![],
            dimensions: vec![],
            transactions: vec![],
            balances: vec![
                SieBalance {
                    kind: BalanceKind::Closing,
                    year_index: 0,
                    account_number: 1930,
                    amount: 100.0,
                },
                SieBalance {
                    kind: BalanceKind::Closing,
                    year_index: -1,
                    account_number: 1930,
                    amount: 50.0,
                },
                SieBalance {
                    kind: BalanceKind::Opening,
                    year_index: 0,
                    account_number: 1930,
                    amount: 25.0,
                },
                SieBalance {
                    kind: BalanceKind::Closing,
                    year_index: 0,
                    account_number: 2440,
                    amount: -60.0,
                },
            ],
            raw_content: String::new(),
        };
        assert_eq!(doc.balance_sum(BalanceKind::Closing, 0, 1000..=1999), 100.0);
        assert_eq!(doc.balance_sum(BalanceKind::Closing, -1, 1000..=1999), 50.0);
        assert_eq!(doc.balance_sum(BalanceKind::Opening, 0, 1000..=1999), 25.0);
        assert_eq!(doc.balance_sum(BalanceKind::Closing, 0, 2000..=2999), -60.0);
        assert!(doc.has_balance_rows(BalanceKind::Closing, 0));
        assert!(!doc.has_balance_rows(BalanceKind::Result, 0));
        assert_eq!(doc.fiscal_year(), 2024);
    }
}
