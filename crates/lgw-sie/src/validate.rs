// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural validation of a parsed file's balance rows.

use crate::types::{BalanceKind, SieDocument};
use serde::{Deserialize, Serialize};

/// One validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssue {
    /// No `#UB` rows for the current year (error).
    NoClosingBalances,
    /// No `#RES` rows for the current year (error).
    NoResultRows,
    /// No current-year rows at all (error).
    NoCurrentYearRows,
    /// No `#IB` rows for the current year (warning).
    NoOpeningBalances,
    /// No prior-year rows; growth KPIs will be null (warning).
    NoPriorYear,
}

/// Outcome of [`validate_sie_balances`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceValidation {
    /// Findings that make KPI computation unreliable.
    pub errors: Vec<ValidationIssue>,
    /// Findings that degrade but do not block KPI computation.
    pub warnings: Vec<ValidationIssue>,
}

impl BalanceValidation {
    /// Whether no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that the balance rows carry enough structure for the KPI engine.
///
/// Missing prior-year rows disable growth metrics rather than failing, so
/// they are a warning.
pub fn validate_sie_balances(doc: &SieDocument) -> BalanceValidation {
    let mut v = BalanceValidation::default();

    let has_current = doc.balances.iter().any(|b| b.year_index == 0);
    if !has_current {
        v.errors.push(ValidationIssue::NoCurrentYearRows);
    }
    if !doc.has_balance_rows(BalanceKind::Closing, 0) {
        v.errors.push(ValidationIssue::NoClosingBalances);
    }
    if !doc.has_balance_rows(BalanceKind::Result, 0) {
        v.errors.push(ValidationIssue::NoResultRows);
    }
    if !doc.has_balance_rows(BalanceKind::Opening, 0) {
        v.warnings.push(ValidationIssue::NoOpeningBalances);
    }
    let has_prior = doc.balances.iter().any(|b| b.year_index == -1);
    if !has_prior {
        v.warnings.push(ValidationIssue::NoPriorYear);
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_sie;

    fn doc_from(body: &str) -> SieDocument {
        let text = format!("#FNAMN \"X\"\n#RAR 0 20240101 20241231\n{body}");
        parse_sie(&text).unwrap()
    }

    #[test]
    fn complete_file_validates_clean() {
        let doc = doc_from(
            "#IB 0 1930 1.00\n#UB 0 1930 2.00\n#RES 0 3001 -3.00\n#UB -1 1930 1.00\n#RES -1 3001 -2.00\n",
        );
        let v = validate_sie_balances(&doc);
        assert!(v.is_ok());
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn empty_balances_produce_all_errors() {
        let doc = doc_from("");
        let v = validate_sie_balances(&doc);
        assert!(!v.is_ok());
        assert!(v.errors.contains(&ValidationIssue::NoCurrentYearRows));
        assert!(v.errors.contains(&ValidationIssue::NoClosingBalances));
        assert!(v.errors.contains(&ValidationIssue::NoResultRows));
    }

    #[test]
    fn missing_prior_year_is_a_warning() {
        let doc = doc_from("#IB 0 1930 1.00\n#UB 0 1930 2.00\n#RES 0 3001 -3.00\n");
        let v = validate_sie_balances(&doc);
        assert!(v.is_ok());
        assert_eq!(v.warnings, vec![ValidationIssue::NoPriorYear]);
    }

    #[test]
    fn missing_opening_is_a_warning() {
        let doc = doc_from("#UB 0 1930 2.00\n#RES 0 3001 -3.00\n#UB -1 1930 1.00\n");
        let v = validate_sie_balances(&doc);
        assert!(v.is_ok());
        assert!(v.warnings.contains(&ValidationIssue::NoOpeningBalances));
    }
}
