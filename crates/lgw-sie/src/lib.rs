// SPDX-License-Identifier: MIT OR Apache-2.0
//! SIE codec and KPI engine.
//!
//! SIE is the Swedish accounting interchange format: a line-oriented text
//! format over the BAS chart of accounts, traditionally encoded in IBM
//! code page 437.  The codec has three layers:
//!
//! 1. [`decode`] — byte-level decoding to normalized UTF-8, with BOM and
//!    code-page detection and diagnostic errors instead of silent
//!    substitution.
//! 2. [`parse`] — line-oriented parsing into [`SieDocument`]: metadata,
//!    accounts, dimensions, flattened transactions, and IB/UB/RES balances
//!    tagged by year index.
//! 3. [`write`] — round-trip a parsed document back to SIE text.
//!
//! On top of the parsed structure, [`kpi`] computes the full KPI vector
//! with BAS-range categorization, partial-year annualization, and the
//! Swedish adjusted-equity convention.

#![deny(unsafe_code)]

pub mod decode;
pub mod kpi;
pub mod parse;
pub mod types;
pub mod validate;
pub mod write;

pub use decode::{DecodeError, decode_sie_bytes};
pub use kpi::{CORPORATE_TAX_RATE, KpiReport, compute_kpis};
pub use parse::{SieParseError, parse_sie};
pub use types::{
    AccountGroup, BalanceKind, SieAccount, SieBalance, SieDimension, SieDocument, SieMetadata,
    SieTransaction,
};
pub use validate::{BalanceValidation, ValidationIssue, validate_sie_balances};
pub use write::write_sie;
