// SPDX-License-Identifier: MIT OR Apache-2.0
//! SIE writer: round-trip a parsed document back to SIE text.
//!
//! Output is normalized: directives in a fixed order, quoted names, `CRLF`
//! line endings, amounts with two decimals.  Transactions are regrouped
//! into their `#VER` blocks by (series, number).

use crate::types::{BalanceKind, SieDocument, SieTransaction};
use std::fmt::Write as _;

/// Render `doc` as SIE text.
pub fn write_sie(doc: &SieDocument) -> String {
    let mut out = String::new();
    let m = &doc.metadata;

    push_line(&mut out, "#FLAGGA 0");
    if let Some(program) = &m.program {
        push_line(&mut out, &format!("#PROGRAM {}", quote(program)));
    }
    push_line(&mut out, "#FORMAT PC8");
    if let Some(generated) = m.generated_at {
        push_line(&mut out, &format!("#GEN {}", generated.format("%Y%m%d")));
    }
    push_line(&mut out, &format!("#SIETYP {}", m.sie_type));
    if let Some(orgnr) = &m.org_number {
        push_line(&mut out, &format!("#ORGNR {orgnr}"));
    }
    push_line(&mut out, &format!("#FNAMN {}", quote(&m.company_name)));
    push_line(&mut out, &format!("#VALUTA {}", m.currency));
    push_line(
        &mut out,
        &format!(
            "#RAR 0 {} {}",
            m.fiscal_year_start.format("%Y%m%d"),
            m.fiscal_year_end.format("%Y%m%d")
        ),
    );
    if let (Some(start), Some(end)) = (m.prior_year_start, m.prior_year_end) {
        push_line(
            &mut out,
            &format!("#RAR -1 {} {}", start.format("%Y%m%d"), end.format("%Y%m%d")),
        );
    }
    if let Some(omfattn) = m.omfattn_date {
        push_line(&mut out, &format!("#OMFATTN {}", omfattn.format("%Y%m%d")));
    }

    for account in &doc.accounts {
        push_line(
            &mut out,
            &format!(
                "#KONTO {} {}",
                account.account_number,
                quote(&account.account_name)
            ),
        );
    }
    for dim in &doc.dimensions {
        push_line(&mut out, &format!("#DIM {} {}", dim.number, quote(&dim.name)));
    }

    for balance in &doc.balances {
        let directive = match balance.kind {
            BalanceKind::Opening => "#IB",
            BalanceKind::Closing => "#UB",
            BalanceKind::Result => "#RES",
        };
        push_line(
            &mut out,
            &format!(
                "{directive} {} {} {:.2}",
                balance.year_index, balance.account_number, balance.amount
            ),
        );
    }

    for group in group_verifications(&doc.transactions) {
        let head = &group[0];
        let mut header = format!(
            "#VER {} {} {}",
            head.series,
            head.number,
            head.date.format("%Y%m%d")
        );
        if let Some(text) = &head.text {
            let _ = write!(header, " {}", quote(text));
        }
        push_line(&mut out, &header);
        push_line(&mut out, "{");
        for row in group {
            push_line(
                &mut out,
                &format!(
                    "#TRANS {} {{}} {:.2} {}",
                    row.account_number,
                    row.amount,
                    row.date.format("%Y%m%d")
                ),
            );
        }
        push_line(&mut out, "}");
    }

    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Group flattened rows back into verification blocks, preserving first-seen
/// order of (series, number).
fn group_verifications(transactions: &[SieTransaction]) -> Vec<Vec<&SieTransaction>> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: std::collections::HashMap<(String, String), Vec<&SieTransaction>> =
        std::collections::HashMap::new();
    for t in transactions {
        let key = (t.series.clone(), t.number.clone());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(t);
    }
    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}
