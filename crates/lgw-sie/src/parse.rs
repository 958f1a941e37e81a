// SPDX-License-Identifier: MIT OR Apache-2.0
//! Line-oriented SIE parser.
//!
//! The input is normalized UTF-8 (see [`crate::decode`]).  Each line is a
//! `#DIRECTIVE` followed by space-separated fields; fields may be quoted to
//! carry spaces, and `#VER` rows open a `{ … }` block of `#TRANS` rows.
//! Transactions are flattened: one output row per `#TRANS`, carrying the
//! verification series, number, date, and text.

use crate::types::{
    AccountGroup, BalanceKind, SieAccount, SieBalance, SieDimension, SieDocument, SieMetadata,
    SieTransaction,
};
use chrono::NaiveDate;
use thiserror::Error;

/// Parse failures with 1-based line numbers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SieParseError {
    /// A directive the file must carry is missing.
    #[error("missing required directive {directive}")]
    MissingDirective {
        /// The absent directive, e.g. `#FNAMN`.
        directive: &'static str,
    },
    /// A directive had too few fields.
    #[error("line {line}: malformed {directive} row")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The directive.
        directive: String,
    },
    /// A field that must be numeric was not.
    #[error("line {line}: invalid number '{value}'")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// The offending field.
        value: String,
    },
    /// A date field was not `YYYYMMDD`.
    #[error("line {line}: invalid date '{value}'")]
    InvalidDate {
        /// 1-based line number.
        line: usize,
        /// The offending field.
        value: String,
    },
    /// A `#TRANS` row outside a `#VER` block, or an unbalanced brace.
    #[error("line {line}: unexpected {what}")]
    Unexpected {
        /// 1-based line number.
        line: usize,
        /// What was found.
        what: String,
    },
}

/// Parse normalized SIE text into a [`SieDocument`].
pub fn parse_sie(text: &str) -> Result<SieDocument, SieParseError> {
    let mut company_name: Option<String> = None;
    let mut org_number: Option<String> = None;
    let mut currency = "SEK".to_string();
    let mut sie_type: u8 = 4;
    let mut fiscal_year: Option<(NaiveDate, NaiveDate)> = None;
    let mut prior_year: Option<(NaiveDate, NaiveDate)> = None;
    let mut omfattn_date: Option<NaiveDate> = None;
    let mut program: Option<String> = None;
    let mut generated_at: Option<NaiveDate> = None;

    let mut accounts: Vec<SieAccount> = Vec::new();
    let mut dimensions: Vec<SieDimension> = Vec::new();
    let mut transactions: Vec<SieTransaction> = Vec::new();
    let mut balances: Vec<SieBalance> = Vec::new();

    // Open #VER header while inside its { } block.
    struct VerHeader {
        series: String,
        number: String,
        date: NaiveDate,
        text: Option<String>,
    }
    let mut open_ver: Option<VerHeader> = None;
    let mut in_block = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "{" {
            if open_ver.is_none() || in_block {
                return Err(SieParseError::Unexpected {
                    line: line_no,
                    what: "'{'".into(),
                });
            }
            in_block = true;
            continue;
        }
        if line == "}" {
            if !in_block {
                return Err(SieParseError::Unexpected {
                    line: line_no,
                    what: "'}'".into(),
                });
            }
            in_block = false;
            open_ver = None;
            continue;
        }

        if !line.starts_with('#') {
            continue;
        }

        let fields = tokenize(line);
        let directive = fields[0].to_ascii_uppercase();
        let args = &fields[1..];

        match directive.as_str() {
            "#FNAMN" => {
                company_name = Some(first_arg(args, line_no, &directive)?.to_owned());
            }
            "#ORGNR" => {
                org_number = Some(first_arg(args, line_no, &directive)?.to_owned());
            }
            "#VALUTA" => {
                currency = first_arg(args, line_no, &directive)?.to_owned();
            }
            "#SIETYP" => {
                sie_type = parse_num::<u8>(first_arg(args, line_no, &directive)?, line_no)?;
            }
            "#PROGRAM" => {
                program = Some(args.join(" "));
            }
            "#GEN" => {
                generated_at = Some(parse_date(first_arg(args, line_no, &directive)?, line_no)?);
            }
            "#OMFATTN" => {
                omfattn_date = Some(parse_date(first_arg(args, line_no, &directive)?, line_no)?);
            }
            "#RAR" => {
                if args.len() < 3 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                let year_index = parse_num::<i8>(&args[0], line_no)?;
                let start = parse_date(&args[1], line_no)?;
                let end = parse_date(&args[2], line_no)?;
                match year_index {
                    0 => fiscal_year = Some((start, end)),
                    -1 => prior_year = Some((start, end)),
                    _ => {}
                }
            }
            "#KONTO" => {
                if args.len() < 2 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                let number = parse_num::<u32>(&args[0], line_no)?;
                accounts.push(SieAccount {
                    account_number: number,
                    account_name: args[1].clone(),
                    account_group: AccountGroup::from_account_number(number),
                });
            }
            "#DIM" => {
                if args.len() < 2 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                dimensions.push(SieDimension {
                    number: parse_num::<u32>(&args[0], line_no)?,
                    name: args[1].clone(),
                });
            }
            "#IB" | "#UB" | "#RES" => {
                if args.len() < 3 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                let kind = match directive.as_str() {
                    "#IB" => BalanceKind::Opening,
                    "#UB" => BalanceKind::Closing,
                    _ => BalanceKind::Result,
                };
                balances.push(SieBalance {
                    kind,
                    year_index: parse_num::<i8>(&args[0], line_no)?,
                    account_number: parse_num::<u32>(&args[1], line_no)?,
                    amount: parse_num::<f64>(&args[2], line_no)?,
                });
            }
            "#VER" => {
                if args.len() < 3 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                open_ver = Some(VerHeader {
                    series: args[0].clone(),
                    number: args[1].clone(),
                    date: parse_date(&args[2], line_no)?,
                    text: args.get(3).cloned().filter(|t| !t.is_empty()),
                });
                // The opening brace may trail the header on the same line.
                if line.ends_with('{') {
                    in_block = true;
                }
            }
            "#TRANS" => {
                let Some(header) = open_ver.as_ref() else {
                    return Err(SieParseError::Unexpected {
                        line: line_no,
                        what: "#TRANS outside a #VER block".into(),
                    });
                };
                if !in_block {
                    return Err(SieParseError::Unexpected {
                        line: line_no,
                        what: "#TRANS before '{'".into(),
                    });
                }
                // #TRANS account {dims} amount [date] [text]
                if args.len() < 3 {
                    return Err(SieParseError::Malformed {
                        line: line_no,
                        directive,
                    });
                }
                let account_number = parse_num::<u32>(&args[0], line_no)?;
                let amount = parse_num::<f64>(&args[2], line_no)?;
                let date = match args.get(3) {
                    Some(d) if !d.is_empty() => parse_date(d, line_no)?,
                    _ => header.date,
                };
                let text = args
                    .get(4)
                    .cloned()
                    .filter(|t| !t.is_empty())
                    .or_else(|| header.text.clone());
                transactions.push(SieTransaction {
                    series: header.series.clone(),
                    number: header.number.clone(),
                    date,
                    text,
                    account_number,
                    amount,
                });
            }
            // #FLAGGA, #FORMAT, #KPTYP, #ADRESS and friends carry nothing
            // the canonical model needs.
            _ => {}
        }
    }

    let company_name = company_name.ok_or(SieParseError::MissingDirective {
        directive: "#FNAMN",
    })?;
    let (fiscal_year_start, fiscal_year_end) =
        fiscal_year.ok_or(SieParseError::MissingDirective { directive: "#RAR" })?;

    Ok(SieDocument {
        metadata: SieMetadata {
            company_name,
            org_number,
            currency,
            sie_type,
            fiscal_year_start,
            fiscal_year_end,
            omfattn_date,
            program,
            generated_at,
            prior_year_start: prior_year.map(|(s, _)| s),
            prior_year_end: prior_year.map(|(_, e)| e),
        },
        accounts,
        dimensions,
        transactions,
        balances,
        raw_content: text.to_owned(),
    })
}

/// Split a SIE line into fields.
///
/// Quoted fields keep embedded spaces (a doubled quote escapes a quote);
/// `{…}` groups become a single field with the braces stripped; everything
/// else splits on runs of whitespace.
fn tokenize(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut field = String::new();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            field.push('"');
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        field.push(c);
                    }
                }
                fields.push(field);
            }
            '{' => {
                chars.next();
                let mut field = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    field.push(c);
                }
                fields.push(field.trim().to_owned());
            }
            _ => {
                let mut field = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ' ' || c == '\t' {
                        break;
                    }
                    field.push(c);
                    chars.next();
                }
                fields.push(field);
            }
        }
    }
    fields
}

fn first_arg<'a>(
    args: &'a [String],
    line: usize,
    directive: &str,
) -> Result<&'a str, SieParseError> {
    args.first().map(|s| s.as_str()).ok_or(SieParseError::Malformed {
        line,
        directive: directive.to_owned(),
    })
}

fn parse_num<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, SieParseError> {
    value.parse().map_err(|_| SieParseError::InvalidNumber {
        line,
        value: value.to_owned(),
    })
}

fn parse_date(value: &str, line: usize) -> Result<NaiveDate, SieParseError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| SieParseError::InvalidDate {
        line,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#FLAGGA 0
#PROGRAM "Bokföring" 1.0
#FORMAT PC8
#GEN 20250115
#SIETYP 4
#ORGNR 556677-8899
#FNAMN "Fjällbacka Konsult AB"
#VALUTA SEK
#RAR 0 20240101 20241231
#RAR -1 20230101 20231231
#OMFATTN 20240630
#KONTO 1930 "Företagskonto"
#KONTO 3001 "Försäljning inom Sverige"
#DIM 1 "Kostnadsställe"
#IB 0 1930 100000.00
#UB 0 1930 150000.00
#UB -1 1930 100000.00
#RES 0 3001 -500000.00
#RES -1 3001 -400000.00
#VER A 1 20240115 "Faktura 1001"
{
#TRANS 1510 {} 125000.00
#TRANS 3001 {} -100000.00
#TRANS 2611 {} -25000.00
}
"#;

    #[test]
    fn parses_metadata() {
        let doc = parse_sie(SAMPLE).unwrap();
        let m = &doc.metadata;
        assert_eq!(m.company_name, "Fjällbacka Konsult AB");
        assert_eq!(m.org_number.as_deref(), Some("556677-8899"));
        assert_eq!(m.currency, "SEK");
        assert_eq!(m.sie_type, 4);
        assert_eq!(m.fiscal_year_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(m.fiscal_year_end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(m.omfattn_date, Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert_eq!(m.prior_year_start, Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
    }

    #[test]
    fn parses_accounts_with_groups() {
        let doc = parse_sie(SAMPLE).unwrap();
        assert_eq!(doc.accounts.len(), 2);
        assert_eq!(doc.accounts[0].account_number, 1930);
        assert_eq!(doc.accounts[0].account_name, "Företagskonto");
        assert_eq!(doc.accounts[0].account_group, Some(AccountGroup::Asset));
        assert_eq!(doc.accounts[1].account_group, Some(AccountGroup::Revenue));
    }

    #[test]
    fn parses_balances_with_year_index() {
        let doc = parse_sie(SAMPLE).unwrap();
        assert_eq!(doc.balances.len(), 5);
        let prior_ub: Vec<_> = doc
            .balances
            .iter()
            .filter(|b| b.kind == BalanceKind::Closing && b.year_index == -1)
            .collect();
        assert_eq!(prior_ub.len(), 1);
        assert_eq!(prior_ub[0].amount, 100000.0);
    }

    #[test]
    fn flattens_transactions_with_header_fields() {
        let doc = parse_sie(SAMPLE).unwrap();
        assert_eq!(doc.transactions.len(), 3);
        let t = &doc.transactions[0];
        assert_eq!(t.series, "A");
        assert_eq!(t.number, "1");
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(t.text.as_deref(), Some("Faktura 1001"));
        assert_eq!(t.account_number, 1510);
        assert_eq!(t.amount, 125000.0);
        // Verification rows balance.
        let sum: f64 = doc.transactions.iter().map(|t| t.amount).sum();
        assert!(sum.abs() < 0.001);
    }

    #[test]
    fn trans_row_date_overrides_header() {
        let text = "#FNAMN \"X\"\n#RAR 0 20240101 20241231\n#VER A 2 20240201\n{\n#TRANS 1930 {} 10.00 20240215 \"Egen text\"\n}\n";
        let doc = parse_sie(text).unwrap();
        assert_eq!(doc.transactions[0].date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert_eq!(doc.transactions[0].text.as_deref(), Some("Egen text"));
    }

    #[test]
    fn missing_fnamn_is_an_error() {
        let err = parse_sie("#RAR 0 20240101 20241231\n").unwrap_err();
        assert_eq!(
            err,
            SieParseError::MissingDirective {
                directive: "#FNAMN"
            }
        );
    }

    #[test]
    fn missing_rar_is_an_error() {
        let err = parse_sie("#FNAMN \"X\"\n").unwrap_err();
        assert_eq!(err, SieParseError::MissingDirective { directive: "#RAR" });
    }

    #[test]
    fn trans_outside_ver_is_an_error() {
        let err = parse_sie("#FNAMN \"X\"\n#RAR 0 20240101 20241231\n#TRANS 1930 {} 10.00\n")
            .unwrap_err();
        assert!(matches!(err, SieParseError::Unexpected { line: 3, .. }));
    }

    #[test]
    fn bad_amount_is_diagnosed_with_line() {
        let err =
            parse_sie("#FNAMN \"X\"\n#RAR 0 20240101 20241231\n#UB 0 1930 tio\n").unwrap_err();
        assert_eq!(
            err,
            SieParseError::InvalidNumber {
                line: 3,
                value: "tio".into()
            }
        );
    }

    #[test]
    fn quoted_fields_keep_spaces_and_escaped_quotes() {
        let fields = tokenize(r#"#KONTO 1510 "Kundfordringar ""osäkra""""#);
        assert_eq!(fields[2], r#"Kundfordringar "osäkra""#);
    }

    #[test]
    fn raw_content_is_preserved() {
        let doc = parse_sie(SAMPLE).unwrap();
        assert_eq!(doc.raw_content, SAMPLE);
    }
}
