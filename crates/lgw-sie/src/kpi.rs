// SPDX-License-Identifier: MIT OR Apache-2.0
//! KPI engine over a parsed SIE file.
//!
//! All categorization uses fixed BAS ranges.  Flow figures (income-statement
//! derived) are annualized for partial-period files; margin ratios and
//! balance-sheet stocks are not.  SIE stores income-statement rows signed
//! opposite to natural reading, so revenue sums are negated where a positive
//! magnitude is wanted.

use crate::types::{BalanceKind, SieDocument};
use serde::{Deserialize, Serialize};

/// Swedish corporate tax rate used for adjusted equity and deferred tax.
pub const CORPORATE_TAX_RATE: f64 = 0.206;

// ---------------------------------------------------------------------------
// KpiReport
// ---------------------------------------------------------------------------

/// The full KPI vector computed from one SIE file.
///
/// `None` means the metric's inputs were absent or its denominator was not
/// positive; in particular, files without prior-year rows have every growth
/// metric null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReport {
    /// Days covered by the file (OMFATTN-based for partial years).
    pub period_days: i64,
    /// `365 / period_days` for partial years, otherwise `1.0`.
    pub annualization_factor: f64,

    // -- Flows (raw, not annualized) --
    /// Net sales: revenue 3000-3799 with discounts netted.
    pub net_sales: f64,
    /// Earnings before interest, tax, depreciation, amortization.
    pub ebitda: f64,
    /// Operating result.
    pub ebit: f64,
    /// Result after financial items, before tax.
    pub pre_tax_profit: f64,
    /// Result after tax.
    pub net_income: f64,

    // -- Stocks --
    /// Balance-sheet total (closing).
    pub total_assets: f64,
    /// Equity plus 79.4% of untaxed reserves plus YTD result.
    pub adjusted_equity: f64,
    /// Untaxed reserves times the corporate tax rate.
    pub deferred_tax_liability: f64,
    /// Current assets minus current liabilities.
    pub working_capital: f64,

    // -- Margins (% of net sales; null when net sales is zero) --
    /// Gross margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_margin: Option<f64>,
    /// EBITDA margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebitda_margin: Option<f64>,
    /// Operating (EBIT) margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_margin: Option<f64>,
    /// Pre-tax profit margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<f64>,
    /// Net margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_margin: Option<f64>,

    // -- Returns (%; annualized numerators, averaged denominators) --
    /// Return on assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_on_assets: Option<f64>,
    /// Return on adjusted equity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_on_equity: Option<f64>,
    /// Return on capital employed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_on_capital_employed: Option<f64>,

    // -- Capital structure --
    /// Adjusted equity over total assets (%).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_ratio: Option<f64>,
    /// Total liabilities over adjusted equity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_to_equity: Option<f64>,
    /// Interest-bearing debt over adjusted equity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_bearing_debt_to_equity: Option<f64>,
    /// (EBIT + financial income) over interest expense, annualized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_coverage: Option<f64>,

    // -- Liquidity --
    /// Cash and bank over current liabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_ratio: Option<f64>,
    /// Current assets excluding inventory over current liabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_ratio: Option<f64>,
    /// Current assets over current liabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ratio: Option<f64>,
    /// Working capital over annualized net sales (%).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_capital_ratio: Option<f64>,

    // -- Efficiency (annualized flows) --
    /// Days inventory outstanding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_inventory_outstanding: Option<f64>,
    /// Days sales outstanding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_sales_outstanding: Option<f64>,
    /// Days payables outstanding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_payables_outstanding: Option<f64>,
    /// Cash conversion cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_conversion_cycle: Option<f64>,
    /// Annualized net sales over average total assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_turnover: Option<f64>,

    // -- Growth (% YoY; null without prior-year rows) --
    /// Net-sales growth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<f64>,
    /// Total-assets growth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_growth: Option<f64>,
    /// Adjusted-equity growth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_equity_growth: Option<f64>,
}

// ---------------------------------------------------------------------------
// BAS ranges
// ---------------------------------------------------------------------------

mod bas {
    use std::ops::RangeInclusive;

    pub const ASSETS: RangeInclusive<u32> = 1000..=1999;
    pub const INVENTORY: RangeInclusive<u32> = 1400..=1499;
    pub const CURRENT_ASSETS: RangeInclusive<u32> = 1500..=1999;
    pub const CUSTOMER_RECEIVABLES: RangeInclusive<u32> = 1500..=1599;
    pub const CASH_AND_BANK: RangeInclusive<u32> = 1900..=1999;

    pub const EQUITY: RangeInclusive<u32> = 2080..=2099;
    pub const UNTAXED_RESERVES: RangeInclusive<u32> = 2100..=2199;
    pub const PROVISIONS: RangeInclusive<u32> = 2200..=2299;
    pub const LONG_TERM_LIABILITIES: RangeInclusive<u32> = 2300..=2399;
    pub const INTEREST_BEARING_LONG_TERM: RangeInclusive<u32> = 2310..=2379;
    pub const CURRENT_LIABILITIES: RangeInclusive<u32> = 2400..=2999;
    pub const INTEREST_BEARING_CURRENT: RangeInclusive<u32> = 2410..=2419;
    pub const ACCOUNTS_PAYABLE: RangeInclusive<u32> = 2440..=2449;

    pub const REVENUE: RangeInclusive<u32> = 3000..=3799;
    pub const COGS: RangeInclusive<u32> = 4000..=4999;
    pub const OPERATING_EXPENSES: RangeInclusive<u32> = 5000..=6999;
    pub const PERSONNEL: RangeInclusive<u32> = 7000..=7699;
    pub const DEPRECIATION: RangeInclusive<u32> = 7700..=7899;
    pub const FINANCIAL_INCOME: RangeInclusive<u32> = 8000..=8399;
    pub const INTEREST_EXPENSES: RangeInclusive<u32> = 8400..=8499;
    pub const OTHER_FINANCIAL_EXPENSES: RangeInclusive<u32> = 8500..=8799;
    pub const TAXES: RangeInclusive<u32> = 8800..=8999;
    pub const INCOME_STATEMENT: RangeInclusive<u32> = 3000..=8999;
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Compute the full KPI vector for `doc`.
pub fn compute_kpis(doc: &SieDocument) -> KpiReport {
    let m = &doc.metadata;

    // Annualization: OMFATTN marks the last transaction date of a partial
    // filing; 350..=380 days counts as a full year.
    let period_end = m.omfattn_date.unwrap_or(m.fiscal_year_end);
    let period_days = (period_end - m.fiscal_year_start).num_days() + 1;
    let factor = if !(350..=380).contains(&period_days) && period_days > 0 {
        365.0 / period_days as f64
    } else {
        1.0
    };
    let ann = |flow: f64| flow * factor;

    // Current-year flows, in natural reading.
    let res = |range| doc.balance_sum(BalanceKind::Result, 0, range);
    let net_sales = -res(bas::REVENUE);
    let cogs = res(bas::COGS);
    let opex = res(bas::OPERATING_EXPENSES);
    let personnel = res(bas::PERSONNEL);
    let depreciation = res(bas::DEPRECIATION);
    let financial_income = -res(bas::FINANCIAL_INCOME);
    let interest_expenses = res(bas::INTEREST_EXPENSES);
    let other_financial = res(bas::OTHER_FINANCIAL_EXPENSES);
    let taxes = res(bas::TAXES);
    let ytd_result = -res(bas::INCOME_STATEMENT);

    let gross_profit = net_sales - cogs;
    let ebitda = gross_profit - opex - personnel;
    let ebit = ebitda - depreciation;
    let pre_tax_profit = ebit + financial_income - interest_expenses - other_financial;
    let net_income = pre_tax_profit - taxes;

    // Closing stocks. Liability-side accounts are credits (negative), so
    // magnitudes are taken.
    let ub = |range| doc.balance_sum(BalanceKind::Closing, 0, range);
    let total_assets = ub(bas::ASSETS);
    let inventory = ub(bas::INVENTORY);
    let current_excl_inventory = ub(bas::CURRENT_ASSETS);
    let total_current_assets = inventory + current_excl_inventory;
    let customer_receivables = ub(bas::CUSTOMER_RECEIVABLES);
    let cash_and_bank = ub(bas::CASH_AND_BANK);
    let equity = ub(bas::EQUITY).abs();
    let untaxed_reserves = ub(bas::UNTAXED_RESERVES).abs();
    let provisions = ub(bas::PROVISIONS).abs();
    let long_term_liabilities = ub(bas::LONG_TERM_LIABILITIES).abs();
    let current_liabilities = ub(bas::CURRENT_LIABILITIES).abs();
    let accounts_payable = ub(bas::ACCOUNTS_PAYABLE).abs();
    let interest_bearing_debt =
        ub(bas::INTEREST_BEARING_LONG_TERM).abs() + ub(bas::INTEREST_BEARING_CURRENT).abs();

    let adjusted_equity = equity + untaxed_reserves * (1.0 - CORPORATE_TAX_RATE) + ytd_result;
    let deferred_tax_liability = untaxed_reserves * CORPORATE_TAX_RATE;
    let total_liabilities = provisions + long_term_liabilities + current_liabilities;
    let working_capital = total_current_assets - current_liabilities;

    // Averages: (IB + UB) / 2 when opening rows exist, otherwise closing.
    let has_opening = doc.has_balance_rows(BalanceKind::Opening, 0);
    let ib = |range| doc.balance_sum(BalanceKind::Opening, 0, range);
    let avg = |opening: f64, closing: f64| {
        if has_opening {
            (opening + closing) / 2.0
        } else {
            closing
        }
    };
    let avg_total_assets = avg(ib(bas::ASSETS), total_assets);
    let opening_adjusted_equity =
        ib(bas::EQUITY).abs() + ib(bas::UNTAXED_RESERVES).abs() * (1.0 - CORPORATE_TAX_RATE);
    let avg_adjusted_equity = avg(opening_adjusted_equity, adjusted_equity);
    let opening_ib_debt = ib(bas::INTEREST_BEARING_LONG_TERM).abs()
        + ib(bas::INTEREST_BEARING_CURRENT).abs();
    let avg_interest_bearing_debt = avg(opening_ib_debt, interest_bearing_debt);

    // Ratio helpers: margins null on zero sales, returns null on
    // non-positive denominators.
    let margin = |num: f64| {
        if net_sales.abs() < f64::EPSILON {
            None
        } else {
            Some(num / net_sales * 100.0)
        }
    };
    let ratio = |num: f64, den: f64| if den > 0.0 { Some(num / den) } else { None };
    let pct = |num: f64, den: f64| ratio(num, den).map(|r| r * 100.0);

    let net_sales_ann = ann(net_sales);
    let cogs_ann = ann(cogs);

    let dio = ratio(inventory * 365.0, cogs_ann);
    let dso = ratio(customer_receivables * 365.0, net_sales_ann);
    let dpo = ratio(accounts_payable * 365.0, cogs_ann);
    let ccc = match (dio, dso, dpo) {
        (Some(dio), Some(dso), Some(dpo)) => Some(dio + dso - dpo),
        _ => None,
    };

    let has_prior = doc.balances.iter().any(|b| b.year_index == -1);
    let (revenue_growth, assets_growth, adjusted_equity_growth) = if has_prior {
        let prior_net_sales = -doc.balance_sum(BalanceKind::Result, -1, bas::REVENUE);
        let prior_assets = doc.balance_sum(BalanceKind::Closing, -1, bas::ASSETS);
        let prior_ytd = -doc.balance_sum(BalanceKind::Result, -1, bas::INCOME_STATEMENT);
        let prior_adjusted_equity = doc.balance_sum(BalanceKind::Closing, -1, bas::EQUITY).abs()
            + doc
                .balance_sum(BalanceKind::Closing, -1, bas::UNTAXED_RESERVES)
                .abs()
                * (1.0 - CORPORATE_TAX_RATE)
            + prior_ytd;
        let growth = |current: f64, prior: f64| {
            if prior.abs() < f64::EPSILON {
                None
            } else {
                Some((current - prior) / prior.abs() * 100.0)
            }
        };
        (
            growth(net_sales, prior_net_sales),
            growth(total_assets, prior_assets),
            growth(adjusted_equity, prior_adjusted_equity),
        )
    } else {
        (None, None, None)
    };

    KpiReport {
        period_days,
        annualization_factor: factor,

        net_sales,
        ebitda,
        ebit,
        pre_tax_profit,
        net_income,

        total_assets,
        adjusted_equity,
        deferred_tax_liability,
        working_capital,

        gross_margin: margin(gross_profit),
        ebitda_margin: margin(ebitda),
        operating_margin: margin(ebit),
        profit_margin: margin(pre_tax_profit),
        net_margin: margin(net_income),

        return_on_assets: pct(ann(ebit), avg_total_assets),
        return_on_equity: pct(ann(net_income), avg_adjusted_equity),
        return_on_capital_employed: pct(
            ann(ebit),
            avg_adjusted_equity + avg_interest_bearing_debt,
        ),

        equity_ratio: pct(adjusted_equity, total_assets),
        debt_to_equity: ratio(total_liabilities, adjusted_equity),
        interest_bearing_debt_to_equity: ratio(interest_bearing_debt, adjusted_equity),
        interest_coverage: ratio(ann(ebit) + ann(financial_income), ann(interest_expenses)),

        cash_ratio: ratio(cash_and_bank, current_liabilities),
        quick_ratio: ratio(current_excl_inventory, current_liabilities),
        current_ratio: ratio(total_current_assets, current_liabilities),
        working_capital_ratio: if net_sales_ann.abs() < f64::EPSILON {
            None
        } else {
            Some(working_capital / net_sales_ann * 100.0)
        },

        days_inventory_outstanding: dio,
        days_sales_outstanding: dso,
        days_payables_outstanding: dpo,
        cash_conversion_cycle: ccc,
        asset_turnover: ratio(net_sales_ann, avg_total_assets),

        revenue_growth,
        assets_growth,
        adjusted_equity_growth,
    }
}
