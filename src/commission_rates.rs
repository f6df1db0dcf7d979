//! Default upfront and trail rates per lender.

use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LenderRate {
    pub lender_name: &'static str,
    /// Percent of the loan amount.
    pub upfront_rate: f64,
    /// Percent of the loan amount.
    pub trail_rate: f64,
}

const fn rate(lender_name: &'static str, upfront_rate: f64, trail_rate: f64) -> LenderRate {
    LenderRate {
        lender_name,
        upfront_rate,
        trail_rate,
    }
}

pub const DEFAULT_RATES: &[LenderRate] = &[
    rate("Commonwealth Bank", 0.65, 0.15),
    rate("ANZ", 0.60, 0.15),
    rate("Westpac", 0.65, 0.20),
    rate("NAB", 0.60, 0.15),
    rate("Macquarie", 0.70, 0.25),
    rate("ING", 0.65, 0.15),
    rate("Suncorp", 0.65, 0.15),
    rate("St. George", 0.65, 0.20),
    rate("Bank of Queensland", 0.60, 0.15),
    rate("Bendigo Bank", 0.65, 0.15),
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, TS)]
#[ts(export)]
pub struct CommissionEstimate {
    pub upfront: f64,
    pub trail: f64,
}

pub fn find_rate(lender: &str) -> Option<&'static LenderRate> {
    let lender = lender.trim();
    DEFAULT_RATES
        .iter()
        .find(|rate| rate.lender_name.eq_ignore_ascii_case(lender))
}

/// Estimated commission on `loan_amount`; an unknown lender earns nothing.
pub fn calculate(lender: &str, loan_amount: f64) -> CommissionEstimate {
    match find_rate(lender) {
        Some(rate) => CommissionEstimate {
            upfront: rate.upfront_rate / 100.0 * loan_amount,
            trail: rate.trail_rate / 100.0 * loan_amount,
        },
        None => CommissionEstimate::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn lender_lookup_ignores_case() {
        let estimate = calculate("westpac", 500_000.0);
        assert!(close(estimate.upfront, 3250.0));
        assert!(close(estimate.trail, 1000.0));
    }

    #[test]
    fn unknown_lender_earns_nothing() {
        assert_eq!(calculate("Bank of Nowhere", 500_000.0), CommissionEstimate::default());
    }

    #[test]
    fn table_has_ten_lenders() {
        assert_eq!(DEFAULT_RATES.len(), 10);
        assert!(find_rate("  ING ").is_some());
    }
}
