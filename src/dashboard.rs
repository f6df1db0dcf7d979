//! Figures shown on the referral and finance dashboards.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use ts_rs::TS;

use crate::{
    model_finance::{
        ArrangementStatus, Commission, CommissionStatus, FinanceArrangement, Incentive,
        IncentiveStatus,
    },
    model_referral::{Referral, ReferralStatus},
    time::parse_date,
};

const MONTHS_SHOWN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusCount {
    pub status: ReferralStatus,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct MonthCount {
    /// e.g. `May 2024`
    pub month: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferralStats {
    pub total: u32,
    pub total_value: f64,
    /// Percentage of referrals completed, 0 when there are none.
    pub conversion_rate: f64,
    pub average_value: f64,
    pub by_status: Vec<StatusCount>,
    pub by_month: Vec<MonthCount>,
}

pub fn referral_stats(referrals: &[Referral]) -> ReferralStats {
    let total = referrals.len() as u32;
    let total_value: f64 = referrals.iter().filter_map(|r| r.value).sum();
    let completed = referrals
        .iter()
        .filter(|r| r.status == ReferralStatus::Completed)
        .count();
    let (conversion_rate, average_value) = if total > 0 {
        (
            completed as f64 * 100.0 / f64::from(total),
            (total_value / f64::from(total)).round(),
        )
    } else {
        (0.0, 0.0)
    };

    let by_status = ReferralStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: referrals.iter().filter(|r| r.status == status).count() as u32,
        })
        .collect();

    let mut months: BTreeMap<(i32, u32), u32> = BTreeMap::new();
    for date in referrals.iter().filter_map(|r| parse_date(&r.date)) {
        *months.entry((date.year(), date.month())).or_default() += 1;
    }
    let skip = months.len().saturating_sub(MONTHS_SHOWN);
    let by_month = months
        .into_iter()
        .skip(skip)
        .filter_map(|((year, month), count)| {
            NaiveDate::from_ymd_opt(year, month, 1).map(|first| MonthCount {
                month: first.format("%b %Y").to_string(),
                count,
            })
        })
        .collect();

    ReferralStats {
        total,
        total_value,
        conversion_rate,
        average_value,
        by_status,
        by_month,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, TS)]
#[ts(export)]
pub struct Tally {
    pub amount: f64,
    pub count: u32,
}

impl Tally {
    fn add(&mut self, amount: f64) {
        self.amount += amount;
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FinanceSummary {
    pub settled_loans: Tally,
    pub commissions_received: Tally,
    pub commissions_pending: Tally,
    pub incentives_delivered: Tally,
}

fn commission_total(c: &Commission) -> f64 {
    c.upfront_amount.unwrap_or(0.0) + c.trail_amount.unwrap_or(0.0)
}

pub fn finance_summary(
    arrangements: &[FinanceArrangement],
    commissions: &[Commission],
    incentives: &[Incentive],
) -> FinanceSummary {
    let mut summary = FinanceSummary::default();
    for a in arrangements
        .iter()
        .filter(|a| a.status == ArrangementStatus::Settled)
    {
        summary.settled_loans.add(a.loan_amount.unwrap_or(0.0));
    }
    for c in commissions {
        match c.status {
            CommissionStatus::Received => summary.commissions_received.add(commission_total(c)),
            CommissionStatus::Pending => summary.commissions_pending.add(commission_total(c)),
            CommissionStatus::Overdue => {}
        }
    }
    for i in incentives
        .iter()
        .filter(|i| i.status == IncentiveStatus::Delivered)
    {
        summary.incentives_delivered.add(i.amount.unwrap_or(0.0));
    }
    summary
}

/// Case-insensitive match on client name or source, optionally narrowed to one status.
pub fn filter_referrals<'a>(
    referrals: &'a [Referral],
    search: &str,
    status: Option<ReferralStatus>,
) -> Vec<&'a Referral> {
    let needle = search.trim().to_lowercase();
    referrals
        .iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .filter(|r| {
            needle.is_empty()
                || r.client_name.to_lowercase().contains(&needle)
                || r.source.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{
        sample_records, CommissionEntity, FinanceArrangementEntity, IncentiveEntity,
        ReferralEntity,
    };
    use crate::model_referral::ReferrerType;
    use chrono::{TimeZone, Utc};

    fn referral(name: &str, status: ReferralStatus, date: &str, value: Option<f64>) -> Referral {
        Referral {
            id: name.to_lowercase(),
            client_name: name.into(),
            source: "LinkedIn".into(),
            status,
            date: date.into(),
            value,
            notes: None,
            referrer_type: ReferrerType::Client,
            referrer_email: None,
            referrer_phone: None,
            recipient_email: None,
            is_external: None,
        }
    }

    #[test]
    fn empty_list_has_zero_rates() {
        let stats = referral_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.conversion_rate, 0.0);
        assert_eq!(stats.average_value, 0.0);
        assert_eq!(stats.by_status.len(), 5);
        assert!(stats.by_month.is_empty());
    }

    #[test]
    fn sample_referrals_summarise() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        let stats = referral_stats(&sample_records::<ReferralEntity>(now));
        assert_eq!(stats.total, 5);
        assert_eq!(stats.total_value, 33500.0);
        assert_eq!(stats.conversion_rate, 20.0);
        assert_eq!(stats.average_value, 6700.0);
        assert!(stats.by_status.iter().all(|s| s.count == 1));
        assert_eq!(
            stats.by_month,
            vec![MonthCount {
                month: "Jun 2024".into(),
                count: 5
            }]
        );
    }

    #[test]
    fn months_keep_the_latest_six_in_order() {
        let referrals: Vec<_> = (1..=8)
            .map(|m| {
                referral(
                    &format!("R{m}"),
                    ReferralStatus::New,
                    &format!("2024-{m:02}-10"),
                    None,
                )
            })
            .collect();
        let months: Vec<_> = referral_stats(&referrals)
            .by_month
            .into_iter()
            .map(|m| m.month)
            .collect();
        assert_eq!(
            months,
            ["Mar 2024", "Apr 2024", "May 2024", "Jun 2024", "Jul 2024", "Aug 2024"]
        );
    }

    #[test]
    fn average_is_rounded() {
        let referrals = [
            referral("A", ReferralStatus::New, "2024-01-01", Some(1000.0)),
            referral("B", ReferralStatus::Lost, "2024-01-02", Some(1001.0)),
            referral("C", ReferralStatus::Lost, "2024-01-03", None),
        ];
        assert_eq!(referral_stats(&referrals).average_value, 667.0);
    }

    #[test]
    fn finance_summary_over_samples() {
        let now = Utc::now();
        let summary = finance_summary(
            &sample_records::<FinanceArrangementEntity>(now),
            &sample_records::<CommissionEntity>(now),
            &sample_records::<IncentiveEntity>(now),
        );
        assert_eq!(
            summary.settled_loans,
            Tally {
                amount: 830000.0,
                count: 2
            }
        );
        assert_eq!(summary.commissions_received.amount, 2720.0);
        assert_eq!(summary.commissions_pending.amount, 4165.0);
        assert_eq!(summary.incentives_delivered.count, 1);
    }

    #[test]
    fn filter_matches_name_or_source() {
        let referrals = [
            referral("Ann Lee", ReferralStatus::New, "2024-01-01", None),
            referral("Bob Ray", ReferralStatus::Completed, "2024-01-01", None),
        ];
        assert_eq!(filter_referrals(&referrals, "ann", None).len(), 1);
        assert_eq!(filter_referrals(&referrals, "LINKED", None).len(), 2);
        assert_eq!(
            filter_referrals(&referrals, "", Some(ReferralStatus::Completed))[0].client_name,
            "Bob Ray"
        );
    }
}
