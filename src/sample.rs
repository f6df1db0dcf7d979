//! Static datasets shown when the live store cannot be used.

use chrono::{DateTime, Duration, Utc};

use crate::model_finance::{
    ArrangementEmbed, ArrangementStatus, ClientName, ClientRow, ClientStatus, CommissionRow,
    CommissionStatus, FinanceArrangementRow, IncentiveRow, IncentiveStatus, ReferralClientName,
    ReferralSummary,
};
use crate::model_referral::{ReferralRow, ReferralStatus};
use crate::time::to_rfc3339;

fn days_ago(now: DateTime<Utc>, days: i64) -> String {
    to_rfc3339(now - Duration::days(days))
}

fn referral(
    id: &str,
    client_name: &str,
    source: &str,
    status: ReferralStatus,
    date: String,
    value: f64,
    notes: &str,
) -> ReferralRow {
    ReferralRow {
        id: id.into(),
        user_id: None,
        client_name: client_name.into(),
        source: source.into(),
        status,
        date: date.clone(),
        value: Some(value),
        notes: Some(notes.into()),
        referrer_type: None,
        referrer_email: None,
        referrer_phone: None,
        recipient_email: None,
        is_external: None,
        created_at: Some(date.clone()),
        updated_at: Some(date),
    }
}

pub fn referrals(now: DateTime<Utc>) -> Vec<ReferralRow> {
    vec![
        referral(
            "1",
            "John Smith",
            "LinkedIn",
            ReferralStatus::New,
            days_ago(now, 0),
            5000.0,
            "Interested in web development services",
        ),
        referral(
            "2",
            "Sarah Johnson",
            "Networking Event",
            ReferralStatus::Contacted,
            days_ago(now, 2),
            7500.0,
            "Looking for branding and marketing services",
        ),
        referral(
            "3",
            "Michael Williams",
            "Referral",
            ReferralStatus::InProgress,
            days_ago(now, 5),
            10000.0,
            "Needs a complete website redesign",
        ),
        referral(
            "4",
            "Lisa Brown",
            "Website Contact Form",
            ReferralStatus::Completed,
            days_ago(now, 10),
            3000.0,
            "Logo design project",
        ),
        referral(
            "5",
            "David Miller",
            "Email Campaign",
            ReferralStatus::Lost,
            days_ago(now, 15),
            8000.0,
            "Chose another provider due to budget constraints",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn client(
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
    status: ClientStatus,
    loan_type: &str,
    loan_amount: f64,
    last_contact: &str,
    notes: &str,
    created_at: String,
) -> ClientRow {
    ClientRow {
        id: id.into(),
        user_id: None,
        name: name.into(),
        email: Some(email.into()),
        phone: Some(phone.into()),
        status,
        loan_type: Some(loan_type.into()),
        loan_amount: Some(loan_amount),
        last_contact: Some(last_contact.into()),
        notes: Some(notes.into()),
        created_at: Some(created_at.clone()),
        updated_at: Some(created_at),
    }
}

pub fn clients(now: DateTime<Utc>) -> Vec<ClientRow> {
    let created = to_rfc3339(now);
    vec![
        client(
            "cl-001",
            "James Wilson",
            "james.wilson@example.com",
            "0412 345 678",
            ClientStatus::Active,
            "Home Loan",
            450000.0,
            "2023-05-15",
            "First-time buyer looking for a property in Eastern suburbs.",
            created.clone(),
        ),
        client(
            "cl-002",
            "Emily Rodriguez",
            "emily.r@example.com",
            "0423 456 789",
            ClientStatus::Pending,
            "Home Loan",
            380000.0,
            "2023-05-12",
            "Waiting on pre-approval from Commonwealth Bank.",
            created.clone(),
        ),
        client(
            "cl-003",
            "Michael Chen",
            "michael.chen@example.com",
            "0434 567 890",
            ClientStatus::Active,
            "Refinance",
            520000.0,
            "2023-05-10",
            "Looking to refinance investment property for better rates.",
            created.clone(),
        ),
        client(
            "cl-004",
            "Sophia Patel",
            "sophia.p@example.com",
            "0445 678 901",
            ClientStatus::Active,
            "Investment Loan",
            620000.0,
            "2023-05-08",
            "Experienced investor adding to portfolio. Prefers ANZ.",
            created.clone(),
        ),
        client(
            "cl-005",
            "Robert Davis",
            "robert.davis@example.com",
            "0456 789 012",
            ClientStatus::Completed,
            "Home Loan",
            340000.0,
            "2023-04-30",
            "Loan finalized with Commonwealth Bank. Settlement next week.",
            created.clone(),
        ),
        client(
            "cl-006",
            "Lisa Zhang",
            "lisa.zhang@example.com",
            "0467 890 123",
            ClientStatus::Completed,
            "Business Loan",
            490000.0,
            "2023-04-25",
            "Successfully secured business loan through Westpac.",
            created,
        ),
    ]
}

fn referral_summary(row: &ReferralRow) -> ReferralSummary {
    ReferralSummary {
        id: row.id.clone(),
        client_name: row.client_name.clone(),
        source: row.source.clone(),
        status: row.status,
        date: row.date.clone(),
        value: row.value,
    }
}

pub fn finance_arrangements(now: DateTime<Utc>) -> Vec<FinanceArrangementRow> {
    let referrals = referrals(now);
    vec![
        FinanceArrangementRow {
            id: "fa-001".into(),
            user_id: None,
            client_id: "cl-001".into(),
            referral_id: Some("3".into()),
            loan_amount: Some(450000.0),
            loan_type: Some("Home Loan".into()),
            lender: Some("Commonwealth Bank".into()),
            application_date: Some(days_ago(now, 20)),
            settlement_date: None,
            status: ArrangementStatus::Approved,
            notes: Some("Pre-approval granted, awaiting valuation.".into()),
            created_at: Some(days_ago(now, 1)),
            updated_at: Some(days_ago(now, 1)),
            clients: Some(ClientName {
                name: "James Wilson".into(),
            }),
            referrals: referrals.get(2).map(referral_summary),
        },
        FinanceArrangementRow {
            id: "fa-002".into(),
            user_id: None,
            client_id: "cl-005".into(),
            referral_id: Some("4".into()),
            loan_amount: Some(340000.0),
            loan_type: Some("Home Loan".into()),
            lender: Some("Commonwealth Bank".into()),
            application_date: Some(days_ago(now, 60)),
            settlement_date: Some(days_ago(now, 7)),
            status: ArrangementStatus::Settled,
            notes: None,
            created_at: Some(days_ago(now, 3)),
            updated_at: Some(days_ago(now, 3)),
            clients: Some(ClientName {
                name: "Robert Davis".into(),
            }),
            referrals: referrals.get(3).map(referral_summary),
        },
        FinanceArrangementRow {
            id: "fa-003".into(),
            user_id: None,
            client_id: "cl-006".into(),
            referral_id: None,
            loan_amount: Some(490000.0),
            loan_type: Some("Business Loan".into()),
            lender: Some("Westpac".into()),
            application_date: Some(days_ago(now, 90)),
            settlement_date: Some(days_ago(now, 30)),
            status: ArrangementStatus::Settled,
            notes: None,
            created_at: Some(days_ago(now, 5)),
            updated_at: Some(days_ago(now, 5)),
            clients: Some(ClientName {
                name: "Lisa Zhang".into(),
            }),
            referrals: None,
        },
    ]
}

fn arrangement_embed(row: &FinanceArrangementRow) -> ArrangementEmbed {
    ArrangementEmbed {
        id: row.id.clone(),
        loan_amount: row.loan_amount,
        loan_type: row.loan_type.clone(),
        lender: row.lender.clone(),
        status: row.status,
        clients: row.clients.clone(),
        referrals: row.referrals.as_ref().map(|r| ReferralClientName {
            client_name: r.client_name.clone(),
        }),
    }
}

pub fn commissions(now: DateTime<Utc>) -> Vec<CommissionRow> {
    let arrangements = finance_arrangements(now);
    vec![
        CommissionRow {
            id: "cm-001".into(),
            user_id: None,
            finance_arrangement_id: "fa-002".into(),
            upfront_amount: Some(2210.0),
            upfront_payment_date: Some(days_ago(now, 2)),
            trail_percentage: Some(0.15),
            trail_amount: Some(510.0),
            status: CommissionStatus::Received,
            notes: None,
            created_at: Some(days_ago(now, 2)),
            updated_at: Some(days_ago(now, 2)),
            finance_arrangements: arrangements.get(1).map(arrangement_embed),
        },
        CommissionRow {
            id: "cm-002".into(),
            user_id: None,
            finance_arrangement_id: "fa-003".into(),
            upfront_amount: Some(3185.0),
            upfront_payment_date: None,
            trail_percentage: Some(0.20),
            trail_amount: Some(980.0),
            status: CommissionStatus::Pending,
            notes: Some("Awaiting lender remittance.".into()),
            created_at: Some(days_ago(now, 4)),
            updated_at: Some(days_ago(now, 4)),
            finance_arrangements: arrangements.get(2).map(arrangement_embed),
        },
    ]
}

pub fn incentives(now: DateTime<Utc>) -> Vec<IncentiveRow> {
    let referrals = referrals(now);
    vec![
        IncentiveRow {
            id: "in-001".into(),
            user_id: None,
            client_id: Some("cl-005".into()),
            referral_id: None,
            kind: Some("Gift Card".into()),
            amount: Some(150.0),
            delivery_date: Some(days_ago(now, 6)),
            status: IncentiveStatus::Delivered,
            notes: Some("Thank you for settling with us.".into()),
            created_at: Some(days_ago(now, 6)),
            updated_at: Some(days_ago(now, 6)),
            clients: Some(ClientName {
                name: "Robert Davis".into(),
            }),
            referrals: None,
        },
        IncentiveRow {
            id: "in-002".into(),
            user_id: None,
            client_id: None,
            referral_id: Some("2".into()),
            kind: Some("Dinner Voucher".into()),
            amount: Some(200.0),
            delivery_date: None,
            status: IncentiveStatus::Planned,
            notes: None,
            created_at: Some(days_ago(now, 8)),
            updated_at: Some(days_ago(now, 8)),
            clients: None,
            referrals: referrals.get(1).map(referral_summary),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_samples_step_back_in_time() {
        let now = Utc::now();
        let rows = referrals(now);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
        assert_eq!(rows[0].date, to_rfc3339(now));
        assert_eq!(rows[4].date, to_rfc3339(now - Duration::days(15)));
    }

    #[test]
    fn finance_samples_reference_sample_clients() {
        let now = Utc::now();
        let client_ids: Vec<_> = clients(now).into_iter().map(|c| c.id).collect();
        for arrangement in finance_arrangements(now) {
            assert!(client_ids.contains(&arrangement.client_id));
        }
        for incentive in incentives(now) {
            assert!(!(incentive.client_id.is_some() && incentive.referral_id.is_some()));
        }
    }
}
