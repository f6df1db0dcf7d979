use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::model_referral::ReferralStatus;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
        #[serde(rename_all = "lowercase")]
        #[ts(export)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl $crate::store::ColumnValue for $name {
            fn into_column(self) -> serde_json::Value {
                serde_json::Value::from(self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

status_enum!(ClientStatus {
    Active => "active",
    Pending => "pending",
    Completed => "completed",
});

status_enum!(ArrangementStatus {
    Inquiry => "inquiry",
    Applied => "applied",
    Approved => "approved",
    Settled => "settled",
    Declined => "declined",
});

status_enum!(CommissionStatus {
    Pending => "pending",
    Received => "received",
    Overdue => "overdue",
});

status_enum!(IncentiveStatus {
    Planned => "planned",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

// Embedded relations, named after the table they are read from.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralClientName {
    pub client_name: String,
}

/// The slice of a referral shown next to an arrangement or incentive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralSummary {
    pub id: String,
    pub client_name: String,
    pub source: String,
    pub status: ReferralStatus,
    pub date: String,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementEmbed {
    pub id: String,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub lender: Option<String>,
    pub status: ArrangementStatus,
    #[serde(default)]
    pub clients: Option<ClientName>,
    #[serde(default)]
    pub referrals: Option<ReferralClientName>,
}

/// The slice of a finance arrangement shown next to a commission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ArrangementSummary {
    pub id: String,
    pub loan_amount: Option<f64>,
    pub loan_type: Option<String>,
    pub lender: Option<String>,
    pub status: ArrangementStatus,
    pub client_name: Option<String>,
    pub referral_client_name: Option<String>,
}

impl From<ArrangementEmbed> for ArrangementSummary {
    fn from(embed: ArrangementEmbed) -> Self {
        Self {
            id: embed.id,
            loan_amount: embed.loan_amount,
            loan_type: embed.loan_type,
            lender: embed.lender,
            status: embed.status,
            client_name: embed.clients.map(|c| c.name),
            referral_client_name: embed.referrals.map(|r| r.client_name),
        }
    }
}

// clients

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: ClientStatus,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub last_contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: ClientStatus,
    pub loan_type: Option<String>,
    pub loan_amount: Option<f64>,
    pub last_contact: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClientDraft {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_client_status")]
    pub status: ClientStatus,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub last_contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_client_status() -> ClientStatus {
    ClientStatus::Active
}

impl ClientDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            status: ClientStatus::Active,
            loan_type: None,
            loan_amount: None,
            last_contact: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClientPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<ClientStatus>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub last_contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// finance_arrangements

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceArrangementRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub referral_id: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub application_date: Option<String>,
    #[serde(default)]
    pub settlement_date: Option<String>,
    pub status: ArrangementStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub clients: Option<ClientName>,
    #[serde(default)]
    pub referrals: Option<ReferralSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinanceArrangement {
    pub id: String,
    pub client_id: String,
    pub referral_id: Option<String>,
    pub loan_amount: Option<f64>,
    pub loan_type: Option<String>,
    pub lender: Option<String>,
    pub application_date: Option<String>,
    pub settlement_date: Option<String>,
    pub status: ArrangementStatus,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub client_name: Option<String>,
    pub referral: Option<ReferralSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinanceArrangementDraft {
    pub client_id: String,
    #[serde(default)]
    pub referral_id: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub application_date: Option<String>,
    #[serde(default)]
    pub settlement_date: Option<String>,
    #[serde(default = "default_arrangement_status")]
    pub status: ArrangementStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_arrangement_status() -> ArrangementStatus {
    ArrangementStatus::Inquiry
}

impl FinanceArrangementDraft {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            referral_id: None,
            loan_amount: None,
            loan_type: None,
            lender: None,
            application_date: None,
            settlement_date: None,
            status: ArrangementStatus::Inquiry,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinanceArrangementPatch {
    #[serde(default)]
    pub referral_id: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub application_date: Option<String>,
    #[serde(default)]
    pub settlement_date: Option<String>,
    #[serde(default)]
    pub status: Option<ArrangementStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

// commissions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub finance_arrangement_id: String,
    #[serde(default)]
    pub upfront_amount: Option<f64>,
    #[serde(default)]
    pub upfront_payment_date: Option<String>,
    #[serde(default)]
    pub trail_percentage: Option<f64>,
    #[serde(default)]
    pub trail_amount: Option<f64>,
    pub status: CommissionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub finance_arrangements: Option<ArrangementEmbed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Commission {
    pub id: String,
    pub finance_arrangement_id: String,
    pub upfront_amount: Option<f64>,
    pub upfront_payment_date: Option<String>,
    pub trail_percentage: Option<f64>,
    pub trail_amount: Option<f64>,
    pub status: CommissionStatus,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub finance_arrangement: Option<ArrangementSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionDraft {
    pub finance_arrangement_id: String,
    #[serde(default)]
    pub upfront_amount: Option<f64>,
    #[serde(default)]
    pub upfront_payment_date: Option<String>,
    #[serde(default)]
    pub trail_percentage: Option<f64>,
    #[serde(default)]
    pub trail_amount: Option<f64>,
    #[serde(default = "default_commission_status")]
    pub status: CommissionStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_commission_status() -> CommissionStatus {
    CommissionStatus::Pending
}

impl CommissionDraft {
    pub fn new(finance_arrangement_id: impl Into<String>) -> Self {
        Self {
            finance_arrangement_id: finance_arrangement_id.into(),
            upfront_amount: None,
            upfront_payment_date: None,
            trail_percentage: None,
            trail_amount: None,
            status: CommissionStatus::Pending,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionPatch {
    #[serde(default)]
    pub upfront_amount: Option<f64>,
    #[serde(default)]
    pub upfront_payment_date: Option<String>,
    #[serde(default)]
    pub trail_percentage: Option<f64>,
    #[serde(default)]
    pub trail_amount: Option<f64>,
    #[serde(default)]
    pub status: Option<CommissionStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

// incentives

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub referral_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    pub status: IncentiveStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub clients: Option<ClientName>,
    #[serde(default)]
    pub referrals: Option<ReferralSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Incentive {
    pub id: String,
    pub client_id: Option<String>,
    pub referral_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub delivery_date: Option<String>,
    pub status: IncentiveStatus,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub client_name: Option<String>,
    pub referral: Option<ReferralSummary>,
}

/// An incentive is for a client or for a referral, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IncentiveDraft {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub referral_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default = "default_incentive_status")]
    pub status: IncentiveStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_incentive_status() -> IncentiveStatus {
    IncentiveStatus::Planned
}

impl Default for IncentiveDraft {
    fn default() -> Self {
        Self {
            client_id: None,
            referral_id: None,
            kind: None,
            amount: None,
            delivery_date: None,
            status: IncentiveStatus::Planned,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IncentivePatch {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub status: Option<IncentiveStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_enums_parse_their_wire_names() {
        assert_eq!("settled".parse::<ArrangementStatus>(), Ok(ArrangementStatus::Settled));
        assert_eq!(CommissionStatus::Overdue.to_string(), "overdue");
        assert!("archived".parse::<IncentiveStatus>().is_err());
        assert_eq!(ClientStatus::ALL.len(), 3);
    }

    #[test]
    fn commission_rows_carry_nested_arrangement() {
        let row: CommissionRow = serde_json::from_value(json!({
            "id": "cm-1",
            "finance_arrangement_id": "fa-1",
            "upfront_amount": 2925.0,
            "status": "received",
            "finance_arrangements": {
                "id": "fa-1",
                "lender": "ANZ",
                "status": "settled",
                "clients": {"name": "James Wilson"},
                "referrals": null
            }
        }))
        .unwrap();
        let summary = ArrangementSummary::from(row.finance_arrangements.unwrap());
        assert_eq!(summary.client_name.as_deref(), Some("James Wilson"));
        assert_eq!(summary.referral_client_name, None);
    }
}
