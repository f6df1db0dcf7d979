use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::{store::ColumnValue, util::opt_flag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum ReferralStatus {
    New,
    Contacted,
    InProgress,
    Completed,
    Lost,
}

impl ReferralStatus {
    pub const ALL: [ReferralStatus; 5] = [
        ReferralStatus::New,
        ReferralStatus::Contacted,
        ReferralStatus::InProgress,
        ReferralStatus::Completed,
        ReferralStatus::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReferralStatus::New => "new",
            ReferralStatus::Contacted => "contacted",
            ReferralStatus::InProgress => "in-progress",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Lost => "lost",
        }
    }
}

impl ColumnValue for ReferralStatus {
    fn into_column(self) -> serde_json::Value {
        serde_json::Value::from(self.as_str())
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferralStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown referral status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReferrerType {
    Broker,
    #[default]
    Client,
    Partner,
    Other,
}

impl ReferrerType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferrerType::Broker => "broker",
            ReferrerType::Client => "client",
            ReferrerType::Partner => "partner",
            ReferrerType::Other => "other",
        }
    }
}

impl ColumnValue for ReferrerType {
    fn into_column(self) -> serde_json::Value {
        serde_json::Value::from(self.as_str())
    }
}

impl FromStr for ReferrerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broker" => Ok(ReferrerType::Broker),
            "client" => Ok(ReferrerType::Client),
            "partner" => Ok(ReferrerType::Partner),
            "other" => Ok(ReferrerType::Other),
            other => Err(format!("unknown referrer type: {other}")),
        }
    }
}

/// A `referrals` row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub client_name: String,
    pub source: String,
    pub status: ReferralStatus,
    pub date: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub referrer_type: Option<ReferrerType>,
    #[serde(default)]
    pub referrer_email: Option<String>,
    #[serde(default)]
    pub referrer_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default, deserialize_with = "opt_flag")]
    pub is_external: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A referral as the broker sees it; `date` is already a long-form date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Referral {
    pub id: String,
    pub client_name: String,
    pub source: String,
    pub status: ReferralStatus,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub referrer_type: ReferrerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
}

/// Fields a broker supplies when adding a referral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferralDraft {
    pub client_name: String,
    pub source: String,
    #[serde(default = "default_status")]
    pub status: ReferralStatus,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub referrer_type: Option<ReferrerType>,
    #[serde(default)]
    pub referrer_email: Option<String>,
    #[serde(default)]
    pub referrer_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
}

fn default_status() -> ReferralStatus {
    ReferralStatus::New
}

impl ReferralDraft {
    pub fn new(client_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            source: source.into(),
            status: ReferralStatus::New,
            value: None,
            notes: None,
            referrer_type: None,
            referrer_email: None,
            referrer_phone: None,
            recipient_email: None,
        }
    }
}

/// A partial referral; only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferralPatch {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<ReferralStatus>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub referrer_type: Option<ReferrerType>,
    #[serde(default)]
    pub referrer_email: Option<String>,
    #[serde(default)]
    pub referrer_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub is_external: Option<bool>,
}

impl From<&ReferralDraft> for ReferralPatch {
    fn from(draft: &ReferralDraft) -> Self {
        Self {
            client_name: Some(draft.client_name.clone()),
            source: Some(draft.source.clone()),
            status: Some(draft.status),
            value: draft.value,
            notes: draft.notes.clone(),
            referrer_type: draft.referrer_type,
            referrer_email: draft.referrer_email.clone(),
            referrer_phone: draft.referrer_phone.clone(),
            recipient_email: draft.recipient_email.clone(),
            is_external: None,
        }
    }
}

impl From<&Referral> for ReferralPatch {
    fn from(record: &Referral) -> Self {
        Self {
            client_name: Some(record.client_name.clone()),
            source: Some(record.source.clone()),
            status: Some(record.status),
            value: record.value,
            notes: record.notes.clone(),
            referrer_type: Some(record.referrer_type),
            referrer_email: record.referrer_email.clone(),
            referrer_phone: record.referrer_phone.clone(),
            recipient_email: record.recipient_email.clone(),
            is_external: record.is_external,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        assert_eq!(
            serde_json::to_value(ReferralStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        assert_eq!(
            "in-progress".parse::<ReferralStatus>().unwrap(),
            ReferralStatus::InProgress
        );
        assert!("archived".parse::<ReferralStatus>().is_err());
    }

    #[test]
    fn rows_decode_integer_external_flag() {
        let row: ReferralRow = serde_json::from_value(json!({
            "id": "r1",
            "client_name": "Ann",
            "source": "LinkedIn",
            "status": "new",
            "date": "2024-03-01T00:00:00Z",
            "is_external": 1
        }))
        .unwrap();
        assert_eq!(row.is_external, Some(true));
        assert_eq!(row.referrer_type, None);
    }

    #[test]
    fn draft_defaults_status_to_new() {
        let draft: ReferralDraft =
            serde_json::from_value(json!({"clientName": "X", "source": "Y"})).unwrap();
        assert_eq!(draft.status, ReferralStatus::New);
    }
}
