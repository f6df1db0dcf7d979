//! The public referral form: anonymous submissions tagged as external.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use ts_rs::TS;

use crate::{
    entity::{decode_row, ReferralEntity},
    error::{AppError, AppResult},
    model_referral::{Referral, ReferralStatus, ReferrerType},
    notify::{Notice, Notifier},
    referral_mapper::put,
    store::{Row, RowStore, REFERRALS},
    time::now_rfc3339,
};

pub const VALIDATION_SUBMISSION: &str = "VALIDATION/SUBMISSION";

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern to compile")
});

/// What a referrer types into the embeddable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferralSubmission {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub referrer_type: Option<ReferrerType>,
    #[serde(default)]
    pub referrer_email: String,
    #[serde(default)]
    pub referrer_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: String,
    /// Free text; only the leading integer is kept.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ReferralSubmission {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.client_name.trim().is_empty() {
            errors.push(FieldError {
                field: "clientName",
                message: "Client name is required",
            });
        }
        if self.source.trim().is_empty() {
            errors.push(FieldError {
                field: "source",
                message: "Referral source is required",
            });
        }
        if !EMAIL.is_match(self.referrer_email.trim()) {
            errors.push(FieldError {
                field: "referrerEmail",
                message: "Valid email is required",
            });
        }
        if !EMAIL.is_match(self.recipient_email.trim()) {
            errors.push(FieldError {
                field: "recipientEmail",
                message: "Recipient email is required",
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The row written for this submission.
    pub fn to_storage(&self) -> Row {
        let mut row = Row::new();
        put(&mut row, "client_name", Some(self.client_name.trim()));
        put(&mut row, "source", Some(self.source.trim()));
        put(
            &mut row,
            "referrer_type",
            Some(self.referrer_type.unwrap_or_default()),
        );
        put(&mut row, "referrer_email", Some(self.referrer_email.trim()));
        row.insert("referrer_phone".into(), non_empty(&self.referrer_phone));
        put(&mut row, "recipient_email", Some(self.recipient_email.trim()));
        row.insert(
            "value".into(),
            self.value
                .as_deref()
                .and_then(leading_integer)
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        row.insert("notes".into(), non_empty(&self.notes));
        put(&mut row, "status", Some(ReferralStatus::New));
        row.insert("date".into(), Value::from(now_rfc3339()));
        row.insert("is_external".into(), Value::Bool(true));
        row
    }
}

fn non_empty(value: &Option<String>) -> Value {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Value::from(text),
        _ => Value::Null,
    }
}

/// Leading base-10 integer of `raw`, ignoring surrounding whitespace and
/// any trailing text: `"2500 approx"` is 2500, `"approx"` is nothing.
pub fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn validation_error(errors: &[FieldError]) -> AppError {
    let mut err = AppError::new(
        VALIDATION_SUBMISSION,
        errors
            .iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; "),
    );
    for e in errors {
        err = err.with_context(e.field, e.message);
    }
    err
}

/// Validate and store a public submission without a signed-in actor.
pub async fn submit_referral(
    store: &dyn RowStore,
    notifier: &dyn Notifier,
    submission: &ReferralSubmission,
) -> AppResult<Referral> {
    if let Err(errors) = submission.validate() {
        return Err(validation_error(&errors));
    }

    match store.insert(None, REFERRALS, submission.to_storage()).await {
        Ok(stored) => {
            info!(target: "brokerdesk", event = "external_referral_submitted");
            notifier.notify(Notice::success(
                "Referral Submitted",
                "Thank you! Your referral has been submitted successfully.",
            ));
            decode_row::<ReferralEntity>(stored)
        }
        Err(err) => {
            warn!(
                target: "brokerdesk",
                event = "external_referral_failed",
                error = %err
            );
            notifier.notify(Notice::destructive(
                "Error",
                "There was a problem submitting your referral. Please try again.",
            ));
            Err(err.into())
        }
    }
}
