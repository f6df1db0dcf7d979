//! Conversion between stored referral rows and display records.

use crate::{
    model_referral::{Referral, ReferralPatch, ReferralRow},
    store::{ColumnValue, Row},
    time::format_long_date,
};

/// Project a stored row onto the display record.
///
/// The date is rendered as a long-form date; a missing referrer type
/// reads as `client`.
pub fn to_display(row: ReferralRow) -> Referral {
    Referral {
        id: row.id,
        client_name: row.client_name,
        source: row.source,
        status: row.status,
        date: format_long_date(&row.date),
        value: row.value,
        notes: row.notes,
        referrer_type: row.referrer_type.unwrap_or_default(),
        referrer_email: row.referrer_email,
        referrer_phone: row.referrer_phone,
        recipient_email: row.recipient_email,
        is_external: row.is_external,
    }
}

pub(crate) fn put<T: ColumnValue>(row: &mut Row, column: &str, value: Option<T>) {
    if let Some(value) = value {
        row.insert(column.to_string(), value.into_column());
    }
}

/// Storage columns for the fields present in `patch`; absent fields are left out.
pub fn to_storage(patch: &ReferralPatch) -> Row {
    let mut row = Row::new();
    put(&mut row, "client_name", patch.client_name.as_ref());
    put(&mut row, "source", patch.source.as_ref());
    put(&mut row, "status", patch.status);
    put(&mut row, "value", patch.value);
    put(&mut row, "notes", patch.notes.as_ref());
    put(&mut row, "referrer_type", patch.referrer_type);
    put(&mut row, "referrer_email", patch.referrer_email.as_ref());
    put(&mut row, "referrer_phone", patch.referrer_phone.as_ref());
    put(&mut row, "recipient_email", patch.recipient_email.as_ref());
    put(&mut row, "is_external", patch.is_external);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_referral::{ReferralStatus, ReferrerType};
    use crate::time::INVALID_DATE;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn row() -> ReferralRow {
        ReferralRow {
            id: "r-1".into(),
            user_id: Some("u-1".into()),
            client_name: "John Smith".into(),
            source: "LinkedIn".into(),
            status: ReferralStatus::New,
            date: "2024-03-05T10:00:00.000Z".into(),
            value: Some(5000.0),
            notes: None,
            referrer_type: None,
            referrer_email: None,
            referrer_phone: None,
            recipient_email: None,
            is_external: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn display_formats_date_and_defaults_referrer() {
        let referral = to_display(row());
        assert_eq!(referral.date, "March 5, 2024");
        assert_eq!(referral.referrer_type, ReferrerType::Client);
        assert_eq!(referral.client_name, "John Smith");
    }

    #[test]
    fn malformed_dates_render_invalid_date() {
        let mut bad = row();
        bad.date = "last tuesday".into();
        assert_eq!(to_display(bad).date, INVALID_DATE);
    }

    #[test]
    fn partial_update_projects_only_present_fields() {
        let patch = ReferralPatch {
            status: Some(ReferralStatus::Completed),
            ..ReferralPatch::default()
        };
        assert_eq!(
            Value::Object(to_storage(&patch)),
            json!({"status": "completed"})
        );
    }

    #[test]
    fn empty_patch_writes_nothing() {
        assert!(to_storage(&ReferralPatch::default()).is_empty());
    }

    #[test]
    fn columns_carry_their_wire_values() {
        let mut row = Row::new();
        put(&mut row, "status", Some(ReferralStatus::InProgress));
        put(&mut row, "referrer_type", Some(ReferrerType::Partner));
        put(&mut row, "client_status", Some(crate::model_finance::ClientStatus::Pending));
        put(&mut row, "is_external", Some(false));
        put::<&str>(&mut row, "notes", None);
        assert_eq!(
            Value::Object(row),
            json!({
                "status": "in-progress",
                "referrer_type": "partner",
                "client_status": "pending",
                "is_external": false,
            })
        );
    }

    fn status() -> impl Strategy<Value = ReferralStatus> {
        prop::sample::select(ReferralStatus::ALL.to_vec())
    }

    fn referrer() -> impl Strategy<Value = ReferrerType> {
        prop::sample::select(vec![
            ReferrerType::Broker,
            ReferrerType::Client,
            ReferrerType::Partner,
            ReferrerType::Other,
        ])
    }

    prop_compose! {
        fn full_row()(
            client_name in "[A-Za-z ]{1,24}",
            source in "[A-Za-z ]{1,24}",
            status in status(),
            value in 0u32..2_000_000,
            notes in "[ -~]{0,40}",
            referrer_type in referrer(),
            referrer_email in "[a-z]{1,8}@[a-z]{1,8}\\.com",
            referrer_phone in "04[0-9]{8}",
            recipient_email in "[a-z]{1,8}@[a-z]{1,8}\\.com",
            is_external in any::<bool>(),
            day in 1u32..28,
        ) -> ReferralRow {
            ReferralRow {
                id: "r-prop".into(),
                user_id: None,
                client_name,
                source,
                status,
                date: format!("2024-02-{day:02}T08:00:00Z"),
                value: Some(f64::from(value)),
                notes: Some(notes),
                referrer_type: Some(referrer_type),
                referrer_email: Some(referrer_email),
                referrer_phone: Some(referrer_phone),
                recipient_email: Some(recipient_email),
                is_external: Some(is_external),
                created_at: None,
                updated_at: None,
            }
        }
    }

    proptest! {
        #[test]
        fn storage_round_trip_restores_everything_but_the_date(original in full_row()) {
            let stored = to_storage(&ReferralPatch::from(&to_display(original.clone())));

            let mut expected = serde_json::to_value(&original).unwrap();
            let expected = expected.as_object_mut().unwrap();
            for column in ["id", "user_id", "date", "created_at", "updated_at"] {
                expected.remove(column);
            }
            prop_assert_eq!(&stored, &*expected);
        }
    }
}
