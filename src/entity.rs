//! The per-table knowledge the generic list and operations layers need.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::{AppError, AppResult, RECORD_DECODE},
    model_finance::{
        ArrangementSummary, Client, ClientDraft, ClientPatch, ClientRow, Commission,
        CommissionDraft, CommissionPatch, CommissionRow, FinanceArrangement,
        FinanceArrangementDraft, FinanceArrangementPatch, FinanceArrangementRow, Incentive,
        IncentiveDraft, IncentivePatch, IncentiveRow,
    },
    model_referral::{Referral, ReferralDraft, ReferralPatch, ReferralRow},
    referral_mapper::{self, put},
    sample,
    store::{self, Embed, Row, SelectQuery},
    time::{format_long_date, now_rfc3339, parse_date},
};

pub const VALIDATION_INCENTIVE_TARGET: &str = "VALIDATION/INCENTIVE_TARGET";
pub const VALIDATION_REQUIRED: &str = "VALIDATION/REQUIRED";

pub trait Entity: Send + Sync + 'static {
    const TABLE: &'static str;
    /// Singular noun used in notices, e.g. "finance arrangement".
    const LABEL: &'static str;
    const PLURAL: &'static str;
    const ORDER_BY: &'static str;
    const DESCENDING: bool = true;
    const EMBEDS: &'static [Embed] = &[];

    type Row: Serialize + DeserializeOwned + Clone + Send + Sync;
    type Record: Serialize + Clone + Debug + Send + Sync;
    type Draft: Send + Sync;
    type Patch: Send + Sync;

    fn to_record(row: Self::Row) -> Self::Record;

    fn draft_to_storage(draft: &Self::Draft) -> AppResult<Row>;

    fn patch_to_storage(patch: &Self::Patch) -> Row;

    fn sample_rows(now: DateTime<Utc>) -> Vec<Self::Row>;

    fn select_query() -> SelectQuery {
        SelectQuery {
            table: Self::TABLE,
            order_by: Self::ORDER_BY,
            descending: Self::DESCENDING,
            embeds: Self::EMBEDS,
        }
    }

    /// Capitalised label for notice titles.
    fn title() -> String {
        let mut chars = Self::LABEL.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

pub fn decode_row<E: Entity>(row: Row) -> AppResult<E::Record> {
    serde_json::from_value::<E::Row>(Value::Object(row))
        .map(E::to_record)
        .map_err(|err| {
            AppError::new(RECORD_DECODE, err.to_string()).with_context("table", E::TABLE)
        })
}

pub fn decode_rows<E: Entity>(rows: Vec<Row>) -> AppResult<Vec<E::Record>> {
    rows.into_iter().map(decode_row::<E>).collect()
}

pub fn sample_records<E: Entity>(now: DateTime<Utc>) -> Vec<E::Record> {
    E::sample_rows(now).into_iter().map(E::to_record).collect()
}

fn require(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::new(VALIDATION_REQUIRED, format!("{field} is required"))
            .with_context("field", field))
    } else {
        Ok(())
    }
}

pub struct ReferralEntity;

impl Entity for ReferralEntity {
    const TABLE: &'static str = store::REFERRALS;
    const LABEL: &'static str = "referral";
    const PLURAL: &'static str = "referrals";
    const ORDER_BY: &'static str = "date";

    type Row = ReferralRow;
    type Record = Referral;
    type Draft = ReferralDraft;
    type Patch = ReferralPatch;

    fn to_record(row: ReferralRow) -> Referral {
        referral_mapper::to_display(row)
    }

    fn draft_to_storage(draft: &ReferralDraft) -> AppResult<Row> {
        require(&draft.client_name, "clientName")?;
        require(&draft.source, "source")?;
        let mut row = referral_mapper::to_storage(&ReferralPatch::from(draft));
        row.insert("date".into(), Value::from(now_rfc3339()));
        Ok(row)
    }

    fn patch_to_storage(patch: &ReferralPatch) -> Row {
        referral_mapper::to_storage(patch)
    }

    fn sample_rows(now: DateTime<Utc>) -> Vec<ReferralRow> {
        sample::referrals(now)
    }
}

pub struct ClientEntity;

impl Entity for ClientEntity {
    const TABLE: &'static str = store::CLIENTS;
    const LABEL: &'static str = "client";
    const PLURAL: &'static str = "clients";
    const ORDER_BY: &'static str = "name";
    const DESCENDING: bool = false;

    type Row = ClientRow;
    type Record = Client;
    type Draft = ClientDraft;
    type Patch = ClientPatch;

    fn to_record(row: ClientRow) -> Client {
        Client {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            status: row.status,
            loan_type: row.loan_type,
            loan_amount: row.loan_amount,
            // Free-text contact dates are shown as entered.
            last_contact: row.last_contact.map(|raw| match parse_date(&raw) {
                Some(_) => format_long_date(&raw),
                None => raw,
            }),
            notes: row.notes,
        }
    }

    fn draft_to_storage(draft: &ClientDraft) -> AppResult<Row> {
        require(&draft.name, "name")?;
        let mut row = Row::new();
        put(&mut row, "name", Some(&draft.name));
        put(&mut row, "email", draft.email.as_ref());
        put(&mut row, "phone", draft.phone.as_ref());
        put(&mut row, "status", Some(draft.status));
        put(&mut row, "loan_type", draft.loan_type.as_ref());
        put(&mut row, "loan_amount", draft.loan_amount);
        put(&mut row, "last_contact", draft.last_contact.as_ref());
        put(&mut row, "notes", draft.notes.as_ref());
        Ok(row)
    }

    fn patch_to_storage(patch: &ClientPatch) -> Row {
        let mut row = Row::new();
        put(&mut row, "name", patch.name.as_ref());
        put(&mut row, "email", patch.email.as_ref());
        put(&mut row, "phone", patch.phone.as_ref());
        put(&mut row, "status", patch.status);
        put(&mut row, "loan_type", patch.loan_type.as_ref());
        put(&mut row, "loan_amount", patch.loan_amount);
        put(&mut row, "last_contact", patch.last_contact.as_ref());
        put(&mut row, "notes", patch.notes.as_ref());
        row
    }

    fn sample_rows(now: DateTime<Utc>) -> Vec<ClientRow> {
        sample::clients(now)
    }
}

const CLIENT_NAME: Embed = Embed {
    alias: "clients",
    table: store::CLIENTS,
    foreign_key: "client_id",
    columns: &["name"],
    nested: &[],
};

const REFERRAL_SUMMARY: Embed = Embed {
    alias: "referrals",
    table: store::REFERRALS,
    foreign_key: "referral_id",
    columns: &["id", "client_name", "source", "status", "date", "value"],
    nested: &[],
};

const REFERRAL_CLIENT_NAME: Embed = Embed {
    alias: "referrals",
    table: store::REFERRALS,
    foreign_key: "referral_id",
    columns: &["client_name"],
    nested: &[],
};

pub struct FinanceArrangementEntity;

impl Entity for FinanceArrangementEntity {
    const TABLE: &'static str = store::FINANCE_ARRANGEMENTS;
    const LABEL: &'static str = "finance arrangement";
    const PLURAL: &'static str = "finance arrangements";
    const ORDER_BY: &'static str = "created_at";
    const EMBEDS: &'static [Embed] = &[CLIENT_NAME, REFERRAL_SUMMARY];

    type Row = FinanceArrangementRow;
    type Record = FinanceArrangement;
    type Draft = FinanceArrangementDraft;
    type Patch = FinanceArrangementPatch;

    fn to_record(row: FinanceArrangementRow) -> FinanceArrangement {
        FinanceArrangement {
            id: row.id,
            client_id: row.client_id,
            referral_id: row.referral_id,
            loan_amount: row.loan_amount,
            loan_type: row.loan_type,
            lender: row.lender,
            application_date: row.application_date,
            settlement_date: row.settlement_date,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            client_name: row.clients.map(|c| c.name),
            referral: row.referrals,
        }
    }

    fn draft_to_storage(draft: &FinanceArrangementDraft) -> AppResult<Row> {
        require(&draft.client_id, "client_id")?;
        let mut row = Row::new();
        put(&mut row, "client_id", Some(&draft.client_id));
        put(&mut row, "referral_id", draft.referral_id.as_ref());
        put(&mut row, "loan_amount", draft.loan_amount);
        put(&mut row, "loan_type", draft.loan_type.as_ref());
        put(&mut row, "lender", draft.lender.as_ref());
        put(&mut row, "application_date", draft.application_date.as_ref());
        put(&mut row, "settlement_date", draft.settlement_date.as_ref());
        put(&mut row, "status", Some(draft.status));
        put(&mut row, "notes", draft.notes.as_ref());
        Ok(row)
    }

    fn patch_to_storage(patch: &FinanceArrangementPatch) -> Row {
        let mut row = Row::new();
        put(&mut row, "referral_id", patch.referral_id.as_ref());
        put(&mut row, "loan_amount", patch.loan_amount);
        put(&mut row, "loan_type", patch.loan_type.as_ref());
        put(&mut row, "lender", patch.lender.as_ref());
        put(&mut row, "application_date", patch.application_date.as_ref());
        put(&mut row, "settlement_date", patch.settlement_date.as_ref());
        put(&mut row, "status", patch.status);
        put(&mut row, "notes", patch.notes.as_ref());
        row
    }

    fn sample_rows(now: DateTime<Utc>) -> Vec<FinanceArrangementRow> {
        sample::finance_arrangements(now)
    }
}

pub struct CommissionEntity;

impl Entity for CommissionEntity {
    const TABLE: &'static str = store::COMMISSIONS;
    const LABEL: &'static str = "commission";
    const PLURAL: &'static str = "commissions";
    const ORDER_BY: &'static str = "created_at";
    const EMBEDS: &'static [Embed] = &[Embed {
        alias: "finance_arrangements",
        table: store::FINANCE_ARRANGEMENTS,
        foreign_key: "finance_arrangement_id",
        columns: &["id", "loan_amount", "loan_type", "lender", "status"],
        nested: &[CLIENT_NAME, REFERRAL_CLIENT_NAME],
    }];

    type Row = CommissionRow;
    type Record = Commission;
    type Draft = CommissionDraft;
    type Patch = CommissionPatch;

    fn to_record(row: CommissionRow) -> Commission {
        Commission {
            id: row.id,
            finance_arrangement_id: row.finance_arrangement_id,
            upfront_amount: row.upfront_amount,
            upfront_payment_date: row.upfront_payment_date,
            trail_percentage: row.trail_percentage,
            trail_amount: row.trail_amount,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            finance_arrangement: row.finance_arrangements.map(ArrangementSummary::from),
        }
    }

    fn draft_to_storage(draft: &CommissionDraft) -> AppResult<Row> {
        require(&draft.finance_arrangement_id, "finance_arrangement_id")?;
        let mut row = Row::new();
        put(&mut row, "finance_arrangement_id", Some(&draft.finance_arrangement_id));
        put(&mut row, "upfront_amount", draft.upfront_amount);
        put(&mut row, "upfront_payment_date", draft.upfront_payment_date.as_ref());
        put(&mut row, "trail_percentage", draft.trail_percentage);
        put(&mut row, "trail_amount", draft.trail_amount);
        put(&mut row, "status", Some(draft.status));
        put(&mut row, "notes", draft.notes.as_ref());
        Ok(row)
    }

    fn patch_to_storage(patch: &CommissionPatch) -> Row {
        let mut row = Row::new();
        put(&mut row, "upfront_amount", patch.upfront_amount);
        put(&mut row, "upfront_payment_date", patch.upfront_payment_date.as_ref());
        put(&mut row, "trail_percentage", patch.trail_percentage);
        put(&mut row, "trail_amount", patch.trail_amount);
        put(&mut row, "status", patch.status);
        put(&mut row, "notes", patch.notes.as_ref());
        row
    }

    fn sample_rows(now: DateTime<Utc>) -> Vec<CommissionRow> {
        sample::commissions(now)
    }
}

pub struct IncentiveEntity;

impl Entity for IncentiveEntity {
    const TABLE: &'static str = store::INCENTIVES;
    const LABEL: &'static str = "incentive";
    const PLURAL: &'static str = "incentives";
    const ORDER_BY: &'static str = "created_at";
    const EMBEDS: &'static [Embed] = &[CLIENT_NAME, REFERRAL_SUMMARY];

    type Row = IncentiveRow;
    type Record = Incentive;
    type Draft = IncentiveDraft;
    type Patch = IncentivePatch;

    fn to_record(row: IncentiveRow) -> Incentive {
        Incentive {
            id: row.id,
            client_id: row.client_id,
            referral_id: row.referral_id,
            kind: row.kind,
            amount: row.amount,
            delivery_date: row.delivery_date,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            client_name: row.clients.map(|c| c.name),
            referral: row.referrals,
        }
    }

    fn draft_to_storage(draft: &IncentiveDraft) -> AppResult<Row> {
        if draft.client_id.is_some() && draft.referral_id.is_some() {
            return Err(AppError::new(
                VALIDATION_INCENTIVE_TARGET,
                "An incentive is for either a client or a referral, not both",
            ));
        }
        let mut row = Row::new();
        put(&mut row, "client_id", draft.client_id.as_ref());
        put(&mut row, "referral_id", draft.referral_id.as_ref());
        put(&mut row, "type", draft.kind.as_ref());
        put(&mut row, "amount", draft.amount);
        put(&mut row, "delivery_date", draft.delivery_date.as_ref());
        put(&mut row, "status", Some(draft.status));
        put(&mut row, "notes", draft.notes.as_ref());
        Ok(row)
    }

    fn patch_to_storage(patch: &IncentivePatch) -> Row {
        let mut row = Row::new();
        put(&mut row, "type", patch.kind.as_ref());
        put(&mut row, "amount", patch.amount);
        put(&mut row, "delivery_date", patch.delivery_date.as_ref());
        put(&mut row, "status", patch.status);
        put(&mut row, "notes", patch.notes.as_ref());
        row
    }

    fn sample_rows(now: DateTime<Utc>) -> Vec<IncentiveRow> {
        sample::incentives(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_referral::ReferralStatus;
    use serde_json::json;

    #[test]
    fn titles_capitalise_the_label() {
        assert_eq!(ReferralEntity::title(), "Referral");
        assert_eq!(FinanceArrangementEntity::title(), "Finance arrangement");
    }

    #[test]
    fn referral_drafts_are_stamped_with_a_date() {
        let row = ReferralEntity::draft_to_storage(&ReferralDraft::new("X", "Y")).unwrap();
        assert_eq!(row["client_name"], "X");
        assert_eq!(row["status"], "new");
        assert!(row["date"].as_str().is_some());
        assert!(!row.contains_key("value"));
    }

    #[test]
    fn blank_client_name_is_rejected() {
        let err = ReferralEntity::draft_to_storage(&ReferralDraft::new("  ", "Y")).unwrap_err();
        assert_eq!(err.code(), VALIDATION_REQUIRED);
    }

    #[test]
    fn incentive_cannot_target_both_client_and_referral() {
        let draft = IncentiveDraft {
            client_id: Some("cl-001".into()),
            referral_id: Some("1".into()),
            ..IncentiveDraft::default()
        };
        let err = IncentiveEntity::draft_to_storage(&draft).unwrap_err();
        assert_eq!(err.code(), VALIDATION_INCENTIVE_TARGET);
    }

    #[test]
    fn incentive_kind_is_stored_as_type() {
        let draft = IncentiveDraft {
            kind: Some("Gift Card".into()),
            ..IncentiveDraft::default()
        };
        let row = IncentiveEntity::draft_to_storage(&draft).unwrap();
        assert_eq!(row["type"], "Gift Card");
        assert_eq!(row["status"], "planned");
    }

    #[test]
    fn decode_reports_the_table() {
        let row = json!({"id": "r1"}).as_object().cloned().unwrap();
        let err = decode_row::<ReferralEntity>(row).unwrap_err();
        assert_eq!(err.code(), RECORD_DECODE);
        assert_eq!(err.context().get("table").map(String::as_str), Some("referrals"));
    }

    #[test]
    fn client_contact_dates_render_long_form() {
        let clients = sample_records::<ClientEntity>(Utc::now());
        assert_eq!(clients[0].last_contact.as_deref(), Some("May 15, 2023"));
    }

    #[test]
    fn arrangement_records_flatten_embeds() {
        let arrangements = sample_records::<FinanceArrangementEntity>(Utc::now());
        assert_eq!(arrangements[0].client_name.as_deref(), Some("James Wilson"));
        assert_eq!(
            arrangements[0].referral.as_ref().map(|r| r.status),
            Some(ReferralStatus::InProgress)
        );
    }
}
