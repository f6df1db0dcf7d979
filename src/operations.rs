//! Insert, update and delete with the demo-mode fallback.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    availability::AvailabilityCell,
    entity::{decode_row, Entity},
    error::{AppError, AppResult, StorageError},
    id::demo_id,
    list_state::Refresh,
    notify::{Notice, Notifier},
    session::{Actor, AuthHandle},
    store::{Row, RowStore},
};

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Update,
    Delete,
}

impl Op {
    fn verb(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Update => "update",
            Op::Delete => "delete",
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            Op::Add => "adding",
            Op::Update => "updating",
            Op::Delete => "deleting",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Op::Add => "added",
            Op::Update => "updated",
            Op::Delete => "deleted",
        }
    }
}

pub struct Operations<E: Entity> {
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn Notifier>,
    auth: AuthHandle,
    availability: AvailabilityCell,
    refresh: Arc<dyn Refresh>,
    /// Id of the actor the write cell last served.
    session: Arc<Mutex<Option<String>>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Operations<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            auth: self.auth.clone(),
            availability: self.availability.clone(),
            refresh: Arc::clone(&self.refresh),
            session: Arc::clone(&self.session),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Operations<E> {
    pub fn new(
        store: Arc<dyn RowStore>,
        notifier: Arc<dyn Notifier>,
        auth: AuthHandle,
        availability: AvailabilityCell,
        refresh: Arc<dyn Refresh>,
    ) -> Self {
        Self {
            store,
            notifier,
            auth,
            availability,
            refresh,
            session: Arc::new(Mutex::new(None)),
            _entity: PhantomData,
        }
    }

    pub fn availability(&self) -> &AvailabilityCell {
        &self.availability
    }

    pub async fn add(&self, draft: E::Draft) -> AppResult<E::Record> {
        let actor = self.require_actor(Op::Add)?;
        let row = E::draft_to_storage(&draft).map_err(|err| self.report(Op::Add, err))?;

        if self.availability.should_skip_live() {
            return self.demo_add(row);
        }

        match self.store.insert(Some(&actor), E::TABLE, row.clone()).await {
            Ok(stored) => {
                self.succeeded(Op::Add, &actor).await;
                decode_row::<E>(stored)
            }
            Err(err) => {
                self.availability.observe_error(&err);
                if err.is_permission_denied() {
                    self.enter_demo_mode(Op::Add);
                    self.demo_add(row)
                } else {
                    Err(self.report(Op::Add, err.into()))
                }
            }
        }
    }

    pub async fn update(&self, id: &str, patch: E::Patch) -> AppResult<()> {
        let actor = self.require_actor(Op::Update)?;
        let row = E::patch_to_storage(&patch);
        self.write(Op::Update, &actor, id, Some(row)).await
    }

    pub async fn remove(&self, id: &str) -> AppResult<()> {
        let actor = self.require_actor(Op::Delete)?;
        self.write(Op::Delete, &actor, id, None).await
    }

    async fn write(&self, op: Op, actor: &Actor, id: &str, row: Option<Row>) -> AppResult<()> {
        if self.availability.should_skip_live() {
            self.notify_demo(op);
            return Ok(());
        }

        let result = match row {
            Some(row) => self.store.update(actor, E::TABLE, id, row).await,
            None => self.store.delete(actor, E::TABLE, id).await,
        };

        match result {
            Ok(()) => {
                self.succeeded(op, actor).await;
                Ok(())
            }
            Err(err) => self.write_failed(op, err),
        }
    }

    fn write_failed(&self, op: Op, err: StorageError) -> AppResult<()> {
        self.availability.observe_error(&err);
        if err.is_permission_denied() {
            self.enter_demo_mode(op);
            self.notify_demo(op);
            Ok(())
        } else {
            Err(self.report(op, err.into()))
        }
    }

    fn require_actor(&self, op: Op) -> AppResult<Actor> {
        let actor = self
            .auth
            .current()
            .ok_or_else(|| self.report(op, AppError::auth_required(op.verb(), E::LABEL)))?;
        self.follow_session(&actor);
        Ok(actor)
    }

    fn follow_session(&self, actor: &Actor) {
        let changed = {
            let mut last = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_deref() == Some(actor.id.as_str()) {
                false
            } else {
                *last = Some(actor.id.clone());
                true
            }
        };
        if changed {
            self.availability.start_session();
        }
    }

    async fn succeeded(&self, op: Op, actor: &Actor) {
        self.availability.observe_success();
        info!(
            target: "brokerdesk",
            event = "mutation_ok",
            table = E::TABLE,
            op = op.verb()
        );
        let description = match op {
            Op::Add => format!("New {} has been added successfully", E::LABEL),
            _ => format!("{} has been {} successfully", E::title(), op.past()),
        };
        self.notifier
            .notify(Notice::success(format!("{} {}", E::title(), op.past()), description));
        self.refresh.refresh(actor).await;
    }

    fn report(&self, op: Op, err: AppError) -> AppError {
        warn!(
            target: "brokerdesk",
            event = "mutation_error",
            table = E::TABLE,
            op = op.verb(),
            code = %err.code(),
            error = %err.message()
        );
        self.notifier.notify(Notice::destructive(
            format!("Error {} {}", op.gerund(), E::LABEL),
            err.message().to_string(),
        ));
        err
    }

    fn enter_demo_mode(&self, op: Op) {
        warn!(
            target: "brokerdesk",
            event = "demo_mode_enter",
            table = E::TABLE,
            op = op.verb()
        );
    }

    fn notify_demo(&self, op: Op) {
        self.notifier.notify(Notice::info(
            "Demo mode",
            format!(
                "{} {} locally only; changes are not saved while live {} are unavailable.",
                E::title(),
                op.past(),
                E::PLURAL
            ),
        ));
    }

    fn demo_add(&self, submitted: Row) -> AppResult<E::Record> {
        self.notify_demo(Op::Add);
        demo_record::<E>(submitted)
    }
}

/// First sample row overlaid with `submitted`, under a time-based demo id.
pub fn demo_record<E: Entity>(submitted: Row) -> AppResult<E::Record> {
    let now = Utc::now();
    let mut merged = E::sample_rows(now)
        .into_iter()
        .next()
        .map(serde_json::to_value)
        .transpose()?
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    for embed in E::EMBEDS {
        merged.remove(embed.alias);
    }
    merged.extend(submitted);
    merged.insert("id".into(), Value::String(demo_id(now.timestamp_millis())));
    decode_row::<E>(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{IncentiveEntity, ReferralEntity};
    use crate::id::is_demo_id;
    use crate::model_finance::IncentiveDraft;
    use crate::model_referral::{ReferralDraft, ReferralStatus};

    #[test]
    fn demo_records_overlay_the_first_sample() {
        let submitted = ReferralEntity::draft_to_storage(&ReferralDraft::new("X", "Y")).unwrap();
        let record = demo_record::<ReferralEntity>(submitted).unwrap();
        assert!(is_demo_id(&record.id));
        assert_eq!(record.client_name, "X");
        assert_eq!(record.source, "Y");
        assert_eq!(record.status, ReferralStatus::New);
        // Not submitted, so the sample's value shows through.
        assert_eq!(record.value, Some(5000.0));
    }

    #[test]
    fn demo_records_drop_sample_embeds() {
        let draft = IncentiveDraft {
            kind: Some("Hamper".into()),
            ..IncentiveDraft::default()
        };
        let submitted = IncentiveEntity::draft_to_storage(&draft).unwrap();
        let record = demo_record::<IncentiveEntity>(submitted).unwrap();
        assert_eq!(record.kind.as_deref(), Some("Hamper"));
        assert_eq!(record.client_name, None);
    }
}
