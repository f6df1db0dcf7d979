//! One read against the live store with the demo-data fallback ladder.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    availability::AvailabilityCell,
    entity::{decode_rows, sample_records, Entity},
    error::StorageError,
    notify::{Notice, Notifier},
    session::Actor,
    store::RowStore,
};

/// Result of a fetch: the rows to show and, for unrecoverable failures,
/// the message to show with them.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<R> {
    pub data: Vec<R>,
    pub error: Option<String>,
}

impl<R> FetchOutcome<R> {
    pub fn ok(data: Vec<R>) -> Self {
        Self { data, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            error: Some(message.into()),
        }
    }
}

pub struct FetchAction<E: Entity> {
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn Notifier>,
    availability: AvailabilityCell,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for FetchAction<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            availability: self.availability.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> FetchAction<E> {
    pub fn new(
        store: Arc<dyn RowStore>,
        notifier: Arc<dyn Notifier>,
        availability: AvailabilityCell,
    ) -> Self {
        Self {
            store,
            notifier,
            availability,
            _entity: PhantomData,
        }
    }

    pub fn availability(&self) -> &AvailabilityCell {
        &self.availability
    }

    /// Read every visible row, newest first.
    ///
    /// Signed out yields an empty list without touching the store. A
    /// missing table or a permission denial yields the sample dataset;
    /// only other failures surface as an error.
    pub async fn fetch_all(&self, actor: Option<&Actor>) -> FetchOutcome<E::Record> {
        let Some(actor) = actor else {
            return FetchOutcome::ok(Vec::new());
        };

        if self.availability.should_skip_live() {
            debug!(
                target: "brokerdesk",
                event = "fetch_skip_live",
                table = E::TABLE
            );
            return FetchOutcome::ok(sample_records::<E>(Utc::now()));
        }

        match self.store.select(actor, &E::select_query()).await {
            Ok(rows) => {
                self.availability.observe_success();
                match decode_rows::<E>(rows) {
                    Ok(records) => {
                        debug!(
                            target: "brokerdesk",
                            event = "fetch_ok",
                            table = E::TABLE,
                            rows = records.len()
                        );
                        FetchOutcome::ok(records)
                    }
                    Err(err) => self.fail(err.message().to_string()),
                }
            }
            Err(err) => self.fall_back(err),
        }
    }

    fn fall_back(&self, err: StorageError) -> FetchOutcome<E::Record> {
        self.availability.observe_error(&err);
        match err {
            StorageError::SchemaMissing { .. } => {
                info!(
                    target: "brokerdesk",
                    event = "fetch_fallback",
                    table = E::TABLE,
                    reason = "schema_missing"
                );
                FetchOutcome::ok(sample_records::<E>(Utc::now()))
            }
            StorageError::PermissionDenied { .. } => {
                info!(
                    target: "brokerdesk",
                    event = "fetch_fallback",
                    table = E::TABLE,
                    reason = "permission_denied"
                );
                if self.availability.claim_demo_notice() {
                    self.notifier.notify(Notice::info(
                        "Using demo data",
                        format!(
                            "You don't have access to live {} yet, so sample data is shown instead.",
                            E::PLURAL
                        ),
                    ));
                }
                FetchOutcome::ok(sample_records::<E>(Utc::now()))
            }
            other @ (StorageError::NotFound { .. }
            | StorageError::InvalidIdentifier { .. }
            | StorageError::Other(_)) => self.fail(other.to_string()),
        }
    }

    fn fail(&self, message: String) -> FetchOutcome<E::Record> {
        warn!(
            target: "brokerdesk",
            event = "fetch_error",
            table = E::TABLE,
            error = %message
        );
        self.notifier.notify(Notice::destructive(
            format!("Error fetching {}", E::PLURAL),
            message.clone(),
        ));
        FetchOutcome::failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::StorageAvailability;
    use crate::entity::ReferralEntity;
    use crate::notify::{NoticeQueue, Severity};
    use crate::store::{MemoryStore, StoreOp};

    fn action(store: &MemoryStore, notices: &NoticeQueue) -> FetchAction<ReferralEntity> {
        FetchAction::new(
            Arc::new(store.clone()),
            Arc::new(notices.clone()),
            AvailabilityCell::new("referrals"),
        )
    }

    fn actor() -> Actor {
        Actor::new("broker-1", None)
    }

    #[tokio::test]
    async fn signed_out_is_empty_and_silent() {
        let store = MemoryStore::new();
        let notices = NoticeQueue::new();
        let outcome = action(&store, &notices).fetch_all(None).await;
        assert!(outcome.data.is_empty());
        assert_eq!(outcome.error, None);
        assert_eq!(store.total_calls(), 0);
        assert!(notices.is_empty());
    }

    #[tokio::test]
    async fn other_errors_surface_destructively() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Select, StorageError::Other("connection reset".into()));
        let notices = NoticeQueue::new();
        let action = action(&store, &notices);

        let outcome = action.fetch_all(Some(&actor())).await;
        assert!(outcome.data.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("connection reset"));
        assert_eq!(action.availability().get(), StorageAvailability::Unknown);

        let shown = notices.drain();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].severity, Severity::Destructive);
        assert_eq!(shown[0].title, "Error fetching referrals");
    }

    #[tokio::test]
    async fn schema_missing_keeps_retrying_live() {
        let store = MemoryStore::unprovisioned();
        let notices = NoticeQueue::new();
        let action = action(&store, &notices);

        for _ in 0..2 {
            let outcome = action.fetch_all(Some(&actor())).await;
            assert_eq!(outcome.data.len(), 5);
            assert_eq!(outcome.error, None);
        }
        assert_eq!(store.calls(StoreOp::Select), 2);
        assert_eq!(action.availability().get(), StorageAvailability::SchemaMissing);
        assert!(notices.is_empty());
    }
}
