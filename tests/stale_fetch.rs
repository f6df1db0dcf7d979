#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use brokerdesk_lib::{
    entity::ReferralEntity,
    error::StorageError,
    session::Actor,
    store::{MemoryStore, Row, RowStore, SelectQuery, REFERRALS},
};
use tokio::sync::Notify;

#[path = "util.rs"]
mod util;

/// Holds selects for one actor until released.
struct GatedStore {
    inner: MemoryStore,
    gated_actor: String,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl RowStore for GatedStore {
    async fn select(&self, actor: &Actor, query: &SelectQuery) -> Result<Vec<Row>, StorageError> {
        if actor.id == self.gated_actor {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.select(actor, query).await
    }

    async fn get(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
    ) -> Result<Option<Row>, StorageError> {
        self.inner.get(actor, table, id).await
    }

    async fn insert(
        &self,
        actor: Option<&Actor>,
        table: &str,
        row: Row,
    ) -> Result<Row, StorageError> {
        self.inner.insert(actor, table, row).await
    }

    async fn update(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
        patch: Row,
    ) -> Result<(), StorageError> {
        self.inner.update(actor, table, id, patch).await
    }

    async fn delete(&self, actor: &Actor, table: &str, id: &str) -> Result<(), StorageError> {
        self.inner.delete(actor, table, id).await
    }
}

#[tokio::test]
async fn results_for_a_previous_actor_are_discarded() {
    let memory = MemoryStore::new();
    memory.seed(
        REFERRALS,
        "slow",
        vec![util::referral_row("Stale", "2024-01-01T00:00:00Z")],
    );
    memory.seed(
        REFERRALS,
        "fast",
        vec![util::referral_row("Fresh", "2024-02-01T00:00:00Z")],
    );
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = GatedStore {
        inner: memory,
        gated_actor: "slow".into(),
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    let (referrals, auth, _notices) =
        util::resource::<ReferralEntity>(Arc::new(store), Some(util::broker("slow")));

    let pending = {
        let referrals = referrals.clone();
        tokio::spawn(async move { referrals.load().await })
    };
    entered.notified().await;
    assert!(referrals.is_loading());

    auth.sign_in(util::broker("fast"));
    referrals.load().await;
    assert_eq!(referrals.items()[0].client_name, "Fresh");

    release.notify_one();
    pending.await.expect("slow load finishes");

    let items = referrals.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].client_name, "Fresh");
    assert!(!referrals.is_loading());
}
