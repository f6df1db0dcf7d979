//! The in-memory list a screen renders, kept in step with the signed-in actor.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    entity::Entity,
    fetch::{FetchAction, FetchOutcome},
    session::{Actor, AuthHandle},
};

/// Something that can reload itself after a successful write by `actor`.
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self, actor: &Actor);
}

/// Point-in-time copy of a list's state.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<R> {
    pub items: Vec<R>,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct Inner<R> {
    items: Vec<R>,
    is_loading: bool,
    error: Option<String>,
    actor: Option<Actor>,
    /// Bumped on every actor change; fetches from an older session are dropped.
    generation: u64,
    initial_fetch_started: bool,
}

impl<R> Default for Inner<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            error: None,
            actor: None,
            generation: 0,
            initial_fetch_started: false,
        }
    }
}

pub struct EntityList<E: Entity> {
    action: FetchAction<E>,
    inner: Arc<Mutex<Inner<E::Record>>>,
}

impl<E: Entity> Clone for EntityList<E> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity> EntityList<E> {
    pub fn new(action: FetchAction<E>) -> Self {
        Self {
            action,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E::Record>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fetch_action(&self) -> &FetchAction<E> {
        &self.action
    }

    pub fn snapshot(&self) -> ListState<E::Record> {
        let inner = self.lock();
        ListState {
            items: inner.items.clone(),
            is_loading: inner.is_loading,
            error: inner.error.clone(),
        }
    }

    pub fn items(&self) -> Vec<E::Record> {
        self.lock().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn actor(&self) -> Option<Actor> {
        self.lock().actor.clone()
    }

    /// React to the signed-in actor. Sign-out clears the list; a new actor
    /// starts a session and triggers its initial fetch exactly once.
    pub async fn sync_actor(&self, actor: Option<Actor>) {
        let (new_session, start_initial) = {
            let mut inner = self.lock();
            match actor {
                None => {
                    if inner.actor.is_some() || !inner.items.is_empty() || inner.error.is_some() {
                        info!(target: "brokerdesk", event = "list_cleared", table = E::TABLE);
                    }
                    inner.generation += 1;
                    inner.actor = None;
                    inner.items.clear();
                    inner.error = None;
                    inner.is_loading = false;
                    inner.initial_fetch_started = false;
                    (true, false)
                }
                Some(actor) => {
                    let changed = inner.actor.as_ref() != Some(&actor);
                    if changed {
                        inner.generation += 1;
                        inner.actor = Some(actor);
                        inner.items.clear();
                        inner.error = None;
                        inner.initial_fetch_started = false;
                    }
                    (
                        changed,
                        !std::mem::replace(&mut inner.initial_fetch_started, true),
                    )
                }
            }
        };
        if new_session {
            self.action.availability().start_session();
        }
        if start_initial {
            self.load(true).await;
        }
    }

    /// Reload without flipping the list back to its loading state.
    pub async fn refetch(&self) {
        self.load(false).await;
    }

    async fn load(&self, initial: bool) {
        let (actor, generation) = {
            let mut inner = self.lock();
            if initial {
                inner.is_loading = true;
            }
            (inner.actor.clone(), inner.generation)
        };

        let FetchOutcome { data, error } = self.action.fetch_all(actor.as_ref()).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(
                target: "brokerdesk",
                event = "fetch_discarded",
                table = E::TABLE,
                started = generation,
                current = inner.generation
            );
            return;
        }
        inner.items = data;
        inner.error = error;
        inner.is_loading = false;
    }

    /// Follow `auth` until every handle is dropped, syncing on each change.
    pub fn watch_auth(&self, auth: &AuthHandle) -> JoinHandle<()> {
        let list = self.clone();
        let mut rx = auth.subscribe();
        tokio::spawn(async move {
            let current = rx.borrow_and_update().clone();
            list.sync_actor(current).await;
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().clone();
                list.sync_actor(current).await;
            }
        })
    }
}

#[async_trait]
impl<E: Entity> Refresh for EntityList<E> {
    /// A write can land before the list was ever loaded; adopt the writer
    /// first so the reload runs under the same actor.
    async fn refresh(&self, actor: &Actor) {
        let synced = {
            let inner = self.lock();
            inner.initial_fetch_started && inner.actor.as_ref() == Some(actor)
        };
        if synced {
            self.refetch().await;
        } else {
            self.sync_actor(Some(actor.clone())).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityCell;
    use crate::entity::ReferralEntity;
    use crate::error::StorageError;
    use crate::notify::NoticeQueue;
    use crate::store::{MemoryStore, StoreOp};
    use serde_json::json;

    fn list(store: &MemoryStore) -> EntityList<ReferralEntity> {
        EntityList::new(FetchAction::new(
            Arc::new(store.clone()),
            Arc::new(NoticeQueue::new()),
            AvailabilityCell::new("referrals"),
        ))
    }

    fn seed(store: &MemoryStore, owner: &str, name: &str) {
        let row = json!({
            "client_name": name,
            "source": "LinkedIn",
            "status": "new",
            "date": "2024-05-01T00:00:00Z"
        });
        store.seed("referrals", owner, vec![row.as_object().cloned().unwrap()]);
    }

    #[tokio::test]
    async fn initial_fetch_runs_once_per_session() {
        let store = MemoryStore::new();
        seed(&store, "a", "Ann");
        let list = list(&store);
        let actor = Actor::new("a", None);

        list.sync_actor(Some(actor.clone())).await;
        list.sync_actor(Some(actor)).await;
        assert_eq!(store.calls(StoreOp::Select), 1);
        assert_eq!(list.items().len(), 1);
        assert!(!list.is_loading());
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Select, StorageError::Other("boom".into()));
        let list = list(&store);
        list.sync_actor(Some(Actor::new("a", None))).await;
        assert_eq!(list.error().as_deref(), Some("boom"));

        list.sync_actor(None).await;
        assert_eq!(
            list.snapshot(),
            ListState {
                items: vec![],
                is_loading: false,
                error: None
            }
        );
    }

    #[tokio::test]
    async fn switching_actor_refetches_for_the_new_actor() {
        let store = MemoryStore::new();
        seed(&store, "a", "Ann");
        seed(&store, "b", "Bob");
        let list = list(&store);

        list.sync_actor(Some(Actor::new("a", None))).await;
        assert_eq!(list.items()[0].client_name, "Ann");
        list.sync_actor(Some(Actor::new("b", None))).await;
        assert_eq!(list.items()[0].client_name, "Bob");
        assert_eq!(store.calls(StoreOp::Select), 2);
    }

    #[tokio::test]
    async fn refresh_adopts_the_writer_before_first_load() {
        let store = MemoryStore::new();
        seed(&store, "a", "Ann");
        let list = list(&store);

        list.refresh(&Actor::new("a", None)).await;
        assert_eq!(list.actor().map(|a| a.id), Some("a".to_string()));
        assert_eq!(list.items()[0].client_name, "Ann");
        assert_eq!(store.calls(StoreOp::Select), 1);

        list.refresh(&Actor::new("a", None)).await;
        assert_eq!(store.calls(StoreOp::Select), 2);
    }

    #[tokio::test]
    async fn switching_actor_retries_a_denied_store() {
        let store = MemoryStore::new();
        seed(&store, "b", "Bob");
        store.fail_next(
            StoreOp::Select,
            StorageError::PermissionDenied {
                table: "referrals".into(),
            },
        );
        let list = list(&store);

        list.sync_actor(Some(Actor::new("a", None))).await;
        assert!(list.fetch_action().availability().should_skip_live());
        list.sync_actor(Some(Actor::new("b", None))).await;
        assert_eq!(store.calls(StoreOp::Select), 2);
        assert_eq!(list.items()[0].client_name, "Bob");
    }

    #[tokio::test]
    async fn refetch_while_signed_out_skips_the_store() {
        let store = MemoryStore::new();
        let list = list(&store);
        list.refetch().await;
        assert!(list.items().is_empty());
        assert_eq!(store.total_calls(), 0);
    }
}
