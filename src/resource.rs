//! A list and its operations wired together for one entity type.

use std::sync::Arc;

use paste::paste;
use tokio::task::JoinHandle;

use crate::{
    availability::SessionAvailability,
    entity::{
        ClientEntity, CommissionEntity, Entity, FinanceArrangementEntity, IncentiveEntity,
        ReferralEntity,
    },
    error::AppResult,
    fetch::FetchAction,
    list_state::{EntityList, ListState},
    notify::Notifier,
    operations::Operations,
    session::AuthHandle,
    store::RowStore,
};

pub struct Resource<E: Entity> {
    list: EntityList<E>,
    operations: Operations<E>,
    auth: AuthHandle,
    availability: SessionAvailability,
}

impl<E: Entity> Clone for Resource<E> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            operations: self.operations.clone(),
            auth: self.auth.clone(),
            availability: self.availability.clone(),
        }
    }
}

impl<E: Entity> Resource<E> {
    pub fn new(store: Arc<dyn RowStore>, notifier: Arc<dyn Notifier>, auth: AuthHandle) -> Self {
        let availability = SessionAvailability::new(E::TABLE);
        let list = EntityList::new(FetchAction::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            availability.reads.clone(),
        ));
        let operations = Operations::new(
            store,
            notifier,
            auth.clone(),
            availability.writes.clone(),
            Arc::new(list.clone()),
        );
        Self {
            list,
            operations,
            auth,
            availability,
        }
    }

    pub fn list(&self) -> &EntityList<E> {
        &self.list
    }

    pub fn operations(&self) -> &Operations<E> {
        &self.operations
    }

    pub fn availability(&self) -> &SessionAvailability {
        &self.availability
    }

    pub fn items(&self) -> Vec<E::Record> {
        self.list.items()
    }

    pub fn is_loading(&self) -> bool {
        self.list.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.list.error()
    }

    pub fn snapshot(&self) -> ListState<E::Record> {
        self.list.snapshot()
    }

    /// Pick up whoever is signed in right now and load their rows.
    pub async fn load(&self) {
        self.list.sync_actor(self.auth.current()).await;
    }

    pub async fn refetch(&self) {
        self.list.refetch().await;
    }

    pub fn watch_auth(&self) -> JoinHandle<()> {
        self.list.watch_auth(&self.auth)
    }

    pub async fn add(&self, draft: E::Draft) -> AppResult<E::Record> {
        self.operations.add(draft).await
    }

    pub async fn update(&self, id: &str, patch: E::Patch) -> AppResult<()> {
        self.operations.update(id, patch).await
    }

    pub async fn remove(&self, id: &str) -> AppResult<()> {
        self.operations.remove(id).await
    }
}

macro_rules! entity_aliases {
    ( $( $name:ident => $plural:ident ),+ $(,)? ) => {
        paste! {
            $(
                pub type [<$plural FetchAction>] = FetchAction<[<$name Entity>]>;
                pub type [<$plural List>] = EntityList<[<$name Entity>]>;
                pub type [<$name Operations>] = Operations<[<$name Entity>]>;
                pub type $plural = Resource<[<$name Entity>]>;
            )+
        }
    };
}

entity_aliases! {
    Referral => Referrals,
    Client => Clients,
    FinanceArrangement => FinanceArrangements,
    Commission => Commissions,
    Incentive => Incentives,
}
