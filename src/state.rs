use std::sync::Arc;

use crate::{
    notify::{Broadcast, NoticeQueue, Notifier, TracingNotifier},
    resource::{Clients, Commissions, FinanceArrangements, Incentives, Referrals},
    session::AuthHandle,
    store::RowStore,
};

/// Everything a front end needs for one signed-in session.
///
/// Each resource keeps its own list and its own view of store
/// availability; nothing is shared between them except the store,
/// the auth handle and the notice queue.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RowStore>,
    pub auth: AuthHandle,
    pub notices: NoticeQueue,
    pub notifier: Arc<dyn Notifier>,
    pub referrals: Referrals,
    pub clients: Clients,
    pub finance_arrangements: FinanceArrangements,
    pub commissions: Commissions,
    pub incentives: Incentives,
}

impl AppState {
    pub fn new(store: Arc<dyn RowStore>, auth: AuthHandle) -> Self {
        let notices = NoticeQueue::new();
        let notifier: Arc<dyn Notifier> = Arc::new(Broadcast::new(vec![
            Arc::new(notices.clone()),
            Arc::new(TracingNotifier),
        ]));
        Self {
            referrals: Referrals::new(Arc::clone(&store), Arc::clone(&notifier), auth.clone()),
            clients: Clients::new(Arc::clone(&store), Arc::clone(&notifier), auth.clone()),
            finance_arrangements: FinanceArrangements::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                auth.clone(),
            ),
            commissions: Commissions::new(Arc::clone(&store), Arc::clone(&notifier), auth.clone()),
            incentives: Incentives::new(Arc::clone(&store), Arc::clone(&notifier), auth.clone()),
            store,
            auth,
            notices,
            notifier,
        }
    }

    /// Load every resource for whoever is signed in.
    pub async fn load_all(&self) {
        tokio::join!(
            self.referrals.load(),
            self.clients.load(),
            self.finance_arrangements.load(),
            self.commissions.load(),
            self.incentives.load(),
        );
    }
}
