use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// The signed-in user every store call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// Shared view of who is signed in.
///
/// Cloning is cheap; every clone observes the same identity and
/// subscribers are woken on each change.
#[derive(Clone)]
pub struct AuthHandle {
    tx: watch::Sender<Option<Actor>>,
}

impl AuthHandle {
    pub fn new(initial: Option<Actor>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn current(&self) -> Option<Actor> {
        self.tx.borrow().clone()
    }

    pub fn sign_in(&self, actor: Actor) {
        info!(target: "brokerdesk", event = "auth_sign_in", actor_id = %actor.id);
        self.tx.send_replace(Some(actor));
    }

    pub fn sign_out(&self) {
        info!(target: "brokerdesk", event = "auth_sign_out");
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Actor>> {
        self.tx.subscribe()
    }
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::signed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_identity_changes() {
        let auth = AuthHandle::signed_out();
        let mut rx = auth.subscribe();
        assert!(auth.current().is_none());

        auth.sign_in(Actor::new("broker-1", None));
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow().as_ref().map(|a| a.id.as_str()), Some("broker-1"));

        auth.sign_out();
        rx.changed().await.expect("sender alive");
        assert!(rx.borrow().is_none());
    }
}
