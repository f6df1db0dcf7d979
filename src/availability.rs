//! What the session has learned about the live store.
//!
//! Each resource keeps one [`AvailabilityCell`] for reads and one for
//! writes. A permission denial is sticky: once seen, callers stop
//! contacting the store until a success or an explicit [`reset`].
//!
//! [`reset`]: AvailabilityCell::reset

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageAvailability {
    #[default]
    Unknown,
    Available,
    PermissionDenied,
    SchemaMissing,
}

impl StorageAvailability {
    /// Only a permission denial short-circuits; a missing table may be
    /// provisioned at any moment so it is always retried.
    pub fn should_skip_live(self) -> bool {
        matches!(self, StorageAvailability::PermissionDenied)
    }

    pub fn after_success(self) -> Self {
        StorageAvailability::Available
    }

    pub fn after_error(self, error: &StorageError) -> Self {
        match error {
            StorageError::PermissionDenied { .. } => StorageAvailability::PermissionDenied,
            StorageError::SchemaMissing { .. } => StorageAvailability::SchemaMissing,
            StorageError::NotFound { .. }
            | StorageError::InvalidIdentifier { .. }
            | StorageError::Other(_) => self,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageAvailability::Unknown => "unknown",
            StorageAvailability::Available => "available",
            StorageAvailability::PermissionDenied => "permission_denied",
            StorageAvailability::SchemaMissing => "schema_missing",
        }
    }
}

#[derive(Debug, Default)]
struct CellState {
    availability: StorageAvailability,
    demo_notice_shown: bool,
}

#[derive(Clone, Default)]
pub struct AvailabilityCell {
    scope: &'static str,
    inner: Arc<Mutex<CellState>>,
}

impl AvailabilityCell {
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            inner: Arc::new(Mutex::new(CellState::default())),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CellState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn get(&self) -> StorageAvailability {
        self.with_state(|state| state.availability)
    }

    pub fn should_skip_live(&self) -> bool {
        self.get().should_skip_live()
    }

    pub fn observe_success(&self) {
        self.transition(|current| current.after_success());
    }

    pub fn observe_error(&self, error: &StorageError) {
        self.transition(|current| current.after_error(error));
    }

    /// Forget what was learned so the next call goes back to the store.
    pub fn reset(&self) {
        self.transition(|_| StorageAvailability::Unknown);
    }

    /// A new actor starts from scratch: unknown availability, notice unclaimed.
    pub fn start_session(&self) {
        self.with_state(|state| state.demo_notice_shown = false);
        self.reset();
    }

    /// Returns true exactly once per session, the first time it is called.
    pub fn claim_demo_notice(&self) -> bool {
        self.with_state(|state| !std::mem::replace(&mut state.demo_notice_shown, true))
    }

    fn transition(&self, next: impl FnOnce(StorageAvailability) -> StorageAvailability) {
        let (from, to) = self.with_state(|state| {
            let from = state.availability;
            state.availability = next(from);
            (from, state.availability)
        });
        if from != to {
            info!(
                target: "brokerdesk",
                event = "storage_availability",
                scope = self.scope,
                from = from.as_str(),
                to = to.as_str()
            );
        }
    }
}

/// The pair of cells owned by one resource.
#[derive(Clone)]
pub struct SessionAvailability {
    pub reads: AvailabilityCell,
    pub writes: AvailabilityCell,
}

impl SessionAvailability {
    pub fn new(table: &'static str) -> Self {
        Self {
            reads: AvailabilityCell::new(table),
            writes: AvailabilityCell::new(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> StorageError {
        StorageError::PermissionDenied {
            table: "referrals".into(),
        }
    }

    #[test]
    fn denial_is_sticky_until_success() {
        let cell = AvailabilityCell::new("referrals");
        assert_eq!(cell.get(), StorageAvailability::Unknown);
        assert!(!cell.should_skip_live());

        cell.observe_error(&denied());
        assert!(cell.should_skip_live());

        cell.observe_error(&StorageError::Other("timeout".into()));
        assert_eq!(cell.get(), StorageAvailability::PermissionDenied);

        cell.observe_success();
        assert_eq!(cell.get(), StorageAvailability::Available);
    }

    #[test]
    fn schema_missing_never_skips_live_queries() {
        let cell = AvailabilityCell::new("clients");
        cell.observe_error(&StorageError::SchemaMissing {
            table: "clients".into(),
        });
        assert_eq!(cell.get(), StorageAvailability::SchemaMissing);
        assert!(!cell.should_skip_live());
    }

    #[test]
    fn reset_returns_to_unknown() {
        let cell = AvailabilityCell::new("referrals");
        cell.observe_error(&denied());
        cell.reset();
        assert_eq!(cell.get(), StorageAvailability::Unknown);
    }

    #[test]
    fn demo_notice_is_claimed_once() {
        let cell = AvailabilityCell::new("referrals");
        let clone = cell.clone();
        assert!(cell.claim_demo_notice());
        assert!(!clone.claim_demo_notice());
        cell.reset();
        assert!(!cell.claim_demo_notice());
    }

    #[test]
    fn new_session_forgets_denial_and_notice() {
        let cell = AvailabilityCell::new("referrals");
        cell.observe_error(&denied());
        assert!(cell.claim_demo_notice());
        assert!(!cell.claim_demo_notice());

        cell.start_session();
        assert_eq!(cell.get(), StorageAvailability::Unknown);
        assert!(!cell.should_skip_live());
        assert!(cell.claim_demo_notice());
    }
}
