use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Severity {
    Info,
    Success,
    Destructive,
}

/// A transient message for the broker: title, description and severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::build(title, description, Severity::Info)
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::build(title, description, Severity::Success)
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::build(title, description, Severity::Destructive)
    }

    fn build(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Queue of notices waiting to be rendered. Nothing is persisted.
#[derive(Clone, Default)]
pub struct NoticeQueue {
    inner: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, notice: Notice) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.push_back(notice);
        }
    }
}

/// Writes notices to the log instead of showing them.
#[derive(Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Destructive => warn!(
                target: "brokerdesk",
                event = "notice",
                severity = "destructive",
                title = %notice.title,
                description = %notice.description
            ),
            severity => info!(
                target: "brokerdesk",
                event = "notice",
                severity = ?severity,
                title = %notice.title,
                description = %notice.description
            ),
        }
    }
}

/// Delivers every notice to each of its notifiers in turn.
#[derive(Clone, Default)]
pub struct Broadcast {
    targets: Vec<Arc<dyn Notifier>>,
}

impl Broadcast {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

impl Notifier for Broadcast {
    fn notify(&self, notice: Notice) {
        for target in &self.targets {
            target.notify(notice.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let queue = NoticeQueue::new();
        queue.notify(Notice::success("Referral added", "ok"));
        queue.notify(Notice::destructive("Error adding referral", "boom"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0].severity, Severity::Success);
        assert_eq!(drained[1].title, "Error adding referral");
        assert!(queue.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_target() {
        let first = NoticeQueue::new();
        let second = NoticeQueue::new();
        let fanout = Broadcast::new(vec![
            Arc::new(first.clone()),
            Arc::new(second.clone()),
            Arc::new(TracingNotifier),
        ]);
        fanout.notify(Notice::info("Using demo data", "sample rows shown"));
        assert_eq!(first.len(), 1);
        assert_eq!(second.snapshot()[0].title, "Using demo data");
    }
}
