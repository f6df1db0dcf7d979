use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    anonymous_insert_allowed, attach_embeds, ensure_table, Row, RowStore, SelectQuery,
    DOMAIN_TABLES, REFERRALS, STORE_MANAGED_COLUMNS,
};
use crate::{error::StorageError, id::new_uuid_v7, session::Actor, time::now_rfc3339};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Get,
    Insert,
    Update,
    Delete,
}

const OPS: [StoreOp; 5] = [
    StoreOp::Select,
    StoreOp::Get,
    StoreOp::Insert,
    StoreOp::Update,
    StoreOp::Delete,
];

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Row>>,
    scripted: HashMap<StoreOp, VecDeque<StorageError>>,
    sticky: HashMap<StoreOp, StorageError>,
}

/// In-memory [`RowStore`] with call counters and injectable failures.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    calls: Arc<HashMap<StoreOp, AtomicUsize>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Every domain table provisioned and empty.
    pub fn new() -> Self {
        let store = Self::unprovisioned();
        {
            let mut inner = store.lock();
            for table in DOMAIN_TABLES {
                inner.tables.insert(table.to_string(), Vec::new());
            }
        }
        store
    }

    /// No tables at all; every call reports the schema as missing.
    pub fn unprovisioned() -> Self {
        let calls = OPS.iter().map(|op| (*op, AtomicUsize::new(0))).collect();
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            calls: Arc::new(calls),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn provision(&self, table: &str) {
        self.lock().tables.entry(table.to_string()).or_default();
    }

    /// Seed rows owned by `user_id`, bypassing scoping and counters.
    pub fn seed(&self, table: &str, user_id: &str, rows: Vec<Row>) {
        let mut inner = self.lock();
        let target = inner.tables.entry(table.to_string()).or_default();
        for mut row in rows {
            row.entry(String::from("id"))
                .or_insert_with(|| Value::String(new_uuid_v7()));
            row.insert("user_id".into(), Value::String(user_id.to_string()));
            target.push(row);
        }
    }

    /// Every row in `table` regardless of owner.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Fail the next call of `op` with `error`; queued failures are used in order.
    pub fn fail_next(&self, op: StoreOp, error: StorageError) {
        self.lock().scripted.entry(op).or_default().push_back(error);
    }

    /// Fail every call of `op` until [`MemoryStore::clear_failures`].
    pub fn fail_always(&self, op: StoreOp, error: StorageError) {
        self.lock().sticky.insert(op, error);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.scripted.clear();
        inner.sticky.clear();
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls
            .get(&op)
            .map(|count| count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        OPS.iter().map(|op| self.calls(*op)).sum()
    }

    fn enter(&self, op: StoreOp, table: &str) -> Result<(), StorageError> {
        if let Some(count) = self.calls.get(&op) {
            count.fetch_add(1, Ordering::SeqCst);
        }
        ensure_table(table)?;
        let mut inner = self.lock();
        if let Some(err) = inner.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(err) = inner.sticky.get(&op) {
            return Err(err.clone());
        }
        if !inner.tables.contains_key(table) {
            return Err(StorageError::SchemaMissing {
                table: table.to_string(),
            });
        }
        Ok(())
    }
}

fn visible_to(row: &Row, table: &str, actor: &Actor) -> bool {
    if row.get("user_id").and_then(Value::as_str) == Some(actor.id.as_str()) {
        return true;
    }
    table == REFERRALS
        && row.get("is_external").map(truthy).unwrap_or(false)
        && actor.email.is_some()
        && row.get("recipient_email").and_then(Value::as_str) == actor.email.as_deref()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn sort_key(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, actor: &Actor, query: &SelectQuery) -> Result<Vec<Row>, StorageError> {
        self.enter(StoreOp::Select, query.table)?;
        let mut rows: Vec<Row> = {
            let inner = self.lock();
            inner
                .tables
                .get(query.table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| visible_to(row, query.table, actor))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        rows.sort_by_key(|row| sort_key(row, query.order_by));
        if query.descending {
            rows.reverse();
        }
        attach_embeds(self, actor, &mut rows, query.embeds).await?;
        Ok(rows)
    }

    async fn get(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
    ) -> Result<Option<Row>, StorageError> {
        self.enter(StoreOp::Get, table)?;
        let inner = self.lock();
        Ok(inner.tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| {
                    row.get("id").and_then(Value::as_str) == Some(id)
                        && visible_to(row, table, actor)
                })
                .cloned()
        }))
    }

    async fn insert(
        &self,
        actor: Option<&Actor>,
        table: &str,
        mut row: Row,
    ) -> Result<Row, StorageError> {
        self.enter(StoreOp::Insert, table)?;
        match actor {
            Some(actor) => {
                row.insert("user_id".into(), Value::String(actor.id.clone()));
            }
            None if anonymous_insert_allowed(table, &row) => {
                row.insert("user_id".into(), Value::Null);
            }
            None => {
                return Err(StorageError::PermissionDenied {
                    table: table.to_string(),
                })
            }
        }
        row.entry(String::from("id"))
            .or_insert_with(|| Value::String(new_uuid_v7()));
        let now = now_rfc3339();
        row.entry(String::from("created_at"))
            .or_insert(Value::from(now.clone()));
        row.insert("updated_at".into(), Value::from(now));

        let mut inner = self.lock();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
        mut patch: Row,
    ) -> Result<(), StorageError> {
        self.enter(StoreOp::Update, table)?;
        for managed in STORE_MANAGED_COLUMNS {
            patch.remove(*managed);
        }
        let mut inner = self.lock();
        let target = inner.tables.get_mut(table).and_then(|rows| {
            rows.iter_mut()
                .find(|row| {
                    row.get("id").and_then(Value::as_str) == Some(id) && visible_to(row, table, actor)
                })
        });
        match target {
            Some(row) => {
                row.extend(patch);
                row.insert("updated_at".into(), Value::from(now_rfc3339()));
                Ok(())
            }
            None => Err(StorageError::not_found(table, id)),
        }
    }

    async fn delete(&self, actor: &Actor, table: &str, id: &str) -> Result<(), StorageError> {
        self.enter(StoreOp::Delete, table)?;
        let mut inner = self.lock();
        let rows = inner.tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| {
            !(row.get("id").and_then(Value::as_str) == Some(id) && visible_to(row, table, actor))
        });
        if rows.len() == before {
            return Err(StorageError::not_found(table, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor(id: &str) -> Actor {
        Actor::new(id, Some(format!("{id}@example.com")))
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        store.seed("clients", "a", vec![row(json!({"name": "Ann", "created_at": "1"}))]);
        store.seed("clients", "b", vec![row(json!({"name": "Bob", "created_at": "2"}))]);

        let query = SelectQuery::latest_first("clients", "created_at");
        let rows = store.select(&actor("a"), &query).await.expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Ann");
        assert_eq!(store.calls(StoreOp::Select), 1);
    }

    #[tokio::test]
    async fn scripted_failures_fire_once() {
        let store = MemoryStore::new();
        store.fail_next(
            StoreOp::Select,
            StorageError::PermissionDenied {
                table: "referrals".into(),
            },
        );
        let query = SelectQuery::latest_first("referrals", "date");
        assert!(store.select(&actor("a"), &query).await.is_err());
        assert!(store.select(&actor("a"), &query).await.is_ok());
        assert_eq!(store.calls(StoreOp::Select), 2);
    }

    #[tokio::test]
    async fn unprovisioned_tables_report_schema_missing() {
        let store = MemoryStore::unprovisioned();
        let query = SelectQuery::latest_first("referrals", "date");
        let err = store.select(&actor("a"), &query).await.unwrap_err();
        assert!(err.is_schema_missing());
    }

    #[tokio::test]
    async fn external_referrals_reach_their_recipient() {
        let store = MemoryStore::new();
        store
            .insert(
                None,
                "referrals",
                row(json!({
                    "client_name": "Walk-in",
                    "is_external": true,
                    "recipient_email": "a@example.com",
                    "date": "2024-01-01T00:00:00Z"
                })),
            )
            .await
            .expect("anonymous external insert");

        let query = SelectQuery::latest_first("referrals", "date");
        assert_eq!(store.select(&actor("a"), &query).await.unwrap().len(), 1);
        assert!(store.select(&actor("b"), &query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recipients_can_change_external_referrals() {
        let store = MemoryStore::new();
        let stored = store
            .insert(
                None,
                "referrals",
                row(json!({
                    "client_name": "Walk-in",
                    "is_external": true,
                    "recipient_email": "a@example.com",
                    "date": "2024-01-01T00:00:00Z"
                })),
            )
            .await
            .expect("anonymous external insert");
        let id = stored["id"].as_str().expect("id").to_string();

        let outsider = store
            .update(&actor("b"), "referrals", &id, row(json!({"status": "contacted"})))
            .await
            .unwrap_err();
        assert!(matches!(outsider, StorageError::NotFound { .. }));

        store
            .update(&actor("a"), "referrals", &id, row(json!({"status": "contacted"})))
            .await
            .expect("recipient update");
        let seen = store.get(&actor("a"), "referrals", &id).await.unwrap();
        assert_eq!(seen.expect("visible")["status"], "contacted");

        store
            .delete(&actor("a"), "referrals", &id)
            .await
            .expect("recipient delete");
        assert!(store.get(&actor("a"), "referrals", &id).await.unwrap().is_none());
    }
}
