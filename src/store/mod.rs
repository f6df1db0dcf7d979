//! Row-level CRUD collaborator.
//!
//! Everything above this layer talks to a [`RowStore`]; the SQLite adapter
//! is used by the binary and the in-memory adapter by tests. Rows travel as
//! JSON objects keyed by storage column names.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    error::{IdentifierKind, StorageError},
    session::Actor,
};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

pub type Row = Map<String, Value>;

/// A field value with a fixed column representation; conversion cannot fail.
pub trait ColumnValue {
    fn into_column(self) -> Value;
}

impl ColumnValue for &str {
    fn into_column(self) -> Value {
        Value::from(self)
    }
}

impl ColumnValue for &String {
    fn into_column(self) -> Value {
        Value::String(self.clone())
    }
}

impl ColumnValue for f64 {
    fn into_column(self) -> Value {
        Value::from(self)
    }
}

impl ColumnValue for bool {
    fn into_column(self) -> Value {
        Value::Bool(self)
    }
}

pub const REFERRALS: &str = "referrals";
pub const CLIENTS: &str = "clients";
pub const FINANCE_ARRANGEMENTS: &str = "finance_arrangements";
pub const COMMISSIONS: &str = "commissions";
pub const INCENTIVES: &str = "incentives";

pub const DOMAIN_TABLES: &[&str] = &[
    REFERRALS,
    CLIENTS,
    FINANCE_ARRANGEMENTS,
    COMMISSIONS,
    INCENTIVES,
];

/// Columns the store owns; callers cannot overwrite them on update.
pub const STORE_MANAGED_COLUMNS: &[&str] = &["id", "user_id", "created_at"];

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern to compile"));

pub fn ensure_table(table: &str) -> Result<(), StorageError> {
    if DOMAIN_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier {
            kind: IdentifierKind::Table,
            name: table.to_string(),
        })
    }
}

pub fn ensure_column(column: &str) -> Result<(), StorageError> {
    if IDENTIFIER.is_match(column) {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier {
            kind: IdentifierKind::Column,
            name: column.to_string(),
        })
    }
}

/// A related row attached under `alias`, looked up through `foreign_key`.
#[derive(Debug, Clone, Copy)]
pub struct Embed {
    pub alias: &'static str,
    pub table: &'static str,
    pub foreign_key: &'static str,
    pub columns: &'static [&'static str],
    pub nested: &'static [Embed],
}

#[derive(Debug, Clone, Copy)]
pub struct SelectQuery {
    pub table: &'static str,
    pub order_by: &'static str,
    pub descending: bool,
    pub embeds: &'static [Embed],
}

impl SelectQuery {
    /// Most recent first, the order every list view uses.
    pub fn latest_first(table: &'static str, order_by: &'static str) -> Self {
        Self {
            table,
            order_by,
            descending: true,
            embeds: &[],
        }
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, actor: &Actor, query: &SelectQuery) -> Result<Vec<Row>, StorageError>;

    async fn get(&self, actor: &Actor, table: &str, id: &str)
        -> Result<Option<Row>, StorageError>;

    /// Inserts and returns the stored row. `None` is an anonymous write,
    /// which stores only accept for external referrals.
    async fn insert(&self, actor: Option<&Actor>, table: &str, row: Row)
        -> Result<Row, StorageError>;

    async fn update(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
        patch: Row,
    ) -> Result<(), StorageError>;

    async fn delete(&self, actor: &Actor, table: &str, id: &str) -> Result<(), StorageError>;
}

/// Whether an anonymous insert is allowed for this table and payload.
pub(crate) fn anonymous_insert_allowed(table: &str, row: &Row) -> bool {
    table == REFERRALS
        && match row.get("is_external") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
}

/// Resolve `embeds` for every row, recursing into nested embeds.
///
/// A related table that does not exist yet leaves the alias as `null`.
pub fn attach_embeds<'a, S>(
    store: &'a S,
    actor: &'a Actor,
    rows: &'a mut [Row],
    embeds: &'a [Embed],
) -> BoxFuture<'a, Result<(), StorageError>>
where
    S: RowStore + ?Sized,
{
    async move {
        for embed in embeds {
            for row in rows.iter_mut() {
                let foreign = row
                    .get(embed.foreign_key)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let related = match foreign {
                    Some(id) => match store.get(actor, embed.table, &id).await {
                        Ok(found) => found,
                        Err(err) if err.is_schema_missing() => None,
                        Err(err) => return Err(err),
                    },
                    None => None,
                };
                let value = match related {
                    Some(related) => {
                        let mut holder = [related];
                        attach_embeds(store, actor, &mut holder, embed.nested).await?;
                        let [related] = holder;
                        Value::Object(project(related, embed))
                    }
                    None => Value::Null,
                };
                row.insert(embed.alias.to_string(), value);
            }
        }
        Ok(())
    }
    .boxed()
}

fn project(mut related: Row, embed: &Embed) -> Row {
    let mut out = Map::new();
    for column in embed.columns.iter().copied() {
        if let Some(value) = related.remove(column) {
            out.insert(column.to_string(), value);
        }
    }
    for nested in embed.nested {
        if let Some(value) = related.remove(nested.alias) {
            out.insert(nested.alias.to_string(), value);
        }
    }
    out
}
