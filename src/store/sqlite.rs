use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteArguments, SqliteRow},
    Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef,
};
use tracing::{debug, warn};

use super::{
    anonymous_insert_allowed, attach_embeds, ensure_column, ensure_table, Row, RowStore,
    SelectQuery, REFERRALS, STORE_MANAGED_COLUMNS,
};
use crate::{error::StorageError, id::new_uuid_v7, session::Actor, time::now_rfc3339};

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn as_str(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

/// SQLite-backed store that enforces per-actor row visibility the way the
/// hosted database's row-level security policies do.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_access(
        &self,
        actor: &Actor,
        table: &str,
        access: Access,
    ) -> Result<(), StorageError> {
        let revoked: Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(
            "SELECT 1 FROM access_revocations \
             WHERE user_id = ? AND table_name = ? AND operation IN (?, 'all') LIMIT 1",
        )
        .bind(&actor.id)
        .bind(table)
        .bind(access.as_str())
        .fetch_optional(&self.pool)
        .await;

        match revoked {
            Ok(Some(_)) => {
                debug!(
                    target: "brokerdesk",
                    event = "store_access_revoked",
                    table,
                    operation = access.as_str(),
                    actor_id = %actor.id
                );
                Err(StorageError::PermissionDenied {
                    table: table.to_string(),
                })
            }
            Ok(None) => Ok(()),
            // Revocations live in the schema too; without it nothing is revoked.
            Err(err) => match map_sqlx(err, "access_revocations") {
                StorageError::SchemaMissing { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    /// Rows an actor may see and change. Reads and writes share it.
    fn scope_clause(table: &str) -> &'static str {
        if table == REFERRALS {
            "(user_id = ? OR (is_external = 1 AND recipient_email = ?))"
        } else {
            "user_id = ?"
        }
    }

    fn bind_scope<'q>(query: Query<'q>, table: &str, actor: &'q Actor) -> Query<'q> {
        let query = query.bind(actor.id.as_str());
        if table == REFERRALS {
            query.bind(actor.email.as_deref())
        } else {
            query
        }
    }
}

fn map_sqlx(error: sqlx::Error, table: &str) -> StorageError {
    match &error {
        sqlx::Error::Database(db) => {
            let code = db.code();
            StorageError::classify(code.as_deref(), db.message(), table)
        }
        _ => StorageError::Other(error.to_string()),
    }
}

pub(crate) fn row_to_map(row: &SqliteRow) -> Row {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let val = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "REAL" => row
                    .try_get::<f64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                _ => row
                    .try_get::<String, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            },
            _ => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    map
}

fn bind_value<'q>(q: Query<'q>, v: &Value) -> Query<'q> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn select(&self, actor: &Actor, query: &SelectQuery) -> Result<Vec<Row>, StorageError> {
        ensure_table(query.table)?;
        ensure_column(query.order_by)?;
        self.ensure_access(actor, query.table, Access::Read).await?;

        let sql = format!(
            "SELECT * FROM {table} WHERE {scope} ORDER BY {order} {dir}, id {dir}",
            table = query.table,
            scope = Self::scope_clause(query.table),
            order = query.order_by,
            dir = if query.descending { "DESC" } else { "ASC" },
        );
        let rows = Self::bind_scope(sqlx::query(&sql), query.table, actor)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| map_sqlx(err, query.table))?;

        let mut mapped: Vec<Row> = rows.iter().map(row_to_map).collect();
        attach_embeds(self, actor, &mut mapped, query.embeds).await?;
        debug!(
            target: "brokerdesk",
            event = "store_select",
            table = query.table,
            rows = mapped.len()
        );
        Ok(mapped)
    }

    async fn get(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
    ) -> Result<Option<Row>, StorageError> {
        ensure_table(table)?;
        self.ensure_access(actor, table, Access::Read).await?;
        let sql = format!(
            "SELECT * FROM {table} WHERE id = ? AND {scope}",
            scope = Self::scope_clause(table)
        );
        let row = Self::bind_scope(sqlx::query(&sql).bind(id), table, actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx(err, table))?;
        Ok(row.as_ref().map(row_to_map))
    }

    async fn insert(
        &self,
        actor: Option<&Actor>,
        table: &str,
        mut row: Row,
    ) -> Result<Row, StorageError> {
        ensure_table(table)?;
        match actor {
            Some(actor) => {
                self.ensure_access(actor, table, Access::Write).await?;
                if let Some(claimed) = row.get("user_id").and_then(Value::as_str) {
                    if claimed != actor.id {
                        warn!(
                            target: "brokerdesk",
                            event = "store_insert_owner_mismatch",
                            table
                        );
                        return Err(StorageError::PermissionDenied {
                            table: table.to_string(),
                        });
                    }
                }
                row.insert("user_id".into(), Value::String(actor.id.clone()));
            }
            None => {
                if !anonymous_insert_allowed(table, &row) {
                    return Err(StorageError::PermissionDenied {
                        table: table.to_string(),
                    });
                }
                row.insert("user_id".into(), Value::Null);
            }
        }

        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(new_uuid_v7);
        row.insert("id".into(), Value::String(id));
        let now = now_rfc3339();
        row.entry(String::from("created_at"))
            .or_insert(Value::from(now.clone()));
        row.insert("updated_at".into(), Value::from(now));

        let cols: Vec<String> = row.keys().cloned().collect();
        for col in &cols {
            ensure_column(col)?;
        }
        let placeholders: Vec<&str> = cols.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
            cols.join(","),
            placeholders.join(",")
        );
        let mut query = sqlx::query(&sql);
        for col in &cols {
            query = bind_value(query, &row[col.as_str()]);
        }
        let stored = query
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_sqlx(err, table))?;
        Ok(row_to_map(&stored))
    }

    async fn update(
        &self,
        actor: &Actor,
        table: &str,
        id: &str,
        mut patch: Row,
    ) -> Result<(), StorageError> {
        ensure_table(table)?;
        self.ensure_access(actor, table, Access::Write).await?;
        for managed in STORE_MANAGED_COLUMNS {
            patch.remove(*managed);
        }
        patch.insert("updated_at".into(), Value::from(now_rfc3339()));

        let cols: Vec<String> = patch.keys().cloned().collect();
        for col in &cols {
            ensure_column(col)?;
        }
        let set_clause: Vec<String> = cols.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ? AND {}",
            set_clause.join(","),
            Self::scope_clause(table)
        );
        let mut query = sqlx::query(&sql);
        for col in &cols {
            query = bind_value(query, &patch[col.as_str()]);
        }
        let res = Self::bind_scope(query.bind(id), table, actor)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx(err, table))?;
        if res.rows_affected() == 0 {
            return Err(StorageError::not_found(table, id));
        }
        Ok(())
    }

    async fn delete(&self, actor: &Actor, table: &str, id: &str) -> Result<(), StorageError> {
        ensure_table(table)?;
        self.ensure_access(actor, table, Access::Write).await?;
        let sql = format!(
            "DELETE FROM {table} WHERE id = ? AND {}",
            Self::scope_clause(table)
        );
        let res = Self::bind_scope(sqlx::query(&sql).bind(id), table, actor)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx(err, table))?;
        if res.rows_affected() == 0 {
            return Err(StorageError::not_found(table, id));
        }
        Ok(())
    }
}

/// Revoke an actor's access to a table; `operation` is `read`, `write` or `all`.
pub async fn revoke_access(
    pool: &SqlitePool,
    user_id: &str,
    table: &str,
    operation: &str,
) -> anyhow::Result<()> {
    ensure_table(table)?;
    if !matches!(operation, "read" | "write" | "all") {
        anyhow::bail!("unknown operation {operation:?}; expected read, write or all");
    }
    sqlx::query(
        "INSERT OR IGNORE INTO access_revocations (user_id, table_name, operation, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(table)
    .bind(operation)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn restore_access(pool: &SqlitePool, user_id: &str, table: &str) -> anyhow::Result<u64> {
    ensure_table(table)?;
    let res = sqlx::query("DELETE FROM access_revocations WHERE user_id = ? AND table_name = ?")
        .bind(user_id)
        .bind(table)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
