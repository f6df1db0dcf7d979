#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use brokerdesk_lib::{
    migrate,
    notify::NoticeQueue,
    resource::Resource,
    entity::Entity,
    session::{Actor, AuthHandle},
    store::{Row, RowStore},
};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

pub async fn migrated_pool() -> SqlitePool {
    let pool = temp_pool().await;
    migrate::apply_migrations(&pool).await.expect("apply migrations");
    pool
}

pub fn broker(id: &str) -> Actor {
    Actor::new(id, Some(format!("{id}@brokerdesk.test")))
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn referral_row(client_name: &str, date: &str) -> Row {
    row(serde_json::json!({
        "client_name": client_name,
        "source": "Website",
        "status": "new",
        "date": date,
        "value": 1000.0,
    }))
}

/// A resource wired to `store`, signed in as `actor`, with its notices.
pub fn resource<E: Entity>(
    store: Arc<dyn RowStore>,
    actor: Option<Actor>,
) -> (Resource<E>, AuthHandle, NoticeQueue) {
    let auth = AuthHandle::new(actor);
    let notices = NoticeQueue::new();
    let resource = Resource::new(store, Arc::new(notices.clone()), auth.clone());
    (resource, auth, notices)
}
