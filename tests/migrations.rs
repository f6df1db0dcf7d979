#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use brokerdesk_lib::migrate;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn fresh_database_applies_everything_once() -> Result<()> {
    let pool = util::temp_pool().await;
    let before = migrate::migration_status(&pool).await?;
    assert!(!before.is_empty());
    assert!(before.iter().all(|m| !m.applied));

    migrate::apply_migrations(&pool).await?;
    migrate::apply_migrations(&pool).await?;

    let after = migrate::migration_status(&pool).await?;
    assert!(after.iter().all(|m| m.applied));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count as usize, after.len());

    let external: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('referrals') WHERE name = 'is_external'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(external, 1);
    Ok(())
}

#[tokio::test]
async fn edited_migrations_are_refused() -> Result<()> {
    let pool = util::migrated_pool().await;
    sqlx::query("UPDATE schema_migrations SET checksum = 'tampered'")
        .execute(&pool)
        .await?;
    let err = migrate::apply_migrations(&pool)
        .await
        .expect_err("checksum mismatch");
    assert!(err.to_string().contains("edited after application"));
    Ok(())
}

#[tokio::test]
async fn status_checks_reject_unknown_statuses() -> Result<()> {
    let pool = util::migrated_pool().await;
    let res = sqlx::query(
        "INSERT INTO referrals (id, user_id, client_name, source, status, date, created_at, updated_at) \
         VALUES ('r1', 'u1', 'A', 'B', 'archived', '2024-01-01', '', '')",
    )
    .execute(&pool)
    .await;
    assert!(res.is_err());
    Ok(())
}
