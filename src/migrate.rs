use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Discussion records
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discussions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Auxiliary per-record metadata (source URL lives here)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discussion_meta (
            discussion_id INTEGER NOT NULL,
            meta_key TEXT NOT NULL,
            meta_value TEXT NOT NULL,
            PRIMARY KEY (discussion_id, meta_key),
            FOREIGN KEY (discussion_id) REFERENCES discussions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Hierarchical tags: organization at the root, repositories below it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            parent_id INTEGER,
            FOREIGN KEY (parent_id) REFERENCES tags(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discussion_tags (
            discussion_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (discussion_id, tag_id),
            FOREIGN KEY (discussion_id) REFERENCES discussions(id),
            FOREIGN KEY (tag_id) REFERENCES tags(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Advisory locks keeping scheduled and manual runs apart
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS run_locks (
            name TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            acquired_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_discussion_tags_tag_id ON discussion_tags(tag_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_parent_id ON tags(parent_id)")
        .execute(pool)
        .await?;

    Ok(())
}
