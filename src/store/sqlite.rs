//! SQLite-backed [`Store`] implementation.
//!
//! Tables (see [`crate::migrate`]): `discussions`, `discussion_meta`,
//! `tags`, `discussion_tags`, `run_locks`.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{slug_candidate, slugify, Store};
use crate::error::PersistError;
use crate::models::{ListFilter, NewDiscussion, RecordId, StoredDiscussion, TagId};
use crate::persist::SOURCE_URL_META_KEY;

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

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SELECT_DISCUSSION: &str = r#"
    SELECT d.id, d.title, d.body, d.created_at,
           (SELECT m.meta_value FROM discussion_meta m
             WHERE m.discussion_id = d.id AND m.meta_key = ?) AS source_url,
           t.name AS tag_name,
           t.slug AS tag_slug
    FROM discussions d
    LEFT JOIN discussion_tags dt ON dt.discussion_id = d.id
    LEFT JOIN tags t ON t.id = dt.tag_id
    LEFT JOIN tags pt ON pt.id = t.parent_id
"#;

fn row_to_discussion(row: &SqliteRow) -> StoredDiscussion {
    StoredDiscussion {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        source_url: row.get("source_url"),
        repository: row.get("tag_name"),
        repository_slug: row.get("tag_slug"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_discussion(&self, new: &NewDiscussion) -> Result<RecordId, PersistError> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now().timestamp();

        let id = sqlx::query("INSERT INTO discussions (title, body, created_at) VALUES (?, ?, ?)")
            .bind(&new.title)
            .bind(&new.body)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        if let Some(tag_id) = new.tag_id {
            sqlx::query("INSERT INTO discussion_tags (discussion_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        for (key, value) in &new.meta {
            sqlx::query(
                "INSERT INTO discussion_meta (discussion_id, meta_key, meta_value) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<(), PersistError> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM discussions WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(PersistError::MissingRecord(id));
        }

        sqlx::query(
            r#"
            INSERT INTO discussion_meta (discussion_id, meta_key, meta_value) VALUES (?, ?, ?)
            ON CONFLICT(discussion_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>, PersistError> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT meta_value FROM discussion_meta WHERE discussion_id = ? AND meta_key = ?",
        )
        .bind(id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn ensure_tag(&self, name: &str, parent: Option<TagId>) -> Result<TagId, PersistError> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM tags WHERE name = ? AND parent_id IS ?")
                .bind(name)
                .bind(parent)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let base = slugify(name);
        let mut attempt = 1;
        let slug = loop {
            let candidate = slug_candidate(&base, attempt);
            let taken: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM tags WHERE slug = ?")
                .bind(&candidate)
                .fetch_one(&self.pool)
                .await?;
            if !taken {
                break candidate;
            }
            attempt += 1;
        };

        let id = sqlx::query("INSERT INTO tags (name, slug, parent_id) VALUES (?, ?, ?)")
            .bind(name)
            .bind(&slug)
            .bind(parent)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    async fn get_discussion(&self, id: RecordId) -> Result<Option<StoredDiscussion>, PersistError> {
        let sql = format!("{} WHERE d.id = ?", SELECT_DISCUSSION);
        let row = sqlx::query(&sql)
            .bind(SOURCE_URL_META_KEY)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_discussion))
    }

    async fn list_discussions(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<StoredDiscussion>, PersistError> {
        let sql = format!(
            r#"{}
            WHERE (? IS NULL OR t.slug = ? OR pt.slug = ?)
              AND (? IS NULL OR (t.name = ? AND t.parent_id IS NOT NULL))
            ORDER BY d.id DESC LIMIT ?"#,
            SELECT_DISCUSSION
        );
        // SQLite treats a negative LIMIT as "no limit".
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&sql)
            .bind(SOURCE_URL_META_KEY)
            .bind(&filter.tag_slug)
            .bind(&filter.tag_slug)
            .bind(&filter.tag_slug)
            .bind(&filter.repository)
            .bind(&filter.repository)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_discussion).collect())
    }

    async fn try_acquire_lock(
        &self,
        name: &str,
        holder: &str,
        stale_after_secs: i64,
    ) -> Result<bool, PersistError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM run_locks WHERE name = ? AND acquired_at < ?")
            .bind(name)
            .bind(now - stale_after_secs)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO run_locks (name, holder, acquired_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(holder)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(inserted == 1)
    }

    async fn release_lock(&self, name: &str, holder: &str) -> Result<(), PersistError> {
        sqlx::query("DELETE FROM run_locks WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("mirror.sqlite")).await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    #[tokio::test]
    async fn test_insert_meta_and_read_back() {
        let (_tmp, store) = open_store().await;
        let org = store.ensure_tag("acme", None).await.unwrap();
        let docs = store.ensure_tag("docs", Some(org)).await.unwrap();

        let id = store
            .insert_discussion(&NewDiscussion {
                title: "Welcome".into(),
                body: "Hello\nworld".into(),
                tag_id: Some(docs),
                meta: Vec::new(),
            })
            .await
            .unwrap();
        store
            .set_meta(id, SOURCE_URL_META_KEY, "https://github.com/acme/docs/discussions/1")
            .await
            .unwrap();

        let stored = store.get_discussion(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Welcome");
        assert_eq!(stored.body, "Hello\nworld");
        assert_eq!(
            stored.source_url.as_deref(),
            Some("https://github.com/acme/docs/discussions/1")
        );
        assert_eq!(stored.repository.as_deref(), Some("docs"));
        assert_eq!(stored.repository_slug.as_deref(), Some("docs"));
    }

    #[tokio::test]
    async fn test_ensure_tag_reuses_existing_root_and_child() {
        let (_tmp, store) = open_store().await;
        let org = store.ensure_tag("acme", None).await.unwrap();
        assert_eq!(store.ensure_tag("acme", None).await.unwrap(), org);
        let child = store.ensure_tag("acme", Some(org)).await.unwrap();
        assert_ne!(child, org);

        let slug: String = sqlx::query_scalar("SELECT slug FROM tags WHERE id = ?")
            .bind(child)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(slug, "acme-2");
    }

    #[tokio::test]
    async fn test_list_filter_and_limit() {
        let (_tmp, store) = open_store().await;
        let org = store.ensure_tag("acme", None).await.unwrap();
        let docs = store.ensure_tag("docs", Some(org)).await.unwrap();
        for title in ["one", "two", "three"] {
            store
                .insert_discussion(&NewDiscussion {
                    title: title.into(),
                    body: String::new(),
                    tag_id: Some(docs),
                    meta: Vec::new(),
                })
                .await
                .unwrap();
        }
        store
            .insert_discussion(&NewDiscussion {
                title: "untagged".into(),
                body: String::new(),
                tag_id: None,
                meta: Vec::new(),
            })
            .await
            .unwrap();

        let all = store.list_discussions(&ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].title, "untagged");

        let tagged = store.list_discussions(&ListFilter::tagged("docs")).await.unwrap();
        let titles: Vec<_> = tagged.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two", "one"]);

        let latest = store.list_discussions(&ListFilter::latest(2)).await.unwrap();
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tag_fails_insert() {
        let (_tmp, store) = open_store().await;
        let result = store
            .insert_discussion(&NewDiscussion {
                title: "orphan".into(),
                body: String::new(),
                tag_id: Some(999),
                meta: vec![(SOURCE_URL_META_KEY.to_string(), "https://github.com/x".to_string())],
            })
            .await;
        assert!(matches!(result, Err(PersistError::Storage(_))));
        let all = store.list_discussions(&ListFilter::default()).await.unwrap();
        assert!(all.is_empty());
        let meta_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discussion_meta")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(meta_rows, 0);
    }

    #[tokio::test]
    async fn test_insert_writes_meta_in_same_transaction() {
        let (_tmp, store) = open_store().await;
        let id = store
            .insert_discussion(&NewDiscussion {
                title: "with meta".into(),
                body: String::new(),
                tag_id: None,
                meta: vec![(
                    SOURCE_URL_META_KEY.to_string(),
                    "https://github.com/acme/docs/discussions/8".to_string(),
                )],
            })
            .await
            .unwrap();
        let stored = store.get_discussion(id).await.unwrap().unwrap();
        assert_eq!(
            stored.source_url.as_deref(),
            Some("https://github.com/acme/docs/discussions/8")
        );
    }

    #[tokio::test]
    async fn test_organization_slug_includes_child_repositories() {
        let (_tmp, store) = open_store().await;
        let org = store.ensure_tag("acme", None).await.unwrap();
        // Same name as the organization, so this tag's slug is `acme-2`.
        let same_name = store.ensure_tag("acme", Some(org)).await.unwrap();
        let docs = store.ensure_tag("docs", Some(org)).await.unwrap();
        for (title, tag) in [("site", same_name), ("guide", docs)] {
            store
                .insert_discussion(&NewDiscussion {
                    title: title.into(),
                    body: String::new(),
                    tag_id: Some(tag),
                    meta: Vec::new(),
                })
                .await
                .unwrap();
        }

        let under_org = store.list_discussions(&ListFilter::tagged("acme")).await.unwrap();
        let titles: Vec<_> = under_org.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["guide", "site"]);

        let by_name = store
            .list_discussions(&ListFilter::for_repository("acme"))
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].title, "site");
        assert_eq!(by_name[0].repository_slug.as_deref(), Some("acme-2"));
    }

    #[tokio::test]
    async fn test_run_lock_round_trip() {
        let (_tmp, store) = open_store().await;
        assert!(store.try_acquire_lock("discussion-sync", "a", 3600).await.unwrap());
        assert!(!store.try_acquire_lock("discussion-sync", "b", 3600).await.unwrap());
        store.release_lock("discussion-sync", "a").await.unwrap();
        assert!(store.try_acquire_lock("discussion-sync", "b", 3600).await.unwrap());
    }
}
