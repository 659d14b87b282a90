//! Image record metadata, persisted in SQLite.

use crate::{
    errors::{StoreError, StoreResult},
    models::image::ImageRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Schema applied at startup and by `--migrate`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Document-style store of image records keyed by identifier.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record stored under `record.id`.
    async fn put(&self, record: &ImageRecord) -> StoreResult<()>;

    /// Fetch a single record.
    async fn get(&self, id: &str) -> StoreResult<ImageRecord>;

    /// Patch only the `date` field. Fails if no record has this id.
    async fn touch_date(&self, id: &str, date: NaiveDate) -> StoreResult<()>;

    /// Remove a record and return what was removed.
    async fn delete(&self, id: &str) -> StoreResult<ImageRecord>;

    /// Every record, in store-defined order.
    async fn list(&self) -> StoreResult<Vec<ImageRecord>>;

    /// Cheap round trip used by the readiness probe.
    async fn check(&self) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Run the embedded schema statement by statement.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            tracing::debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }
}

fn not_found(id: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |err| match err {
        sqlx::Error::RowNotFound => StoreError::RecordNotFound(id.to_string()),
        other => StoreError::Sqlx(other),
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, record: &ImageRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO images (id, name, date, object_key)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                date = excluded.date,
                object_key = excluded.object_key
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.date)
        .bind(&record.object_key)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<ImageRecord> {
        sqlx::query_as::<_, ImageRecord>(
            "SELECT id, name, date, object_key FROM images WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(not_found(id))
    }

    async fn touch_date(&self, id: &str, date: NaiveDate) -> StoreResult<()> {
        let result = sqlx::query("UPDATE images SET date = ? WHERE id = ?")
            .bind(date)
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<ImageRecord> {
        sqlx::query_as::<_, ImageRecord>(
            "DELETE FROM images WHERE id = ? RETURNING id, name, date, object_key",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(not_found(id))
    }

    async fn list(&self) -> StoreResult<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRecord>("SELECT id, name, date, object_key FROM images")
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    async fn check(&self) -> StoreResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(StoreError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {}",
                one
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteMetadataStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteMetadataStore::new(Arc::new(pool));
        store.migrate().await.unwrap();
        store
    }

    fn record(id: &str, name: &str) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            name: name.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            object_key: format!("{}.png", id),
        }
    }

    #[tokio::test]
    async fn put_then_get_and_list() {
        let store = store().await;
        store.put(&record("a", "Alpha")).await.unwrap();
        store.put(&record("b", "")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), record("a", "Alpha"));
        let mut ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn touch_date_changes_only_date() {
        let store = store().await;
        store.put(&record("a", "Alpha")).await.unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        store.touch_date("a", later).await.unwrap();

        let updated = store.get("a").await.unwrap();
        assert_eq!(updated.date, later);
        assert_eq!(updated.name, "Alpha");
        assert_eq!(updated.object_key, "a.png");
    }

    #[tokio::test]
    async fn touch_date_on_unknown_id_fails() {
        let store = store().await;
        let err = store
            .touch_date("ghost", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn delete_returns_removed_record() {
        let store = store().await;
        store.put(&record("a", "Alpha")).await.unwrap();

        let removed = store.delete("a").await.unwrap();
        assert_eq!(removed.object_key, "a.png");
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.delete("a").await,
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn check_runs_against_pool() {
        store().await.check().await.unwrap();
    }
}
