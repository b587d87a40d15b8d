//! Pack storage engine access.
//!
//! The storage engine is an external collaborator: an ordered,
//! sublevel-partitioned key/value store, one instance per built pack. This
//! module wraps it as [`PackDb`] and consumes exactly the primitives the
//! pipeline needs: batched multi-key put, full-sublevel iteration in key
//! order, multi-key get, and an explicit close after each logical operation.
//!
//! Layout per pack database:
//! - `documents` — finalized documents keyed by `_id`; a parent document's
//!   embedded array holds bare child ids.
//! - `embedded` — embedded sub-documents (actor items, journal pages, table
//!   results) keyed `<parentId>.<embeddedId>`.
//! - `folders` — folder records keyed by folder id.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::Row;

use crate::error::{PackError, PackResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (id TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS embedded (key TEXT PRIMARY KEY, data TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS folders (id TEXT PRIMARY KEY, data TEXT NOT NULL)
"#;

/// Handle to one pack's storage engine instance.
#[derive(Debug)]
pub struct PackDb {
    pool: SqlitePool,
}

impl PackDb {
    /// Create a fresh database at `path`, removing any previous build.
    pub async fn create(path: &Path) -> PackResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Delete)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Open an existing pack database for reading.
    pub async fn open(path: &Path) -> PackResult<Self> {
        if !path.is_file() {
            return Err(PackError::validation(format!(
                "no built pack database at {}",
                path.display()
            )));
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Delete);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Write a whole pack in one batch. Any failure leaves the database
    /// untouched; a save is all-or-nothing.
    pub async fn put_batch(
        &self,
        documents: &[(String, String)],
        embedded: &[(String, String)],
        folders: &[(String, String)],
    ) -> PackResult<()> {
        let mut tx = self.pool.begin().await?;
        for (id, data) in documents {
            sqlx::query("INSERT OR REPLACE INTO documents (id, data) VALUES (?, ?)")
                .bind(id)
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }
        for (key, data) in embedded {
            sqlx::query("INSERT OR REPLACE INTO embedded (key, data) VALUES (?, ?)")
                .bind(key)
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }
        for (id, data) in folders {
            sqlx::query("INSERT OR REPLACE INTO folders (id, data) VALUES (?, ?)")
                .bind(id)
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All documents, in key order.
    pub async fn documents(&self) -> PackResult<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, data FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("data")))
            .collect())
    }

    /// All folder records, in key order.
    pub async fn folders(&self) -> PackResult<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, data FROM folders ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("data")))
            .collect())
    }

    /// Fetch embedded sub-documents by `<parentId>.<embeddedId>` key.
    pub async fn get_embedded(&self, keys: &[String]) -> PackResult<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let row = sqlx::query("SELECT data FROM embedded WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            out.push(row.map(|r| r.get("data")));
        }
        Ok(out)
    }

    /// Close the storage engine instance.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_write_and_ordered_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gear.db");

        let db = PackDb::create(&path).await.unwrap();
        db.put_batch(
            &[
                ("zzzz000000000000".into(), "{\"name\":\"Z\"}".into()),
                ("aaaa000000000000".into(), "{\"name\":\"A\"}".into()),
            ],
            &[("aaaa000000000000.bbbb000000000000".into(), "{}".into())],
            &[("ffff000000000000".into(), "{\"name\":\"F\"}".into())],
        )
        .await
        .unwrap();
        db.close().await;

        let db = PackDb::open(&path).await.unwrap();
        let docs = db.documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, "aaaa000000000000", "iteration is key-ordered");

        let embedded = db
            .get_embedded(&[
                "aaaa000000000000.bbbb000000000000".to_string(),
                "aaaa000000000000.missing0000000000".to_string(),
            ])
            .await
            .unwrap();
        assert!(embedded[0].is_some());
        assert!(embedded[1].is_none());

        assert_eq!(db.folders().await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_create_truncates_previous_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gear.db");

        let db = PackDb::create(&path).await.unwrap();
        db.put_batch(&[("aaaa000000000000".into(), "{}".into())], &[], &[])
            .await
            .unwrap();
        db.close().await;

        let db = PackDb::create(&path).await.unwrap();
        assert!(db.documents().await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackDb::open(&dir.path().join("none.db")).await.unwrap_err();
        assert!(matches!(err, PackError::Validation(_)));
    }
}
