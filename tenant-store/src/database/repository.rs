//! Repository layer for database operations
//!
//! File CRUD scoped by organization. Writes that touch both the file and
//! its properties run in one transaction.

use super::models::*;
use crate::error::Result;
use crate::storage::path;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a file and its properties by path
    ///
    /// Both reads share one transaction so a concurrent overwrite can never
    /// pair the old contents with the new properties.
    pub async fn get_file(&self, org_id: i64, path: &str) -> Result<Option<StoredFile>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT * FROM file WHERE org_id = ? AND path = ?
            "#,
        )
        .bind(org_id)
        .bind(path)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        let meta = sqlx::query_as::<_, FileMeta>(
            r#"
            SELECT key, value FROM file_meta WHERE org_id = ? AND path = ?
            "#,
        )
        .bind(org_id)
        .bind(path)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(StoredFile {
            row,
            properties: meta.into_iter().map(|m| (m.key, m.value)).collect(),
        }))
    }

    /// List files stored directly in a folder
    pub async fn list_folder_files(&self, org_id: i64, folder: &str) -> Result<Vec<FileListing>> {
        let files = sqlx::query_as::<_, FileListing>(
            r#"
            SELECT path, mime_type, size, updated_at FROM file
            WHERE org_id = ? AND parent_folder_path = ?
            ORDER BY path ASC
            "#,
        )
        .bind(org_id)
        .bind(folder)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    /// List paths of all files below a folder, at any depth
    pub async fn list_descendant_paths(&self, org_id: i64, folder: &str) -> Result<Vec<String>> {
        let prefix = if folder == "/" {
            "/".to_string()
        } else {
            format!("{}/", folder)
        };

        let paths: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT path FROM file
            WHERE org_id = ? AND substr(path, 1, ?) = ?
            ORDER BY path ASC
            "#,
        )
        .bind(org_id)
        .bind(prefix.chars().count() as i64)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(paths)
    }

    /// Create or replace a file and its properties
    pub async fn upsert_file(
        &self,
        org_id: i64,
        req: UpsertFileRequest,
        properties: &HashMap<String, String>,
    ) -> Result<()> {
        let now = Utc::now();
        let parent = path::parent(&req.path).to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO file (org_id, path, parent_folder_path, contents, etag, cache_control,
                              content_disposition, mime_type, size, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(org_id, path) DO UPDATE SET
                contents = excluded.contents,
                etag = excluded.etag,
                cache_control = excluded.cache_control,
                content_disposition = excluded.content_disposition,
                mime_type = excluded.mime_type,
                size = excluded.size,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(org_id)
        .bind(&req.path)
        .bind(&parent)
        .bind(&req.contents)
        .bind(&req.etag)
        .bind(&req.cache_control)
        .bind(&req.content_disposition)
        .bind(&req.mime_type)
        .bind(req.contents.len() as i64)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM file_meta WHERE org_id = ? AND path = ?")
            .bind(org_id)
            .bind(&req.path)
            .execute(&mut *tx)
            .await?;

        for (key, value) in properties {
            sqlx::query("INSERT INTO file_meta (org_id, path, key, value) VALUES (?, ?, ?, ?)")
                .bind(org_id)
                .bind(&req.path)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Upserted file: {} for org: {}", req.path, org_id);
        Ok(())
    }

    /// Delete a file and its properties, returning whether it existed
    pub async fn delete_file(&self, org_id: i64, path: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM file_meta WHERE org_id = ? AND path = ?")
            .bind(org_id)
            .bind(path)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query("DELETE FROM file WHERE org_id = ? AND path = ?")
            .bind(org_id)
            .bind(path)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::debug!("Deleted file: {} for org: {} ({} rows)", path, org_id, rows);
        Ok(rows > 0)
    }
}
