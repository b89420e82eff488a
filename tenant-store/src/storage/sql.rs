//! SQL-backed backend
//!
//! Stores file blobs in the `file` table, scoped to one organization.
//! Folders are implicit: a folder exists while any file lives below it.

use super::backend::{Backend, File, FileEntry, UpsertFileCommand};
use super::path;
use crate::context::RequestContext;
use crate::database::{Repository, UpsertFileRequest};
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Clone)]
pub struct SqlBackend {
    repo: Repository,
    org_id: i64,
}

impl SqlBackend {
    pub fn new(repo: Repository, org_id: i64) -> Self {
        Self { repo, org_id }
    }

    pub fn org_id(&self) -> i64 {
        self.org_id
    }
}

/// Calculate SHA-256 hash of data
fn calculate_etag(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Backend for SqlBackend {
    async fn get(&self, _ctx: &RequestContext, path: &str) -> Result<Option<File>> {
        let path = path::normalize(path)?;
        let stored = match self.repo.get_file(self.org_id, &path).await? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        let row = stored.row;

        tracing::debug!("Read SQL file: {} for org: {}", path, self.org_id);

        Ok(Some(File {
            path: row.path,
            contents: row.contents,
            mime_type: row.mime_type,
            cache_control: row.cache_control,
            content_disposition: row.content_disposition,
            properties: stored.properties,
            size: row.size,
            modified: Some(row.updated_at),
        }))
    }

    async fn list(&self, _ctx: &RequestContext, folder: &str) -> Result<Vec<FileEntry>> {
        let folder = path::normalize(folder)?;

        let mut entries: Vec<FileEntry> = Vec::new();
        for descendant in self.repo.list_descendant_paths(self.org_id, &folder).await? {
            let rest = descendant[folder.len()..].trim_start_matches('/');
            if let Some((child, _)) = rest.split_once('/') {
                if !entries.iter().any(|e| e.name == child) {
                    entries.push(FileEntry::folder(child));
                }
            }
        }

        for file in self.repo.list_folder_files(self.org_id, &folder).await? {
            entries.push(FileEntry {
                name: path::file_name(&file.path).to_string(),
                is_folder: false,
                size: file.size,
                mime_type: file.mime_type,
                modified: Some(file.updated_at),
            });
        }

        tracing::debug!(
            "Listed SQL folder: {} for org: {} ({} entries)",
            folder,
            self.org_id,
            entries.len()
        );

        Ok(entries)
    }

    async fn upsert(&self, _ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()> {
        let path = path::normalize(&cmd.path)?;
        let req = UpsertFileRequest {
            etag: calculate_etag(&cmd.contents),
            path,
            contents: cmd.contents.clone(),
            mime_type: cmd.mime_type.clone(),
            cache_control: cmd.cache_control.clone(),
            content_disposition: cmd.content_disposition.clone(),
        };

        self.repo.upsert_file(self.org_id, req, &cmd.properties).await
    }

    async fn delete(&self, _ctx: &RequestContext, path: &str) -> Result<()> {
        let path = path::normalize(path)?;
        self.repo.delete_file(self.org_id, &path).await?;
        Ok(())
    }
}
