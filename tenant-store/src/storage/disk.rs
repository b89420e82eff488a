//! Local disk backend
//!
//! Serves files from a base directory. Only paths below the configured
//! allowed sub-roots are visible; folders leading to an allowed sub-root
//! are listed but expose nothing else.
//!
//! Example: with roots ["/img/"], "/img/logo.png" is readable while
//! "/secret.txt" is not, and listing "/" shows only "img".

use super::backend::{mime_from_path, Backend, File, FileEntry, UpsertFileCommand};
use super::path;
use crate::context::RequestContext;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tokio::fs;

/// Disk backend configuration
#[derive(Debug, Clone, Default)]
pub struct DiskConfig {
    pub path: PathBuf,
    /// Allowed sub-roots, e.g. "/img/". Empty means everything is visible.
    pub roots: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiskBackend {
    base: PathBuf,
    roots: Vec<String>,
}

impl DiskBackend {
    pub fn new(config: DiskConfig) -> Result<Self> {
        let roots = config
            .roots
            .iter()
            .map(|r| path::normalize(r))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base: config.path,
            roots,
        })
    }

    pub fn base(&self) -> &std::path::Path {
        &self.base
    }

    fn allows(&self, path: &str) -> bool {
        self.roots.is_empty() || self.roots.iter().any(|root| path::is_under(path, root))
    }

    /// Immediate child names of `folder` that lead towards an allowed sub-root
    fn children_towards_roots(&self, folder: &str) -> Vec<String> {
        let mut children: Vec<String> = Vec::new();
        for root in &self.roots {
            if root == folder || !path::is_under(root, folder) {
                continue;
            }
            let rest = root[folder.len()..].trim_start_matches('/');
            let child = rest.split('/').next().unwrap_or(rest).to_string();
            if !child.is_empty() && !children.contains(&child) {
                children.push(child);
            }
        }
        children
    }

    fn real_path(&self, path: &str) -> PathBuf {
        self.base.join(path.trim_start_matches('/'))
    }
}

fn modified_time(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl Backend for DiskBackend {
    async fn get(&self, _ctx: &RequestContext, path: &str) -> Result<Option<File>> {
        let path = path::normalize(path)?;
        if !self.allows(&path) {
            return Ok(None);
        }

        let real_path = self.real_path(&path);
        let metadata = match fs::metadata(&real_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let contents = fs::read(&real_path).await?;

        tracing::debug!("Read disk file: {} ({} bytes)", path, contents.len());

        Ok(Some(File {
            mime_type: mime_from_path(&path).to_string(),
            path,
            size: contents.len() as i64,
            contents,
            cache_control: String::new(),
            content_disposition: String::new(),
            properties: HashMap::new(),
            modified: modified_time(&metadata),
        }))
    }

    async fn list(&self, _ctx: &RequestContext, folder: &str) -> Result<Vec<FileEntry>> {
        let folder = path::normalize(folder)?;

        if !self.allows(&folder) {
            let children = self.children_towards_roots(&folder);
            if children.is_empty() {
                return Err(AppError::NotFound(folder));
            }
            return Ok(children.into_iter().map(FileEntry::folder).collect());
        }

        // Only directories can be listed; a file path is not a folder
        let real_path = self.real_path(&folder);
        match fs::metadata(&real_path).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(AppError::NotFound(folder)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(folder))
            }
            Err(e) => return Err(e.into()),
        }

        let mut dir = fs::read_dir(&real_path).await?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Hidden files and in-flight temp files are never listed
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                entries.push(FileEntry {
                    modified: modified_time(&metadata),
                    ..FileEntry::folder(name)
                });
            } else if metadata.is_file() {
                entries.push(FileEntry {
                    mime_type: mime_from_path(&name).to_string(),
                    name,
                    is_folder: false,
                    size: metadata.len() as i64,
                    modified: modified_time(&metadata),
                });
            }
        }

        entries.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then(a.name.cmp(&b.name)));

        tracing::debug!("Listed disk folder: {} ({} entries)", folder, entries.len());

        Ok(entries)
    }

    async fn upsert(&self, _ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()> {
        let path = path::normalize(&cmd.path)?;
        if path == "/" || !self.allows(&path) {
            return Err(AppError::InvalidPath(path));
        }

        let real_path = self.real_path(&path);
        let parent = real_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.base.clone());
        fs::create_dir_all(&parent).await?;

        // Write to a uniquely named hidden temp file, then rename into place.
        // The temp file is removed on drop if anything fails before persist.
        let prefix = format!(".{}.", path::file_name(&path));
        let contents = cmd.contents.clone();
        let target = real_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".tmp")
                .tempfile_in(&parent)?;
            temp.write_all(&contents)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e)))??;

        tracing::debug!("Wrote disk file: {} ({} bytes)", path, cmd.contents.len());

        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, path: &str) -> Result<()> {
        let path = path::normalize(path)?;
        if !self.allows(&path) {
            return Err(AppError::InvalidPath(path));
        }

        match fs::remove_file(self.real_path(&path)).await {
            Ok(()) => {
                tracing::debug!("Deleted disk file: {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
