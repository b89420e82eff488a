//! In-memory backend
//!
//! Keeps files in an ordered map. Used by tests and by embedders that want a
//! scratch root.

use super::backend::{Backend, File, FileEntry, UpsertFileCommand};
use super::path;
use crate::context::RequestContext;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryBackend {
    files: RwLock<BTreeMap<String, File>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, _ctx: &RequestContext, path: &str) -> Result<Option<File>> {
        let path = path::normalize(path)?;
        Ok(self.files.read().await.get(&path).cloned())
    }

    async fn list(&self, _ctx: &RequestContext, folder: &str) -> Result<Vec<FileEntry>> {
        let folder = path::normalize(folder)?;
        let files = self.files.read().await;

        let mut entries: Vec<FileEntry> = Vec::new();
        for (key, file) in files.iter() {
            if key == &folder || !path::is_under(key, &folder) {
                continue;
            }

            let rest = key[folder.len()..].trim_start_matches('/');
            match rest.split_once('/') {
                Some((child, _)) => {
                    if !entries.iter().any(|e| e.is_folder && e.name == child) {
                        entries.push(FileEntry::folder(child));
                    }
                }
                None => entries.push(FileEntry {
                    name: rest.to_string(),
                    is_folder: false,
                    size: file.size,
                    mime_type: file.mime_type.clone(),
                    modified: file.modified,
                }),
            }
        }

        Ok(entries)
    }

    async fn upsert(&self, _ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()> {
        let path = path::normalize(&cmd.path)?;
        let file = File {
            path: path.clone(),
            contents: cmd.contents.clone(),
            mime_type: cmd.mime_type.clone(),
            cache_control: cmd.cache_control.clone(),
            content_disposition: cmd.content_disposition.clone(),
            properties: cmd.properties.clone(),
            size: cmd.contents.len() as i64,
            modified: Some(Utc::now()),
        };

        self.files.write().await.insert(path, file);
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, path: &str) -> Result<()> {
        let path = path::normalize(path)?;
        self.files.write().await.remove(&path);
        Ok(())
    }
}
