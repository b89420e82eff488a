//! Backend trait for storage roots
//!
//! Every storage root binds one backend. Backends see root-relative,
//! normalized paths (`/folder/file.png`) and must be safe to call
//! concurrently.

use crate::context::RequestContext;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fully materialized file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub contents: Vec<u8>,
    pub mime_type: String,
    pub cache_control: String,
    pub content_disposition: String,
    pub properties: HashMap<String, String>,
    pub size: i64,
    pub modified: Option<DateTime<Utc>>,
}

/// One row of a folder listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub is_folder: bool,
    pub size: i64,
    pub mime_type: String,
    pub modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
            size: 0,
            mime_type: String::new(),
            modified: None,
        }
    }
}

/// Backend-ready write command, produced only by the upload pipeline
/// after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertFileCommand {
    pub path: String,
    pub contents: Vec<u8>,
    pub mime_type: String,
    pub cache_control: String,
    pub content_disposition: String,
    pub properties: HashMap<String, String>,
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Fetch a file. `Ok(None)` when nothing is stored at `path`.
    async fn get(&self, ctx: &RequestContext, path: &str) -> Result<Option<File>>;

    /// List the direct children of the folder at `path`.
    async fn list(&self, ctx: &RequestContext, path: &str) -> Result<Vec<FileEntry>>;

    /// Create or replace the file at `cmd.path`.
    async fn upsert(&self, ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()>;

    /// Remove the file at `path`. Removing a missing file is not an error.
    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<()>;
}

/// Infer a MIME type from a file extension.
pub fn mime_from_path(path: &str) -> &'static str {
    match super::path::extension(path).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("geojson") => "application/geo+json",
        _ => "application/octet-stream",
    }
}
