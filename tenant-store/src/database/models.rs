//! Database models
//!
//! Row structs for the SQL storage tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// A stored file, including its contents
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRow {
    pub org_id: i64,
    /// Root-relative path, e.g. "/img/logo.png"
    pub path: String,
    pub parent_folder_path: String,
    pub contents: Vec<u8>,
    /// SHA-256 of the contents
    pub etag: String,
    pub cache_control: String,
    pub content_disposition: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored file without its contents, used for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileListing {
    pub path: String,
    pub mime_type: String,
    pub size: i64,
    pub updated_at: DateTime<Utc>,
}

/// File write request
#[derive(Debug, Clone)]
pub struct UpsertFileRequest {
    pub path: String,
    pub contents: Vec<u8>,
    pub etag: String,
    pub mime_type: String,
    pub cache_control: String,
    pub content_disposition: String,
}

/// Free-form file property
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileMeta {
    pub key: String,
    pub value: String,
}

/// A file row together with its properties, read as one snapshot
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub row: FileRow,
    pub properties: HashMap<String, String>,
}
