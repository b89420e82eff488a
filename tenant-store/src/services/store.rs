//! Storage service
//!
//! Public entry point of the router. Resolves the caller's organization,
//! forwards reads to the namespace tree and writes to the upload pipeline,
//! and maps internal errors onto the public `StorageError` taxonomy.

use super::frame::Frame;
use super::tree::NamespaceTree;
use super::upload::{strip_upload_root, validate_storage_path, UploadPipeline, UploadRequest};
use crate::config::{GLOBAL_ORG_ID, ROOT_RESOURCES};
use crate::context::RequestContext;
use crate::error::{AppError, StorageError};
use crate::storage::{path, File};
use serde::{Deserialize, Serialize};

/// Identity of the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInUser {
    pub user_id: i64,
    pub org_id: i64,
    pub login: String,
}

/// Organization of the caller; anonymous callers see the global namespace
pub fn get_org_id(user: Option<&SignedInUser>) -> i64 {
    user.map_or(GLOBAL_ORG_ID, |u| u.org_id)
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub struct StorageService {
    tree: NamespaceTree,
    uploads: UploadPipeline,
}

impl StorageService {
    pub fn new(tree: NamespaceTree, max_upload_size: usize) -> Self {
        Self {
            tree,
            uploads: UploadPipeline::new(max_upload_size),
        }
    }

    pub fn tree(&self) -> &NamespaceTree {
        &self.tree
    }

    /// List a folder, or the visible roots at the namespace top
    pub async fn list(
        &self,
        ctx: &RequestContext,
        user: Option<&SignedInUser>,
        folder: &str,
    ) -> StorageResult<Frame> {
        let org_id = get_org_id(user);
        self.tree
            .list_folder(ctx, org_id, folder)
            .await
            .map_err(|e| to_public("list", folder, e))
    }

    pub async fn read(
        &self,
        ctx: &RequestContext,
        user: Option<&SignedInUser>,
        file_path: &str,
    ) -> StorageResult<File> {
        let org_id = get_org_id(user);
        self.tree
            .get_file(ctx, org_id, file_path)
            .await
            .map_err(|e| to_public("read", file_path, e))
    }

    pub async fn upload(
        &self,
        ctx: &RequestContext,
        user: Option<&SignedInUser>,
        req: &UploadRequest,
    ) -> StorageResult<()> {
        let org_id = get_org_id(user);
        self.uploads.upload(ctx, &self.tree, org_id, req).await
    }

    /// Delete a file from the upload root
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        user: Option<&SignedInUser>,
        file_path: &str,
    ) -> StorageResult<()> {
        let org_id = get_org_id(user);
        let root = self
            .tree
            .get_root(org_id, ROOT_RESOURCES)
            .ok_or(StorageError::FeatureDisabled)?;

        // Only files inside the upload root can be deleted
        let storage_path = strip_upload_root(file_path).ok_or(StorageError::UnsupportedOperation)?;

        // Reject traversal before the path reaches a backend
        if let Err(reason) = validate_storage_path(storage_path) {
            tracing::warn!("file delete validation failed: path={} reason={}", file_path, reason);
            return Err(StorageError::ValidationFailed);
        }

        let storage_path = match path::normalize(storage_path) {
            Ok(p) if p != "/" => p,
            _ => return Err(StorageError::ValidationFailed),
        };

        tracing::info!("deleting a file: path={}", file_path);

        root.delete(ctx, &storage_path)
            .await
            .map_err(|e| to_public("delete", file_path, e))
    }
}

/// Map an internal error onto the public taxonomy, logging anything internal
fn to_public(operation: &str, path: &str, err: AppError) -> StorageError {
    match err {
        AppError::NotFound(_) => StorageError::NotFound,
        AppError::InvalidPath(reason) => {
            tracing::debug!("{} rejected path {}: {}", operation, path, reason);
            StorageError::NotFound
        }
        AppError::ReadOnly(_) => StorageError::UnsupportedOperation,
        err => {
            tracing::error!("{} failed: path={} error={}", operation, path, err);
            StorageError::Internal
        }
    }
}
