//! Namespace tree
//!
//! Resolves virtual paths against the roots visible to an organization and
//! routes reads to the matching backend. Backend errors are passed through
//! unchanged.

use super::frame::Frame;
use super::registry::RootRegistry;
use crate::context::RequestContext;
use crate::error::{AppError, Result};
use crate::storage::{path, File, StorageRoot};
use std::sync::Arc;

pub struct NamespaceTree {
    registry: RootRegistry,
}

impl NamespaceTree {
    pub fn new(registry: RootRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RootRegistry {
        &self.registry
    }

    /// Resolve a virtual path into its root and normalized root-relative path
    fn resolve(&self, org_id: i64, virtual_path: &str) -> Result<(Arc<StorageRoot>, String)> {
        let (root_name, rest) = path::split_root(virtual_path)
            .ok_or_else(|| AppError::NotFound(virtual_path.to_string()))?;

        let root = self
            .registry
            .find_root(org_id, root_name)
            .ok_or_else(|| AppError::NotFound(virtual_path.to_string()))?;

        Ok((root, path::normalize(&rest)?))
    }

    /// List a folder; the namespace top lists the roots themselves
    pub async fn list_folder(&self, ctx: &RequestContext, org_id: i64, folder: &str) -> Result<Frame> {
        // Namespace top
        if path::split_root(folder).is_none() {
            let roots = self.registry.visible_roots(org_id);
            return Ok(Frame::from_roots(&roots));
        }

        let (root, rest) = self.resolve(org_id, folder)?;
        let entries = root.list(ctx, &rest).await?;

        tracing::debug!(
            "Listed {} in root {} for org {} ({} entries)",
            rest,
            root.name(),
            org_id,
            entries.len()
        );

        Ok(Frame::from_entries(folder, entries))
    }

    pub async fn get_file(&self, ctx: &RequestContext, org_id: i64, file_path: &str) -> Result<File> {
        let (root, rest) = self.resolve(org_id, file_path)?;

        root.get(ctx, &rest)
            .await?
            .ok_or_else(|| AppError::NotFound(file_path.to_string()))
    }

    pub fn get_root(&self, org_id: i64, name: &str) -> Option<Arc<StorageRoot>> {
        self.registry.find_root(org_id, name)
    }
}
