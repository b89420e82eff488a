//! Storage roots
//!
//! A storage root mounts one backend under a top-level path segment. Its
//! metadata is fixed at construction.

use super::backend::{Backend, File, FileEntry, UpsertFileCommand};
use crate::context::RequestContext;
use crate::error::{AppError, Result};
use std::fmt;
use std::sync::Arc;

/// Immutable configuration of a storage root
#[derive(Debug, Clone, Default)]
pub struct RootConfig {
    pub name: String,
    pub description: String,
    pub read_only: bool,
    /// Builtin roots cannot be removed or reconfigured by tenants
    pub builtin: bool,
}

impl RootConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            read_only: false,
            builtin: false,
        }
    }
}

pub struct StorageRoot {
    config: RootConfig,
    backend: Arc<dyn Backend>,
}

impl StorageRoot {
    pub fn new(config: RootConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        validate_root_name(&config.name)?;
        Ok(Self { config, backend })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn builtin(&self) -> bool {
        self.config.builtin
    }

    pub async fn get(&self, ctx: &RequestContext, path: &str) -> Result<Option<File>> {
        ctx.run(self.backend.get(ctx, path)).await
    }

    pub async fn list(&self, ctx: &RequestContext, path: &str) -> Result<Vec<FileEntry>> {
        ctx.run(self.backend.list(ctx, path)).await
    }

    pub async fn upsert(&self, ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()> {
        if self.read_only() {
            return Err(AppError::ReadOnly(self.config.name.clone()));
        }
        ctx.run(self.backend.upsert(ctx, cmd)).await
    }

    pub async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<()> {
        if self.read_only() {
            return Err(AppError::ReadOnly(self.config.name.clone()));
        }
        ctx.run(self.backend.delete(ctx, path)).await
    }
}

impl fmt::Debug for StorageRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRoot")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Root names are single path segments
fn validate_root_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidPath(format!("invalid root name: {:?}", name)))
    }
}
