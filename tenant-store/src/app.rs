//! Service wiring
//!
//! Builds the storage service from settings: the shared static roots, the
//! optional development root, and the per-organization upload root.

use crate::config::{ROOT_DEVENV, ROOT_PUBLIC_STATIC, ROOT_RESOURCES};
use crate::database::Repository;
use crate::error::Result;
use crate::services::{NamespaceTree, RootRegistry, StorageService};
use crate::settings::StorageSettings;
use crate::storage::{Backend, DiskBackend, DiskConfig, RootConfig, SqlBackend, StorageRoot};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Assemble the storage service
pub async fn provide_service(settings: &StorageSettings, pool: SqlitePool) -> Result<StorageService> {
    tracing::info!("Initializing storage service");

    let repo = Repository::new(pool);
    let upload_enabled = settings.features.storage_local_upload;

    // Org roots: the SQL upload root, only when the feature is on
    let mut registry = RootRegistry::new(move |org_id| {
        if !upload_enabled {
            return Vec::new();
        }

        let backend: Arc<dyn Backend> = Arc::new(SqlBackend::new(repo.clone(), org_id));
        let config = RootConfig {
            builtin: true,
            ..RootConfig::new(ROOT_RESOURCES, "Upload custom resource files")
        };

        match StorageRoot::new(config, backend) {
            Ok(root) => vec![root],
            Err(e) => {
                tracing::error!("Failed to create upload root for org {}: {}", org_id, e);
                Vec::new()
            }
        }
    });

    // Global roots
    let public: Arc<dyn Backend> = Arc::new(DiskBackend::new(DiskConfig {
        path: settings.static_root_path.clone(),
        roots: settings.public_static_roots.clone(),
    })?);
    registry.register_global_root(StorageRoot::new(
        RootConfig {
            read_only: true,
            builtin: true,
            ..RootConfig::new(ROOT_PUBLIC_STATIC, "Access files from the static public files")
        },
        public,
    )?)?;

    // Probe for the development root once, at construction
    if settings.dev_env_enabled() {
        let dev_env_path = settings.dev_env_path();
        if tokio::fs::try_exists(&dev_env_path).await.unwrap_or(false) {
            let devenv: Arc<dyn Backend> = Arc::new(DiskBackend::new(DiskConfig {
                path: dev_env_path,
                roots: settings.dev_env_roots.clone(),
            })?);
            registry.register_global_root(StorageRoot::new(
                RootConfig::new(ROOT_DEVENV, "Development Environment"),
                devenv,
            )?)?;
        } else {
            tracing::debug!("No development root found at {:?}", dev_env_path);
        }
    }

    tracing::info!(
        "Storage service initialized (upload enabled: {}, max upload size: {})",
        upload_enabled,
        settings.max_upload_size
    );

    Ok(StorageService::new(
        NamespaceTree::new(registry),
        settings.max_upload_size,
    ))
}
