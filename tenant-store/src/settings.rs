//! Storage settings
//!
//! Loads the storage router settings from a JSON file. Missing fields fall
//! back to defaults; a missing file yields the default settings.

use crate::config::{DEFAULT_DEV_ENV_ROOTS, DEFAULT_PUBLIC_STATIC_ROOTS, MAX_UPLOAD_SIZE};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// Feature flags consumed by the storage router
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureToggles {
    /// Mount the per-organization `resources` upload root
    #[serde(default)]
    pub storage_local_upload: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_static_root_path")]
    pub static_root_path: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub environment: Environment,
    /// Mount the `devenv` root when the directory exists outside production
    #[serde(default)]
    pub add_dev_env: bool,
    #[serde(default)]
    pub features: FeatureToggles,
    #[serde(default = "default_public_static_roots")]
    pub public_static_roots: Vec<String>,
    #[serde(default = "default_dev_env_roots")]
    pub dev_env_roots: Vec<String>,
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

fn default_static_root_path() -> PathBuf {
    PathBuf::from("public")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/storage.db")
}

fn default_public_static_roots() -> Vec<String> {
    DEFAULT_PUBLIC_STATIC_ROOTS.iter().map(|s| s.to_string()).collect()
}

fn default_dev_env_roots() -> Vec<String> {
    DEFAULT_DEV_ENV_ROOTS.iter().map(|s| s.to_string()).collect()
}

fn default_max_upload_size() -> usize {
    MAX_UPLOAD_SIZE
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            static_root_path: default_static_root_path(),
            database_path: default_database_path(),
            environment: Environment::default(),
            add_dev_env: false,
            features: FeatureToggles::default(),
            public_static_roots: default_public_static_roots(),
            dev_env_roots: default_dev_env_roots(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl StorageSettings {
    /// Load settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Settings file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let settings: StorageSettings = serde_json::from_str(&content)?;
        settings.validate()?;

        tracing::info!("Loaded storage settings from {:?}", path);
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.static_root_path.as_os_str().is_empty() {
            return Err(AppError::Config("static_root_path cannot be empty".into()));
        }

        if self.max_upload_size == 0 {
            return Err(AppError::Config(
                "max_upload_size must be greater than 0".into(),
            ));
        }

        for root in self.public_static_roots.iter().chain(&self.dev_env_roots) {
            if !root.starts_with('/') {
                return Err(AppError::Config(format!(
                    "allowed sub-path must be absolute: {}",
                    root
                )));
            }
        }

        Ok(())
    }

    /// Whether development-only roots may be mounted
    pub fn dev_env_enabled(&self) -> bool {
        self.add_dev_env && self.environment != Environment::Production
    }

    /// Location probed for the `devenv` root
    pub fn dev_env_path(&self) -> PathBuf {
        self.static_root_path.join("..").join("devenv")
    }
}
