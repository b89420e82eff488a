//! Root registry
//!
//! Holds the global roots shared by every organization and lazily builds
//! each organization's own roots through an injected factory. Each org id
//! has its own compute-once cell, so the factory runs at most once per org
//! and initializing one org never waits on another.

use crate::config::GLOBAL_ORG_ID;
use crate::error::{AppError, Result};
use crate::storage::StorageRoot;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub type OrgRoots = Arc<[Arc<StorageRoot>]>;

/// Builds the tenant-specific roots of one organization
pub type OrgRootsFactory = Arc<dyn Fn(i64) -> Vec<StorageRoot> + Send + Sync>;

pub struct RootRegistry {
    global: Vec<Arc<StorageRoot>>,
    org_roots: DashMap<i64, Arc<OnceCell<OrgRoots>>>,
    factory: OrgRootsFactory,
}

impl RootRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(i64) -> Vec<StorageRoot> + Send + Sync + 'static,
    {
        Self {
            global: Vec::new(),
            org_roots: DashMap::new(),
            factory: Arc::new(factory),
        }
    }

    /// Register a root shared by every organization
    pub fn register_global_root(&mut self, root: StorageRoot) -> Result<()> {
        if self.global.iter().any(|r| r.name() == root.name()) {
            return Err(AppError::DuplicateRoot(root.name().to_string()));
        }

        tracing::info!(
            "Registered global storage root: {} (read_only: {}, builtin: {})",
            root.name(),
            root.read_only(),
            root.builtin()
        );

        self.global.push(Arc::new(root));
        Ok(())
    }

    pub fn global_roots(&self) -> &[Arc<StorageRoot>] {
        &self.global
    }

    /// Roots specific to `org_id`, built on first access and cached
    pub fn get_or_init_org_roots(&self, org_id: i64) -> OrgRoots {
        if org_id == GLOBAL_ORG_ID {
            return Arc::from(Vec::new());
        }

        // Only this org's cell is locked while the factory runs
        let cell = self
            .org_roots
            .entry(org_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        cell.get_or_init(|| self.build_org_roots(org_id)).clone()
    }

    fn build_org_roots(&self, org_id: i64) -> OrgRoots {
        let mut roots: Vec<Arc<StorageRoot>> = Vec::new();

        for root in (self.factory)(org_id) {
            let shadows_global = self.global.iter().any(|g| g.name() == root.name());
            let duplicate = roots.iter().any(|r| r.name() == root.name());
            if shadows_global || duplicate {
                tracing::warn!(
                    "Ignoring storage root {} for org {}: name already in use",
                    root.name(),
                    org_id
                );
                continue;
            }
            roots.push(Arc::new(root));
        }

        tracing::info!("Initialized {} storage roots for org {}", roots.len(), org_id);

        Arc::from(roots)
    }

    /// All roots visible to `org_id`: global roots followed by its own
    pub fn visible_roots(&self, org_id: i64) -> Vec<Arc<StorageRoot>> {
        let mut roots = self.global.clone();
        roots.extend(self.get_or_init_org_roots(org_id).iter().cloned());
        roots
    }

    pub fn find_root(&self, org_id: i64, name: &str) -> Option<Arc<StorageRoot>> {
        self.get_or_init_org_roots(org_id)
            .iter()
            .chain(self.global.iter())
            .find(|r| r.name() == name)
            .cloned()
    }

    pub fn is_initialized(&self, org_id: i64) -> bool {
        self.org_roots
            .get(&org_id)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Drop every cached org namespace; the next access rebuilds it.
    pub fn reset(&self) {
        self.org_roots.clear();
    }
}
