//! Services module
//!
//! Routing and write-path logic that sits between callers and the storage
//! backends.

pub mod frame;
pub mod registry;
pub mod store;
pub mod tree;
pub mod upload;

pub use frame::{Field, Frame};
pub use registry::{OrgRoots, OrgRootsFactory, RootRegistry};
pub use store::{get_org_id, SignedInUser, StorageResult, StorageService};
pub use tree::NamespaceTree;
pub use upload::{EntityType, UploadPipeline, UploadRequest, ValidationResult};
