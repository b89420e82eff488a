//! Storage module
//!
//! Storage roots and the backends they mount: local disk, SQL blob table,
//! and in-memory.

pub mod backend;
pub mod disk;
pub mod memory;
pub mod path;
pub mod root;
pub mod sql;

pub use backend::{Backend, File, FileEntry, UpsertFileCommand};
pub use disk::{DiskBackend, DiskConfig};
pub use memory::MemoryBackend;
pub use root::{RootConfig, StorageRoot};
pub use sql::SqlBackend;
