//! Tenant-scoped virtual storage router
//!
//! Presents a single virtual file namespace per organization, composed of
//! shared global roots and lazily created per-organization roots, each
//! backed by a pluggable storage backend.

pub mod app;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod services;
pub mod settings;
pub mod storage;

pub use app::provide_service;
