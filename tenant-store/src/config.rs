//! Storage configuration constants
//!
//! Central location for reserved root names, resource limits, and the
//! validation allow-lists used by the upload pipeline.

// ===== Organizations =====

/// Organization id of the global (shared) namespace
pub const GLOBAL_ORG_ID: i64 = 0;

// ===== Reserved Roots =====

/// Built-in read-only root exposing static public assets
pub const ROOT_PUBLIC_STATIC: &str = "public-static";

/// Per-organization root that accepts uploads
pub const ROOT_RESOURCES: &str = "resources";

/// Development-only root, mounted when a local devenv directory exists
pub const ROOT_DEVENV: &str = "devenv";

// ===== Upload Limits =====

/// Maximum upload payload size in bytes (3 MiB)
pub const MAX_UPLOAD_SIZE: usize = 3 * 1024 * 1024;

/// Maximum length of a root-relative storage path.
pub const MAX_PATH_LENGTH: usize = 1024;

/// Maximum length of a single path segment
pub const MAX_SEGMENT_LENGTH: usize = 255;

// ===== Upload Allow-lists =====

/// MIME types accepted for image uploads, with the file extensions each may use
pub const ALLOWED_IMAGE_TYPES: &[(&str, &[&str])] = &[
    ("image/png", &["png"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
    ("image/svg+xml", &["svg"]),
];

/// MIME types accepted for JSON documents (dashboards and similar)
pub const ALLOWED_JSON_TYPES: &[(&str, &[&str])] = &[("application/json", &["json"])];

// ===== Static Asset Defaults =====

/// Sub-paths of the static root that are exposed through `public-static`
pub const DEFAULT_PUBLIC_STATIC_ROOTS: &[&str] = &["/testdata/", "/img/", "/gazetteer/", "/maps/"];

/// Sub-paths of the devenv directory that are exposed through `devenv`
pub const DEFAULT_DEV_ENV_ROOTS: &[&str] = &["/dev-dashboards/"];
