//! Virtual path helpers
//!
//! A virtual path is `/`-delimited; its first segment names a storage root
//! and the remainder is the root-relative path handed to that root's backend.
//! Root-relative paths are always absolute (`/a/b.txt`) and never contain
//! `.` or `..` segments.

use crate::error::{AppError, Result};

/// Split a virtual path into its root name and root-relative remainder.
///
/// Returns `None` for the namespace top (`""` or `"/"`).
pub fn split_root(path: &str) -> Option<(&str, String)> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.split_once('/') {
        Some((root, rest)) => Some((root, format!("/{}", rest))),
        None => Some((trimmed, "/".to_string())),
    }
}

/// Normalize a root-relative path, rejecting traversal.
///
/// Redundant slashes are collapsed and a trailing slash is dropped.
pub fn normalize(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(AppError::InvalidPath("path contains null character".into()));
    }
    if path.contains('\\') {
        return Err(AppError::InvalidPath("path contains backslash".into()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => {
                return Err(AppError::InvalidPath(format!(
                    "path contains traversal segment: {}",
                    path
                )))
            }
            s => segments.push(s),
        }
    }

    Ok(format!("/{}", segments.join("/")))
}

/// Parent folder of a normalized path.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Last segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

pub fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Check if `path` equals `base` or lies below it.
pub fn is_under(path: &str, base: &str) -> bool {
    if base == "/" {
        return true;
    }

    path.starts_with(base) && (path.len() == base.len() || path.as_bytes()[base.len()] == b'/')
}

/// Extension of the last segment, lowercased.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => Some(name[pos + 1..].to_ascii_lowercase()),
        _ => None,
    }
}
