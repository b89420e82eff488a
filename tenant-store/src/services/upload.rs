//! Upload pipeline
//!
//! Guards writes into the upload root: resolve root, validate, sanitize,
//! check for an existing file, commit. Validation reasons are logged and
//! never returned to the caller.
//!
//! The existence check and the commit are separate backend calls. Two
//! concurrent uploads to the same new path may both pass the check; the
//! backend's write semantics decide which content survives. Callers that
//! need create-only semantics cannot rely on `overwrite_existing_file = false`.

use super::tree::NamespaceTree;
use crate::config::{
    ALLOWED_IMAGE_TYPES, ALLOWED_JSON_TYPES, MAX_PATH_LENGTH, MAX_SEGMENT_LENGTH, ROOT_RESOURCES,
};
use crate::context::RequestContext;
use crate::error::{AppError, Result, StorageError};
use crate::storage::{path, StorageRoot, UpsertFileCommand};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of entity carried by an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    Image,
    Dashboard,
    Json,
}

impl EntityType {
    fn allowed_types(self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            EntityType::Image => ALLOWED_IMAGE_TYPES,
            EntityType::Dashboard | EntityType::Json => ALLOWED_JSON_TYPES,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Virtual path, e.g. "resources/img/logo.png"
    pub path: String,
    pub contents: Vec<u8>,
    pub mime_type: String,
    #[serde(default)]
    pub cache_control: String,
    #[serde(default)]
    pub content_disposition: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub overwrite_existing_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub reason: String,
}

impl ValidationResult {
    fn success() -> Self {
        Self {
            ok: true,
            reason: String::new(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadPipeline {
    max_size: usize,
}

impl UploadPipeline {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Run the full pipeline for one request
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        tree: &NamespaceTree,
        org_id: i64,
        req: &UploadRequest,
    ) -> std::result::Result<(), StorageError> {
        // Uploads only ever land in the org's own upload root
        let root = tree
            .get_root(org_id, ROOT_RESOURCES)
            .ok_or(StorageError::FeatureDisabled)?;

        let storage_path = strip_upload_root(&req.path).ok_or(StorageError::UnsupportedOperation)?;

        // Validate before anything touches the backend
        let validation = self.validate(req, storage_path);
        if !validation.ok {
            tracing::warn!(
                "file upload validation failed: filetype={} path={} reason={}",
                req.mime_type,
                req.path,
                validation.reason
            );
            return Err(StorageError::ValidationFailed);
        }

        let cmd = match self.sanitize(req, storage_path) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::error!(
                    "failed while sanitizing the upload request: filetype={} path={} error={}",
                    req.mime_type,
                    req.path,
                    e
                );
                return Err(StorageError::Internal);
            }
        };

        tracing::info!("uploading a file: filetype={} path={}", req.mime_type, req.path);

        // A path is either a file or a folder, never both
        match path_collides(ctx, &root, &cmd.path).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::warn!(
                    "file upload collides with an existing file or folder: path={}",
                    req.path
                );
                return Err(StorageError::Conflict);
            }
            Err(e) => {
                tracing::error!(
                    "failed while checking file existence: path={} error={}",
                    req.path,
                    e
                );
                return Err(StorageError::Internal);
            }
        }

        // Not atomic with the commit below
        if !req.overwrite_existing_file {
            match root.get(ctx, &cmd.path).await {
                Ok(Some(_)) => return Err(StorageError::Conflict),
                Ok(None) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::error!(
                        "failed while checking file existence: path={} error={}",
                        req.path,
                        e
                    );
                    return Err(StorageError::Internal);
                }
            }
        }

        if let Err(e) = root.upsert(ctx, &cmd).await {
            tracing::error!("failed while uploading the file: path={} error={}", req.path, e);
            return Err(StorageError::Internal);
        }

        Ok(())
    }

    /// Check an upload against policy. `storage_path` is root-relative.
    pub fn validate(&self, req: &UploadRequest, storage_path: &str) -> ValidationResult {
        if req.contents.is_empty() {
            return ValidationResult::fail("empty payload");
        }

        if req.contents.len() > self.max_size {
            return ValidationResult::fail(format!(
                "payload of {} bytes exceeds the {} byte limit",
                req.contents.len(),
                self.max_size
            ));
        }

        if let Err(reason) = validate_storage_path(storage_path) {
            return ValidationResult::fail(reason);
        }

        let allowed = req.entity_type.allowed_types();
        let extensions = match allowed.iter().find(|(mime, _)| *mime == req.mime_type) {
            Some((_, extensions)) => *extensions,
            None => {
                return ValidationResult::fail(format!(
                    "mime type {:?} is not allowed for {:?} uploads",
                    req.mime_type, req.entity_type
                ))
            }
        };

        match path::extension(storage_path) {
            Some(ext) if extensions.contains(&ext.as_str()) => {}
            Some(ext) => {
                return ValidationResult::fail(format!(
                    "extension {:?} does not match mime type {}",
                    ext, req.mime_type
                ))
            }
            None => return ValidationResult::fail("missing file extension"),
        }

        if let Err(reason) = check_contents(req.entity_type, &req.mime_type, &req.contents) {
            return ValidationResult::fail(reason);
        }

        ValidationResult::success()
    }

    /// Convert a validated request into a backend command
    pub fn sanitize(&self, req: &UploadRequest, storage_path: &str) -> Result<UpsertFileCommand> {
        let path = path::normalize(storage_path)?;
        if path == "/" {
            return Err(AppError::InvalidPath(format!(
                "upload path {:?} normalizes to the root folder",
                req.path
            )));
        }

        Ok(UpsertFileCommand {
            path,
            contents: req.contents.clone(),
            mime_type: req.mime_type.clone(),
            cache_control: req.cache_control.clone(),
            content_disposition: req.content_disposition.clone(),
            properties: req.properties.clone(),
        })
    }
}

/// Whether `file_path` would shadow an existing file with a folder, or a
/// folder with a file
async fn path_collides(ctx: &RequestContext, root: &StorageRoot, file_path: &str) -> Result<bool> {
    let mut ancestor = path::parent(file_path);
    while ancestor != "/" {
        match root.get(ctx, ancestor).await {
            Ok(Some(_)) => return Ok(true),
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        ancestor = path::parent(ancestor);
    }

    match root.list(ctx, file_path).await {
        Ok(children) => Ok(!children.is_empty()),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Root-relative part of a path inside the upload root, keeping its leading slash
pub(crate) fn strip_upload_root(virtual_path: &str) -> Option<&str> {
    virtual_path
        .strip_prefix(ROOT_RESOURCES)
        .filter(|rest| rest.starts_with('/'))
}

/// Character and structure policy for root-relative upload paths
pub(crate) fn validate_storage_path(storage_path: &str) -> std::result::Result<(), String> {
    if storage_path.len() > MAX_PATH_LENGTH {
        return Err(format!("path longer than {} bytes", MAX_PATH_LENGTH));
    }

    let segments = match storage_path.strip_prefix('/') {
        Some(rest) => rest.split('/'),
        None => return Err("path must be absolute".to_string()),
    };

    for segment in segments {
        if segment.is_empty() {
            return Err("path contains an empty segment".to_string());
        }
        if segment == "." || segment == ".." {
            return Err(format!("path contains traversal segment {:?}", segment));
        }
        if segment.starts_with('.') {
            return Err(format!("path contains hidden segment {:?}", segment));
        }
        if segment.len() > MAX_SEGMENT_LENGTH {
            return Err(format!("path segment longer than {} bytes", MAX_SEGMENT_LENGTH));
        }
        if let Some(c) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')))
        {
            return Err(format!("path contains disallowed character {:?}", c));
        }
    }

    Ok(())
}

/// Check that the payload matches its declared type
fn check_contents(
    entity_type: EntityType,
    mime_type: &str,
    contents: &[u8],
) -> std::result::Result<(), String> {
    match mime_type {
        "image/png" if contents.starts_with(b"\x89PNG\r\n\x1a\n") => Ok(()),
        "image/jpeg" if contents.starts_with(&[0xFF, 0xD8, 0xFF]) => Ok(()),
        "image/gif" if contents.starts_with(b"GIF87a") || contents.starts_with(b"GIF89a") => Ok(()),
        "image/webp" if contents.len() >= 12 && &contents[..4] == b"RIFF" && &contents[8..12] == b"WEBP" => {
            Ok(())
        }
        "image/svg+xml" => {
            let text = std::str::from_utf8(contents).map_err(|_| "svg is not valid utf-8")?;
            check_svg(text)
        }
        "application/json" => {
            let value: serde_json::Value = serde_json::from_slice(contents)
                .map_err(|e| format!("payload is not valid json: {}", e))?;
            if entity_type == EntityType::Dashboard && !value.is_object() {
                return Err("dashboard payload must be a json object".to_string());
            }
            Ok(())
        }
        other => Err(format!("payload does not look like {}", other)),
    }
}

/// Parse an SVG document and reject anything that can execute script
fn check_svg(text: &str) -> std::result::Result<(), String> {
    let mut reader = Reader::from_str(text);
    let mut saw_svg = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if name == "script" || name == "foreignobject" {
                    return Err(format!("svg payload contains <{}>", name));
                }
                saw_svg |= name == "svg";

                for attr in e.attributes() {
                    let attr = attr.map_err(|e| format!("svg attribute is malformed: {}", e))?;
                    let key =
                        String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
                    if key.starts_with("on") {
                        return Err(format!("svg payload contains event handler {:?}", key));
                    }

                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("svg attribute value is malformed: {}", e))?;
                    // Browsers ignore whitespace and control characters inside the scheme
                    let scheme: String = value
                        .chars()
                        .filter(|c| !c.is_whitespace() && !c.is_control())
                        .take(11)
                        .collect::<String>()
                        .to_ascii_lowercase();
                    if scheme.starts_with("javascript:") {
                        return Err(format!("svg attribute {:?} contains a script url", key));
                    }
                }
            }
            Ok(Event::DocType(e)) => {
                if String::from_utf8_lossy(&e).to_ascii_lowercase().contains("entity") {
                    return Err("svg payload declares entities".to_string());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("svg payload is not well-formed xml: {}", e)),
        }
    }

    if !saw_svg {
        return Err("svg payload has no <svg> element".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png_request(path: &str) -> UploadRequest {
        UploadRequest {
            path: path.to_string(),
            contents: PNG.to_vec(),
            mime_type: "image/png".to_string(),
            entity_type: EntityType::Image,
            ..UploadRequest::default()
        }
    }

    fn validate(req: &UploadRequest) -> ValidationResult {
        let pipeline = UploadPipeline::new(crate::config::MAX_UPLOAD_SIZE);
        let storage_path = strip_upload_root(&req.path).unwrap();
        pipeline.validate(req, storage_path)
    }

    #[test]
    fn test_strip_upload_root() {
        assert_eq!(strip_upload_root("resources/a.png"), Some("/a.png"));
        assert_eq!(strip_upload_root("resources/"), Some("/"));
        assert_eq!(strip_upload_root("resources"), None);
        assert_eq!(strip_upload_root("resourcesx/a.png"), None);
        assert_eq!(strip_upload_root("public-static/a.png"), None);
    }

    #[test]
    fn test_valid_png_passes() {
        assert!(validate(&png_request("resources/img/logo.png")).ok);
    }

    #[test]
    fn test_empty_and_oversized_payloads_fail() {
        let mut req = png_request("resources/a.png");
        req.contents.clear();
        assert!(!validate(&req).ok);

        let pipeline = UploadPipeline::new(8);
        let req = png_request("resources/a.png");
        let result = pipeline.validate(&req, "/a.png");
        assert!(!result.ok);
        assert!(result.reason.contains("exceeds"));
    }

    #[test]
    fn test_payload_of_exactly_max_size_passes() {
        let pipeline = UploadPipeline::new(PNG.len());
        let req = png_request("resources/a.png");
        assert!(pipeline.validate(&req, "/a.png").ok);

        let pipeline = UploadPipeline::new(PNG.len() - 1);
        assert!(!pipeline.validate(&req, "/a.png").ok);
    }

    #[test]
    fn test_path_policy() {
        for bad in [
            "resources/../secret.png",
            "resources/a/../../b.png",
            "resources//a.png",
            "resources/a/",
            "resources/.hidden.png",
            "resources/a$b.png",
            "resources/a\\b.png",
        ] {
            let result = validate(&png_request(bad));
            assert!(!result.ok, "expected {} to fail", bad);
        }

        assert!(validate(&png_request("resources/My Folder/icon-1_a.png")).ok);
    }

    #[test]
    fn test_mime_and_extension_must_agree() {
        let mut req = png_request("resources/a.jpg");
        assert!(!validate(&req).ok);

        req.path = "resources/a.png".into();
        req.mime_type = "text/html".into();
        let result = validate(&req);
        assert!(!result.ok);
        assert!(result.reason.contains("not allowed"));
    }

    #[test]
    fn test_contents_must_match_declared_type() {
        let mut req = png_request("resources/a.png");
        req.contents = b"GIF89a....".to_vec();
        assert!(!validate(&req).ok);
    }

    #[test]
    fn test_svg_with_script_fails() {
        let req = UploadRequest {
            path: "resources/a.svg".into(),
            contents: br#"<svg><script>alert(1)</script></svg>"#.to_vec(),
            mime_type: "image/svg+xml".into(),
            ..UploadRequest::default()
        };
        assert!(!validate(&req).ok);

        let req = UploadRequest {
            contents: br#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#.to_vec(),
            ..req
        };
        assert!(validate(&req).ok);
    }

    #[test]
    fn test_svg_active_content_fails() {
        let payloads: [&[u8]; 7] = [
            br#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(document.cookie)"></svg>"#,
            br#"<svg><image href="x" ONERROR = "alert(1)"/></svg>"#,
            br#"<svg><foreignObject><div>hi</div></foreignObject></svg>"#,
            br#"<svg xmlns:xlink="http://www.w3.org/1999/xlink"><a xlink:href=" java&#x09;script:alert(1)">x</a></svg>"#,
            br#"<svg><svg:script xmlns:svg="http://www.w3.org/2000/svg">alert(1)</svg:script></svg>"#,
            br#"<!DOCTYPE svg [<!ENTITY x "y">]><svg>&x;</svg>"#,
            br#"<svg><g></svg>"#,
        ];

        for contents in payloads {
            let req = UploadRequest {
                path: "resources/a.svg".into(),
                contents: contents.to_vec(),
                mime_type: "image/svg+xml".into(),
                ..UploadRequest::default()
            };
            let result = validate(&req);
            assert!(!result.ok, "accepted {}", String::from_utf8_lossy(contents));
        }
    }

    #[test]
    fn test_svg_with_styling_passes() {
        let req = UploadRequest {
            path: "resources/icons/dot.svg".into(),
            contents: br#"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">
  <circle cx="5" cy="5" r="4" fill="red" stroke-width="1"/>
  <text x="1" y="9">one = 1</text>
</svg>"#
                .to_vec(),
            mime_type: "image/svg+xml".into(),
            ..UploadRequest::default()
        };
        assert!(validate(&req).ok);
    }

    #[test]
    fn test_dashboard_must_be_json_object() {
        let mut req = UploadRequest {
            path: "resources/dash/home.json".into(),
            contents: b"[1, 2]".to_vec(),
            mime_type: "application/json".into(),
            entity_type: EntityType::Dashboard,
            ..UploadRequest::default()
        };
        assert!(!validate(&req).ok);

        req.contents = br#"{"title": "Home"}"#.to_vec();
        assert!(validate(&req).ok);

        req.entity_type = EntityType::Image;
        assert!(!validate(&req).ok);
    }

    #[test]
    fn test_sanitize_keeps_metadata_verbatim() {
        let pipeline = UploadPipeline::new(crate::config::MAX_UPLOAD_SIZE);
        let mut req = png_request("resources/img/logo.png");
        req.cache_control = "max-age=3600".into();
        req.content_disposition = "attachment".into();
        req.properties.insert("Owner-Key".into(), " spaced value ".into());

        let cmd = pipeline.sanitize(&req, "/img/logo.png").unwrap();
        assert_eq!(cmd.path, "/img/logo.png");
        assert_eq!(cmd.cache_control, "max-age=3600");
        assert_eq!(cmd.content_disposition, "attachment");
        assert_eq!(cmd.properties, req.properties);
        assert_eq!(cmd.mime_type, "image/png");
    }

    #[test]
    fn test_sanitize_rejects_root_folder() {
        let pipeline = UploadPipeline::new(crate::config::MAX_UPLOAD_SIZE);
        let req = png_request("resources/");
        assert!(pipeline.sanitize(&req, "/").is_err());
    }
}
