//! Integration tests for tenant-store
//!
//! These tests verify end-to-end behavior of the storage service:
//! - Root listing per organization
//! - Upload validation, conflicts and overwrites
//! - Feature gating of the upload root
//! - Disk and SQL backends wired through `provide_service`

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tenant_store::context::RequestContext;
use tenant_store::database::create_pool;
use tenant_store::error::{Result, StorageError};
use tenant_store::provide_service;
use tenant_store::services::{
    EntityType, NamespaceTree, RootRegistry, SignedInUser, StorageService, UploadRequest,
};
use tenant_store::settings::StorageSettings;
use tenant_store::storage::{
    Backend, File, FileEntry, MemoryBackend, RootConfig, StorageRoot, UpsertFileCommand,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Memory backend that counts every call reaching it
#[derive(Default)]
struct SpyBackend {
    inner: MemoryBackend,
    gets: AtomicUsize,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

#[async_trait]
impl Backend for SpyBackend {
    async fn get(&self, ctx: &RequestContext, path: &str) -> Result<Option<File>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(ctx, path).await
    }

    async fn list(&self, ctx: &RequestContext, path: &str) -> Result<Vec<FileEntry>> {
        self.inner.list(ctx, path).await
    }

    async fn upsert(&self, ctx: &RequestContext, cmd: &UpsertFileCommand) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(ctx, cmd).await
    }

    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(ctx, path).await
    }
}

fn user(org_id: i64) -> SignedInUser {
    SignedInUser {
        user_id: 1,
        org_id,
        login: "admin".to_string(),
    }
}

/// Service where org 1 has an upload root backed by `spy` and org 2 has none
fn create_test_service(spy: Arc<SpyBackend>) -> StorageService {
    let mut registry = RootRegistry::new(move |org_id| {
        if org_id != 1 {
            return Vec::new();
        }
        let backend: Arc<dyn Backend> = spy.clone();
        vec![StorageRoot::new(
            RootConfig {
                builtin: true,
                ..RootConfig::new("resources", "Upload custom resource files")
            },
            backend,
        )
        .unwrap()]
    });

    let public: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    registry
        .register_global_root(
            StorageRoot::new(
                RootConfig {
                    read_only: true,
                    builtin: true,
                    ..RootConfig::new("public-static", "Public static files")
                },
                public,
            )
            .unwrap(),
        )
        .unwrap();

    StorageService::new(NamespaceTree::new(registry), 64)
}

fn png_upload(path: &str) -> UploadRequest {
    UploadRequest {
        path: path.to_string(),
        contents: PNG.to_vec(),
        mime_type: "image/png".to_string(),
        entity_type: EntityType::Image,
        ..UploadRequest::default()
    }
}

#[tokio::test]
async fn test_upload_then_read() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();

    let mut req = png_upload("resources/img/logo.png");
    req.properties.insert("owner".into(), "team-a".into());
    service.upload(&ctx, Some(&user(1)), &req).await.unwrap();

    let file = service
        .read(&ctx, Some(&user(1)), "resources/img/logo.png")
        .await
        .unwrap();
    assert_eq!(file.contents, PNG);
    assert_eq!(file.mime_type, "image/png");
    assert_eq!(file.properties.get("owner").map(String::as_str), Some("team-a"));

    let frame = service
        .list(&ctx, Some(&user(1)), "resources/img")
        .await
        .unwrap();
    assert_eq!(frame.strings("name"), vec!["logo.png"]);
}

#[tokio::test]
async fn test_oversized_payload_never_reaches_backend() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();

    let mut req = png_upload("resources/big.png");
    req.contents.resize(65, 0);

    let err = service.upload(&ctx, Some(&user(1)), &req).await.unwrap_err();
    assert_eq!(err, StorageError::ValidationFailed);
    assert_eq!(spy.upserts.load(Ordering::SeqCst), 0);
    assert_eq!(spy.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();

    let err = service
        .upload(&ctx, Some(&user(1)), &png_upload("resources/../secret.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::ValidationFailed);

    let err = service
        .delete(&ctx, Some(&user(1)), "resources/../secret.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::ValidationFailed);

    assert_eq!(spy.upserts.load(Ordering::SeqCst), 0);
    assert_eq!(spy.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conflict_and_overwrite() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();
    let alice = user(1);

    service
        .upload(&ctx, Some(&alice), &png_upload("resources/a.png"))
        .await
        .unwrap();

    let mut replacement = png_upload("resources/a.png");
    replacement.contents.extend_from_slice(b"v2");

    let err = service
        .upload(&ctx, Some(&alice), &replacement)
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::Conflict);
    let file = service.read(&ctx, Some(&alice), "resources/a.png").await.unwrap();
    assert_eq!(file.contents, PNG);

    replacement.overwrite_existing_file = true;
    service
        .upload(&ctx, Some(&alice), &replacement)
        .await
        .unwrap();
    let file = service.read(&ctx, Some(&alice), "resources/a.png").await.unwrap();
    assert!(file.contents.ends_with(b"v2"));
    assert_eq!(spy.upserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_file_and_folder_cannot_share_a_path() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();
    let alice = user(1);

    service
        .upload(&ctx, Some(&alice), &png_upload("resources/a.png/b.png"))
        .await
        .unwrap();

    // Target is already a folder, even when overwriting
    let mut req = png_upload("resources/a.png");
    req.overwrite_existing_file = true;
    let err = service.upload(&ctx, Some(&alice), &req).await.unwrap_err();
    assert_eq!(err, StorageError::Conflict);

    // A parent of the target is already a file
    service
        .upload(&ctx, Some(&alice), &png_upload("resources/c.png"))
        .await
        .unwrap();
    let err = service
        .upload(&ctx, Some(&alice), &png_upload("resources/c.png/d/e.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::Conflict);

    assert_eq!(spy.upserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_upload_disabled_without_upload_root() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();

    let err = service
        .upload(&ctx, Some(&user(2)), &png_upload("resources/a.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::FeatureDisabled);

    let err = service
        .delete(&ctx, Some(&user(2)), "resources/a.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::FeatureDisabled);

    let err = service
        .upload(&ctx, None, &png_upload("resources/a.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::FeatureDisabled);

    assert_eq!(spy.gets.load(Ordering::SeqCst), 0);
    assert_eq!(spy.upserts.load(Ordering::SeqCst), 0);
    assert_eq!(spy.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_writes_outside_upload_root_unsupported() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy);
    let ctx = RequestContext::background();

    let err = service
        .upload(&ctx, Some(&user(1)), &png_upload("public-static/img/a.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::UnsupportedOperation);

    let err = service
        .delete(&ctx, Some(&user(1)), "public-static/img/a.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::UnsupportedOperation);
}

#[tokio::test]
async fn test_delete_removes_file() {
    let spy = Arc::new(SpyBackend::default());
    let service = create_test_service(spy.clone());
    let ctx = RequestContext::background();

    service
        .upload(&ctx, Some(&user(1)), &png_upload("resources/a.png"))
        .await
        .unwrap();
    service
        .delete(&ctx, Some(&user(1)), "resources/a.png")
        .await
        .unwrap();

    let err = service
        .read(&ctx, Some(&user(1)), "resources/a.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);
    assert_eq!(spy.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_root_listing_is_independent_of_init_order() {
    let service = create_test_service(Arc::new(SpyBackend::default()));
    let ctx = RequestContext::background();

    let two = service.list(&ctx, Some(&user(2)), "").await.unwrap();
    let one = service.list(&ctx, Some(&user(1)), "").await.unwrap();
    let two_again = service.list(&ctx, Some(&user(2)), "").await.unwrap();

    assert_eq!(one.strings("name"), vec!["public-static", "resources"]);
    assert_eq!(two.strings("name"), vec!["public-static"]);
    assert_eq!(two, two_again);

    let anonymous = service.list(&ctx, None, "/").await.unwrap();
    assert_eq!(anonymous.strings("name"), vec!["public-static"]);
}

#[tokio::test]
async fn test_unknown_root_is_not_found() {
    let service = create_test_service(Arc::new(SpyBackend::default()));
    let ctx = RequestContext::background();

    let err = service
        .read(&ctx, Some(&user(1)), "nowhere/a.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);

    let err = service
        .list(&ctx, Some(&user(2)), "resources")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_initializes_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registry = RootRegistry::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        vec![StorageRoot::new(RootConfig::new("resources", "uploads"), backend).unwrap()]
    });
    let service = Arc::new(StorageService::new(NamespaceTree::new(registry), 64));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            service
                .list(&ctx, Some(&user(9)), "")
                .await
                .unwrap()
                .row_count()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 1);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provided_service_end_to_end() {
    let temp = TempDir::new().unwrap();
    let public = temp.path().join("public");
    tokio::fs::create_dir_all(public.join("img")).await.unwrap();
    tokio::fs::write(public.join("img/logo.png"), PNG).await.unwrap();
    tokio::fs::write(public.join("secret.txt"), b"hidden").await.unwrap();

    let settings = StorageSettings {
        static_root_path: public,
        database_path: temp.path().join("data/storage.db"),
        features: tenant_store::settings::FeatureToggles {
            storage_local_upload: true,
        },
        ..StorageSettings::default()
    };
    let pool = create_pool(&settings.database_path).await.unwrap();
    let service = provide_service(&settings, pool).await.unwrap();
    let ctx = RequestContext::background();
    let alice = user(1);

    let logo = service
        .read(&ctx, Some(&alice), "public-static/img/logo.png")
        .await
        .unwrap();
    assert_eq!(logo.contents, PNG);

    let err = service
        .read(&ctx, Some(&alice), "public-static/secret.txt")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);

    // A file is not a folder
    let err = service
        .list(&ctx, Some(&alice), "public-static/img/logo.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);

    service
        .upload(&ctx, Some(&alice), &png_upload("resources/icons/a.png"))
        .await
        .unwrap();
    let listing = service
        .list(&ctx, Some(&alice), "resources")
        .await
        .unwrap();
    assert_eq!(listing.strings("name"), vec!["icons"]);

    // The SQL root never lists a name as both file and folder
    service
        .upload(&ctx, Some(&alice), &png_upload("resources/x.png/y.png"))
        .await
        .unwrap();
    let err = service
        .upload(&ctx, Some(&alice), &png_upload("resources/x.png"))
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::Conflict);
    let listing = service
        .list(&ctx, Some(&alice), "resources")
        .await
        .unwrap();
    assert_eq!(listing.strings("name"), vec!["icons", "x.png"]);

    // Script-carrying SVGs are refused before reaching the SQL root
    let svg = UploadRequest {
        path: "resources/x.svg".into(),
        contents: br#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(document.cookie)"></svg>"#
            .to_vec(),
        mime_type: "image/svg+xml".into(),
        ..UploadRequest::default()
    };
    let err = service.upload(&ctx, Some(&alice), &svg).await.unwrap_err();
    assert_eq!(err, StorageError::ValidationFailed);

    // Uploads are scoped to the organization
    let err = service
        .read(&ctx, Some(&user(2)), "resources/icons/a.png")
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::NotFound);
}
