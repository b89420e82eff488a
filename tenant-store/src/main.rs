// tenant-store - inspect the virtual storage namespace of an organization
// Usage: tenant-store <settings.json> [org_id] [path]

use anyhow::Context;
use std::path::PathBuf;
use tenant_store::context::RequestContext;
use tenant_store::database::create_pool;
use tenant_store::error::StorageError;
use tenant_store::services::SignedInUser;
use tenant_store::settings::StorageSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenant_store=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let settings_path = PathBuf::from(
        args.next()
            .context("usage: tenant-store <settings.json> [org_id] [path]")?,
    );
    let org_id: Option<i64> = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("org_id must be an integer")?;
    let path = args.next().unwrap_or_default();

    tracing::info!("Starting tenant-store");

    let settings = StorageSettings::load(&settings_path)
        .await
        .with_context(|| format!("failed to load settings from {:?}", settings_path))?;
    let pool = create_pool(&settings.database_path)
        .await
        .context("failed to open database")?;
    let service = tenant_store::provide_service(&settings, pool).await?;

    let user = org_id.map(|org_id| SignedInUser {
        user_id: 0,
        org_id,
        login: "cli".to_string(),
    });
    let ctx = RequestContext::background();

    let output = match service.list(&ctx, user.as_ref(), &path).await {
        Ok(frame) => serde_json::to_value(frame)?,
        Err(StorageError::NotFound) => {
            let file = service.read(&ctx, user.as_ref(), &path).await?;
            serde_json::json!({
                "path": file.path,
                "size": file.size,
                "mime_type": file.mime_type,
            })
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
