//! Idempotent deployment step: applies migrations, then makes sure the
//! bootstrap organization and super admin exist.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use placement_backend::{
    config::{self, BootstrapConfig},
    provision,
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = BootstrapConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config::database_url()?)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = PgStore::new(pool);
    let outcome = provision::ensure_bootstrap(&store, &cfg).await?;

    tracing::info!(
        org_id = %outcome.organization.id,
        organization_created = outcome.organization_created,
        admin_id = %outcome.admin.id,
        admin_created = outcome.admin_created,
        "provisioning complete"
    );

    Ok(())
}
