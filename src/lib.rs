//! Stacks application library
//!
//! Wires the catalog and polls modules into a [`ModuleRegistry`] and runs
//! them behind the HTTP server.

pub mod modules;

use anyhow::Context;
use sqlx::migrate::Migrator;
use stacks_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use modules::{register_all, Services};

/// Schema of every module, from `migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Registry with every project module, built from `settings`.
pub fn build_registry(settings: &Settings, services: &Services) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    register_all(&mut registry, settings, services)?;
    Ok(registry)
}

/// Migrate the database, initialise and start every module, serve until Ctrl-C, then stop the modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let services = Services::from_settings(&settings)?;
    services
        .database
        .migrate(&MIGRATOR)
        .await
        .with_context(|| format!("failed to migrate {}", settings.database.url))?;

    let registry = build_registry(&settings, &services)?;
    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = stacks_http::start_server(&registry, &settings, shutdown_signal()).await;

    registry.stop_modules().await?;
    services.database.close().await;
    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
