pub mod catalog;
pub mod polls;

use std::sync::Arc;

use anyhow::Context;
use stacks_authz::Authenticator;
use stacks_db::Database;
use stacks_kernel::{settings::Settings, Clock, ModuleRegistry, SystemClock};

/// Shared collaborators handed to every module at construction.
#[derive(Clone)]
pub struct Services {
    pub authenticator: Authenticator,
    pub clock: Arc<dyn Clock>,
    pub database: Database,
}

impl Services {
    /// Production collaborators. The database pool connects on first use.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            authenticator: Authenticator::from_settings(&settings.auth)
                .context("failed to set up authentication")?,
            clock: Arc::new(SystemClock),
            database: Database::connect_lazy(
                &settings.database.url,
                settings.database.max_connections,
            )
            .with_context(|| format!("invalid database url '{}'", settings.database.url))?,
        })
    }
}

/// Register all project modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    settings: &Settings,
    services: &Services,
) -> anyhow::Result<()> {
    registry.register(catalog::create_module(
        services.database.clone(),
        &settings.catalog,
        services.clock.clone(),
        services.authenticator.clone(),
    ))?;
    registry.register(polls::create_module(
        services.database.clone(),
        services.clock.clone(),
    ))?;
    Ok(())
}
