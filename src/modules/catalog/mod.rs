//! Library catalog: authors, books, copies and the loan desk.

pub mod descriptor;
pub mod fixtures;
pub mod forms;
pub mod handlers;
pub mod loans;
pub mod models;
mod openapi;
pub mod service;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use axum::{middleware, Router};
use stacks_authz::{authenticate, Authenticator};
use stacks_db::Database;
use stacks_kernel::{settings::CatalogSettings, Clock, InitCtx, InlineStyle, ModelAdmin, Module};
use tokio::task::JoinHandle;

use self::fixtures::Fixture;
use self::service::Catalog;

/// Where the module's router is mounted; record URLs are built from it.
pub const MOUNT: &str = "/api/catalog";

pub struct CatalogModule {
    catalog: Arc<Catalog>,
    authenticator: Authenticator,
    audit: Mutex<Option<JoinHandle<()>>>,
}

impl CatalogModule {
    pub fn new(
        db: Database,
        settings: &CatalogSettings,
        clock: Arc<dyn Clock>,
        authenticator: Authenticator,
    ) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(db, settings, clock)),
            authenticator,
            audit: Mutex::new(None),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn audit_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.audit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if let Some(path) = &ctx.settings.database.fixtures {
            let fixture = Fixture::read(path)?;
            let loaded = self
                .catalog
                .load_fixture(fixture)
                .await
                .with_context(|| format!("failed to load fixture {}", path.display()))?;
            match loaded {
                Some(summary) => tracing::info!(module = self.name(), ?summary, "fixture loaded"),
                None => tracing::info!(
                    module = self.name(),
                    "catalog already has records; fixture skipped"
                ),
            }
        }
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "catalog module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        handlers::router(self.catalog.clone()).layer(middleware::from_fn_with_state(
            self.authenticator.clone(),
            authenticate,
        ))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi::document())
    }

    fn admin(&self) -> Vec<ModelAdmin> {
        vec![
            ModelAdmin::new("language"),
            ModelAdmin::new("genre"),
            ModelAdmin::new("author")
                .list_display(&["last_name", "first_name", "date_of_birth", "date_of_death"])
                .inline("book", InlineStyle::Stacked, 3),
            ModelAdmin::new("book")
                .list_display(&["title", "author", "display_genre", "get_language"])
                .inline("bookinstance", InlineStyle::Tabular, 3),
            ModelAdmin::new("bookinstance")
                .list_display(&["book", "imprint", "status", "due_back"])
                .fieldset(None, &["book", "imprint", "id"])
                .fieldset(Some("Availability"), &["status", "due_back"]),
        ]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let mut events = self.catalog.events().subscribe();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match serde_json::to_string(&event) {
                    Ok(line) => tracing::info!(target: "stacks::audit", event = %line, "loan event"),
                    Err(err) => tracing::warn!(target: "stacks::audit", error = %err, "unserializable loan event"),
                }
            }
        });
        if let Some(previous) = self.audit_slot().replace(handle) {
            previous.abort();
        }
        tracing::info!(module = self.name(), "catalog module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(handle) = self.audit_slot().take() {
            handle.abort();
        }
        tracing::info!(module = self.name(), "catalog module stopped");
        Ok(())
    }
}

/// Create the catalog module
pub fn create_module(
    db: Database,
    settings: &CatalogSettings,
    clock: Arc<dyn Clock>,
    authenticator: Authenticator,
) -> Arc<dyn Module> {
    Arc::new(CatalogModule::new(db, settings, clock, authenticator))
}
