//! Polls: questions, their choices and voting.

pub mod handlers;
pub mod models;
pub mod store;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use stacks_db::Database;
use stacks_kernel::{Clock, InitCtx, InlineStyle, ModelAdmin, Module};

use self::store::{PollFixture, Polls};

pub const MOUNT: &str = "/api/polls";

pub struct PollsModule {
    polls: Arc<Polls>,
}

impl PollsModule {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            polls: Arc::new(Polls::new(db, clock)),
        }
    }
}

#[async_trait]
impl Module for PollsModule {
    fn name(&self) -> &'static str {
        "polls"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if let Some(path) = &ctx.settings.database.fixtures {
            let file = File::open(path)
                .with_context(|| format!("failed to open fixture {}", path.display()))?;
            let fixture: PollFixture = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse fixture {}", path.display()))?;
            let loaded = self
                .polls
                .load_fixture(fixture)
                .await
                .context("failed to load poll fixture")?;
            match loaded {
                Some((questions, choices)) => {
                    tracing::info!(module = self.name(), questions, choices, "fixture loaded")
                }
                None => tracing::info!(module = self.name(), "polls already stored; fixture skipped"),
            }
        }
        Ok(())
    }

    fn routes(&self) -> Router {
        handlers::router(self.polls.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = serde_json::json!({
            "description": "Error",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
        });
        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Five most recently published questions",
                        "tags": ["Polls"],
                        "responses": {"200": {"description": "Questions, newest first"}}
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Published question with its choices",
                        "tags": ["Polls"],
                        "responses": {"200": {"description": "Question"}, "404": error.clone()}
                    }
                },
                "/{id}/results": {
                    "get": {
                        "summary": "Vote counts of a question",
                        "tags": ["Polls"],
                        "responses": {"200": {"description": "Question with votes"}, "404": error.clone()}
                    }
                },
                "/{id}/vote": {
                    "post": {
                        "summary": "Vote for one choice",
                        "tags": ["Polls"],
                        "requestBody": {
                            "content": {
                                "application/x-www-form-urlencoded": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {"choice": {"type": "integer"}}
                                    }
                                }
                            }
                        },
                        "responses": {
                            "302": {"description": "Counted; see results"},
                            "404": error.clone(),
                            "422": error.clone()
                        }
                    }
                }
            }
        }))
    }

    fn admin(&self) -> Vec<ModelAdmin> {
        vec![
            ModelAdmin::new("question")
                .fieldset(None, &["question_text"])
                .collapsed_fieldset("Date information", &["pub_date"])
                .inline("choice", InlineStyle::Stacked, 3),
            ModelAdmin::new("choice"),
        ]
    }
}

/// Create the polls module
pub fn create_module(db: Database, clock: Arc<dyn Clock>) -> Arc<dyn Module> {
    Arc::new(PollsModule::new(db, clock))
}
