use std::sync::Arc;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use stacks_http::{found, AppError, Form, Path};

use super::models::Question;
use super::store::{Polls, QuestionView};
use super::MOUNT;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoteForm {
    pub choice: Option<String>,
}

pub fn router(polls: Arc<Polls>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(detail))
        .route("/{id}/results", get(results))
        .route("/{id}/vote", post(vote))
        .with_state(polls)
}

fn question_id(raw: &str) -> Result<u64, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("no question with id '{raw}'")))
}

async fn index(State(polls): State<Arc<Polls>>) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(polls.latest().await?))
}

async fn detail(
    State(polls): State<Arc<Polls>>,
    Path(id): Path<String>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(polls.published(question_id(&id)?).await?))
}

async fn results(
    State(polls): State<Arc<Polls>>,
    Path(id): Path<String>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(polls.results(question_id(&id)?).await?))
}

async fn vote(
    State(polls): State<Arc<Polls>>,
    Path(id): Path<String>,
    Form(form): Form<VoteForm>,
) -> Result<Response, AppError> {
    let id = question_id(&id)?;
    let choice = polls.vote(id, form.choice.as_deref()).await?;
    tracing::debug!(module = "polls", question = id, choice = choice.id, votes = choice.votes, "vote counted");
    Ok(found(format!("{MOUNT}/{id}/results")))
}
