use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use stacks_db::{sql_id, violation, Database, StoreError, Violation};
use stacks_http::{AppError, FieldError};
use stacks_kernel::Clock;
use time::OffsetDateTime;

use super::models::{Choice, Question, QuestionRow};

/// How many questions the index shows.
pub const LATEST_COUNT: usize = 5;

const NO_CHOICE: &str = "You didn't select a choice.";

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub was_published_recently: bool,
    pub choices: Vec<Choice>,
}

/// Poll records; shares the fixture file with the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollFixture {
    pub questions: Vec<Question>,
    pub choices: Vec<Choice>,
}

pub struct Polls {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Polls {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub async fn add_question(
        &self,
        text: &str,
        pub_date: OffsetDateTime,
    ) -> Result<Question, AppError> {
        let question_text = bounded_text("question_text", text)?;
        let row = sqlx::query_as::<_, QuestionRow>(
            "INSERT INTO question (question_text, pub_date) VALUES (?, ?)
             RETURNING id, question_text, pub_date",
        )
        .bind(question_text)
        .bind(pub_date.unix_timestamp())
        .fetch_one(self.pool())
        .await?;
        Ok(Question::try_from(row)?)
    }

    pub async fn add_choice(&self, question: u64, text: &str) -> Result<Choice, AppError> {
        let choice_text = bounded_text("choice_text", text)?;
        let inserted = sqlx::query_as::<_, Choice>(
            "INSERT INTO choice (question_id, choice_text) VALUES (?, ?)
             RETURNING id, question_id, choice_text, votes",
        )
        .bind(sql_id(question))
        .bind(choice_text)
        .fetch_one(self.pool())
        .await;
        match inserted {
            Ok(choice) => Ok(choice),
            Err(err) if violation(&err) == Some(Violation::ForeignKey) => {
                Err(StoreError::not_found(Question::TABLE, question).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The most recently published questions, newest first. Future ones are hidden.
    pub async fn latest(&self) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, question_text, pub_date FROM question
             WHERE pub_date <= ? ORDER BY pub_date DESC, id DESC LIMIT ?",
        )
        .bind(self.clock.now().unix_timestamp())
        .bind(LATEST_COUNT as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(Question::try_from)
            .collect::<Result<_, _>>()?)
    }

    /// A published question with its choices; future questions do not exist yet.
    pub async fn published(&self, id: u64) -> Result<QuestionView, AppError> {
        let question = self
            .question(id)
            .await?
            .filter(|q| q.is_published(self.clock.now()))
            .ok_or_else(|| StoreError::not_found(Question::TABLE, id))?;
        self.view(question).await
    }

    pub async fn results(&self, id: u64) -> Result<QuestionView, AppError> {
        let question = self
            .question(id)
            .await?
            .ok_or_else(|| StoreError::not_found(Question::TABLE, id))?;
        self.view(question).await
    }

    async fn question(&self, id: u64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, question_text, pub_date FROM question WHERE id = ?",
        )
        .bind(sql_id(id))
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Question::try_from).transpose()?)
    }

    async fn view(&self, question: Question) -> Result<QuestionView, AppError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, choice_text, votes FROM choice
             WHERE question_id = ? ORDER BY id",
        )
        .bind(sql_id(question.id))
        .fetch_all(self.pool())
        .await?;
        Ok(QuestionView {
            was_published_recently: question.was_published_recently(self.clock.now()),
            question,
            choices,
        })
    }

    /// Count one vote. The increment is a single `UPDATE`, so concurrent votes are never lost.
    pub async fn vote(&self, question: u64, choice: Option<&str>) -> Result<Choice, AppError> {
        self.question(question)
            .await?
            .ok_or_else(|| StoreError::not_found(Question::TABLE, question))?;
        let no_choice = || AppError::invalid_fields(vec![FieldError::new("choice", NO_CHOICE)]);

        let choice_id: u64 = choice
            .map(str::trim)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(no_choice)?;

        sqlx::query_as::<_, Choice>(
            "UPDATE choice SET votes = votes + 1
             WHERE id = ? AND question_id = ?
             RETURNING id, question_id, choice_text, votes",
        )
        .bind(sql_id(choice_id))
        .bind(sql_id(question))
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(no_choice)
    }

    /// Load questions and choices in one transaction, unless questions already exist.
    pub async fn load_fixture(
        &self,
        fixture: PollFixture,
    ) -> Result<Option<(usize, usize)>, AppError> {
        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question")
            .fetch_one(self.pool())
            .await?;
        if stored > 0 {
            return Ok(None);
        }

        let counts = (fixture.questions.len(), fixture.choices.len());
        let mut tx = self.pool().begin().await?;
        for question in fixture.questions {
            sqlx::query("INSERT INTO question (id, question_text, pub_date) VALUES (?, ?, ?)")
                .bind(sql_id(question.id))
                .bind(question.question_text)
                .bind(question.pub_date.unix_timestamp())
                .execute(&mut *tx)
                .await?;
        }
        for choice in fixture.choices {
            let inserted = sqlx::query(
                "INSERT INTO choice (id, question_id, choice_text, votes) VALUES (?, ?, ?, ?)",
            )
            .bind(sql_id(choice.id))
            .bind(sql_id(choice.question))
            .bind(choice.choice_text)
            .bind(i64::try_from(choice.votes).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(_) => {}
                Err(err) if violation(&err) == Some(Violation::ForeignKey) => {
                    return Err(StoreError::not_found(Question::TABLE, choice.question).into())
                }
                Err(err) => return Err(err.into()),
            }
        }
        tx.commit().await?;
        Ok(Some(counts))
    }
}

fn bounded_text(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid_fields(vec![FieldError::required(field)]));
    }
    if value.chars().count() > 200 {
        return Err(AppError::invalid_fields(vec![FieldError::new(
            field,
            "Ensure this value has at most 200 characters.",
        )]));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stacks_kernel::FixedClock;
    use time::{macros::datetime, Duration};

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    async fn polls() -> Polls {
        Polls::new(crate::testing::database().await, Arc::new(FixedClock(NOW)))
    }

    #[tokio::test]
    async fn index_excludes_future_questions() {
        let polls = polls().await;
        polls
            .add_question("Past question.", NOW - Duration::days(30))
            .await
            .unwrap();
        polls
            .add_question("Future question.", NOW + Duration::days(30))
            .await
            .unwrap();

        let texts: Vec<_> = polls
            .latest()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.question_text)
            .collect();
        assert_eq!(texts, vec!["Past question."]);
    }

    #[tokio::test]
    async fn index_shows_five_newest_first() {
        let polls = polls().await;
        for day in 1..=7 {
            polls
                .add_question(&format!("Day {day}"), NOW - Duration::days(day))
                .await
                .unwrap();
        }

        let texts: Vec<_> = polls
            .latest()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.question_text)
            .collect();
        assert_eq!(texts, vec!["Day 1", "Day 2", "Day 3", "Day 4", "Day 5"]);
    }

    #[tokio::test]
    async fn future_question_detail_is_not_found() {
        let polls = polls().await;
        let future = polls
            .add_question("Future question.", NOW + Duration::days(5))
            .await
            .unwrap();
        let err = polls.published(future.id).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn vote_counts_only_choices_of_the_question() {
        let polls = polls().await;
        let q1 = polls.add_question("One?", NOW).await.unwrap();
        let q2 = polls.add_question("Two?", NOW).await.unwrap();
        let yes = polls.add_choice(q1.id, "Yes").await.unwrap();
        let other = polls.add_choice(q2.id, "Other").await.unwrap();

        assert_eq!(
            polls.vote(q1.id, Some(&yes.id.to_string())).await.unwrap().votes,
            1
        );
        assert_eq!(
            polls.vote(q1.id, Some(&yes.id.to_string())).await.unwrap().votes,
            2
        );

        for bad in [None, Some("abc"), Some("99"), Some(other.id.to_string().as_str())] {
            let err = polls.vote(q1.id, bad).await.unwrap_err();
            assert_eq!(
                err.status(),
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                "{bad:?}"
            );
        }

        let results = polls.results(q2.id).await.unwrap();
        assert_eq!(results.choices[0].votes, 0);
    }

    #[tokio::test]
    async fn concurrent_votes_are_all_counted() {
        let polls = Arc::new(polls().await);
        let question = polls.add_question("Busy?", NOW).await.unwrap().id;
        let yes = polls.add_choice(question, "Yes").await.unwrap();
        let raw = yes.id.to_string();

        let votes: Vec<_> = (0..8)
            .map(|_| {
                let polls = polls.clone();
                let raw = raw.clone();
                tokio::spawn(async move { polls.vote(question, Some(&raw)).await })
            })
            .collect();
        for vote in votes {
            vote.await.unwrap().unwrap();
        }

        let results = polls.results(question).await.unwrap();
        assert_eq!(results.choices[0].votes, 8);
    }

    #[tokio::test]
    async fn choice_for_a_missing_question_is_not_found() {
        let polls = polls().await;
        let err = polls.add_choice(42, "Yes").await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fixture_is_skipped_once_questions_exist() {
        let polls = polls().await;
        let fixture: PollFixture = serde_json::from_value(serde_json::json!({
            "questions": [{"id": 1, "question_text": "What's new?", "pub_date": "2024-02-29T09:00:00Z"}],
            "choices": [{"id": 1, "question": 1, "choice_text": "Not much"}]
        }))
        .unwrap();

        assert_eq!(polls.load_fixture(fixture.clone()).await.unwrap(), Some((1, 1)));
        assert_eq!(polls.load_fixture(fixture).await.unwrap(), None);
        assert_eq!(polls.latest().await.unwrap().len(), 1);
    }
}
