use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stacks_db::StoreError;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub question_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
}

impl Question {
    pub const TABLE: &'static str = "question";

    /// Published within the last day, and not in the future.
    pub fn was_published_recently(&self, now: OffsetDateTime) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    pub fn is_published(&self, now: OffsetDateTime) -> bool {
        self.pub_date <= now
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question_text)
    }
}

/// `question` row; `pub_date` is stored as unix seconds.
#[derive(Debug, FromRow)]
pub(super) struct QuestionRow {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub question_text: String,
    pub pub_date: i64,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let pub_date = OffsetDateTime::from_unix_timestamp(row.pub_date)
            .map_err(|err| StoreError::corrupt(Question::TABLE, row.id, err.to_string()))?;
        Ok(Self {
            id: row.id,
            question_text: row.question_text,
            pub_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Choice {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    #[sqlx(rename = "question_id", try_from = "i64")]
    pub question: u64,
    pub choice_text: String,
    #[serde(default)]
    #[sqlx(try_from = "i64")]
    pub votes: u64,
}

impl Choice {
    pub const TABLE: &'static str = "choice";
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.choice_text)
    }
}
