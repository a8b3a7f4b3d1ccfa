//! Submitted form bodies and their field-level cleaning.
//!
//! Bodies arrive URL-encoded, so every field is text. Multi-valued fields
//! (genres, languages) are comma-separated ids.

use serde::Deserialize;
use stacks_http::{AppError, FieldError};
use time::{format_description::FormatItem, macros::format_description, Date};

use super::models::LoanStatus;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).ok()
}

/// Collects field errors while cleaning a form.
#[derive(Debug, Default)]
pub struct Cleaner {
    errors: Vec<FieldError>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Required text, trimmed, at most `max_len` characters.
    pub fn text(&mut self, field: &str, value: &str, max_len: usize) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.reject(FieldError::required(field));
        } else if value.chars().count() > max_len {
            self.reject(FieldError::new(
                field,
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    max_len,
                    value.chars().count()
                ),
            ));
        }
        value.to_string()
    }

    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<Date> {
        match self.optional_date(field, value) {
            Some(date) => Some(date),
            None if blank(value) => {
                self.reject(FieldError::required(field));
                None
            }
            None => None,
        }
    }

    pub fn optional_date(&mut self, field: &str, value: Option<&str>) -> Option<Date> {
        let raw = value.filter(|v| !v.trim().is_empty())?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.reject(FieldError::new(field, "Enter a valid date."));
        }
        parsed
    }

    pub fn optional_id(&mut self, field: &str, value: Option<&str>) -> Option<u64> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match raw.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                self.reject(invalid_choice(field, raw));
                None
            }
        }
    }

    /// Comma-separated ids; duplicates are dropped, order kept.
    pub fn ids(&mut self, field: &str, value: Option<&str>) -> Vec<u64> {
        let mut ids = Vec::new();
        for raw in value.unwrap_or_default().split(',').map(str::trim) {
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<u64>() {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(_) => self.reject(invalid_choice(field, raw)),
            }
        }
        ids
    }

    pub fn finish<T>(self, cleaned: T) -> Result<T, AppError> {
        if self.errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(AppError::invalid_fields(self.errors))
        }
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn invalid_choice(field: &str, value: impl std::fmt::Display) -> FieldError {
    FieldError::new(
        field,
        format!("Select a valid choice. {value} is not one of the available choices."),
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthorForm {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub date_of_death: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<Date>,
    pub date_of_death: Option<Date>,
}

impl AuthorForm {
    pub fn clean(&self) -> Result<AuthorDraft, AppError> {
        let mut cleaner = Cleaner::new();
        let draft = AuthorDraft {
            first_name: cleaner.text("first_name", &self.first_name, 100),
            last_name: cleaner.text("last_name", &self.last_name, 100),
            date_of_birth: cleaner.optional_date("date_of_birth", self.date_of_birth.as_deref()),
            date_of_death: cleaner.optional_date("date_of_death", self.date_of_death.as_deref()),
        };
        cleaner.finish(draft)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookForm {
    pub title: String,
    pub author: Option<String>,
    pub summary: String,
    pub isbn: String,
    pub genres: Option<String>,
    pub languages: Option<String>,
}

/// Book fields after cleaning; references are not yet checked against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: Option<u64>,
    pub summary: String,
    pub isbn: String,
    pub genres: Vec<u64>,
    pub languages: Vec<u64>,
}

impl BookForm {
    pub fn clean(&self) -> Result<BookDraft, AppError> {
        let mut cleaner = Cleaner::new();
        let draft = BookDraft {
            title: cleaner.text("title", &self.title, 200),
            author: cleaner.optional_id("author", self.author.as_deref()),
            summary: cleaner.text("summary", &self.summary, 1000),
            isbn: cleaner.text("isbn", &self.isbn, 13),
            genres: cleaner.ids("genres", self.genres.as_deref()),
            languages: cleaner.ids("languages", self.languages.as_deref()),
        };
        cleaner.finish(draft)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InstanceForm {
    pub book: Option<String>,
    pub imprint: String,
}

impl InstanceForm {
    pub fn clean(&self) -> Result<(u64, String), AppError> {
        let mut cleaner = Cleaner::new();
        let book = cleaner.optional_id("book", self.book.as_deref());
        if book.is_none() && blank(self.book.as_deref()) {
            cleaner.reject(FieldError::required("book"));
        }
        let imprint = cleaner.text("imprint", &self.imprint, 200);
        let cleaned = cleaner.finish(imprint)?;
        // `finish` succeeded, so `book` parsed
        Ok((book.unwrap_or_default(), cleaned))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusForm {
    pub status: Option<String>,
}

impl StatusForm {
    /// Only statuses without loan details can be set directly; lending goes through issue.
    pub fn clean(&self) -> Result<LoanStatus, AppError> {
        let raw = self.status.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(AppError::invalid_fields(vec![FieldError::required("status")]));
        }
        match raw.parse::<LoanStatus>() {
            Ok(LoanStatus::OnLoan) | Err(_) => {
                Err(AppError::invalid_fields(vec![invalid_choice("status", raw)]))
            }
            Ok(status) => Ok(status),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IssueForm {
    pub borrower: String,
    pub due_back: Option<String>,
}

impl IssueForm {
    pub fn clean(&self) -> Result<(String, Date), AppError> {
        let mut cleaner = Cleaner::new();
        let borrower = cleaner.text("borrower", &self.borrower, 150);
        let due_back = cleaner.date("due_back", self.due_back.as_deref());
        let (borrower, due_back) = cleaner.finish((borrower, due_back))?;
        due_back
            .map(|date| (borrower, date))
            .ok_or_else(|| AppError::invalid_fields(vec![FieldError::required("due_back")]))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenewalForm {
    pub renewal_date: Option<String>,
}

impl RenewalForm {
    pub fn clean(&self) -> Result<Date, AppError> {
        let mut cleaner = Cleaner::new();
        let date = cleaner.date("renewal_date", self.renewal_date.as_deref());
        let date = cleaner.finish(date)?;
        date.ok_or_else(|| AppError::invalid_fields(vec![FieldError::required("renewal_date")]))
    }
}
