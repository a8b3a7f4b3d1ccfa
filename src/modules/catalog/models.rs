use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stacks_db::StoreError;
use time::Date;
use uuid::Uuid;

use super::MOUNT;

/// A person who wrote one or more books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<Date>,
    /// Shown as "Died"
    #[serde(default)]
    pub date_of_death: Option<Date>,
}

impl Author {
    pub const TABLE: &'static str = "author";

    pub fn absolute_url(&self) -> String {
        format!("{MOUNT}/author/{}", self.id)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

/// Book category such as "Science Fiction".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Genre {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub name: String,
}

impl Genre {
    pub const TABLE: &'static str = "genre";
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Natural language a book is written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Language {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub name: String,
}

impl Language {
    pub const TABLE: &'static str = "language";
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Title-level catalog metadata, shared by every copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub author: Option<u64>,
    pub summary: String,
    pub isbn: String,
    #[serde(default)]
    pub genres: Vec<u64>,
    #[serde(default)]
    pub languages: Vec<u64>,
}

impl Book {
    pub const TABLE: &'static str = "book";

    pub fn absolute_url(&self) -> String {
        format!("{MOUNT}/book/{}", self.id)
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Opaque identifier of a copy. Random rather than sequential so it does not reveal stock size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Availability of a copy, stored as its one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoanStatus {
    #[default]
    #[serde(rename = "m")]
    Maintenance,
    #[serde(rename = "o")]
    OnLoan,
    #[serde(rename = "a")]
    Available,
    #[serde(rename = "r")]
    Reserved,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Maintenance,
        LoanStatus::OnLoan,
        LoanStatus::Available,
        LoanStatus::Reserved,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "m",
            LoanStatus::OnLoan => "o",
            LoanStatus::Available => "a",
            LoanStatus::Reserved => "r",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "Maintenance",
            LoanStatus::OnLoan => "On loan",
            LoanStatus::Available => "Available",
            LoanStatus::Reserved => "Reserved",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        LoanStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| format!("Select a valid choice. {code} is not one of the available choices."))
    }
}

/// Loan state of a copy. The borrower and due date exist only while on loan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoanState {
    #[default]
    Maintenance,
    Available,
    Reserved,
    OnLoan { borrower: String, due_back: Date },
}

impl LoanState {
    pub fn status(&self) -> LoanStatus {
        match self {
            LoanState::Maintenance => LoanStatus::Maintenance,
            LoanState::Available => LoanStatus::Available,
            LoanState::Reserved => LoanStatus::Reserved,
            LoanState::OnLoan { .. } => LoanStatus::OnLoan,
        }
    }

    pub fn borrower(&self) -> Option<&str> {
        match self {
            LoanState::OnLoan { borrower, .. } => Some(borrower),
            _ => None,
        }
    }

    pub fn due_back(&self) -> Option<Date> {
        match self {
            LoanState::OnLoan { due_back, .. } => Some(*due_back),
            _ => None,
        }
    }
}

/// One lendable copy of a [`Book`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "InstanceRow", try_from = "InstanceRow")]
pub struct BookInstance {
    pub id: InstanceId,
    pub book: u64,
    pub imprint: String,
    pub loan: LoanState,
}

impl BookInstance {
    pub const TABLE: &'static str = "bookinstance";

    pub fn status(&self) -> LoanStatus {
        self.loan.status()
    }

    pub fn borrower(&self) -> Option<&str> {
        self.loan.borrower()
    }

    pub fn due_back(&self) -> Option<Date> {
        self.loan.due_back()
    }

    /// `"{id} ({title})"`
    pub fn label(&self, book: &Book) -> String {
        format!("{} ({})", self.id, book.title)
    }
}

/// `book` row; genres and languages live in their own link tables.
#[derive(Debug, FromRow)]
pub(super) struct BookRow {
    #[sqlx(try_from = "i64")]
    pub id: u64,
    pub title: String,
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
}

impl BookRow {
    pub fn into_book(self, genres: Vec<u64>, languages: Vec<u64>) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author_id.and_then(|id| u64::try_from(id).ok()),
            summary: self.summary,
            isbn: self.isbn,
            genres,
            languages,
        }
    }
}

/// `bookinstance` row as stored.
#[derive(Debug, FromRow)]
pub(super) struct InstanceRecord {
    pub id: Uuid,
    #[sqlx(try_from = "i64")]
    pub book_id: u64,
    pub imprint: String,
    pub status: String,
    pub borrower: Option<String>,
    pub due_back: Option<Date>,
}

impl TryFrom<InstanceRecord> for BookInstance {
    type Error = StoreError;

    fn try_from(record: InstanceRecord) -> Result<Self, Self::Error> {
        let id = InstanceId(record.id);
        let status = record
            .status
            .parse::<LoanStatus>()
            .map_err(|reason| StoreError::corrupt(BookInstance::TABLE, id, reason))?;
        BookInstance::try_from(InstanceRow {
            id,
            book: record.book_id,
            imprint: record.imprint,
            status,
            due_back: record.due_back,
            borrower: record.borrower,
        })
        .map_err(|reason| StoreError::corrupt(BookInstance::TABLE, id, reason))
    }
}

/// Flat wire form of a [`BookInstance`]: status, borrower and due date side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceRow {
    #[serde(default)]
    id: InstanceId,
    book: u64,
    imprint: String,
    #[serde(default)]
    status: LoanStatus,
    #[serde(default)]
    due_back: Option<Date>,
    #[serde(default)]
    borrower: Option<String>,
}

impl From<BookInstance> for InstanceRow {
    fn from(instance: BookInstance) -> Self {
        let status = instance.status();
        let (borrower, due_back) = match instance.loan {
            LoanState::OnLoan { borrower, due_back } => (Some(borrower), Some(due_back)),
            _ => (None, None),
        };
        Self {
            id: instance.id,
            book: instance.book,
            imprint: instance.imprint,
            status,
            due_back,
            borrower,
        }
    }
}

impl TryFrom<InstanceRow> for BookInstance {
    type Error = String;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let idle = match row.status {
            LoanStatus::Maintenance => Some(LoanState::Maintenance),
            LoanStatus::Available => Some(LoanState::Available),
            LoanStatus::Reserved => Some(LoanState::Reserved),
            LoanStatus::OnLoan => None,
        };
        let loan = match (idle, row.borrower, row.due_back) {
            (Some(state), None, None) => state,
            (None, Some(borrower), Some(due_back)) => LoanState::OnLoan { borrower, due_back },
            (None, _, _) => {
                return Err(format!(
                    "copy {} is on loan but lacks a borrower or due date",
                    row.id
                ))
            }
            (Some(_), _, _) => {
                return Err(format!(
                    "copy {} has status '{}' but carries loan details",
                    row.id,
                    row.status.code()
                ))
            }
        };
        Ok(Self {
            id: row.id,
            book: row.book,
            imprint: row.imprint,
            loan,
        })
    }
}
