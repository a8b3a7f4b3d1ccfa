use std::sync::Arc;

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use stacks_db::{
    sql_id, violation, Database, Page, PageRequest, Paginator, StoreError, Violation,
};
use stacks_events::EventBus;
use stacks_http::{AppError, FieldError};
use stacks_kernel::{settings::CatalogSettings, Clock};
use time::Date;

use super::fixtures::{Fixture, FixtureSummary};
use super::forms::{invalid_choice, AuthorDraft, BookDraft};
use super::loans::{LoanEvent, RenewalWindow};
use super::models::{
    Author, Book, BookInstance, BookRow, Genre, InstanceId, InstanceRecord, Language, LoanStatus,
};
use super::MOUNT;

/// Status filter the dashboard has always used for its "available" count.
/// It matches no status code, so that count is always zero.
const LEGACY_AVAILABLE_FILTER: &str = "avail";

/// Times a copy update is retried after losing a race with another writer.
const COPY_UPDATE_ATTEMPTS: usize = 3;

/// Dashboard counts, recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub num_books: usize,
    pub num_instances: usize,
    pub num_instances_available: usize,
    pub num_instances_status_available: usize,
    pub num_authors: usize,
    pub num_genres: usize,
    pub num_visits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id: u64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorDetail {
    #[serde(flatten)]
    pub author: Author,
    pub name: String,
    pub books: Vec<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub url: String,
    pub author_link: Option<Link>,
    pub display_genre: String,
    pub get_language: String,
    pub copies: Vec<BookInstance>,
}

/// A copy on loan, as listed on the loan pages.
#[derive(Debug, Clone, Serialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub instance: BookInstance,
    pub title: String,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalView {
    pub instance: BookInstance,
    pub label: String,
    pub renewal_date: Date,
    pub latest_renewal_date: Date,
}

#[derive(FromRow)]
struct LoanRecord {
    #[sqlx(flatten)]
    instance: InstanceRecord,
    title: String,
}

/// Catalog records and the operations on them.
pub struct Catalog {
    db: Database,
    events: EventBus<LoanEvent>,
    clock: Arc<dyn Clock>,
    window: RenewalWindow,
    paginate_by: usize,
}

impl Catalog {
    pub fn new(db: Database, settings: &CatalogSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            events: EventBus::new(),
            clock,
            window: RenewalWindow::from_settings(settings),
            paginate_by: settings.paginate_by.max(1),
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn events(&self) -> &EventBus<LoanEvent> {
        &self.events
    }

    pub fn today(&self) -> Date {
        self.clock.today()
    }

    pub async fn dashboard(&self, visitor: Option<&str>) -> Result<Dashboard, AppError> {
        Ok(Dashboard {
            num_books: self.count("SELECT COUNT(*) FROM book").await?,
            num_instances: self.count("SELECT COUNT(*) FROM bookinstance").await?,
            num_instances_available: self.count_status(LEGACY_AVAILABLE_FILTER).await?,
            num_instances_status_available: self
                .count_status(LoanStatus::Available.code())
                .await?,
            num_authors: self.count("SELECT COUNT(*) FROM author").await?,
            num_genres: self.count("SELECT COUNT(*) FROM genre").await?,
            num_visits: self.record_visit(visitor).await?,
        })
    }

    /// Count this visit; anonymous callers are not tracked and always see 1.
    async fn record_visit(&self, visitor: Option<&str>) -> Result<u64, sqlx::Error> {
        let Some(visitor) = visitor else {
            return Ok(1);
        };
        let visits: i64 = sqlx::query_scalar(
            "INSERT INTO visit (username, visits) VALUES (?, 1)
             ON CONFLICT (username) DO UPDATE SET visits = visits + 1
             RETURNING visits",
        )
        .bind(visitor)
        .fetch_one(self.pool())
        .await?;
        Ok(u64::try_from(visits).unwrap_or_default())
    }

    async fn count(&self, sql: &'static str) -> Result<usize, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(self.pool()).await?;
        Ok(to_count(count))
    }

    async fn count_status(&self, status: &str) -> Result<usize, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookinstance WHERE status = ?")
            .bind(status)
            .fetch_one(self.pool())
            .await?;
        Ok(to_count(count))
    }

    async fn paginator(&self, count_sql: &'static str) -> Result<Paginator, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(count_sql).fetch_one(self.pool()).await?;
        Ok(Paginator::counted(count, self.paginate_by))
    }

    // Authors

    pub async fn authors_page(&self, request: PageRequest) -> Result<Page<Author>, AppError> {
        let paginator = self.paginator("SELECT COUNT(*) FROM author").await?;
        let window = paginator.window(request)?;
        let authors = sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, date_of_birth, date_of_death
             FROM author ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;
        Ok(paginator.page(window, authors))
    }

    pub async fn author(&self, id: u64) -> Result<Author, AppError> {
        sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, date_of_birth, date_of_death
             FROM author WHERE id = ?",
        )
        .bind(sql_id(id))
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found(Author::TABLE, id).into())
    }

    pub async fn author_detail(&self, id: u64) -> Result<AuthorDetail, AppError> {
        let author = self.author(id).await?;
        let books = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, title FROM book WHERE author_id = ? ORDER BY id",
        )
        .bind(sql_id(id))
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .filter_map(|(book, title)| {
            let id = u64::try_from(book).ok()?;
            Some(Link {
                id,
                url: format!("{MOUNT}/book/{id}"),
                name: title,
            })
        })
        .collect();
        Ok(AuthorDetail {
            name: author.to_string(),
            author,
            books,
        })
    }

    pub async fn create_author(&self, draft: AuthorDraft) -> Result<Author, AppError> {
        let author = sqlx::query_as::<_, Author>(
            "INSERT INTO author (first_name, last_name, date_of_birth, date_of_death)
             VALUES (?, ?, ?, ?)
             RETURNING id, first_name, last_name, date_of_birth, date_of_death",
        )
        .bind(draft.first_name)
        .bind(draft.last_name)
        .bind(draft.date_of_birth)
        .bind(draft.date_of_death)
        .fetch_one(self.pool())
        .await?;
        Ok(author)
    }

    pub async fn update_author(&self, id: u64, draft: AuthorDraft) -> Result<Author, AppError> {
        sqlx::query_as::<_, Author>(
            "UPDATE author
             SET first_name = ?, last_name = ?, date_of_birth = ?, date_of_death = ?
             WHERE id = ?
             RETURNING id, first_name, last_name, date_of_birth, date_of_death",
        )
        .bind(draft.first_name)
        .bind(draft.last_name)
        .bind(draft.date_of_birth)
        .bind(draft.date_of_death)
        .bind(sql_id(id))
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found(Author::TABLE, id).into())
    }

    /// Remove an author. `ON DELETE SET NULL` clears the author of their books in the same statement.
    pub async fn delete_author(&self, id: u64) -> Result<Author, AppError> {
        let author = sqlx::query_as::<_, Author>(
            "DELETE FROM author WHERE id = ?
             RETURNING id, first_name, last_name, date_of_birth, date_of_death",
        )
        .bind(sql_id(id))
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found(Author::TABLE, id))?;
        tracing::debug!(author = id, "author deleted");
        Ok(author)
    }

    // Genres and languages

    pub async fn genres(&self) -> Result<Vec<Genre>, AppError> {
        Ok(
            sqlx::query_as::<_, Genre>("SELECT id, name FROM genre ORDER BY id")
                .fetch_all(self.pool())
                .await?,
        )
    }

    pub async fn create_genre(&self, name: &str) -> Result<Genre, AppError> {
        let name = required_name(name)?;
        Ok(
            sqlx::query_as::<_, Genre>("INSERT INTO genre (name) VALUES (?) RETURNING id, name")
                .bind(name)
                .fetch_one(self.pool())
                .await?,
        )
    }

    pub async fn languages(&self) -> Result<Vec<Language>, AppError> {
        Ok(
            sqlx::query_as::<_, Language>("SELECT id, name FROM language ORDER BY id")
                .fetch_all(self.pool())
                .await?,
        )
    }

    pub async fn create_language(&self, name: &str) -> Result<Language, AppError> {
        let name = required_name(name)?;
        Ok(sqlx::query_as::<_, Language>(
            "INSERT INTO language (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await?)
    }

    // Books

    pub async fn books_page(&self, request: PageRequest) -> Result<Page<Book>, AppError> {
        let paginator = self.paginator("SELECT COUNT(*) FROM book").await?;
        let window = paginator.window(request)?;
        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT id, title, author_id, summary, isbn FROM book ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;

        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            books.push(self.with_links(row).await?);
        }
        Ok(paginator.page(window, books))
    }

    pub async fn book(&self, id: u64) -> Result<Book, AppError> {
        let row = sqlx::query_as::<_, BookRow>(
            "SELECT id, title, author_id, summary, isbn FROM book WHERE id = ?",
        )
        .bind(sql_id(id))
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found(Book::TABLE, id))?;
        Ok(self.with_links(row).await?)
    }

    async fn with_links(&self, row: BookRow) -> Result<Book, sqlx::Error> {
        let genres: Vec<i64> = sqlx::query_scalar(
            "SELECT genre_id FROM book_genre WHERE book_id = ? ORDER BY position",
        )
        .bind(sql_id(row.id))
        .fetch_all(self.pool())
        .await?;
        let languages: Vec<i64> = sqlx::query_scalar(
            "SELECT language_id FROM book_language WHERE book_id = ? ORDER BY position",
        )
        .bind(sql_id(row.id))
        .fetch_all(self.pool())
        .await?;
        Ok(row.into_book(stored_ids(genres), stored_ids(languages)))
    }

    pub async fn book_detail(&self, id: u64) -> Result<BookDetail, AppError> {
        let book = self.book(id).await?;
        let author_link = match book.author {
            Some(author_id) => match self.author(author_id).await {
                Ok(author) => Some(Link {
                    id: author.id,
                    url: author.absolute_url(),
                    name: author.to_string(),
                }),
                Err(AppError::NotFound { .. }) => None,
                Err(err) => return Err(err),
            },
            None => None,
        };
        let copies = sqlx::query_as::<_, InstanceRecord>(
            "SELECT id, book_id, imprint, status, borrower, due_back
             FROM bookinstance WHERE book_id = ? ORDER BY rowid",
        )
        .bind(sql_id(id))
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(BookInstance::try_from)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(BookDetail {
            url: book.absolute_url(),
            author_link,
            display_genre: self.display_genre(&book).await?,
            get_language: self.get_language(&book).await?,
            copies,
            book,
        })
    }

    /// First three genre names, comma-separated.
    pub async fn display_genre(&self, book: &Book) -> Result<String, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT genre.name FROM book_genre
             JOIN genre ON genre.id = book_genre.genre_id
             WHERE book_genre.book_id = ?
             ORDER BY book_genre.position LIMIT 3",
        )
        .bind(sql_id(book.id))
        .fetch_all(self.pool())
        .await?;
        Ok(names.join(", "))
    }

    /// First three language names, comma-separated.
    pub async fn get_language(&self, book: &Book) -> Result<String, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT language.name FROM book_language
             JOIN language ON language.id = book_language.language_id
             WHERE book_language.book_id = ?
             ORDER BY book_language.position LIMIT 3",
        )
        .bind(sql_id(book.id))
        .fetch_all(self.pool())
        .await?;
        Ok(names.join(", "))
    }

    pub async fn create_book(&self, draft: BookDraft) -> Result<Book, AppError> {
        self.check_book_references(&draft).await?;
        let id = match self.write_book(None, &draft).await {
            Ok(Some(id)) => id,
            Ok(None) => return Err(StoreError::not_found(Book::TABLE, "new").into()),
            Err(err) => return Err(self.reference_error(&draft, err).await),
        };
        Ok(draft.into_book(u64::try_from(id).unwrap_or_default()))
    }

    pub async fn update_book(&self, id: u64, draft: BookDraft) -> Result<Book, AppError> {
        self.check_book_references(&draft).await?;
        match self.write_book(Some(id), &draft).await {
            Ok(Some(_)) => Ok(draft.into_book(id)),
            Ok(None) => Err(StoreError::not_found(Book::TABLE, id).into()),
            Err(err) => Err(self.reference_error(&draft, err).await),
        }
    }

    /// Insert or replace a book row and its genre and language links in one transaction.
    /// `None` when `existing` names no book.
    async fn write_book(
        &self,
        existing: Option<u64>,
        draft: &BookDraft,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let id = match existing {
            None => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO book (title, author_id, summary, isbn)
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(&draft.title)
                .bind(draft.author.map(sql_id))
                .bind(&draft.summary)
                .bind(&draft.isbn)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(id) => {
                let updated = sqlx::query(
                    "UPDATE book SET title = ?, author_id = ?, summary = ?, isbn = ? WHERE id = ?",
                )
                .bind(&draft.title)
                .bind(draft.author.map(sql_id))
                .bind(&draft.summary)
                .bind(&draft.isbn)
                .bind(sql_id(id))
                .execute(&mut *tx)
                .await?;
                if updated.rows_affected() == 0 {
                    return Ok(None);
                }
                for statement in [
                    "DELETE FROM book_genre WHERE book_id = ?",
                    "DELETE FROM book_language WHERE book_id = ?",
                ] {
                    sqlx::query(statement)
                        .bind(sql_id(id))
                        .execute(&mut *tx)
                        .await?;
                }
                sql_id(id)
            }
        };
        link_book(&mut tx, id, &draft.genres, &draft.languages).await?;
        tx.commit().await?;
        Ok(Some(id))
    }

    /// Remove a book. `ON DELETE RESTRICT` refuses while copies of it exist.
    pub async fn delete_book(&self, id: u64) -> Result<Book, AppError> {
        let book = self.book(id).await?;
        let deleted = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(sql_id(id))
            .execute(self.pool())
            .await;
        match deleted {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StoreError::not_found(Book::TABLE, id).into())
            }
            Ok(_) => Ok(book),
            Err(err) if violation(&err) == Some(Violation::ForeignKey) => {
                Err(StoreError::protected(Book::TABLE, id, BookInstance::TABLE).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn check_book_references(&self, draft: &BookDraft) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if let Some(author) = draft.author {
            if !self.exists("SELECT EXISTS (SELECT 1 FROM author WHERE id = ?)", author).await? {
                errors.push(invalid_choice("author", author));
            }
        }
        for genre in &draft.genres {
            if !self.exists("SELECT EXISTS (SELECT 1 FROM genre WHERE id = ?)", *genre).await? {
                errors.push(invalid_choice("genres", genre));
            }
        }
        for language in &draft.languages {
            if !self
                .exists("SELECT EXISTS (SELECT 1 FROM language WHERE id = ?)", *language)
                .await?
            {
                errors.push(invalid_choice("languages", language));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::invalid_fields(errors))
        }
    }

    /// Error for a failed book write; a foreign key failure means a reference vanished after the check.
    async fn reference_error(&self, draft: &BookDraft, err: sqlx::Error) -> AppError {
        if violation(&err) != Some(Violation::ForeignKey) {
            return err.into();
        }
        match self.check_book_references(draft).await {
            Err(invalid) => invalid,
            Ok(()) => StoreError::MissingReference {
                table: Book::TABLE,
                references: "author, genre or language",
            }
            .into(),
        }
    }

    async fn exists(&self, sql: &'static str, id: u64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(sql)
            .bind(sql_id(id))
            .fetch_one(self.pool())
            .await
    }

    // Copies and loans

    pub async fn instance(&self, id: InstanceId) -> Result<BookInstance, AppError> {
        let record = sqlx::query_as::<_, InstanceRecord>(
            "SELECT id, book_id, imprint, status, borrower, due_back
             FROM bookinstance WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found(BookInstance::TABLE, id))?;
        Ok(BookInstance::try_from(record)?)
    }

    /// New copies start in maintenance. A book deleted meanwhile fails the foreign key.
    pub async fn create_instance(
        &self,
        book: u64,
        imprint: String,
    ) -> Result<BookInstance, AppError> {
        let instance = BookInstance::new(book, imprint);
        let inserted = sqlx::query(
            "INSERT INTO bookinstance (id, book_id, imprint, status) VALUES (?, ?, ?, ?)",
        )
        .bind(instance.id.0)
        .bind(sql_id(book))
        .bind(&instance.imprint)
        .bind(instance.status().code())
        .execute(self.pool())
        .await;
        match inserted {
            Ok(_) => {}
            Err(err) if violation(&err) == Some(Violation::ForeignKey) => {
                return Err(AppError::invalid_fields(vec![invalid_choice("book", book)]))
            }
            Err(err) => return Err(err.into()),
        }
        self.events.publish(LoanEvent::Created {
            instance: instance.id,
            book,
        });
        Ok(instance)
    }

    /// Apply `change` to the stored copy and write the result only if the row still
    /// holds what was read. `change` runs again on every attempt; its error aborts.
    async fn change_instance<T, F>(
        &self,
        id: InstanceId,
        mut change: F,
    ) -> Result<(BookInstance, T), AppError>
    where
        F: FnMut(&mut BookInstance) -> Result<T, AppError>,
    {
        for attempt in 1..=COPY_UPDATE_ATTEMPTS {
            let current = self.instance(id).await?;
            let mut next = current.clone();
            let outcome = change(&mut next)?;

            let written = sqlx::query(
                "UPDATE bookinstance SET status = ?, borrower = ?, due_back = ?
                 WHERE id = ? AND status = ? AND borrower IS ? AND due_back IS ?",
            )
            .bind(next.status().code())
            .bind(next.borrower())
            .bind(next.due_back())
            .bind(id.0)
            .bind(current.status().code())
            .bind(current.borrower())
            .bind(current.due_back())
            .execute(self.pool())
            .await?;
            if written.rows_affected() == 1 {
                return Ok((next, outcome));
            }
            tracing::debug!(instance = %id, attempt, "copy changed concurrently");
        }
        Err(AppError::conflict(
            vec![],
            format!("copy {id} is being changed by another request"),
        ))
    }

    pub async fn set_status(
        &self,
        id: InstanceId,
        to: LoanStatus,
    ) -> Result<BookInstance, AppError> {
        let (instance, from) = self
            .change_instance(id, |copy| {
                let from = copy.status();
                copy.set_status(to)?;
                Ok(from)
            })
            .await?;
        self.events.publish(LoanEvent::StatusChanged {
            instance: id,
            from,
            to,
        });
        Ok(instance)
    }

    /// Lend a copy. The due date must fall inside the renewal window.
    pub async fn issue(
        &self,
        id: InstanceId,
        borrower: &str,
        due_back: Date,
    ) -> Result<BookInstance, AppError> {
        let (instance, due_back) = self
            .change_instance(id, |copy| {
                let due_back = self.checked_due_date("due_back", due_back)?;
                copy.issue(borrower, due_back)?;
                Ok(due_back)
            })
            .await?;
        self.events.publish(LoanEvent::Issued {
            instance: id,
            borrower: borrower.to_string(),
            due_back,
        });
        Ok(instance)
    }

    pub async fn mark_returned(&self, id: InstanceId) -> Result<BookInstance, AppError> {
        let (instance, borrower) = self
            .change_instance(id, |copy| Ok(copy.mark_returned()?))
            .await?;
        self.events.publish(LoanEvent::Returned {
            instance: id,
            borrower,
        });
        Ok(instance)
    }

    /// What the renewal form shows before anything is submitted.
    pub async fn renewal_view(&self, id: InstanceId) -> Result<RenewalView, AppError> {
        let instance = self.instance(id).await?;
        let title: Option<String> = sqlx::query_scalar("SELECT title FROM book WHERE id = ?")
            .bind(sql_id(instance.book))
            .fetch_optional(self.pool())
            .await?;
        let label = match title {
            Some(title) => format!("{} ({title})", instance.id),
            None => instance.id.to_string(),
        };
        let today = self.today();
        Ok(RenewalView {
            instance,
            label,
            renewal_date: self.window.initial(today),
            latest_renewal_date: self.window.latest(today),
        })
    }

    /// Move the due date of a copy on loan.
    ///
    /// An unknown copy is 404 before the date is looked at. A copy returned
    /// concurrently fails the conditional write and is never given a due date.
    pub async fn renew(&self, id: InstanceId, proposed: Date) -> Result<BookInstance, AppError> {
        let (instance, event) = self
            .change_instance(id, |copy| {
                let due_back = self.checked_due_date("renewal_date", proposed)?;
                let previous = copy.renew(due_back)?;
                Ok(LoanEvent::Renewed {
                    instance: id,
                    borrower: copy.borrower().unwrap_or_default().to_string(),
                    from: previous,
                    to: due_back,
                })
            })
            .await?;
        self.events.publish(event);
        Ok(instance)
    }

    fn checked_due_date(&self, field: &str, proposed: Date) -> Result<Date, AppError> {
        self.window
            .check(field, proposed, self.today())
            .map_err(|err| AppError::invalid_fields(vec![err]))
    }

    /// Copies `borrower` has on loan, soonest due first.
    pub async fn loans_of(
        &self,
        borrower: &str,
        request: PageRequest,
    ) -> Result<Page<LoanView>, AppError> {
        self.loans(Some(borrower), request).await
    }

    /// Every copy on loan, soonest due first.
    pub async fn all_loans(&self, request: PageRequest) -> Result<Page<LoanView>, AppError> {
        self.loans(None, request).await
    }

    async fn loans(
        &self,
        borrower: Option<&str>,
        request: PageRequest,
    ) -> Result<Page<LoanView>, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookinstance
             WHERE status = 'o' AND (?1 IS NULL OR borrower = ?1)",
        )
        .bind(borrower)
        .fetch_one(self.pool())
        .await?;
        let paginator = Paginator::counted(count, self.paginate_by);
        let window = paginator.window(request)?;

        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT bookinstance.id AS id, bookinstance.book_id AS book_id,
                    bookinstance.imprint AS imprint, bookinstance.status AS status,
                    bookinstance.borrower AS borrower, bookinstance.due_back AS due_back,
                    book.title AS title
             FROM bookinstance JOIN book ON book.id = bookinstance.book_id
             WHERE bookinstance.status = 'o' AND (?1 IS NULL OR bookinstance.borrower = ?1)
             ORDER BY bookinstance.due_back, bookinstance.rowid
             LIMIT ?2 OFFSET ?3",
        )
        .bind(borrower)
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await?;

        let today = self.today();
        let mut loans = Vec::with_capacity(records.len());
        for record in records {
            let instance = BookInstance::try_from(record.instance)?;
            loans.push(LoanView {
                title: record.title,
                is_overdue: instance.due_back().is_some_and(|due| due < today),
                instance,
            });
        }
        Ok(paginator.page(window, loans))
    }

    /// Insert fixture records in dependency order, in one transaction.
    ///
    /// Returns `None` and writes nothing when the catalog already holds records.
    pub async fn load_fixture(&self, fixture: Fixture) -> Result<Option<FixtureSummary>, AppError> {
        let stored: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM author) + (SELECT COUNT(*) FROM genre)
                  + (SELECT COUNT(*) FROM language) + (SELECT COUNT(*) FROM book)",
        )
        .fetch_one(self.pool())
        .await?;
        if stored > 0 {
            return Ok(None);
        }

        let summary = fixture.summary();
        let mut tx = self.pool().begin().await?;
        for author in fixture.authors {
            sqlx::query(
                "INSERT INTO author (id, first_name, last_name, date_of_birth, date_of_death)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(sql_id(author.id))
            .bind(author.first_name)
            .bind(author.last_name)
            .bind(author.date_of_birth)
            .bind(author.date_of_death)
            .execute(&mut *tx)
            .await
            .map_err(fixture_error(Author::TABLE, "author"))?;
        }
        for genre in fixture.genres {
            sqlx::query("INSERT INTO genre (id, name) VALUES (?, ?)")
                .bind(sql_id(genre.id))
                .bind(genre.name)
                .execute(&mut *tx)
                .await
                .map_err(fixture_error(Genre::TABLE, "genre"))?;
        }
        for language in fixture.languages {
            sqlx::query("INSERT INTO language (id, name) VALUES (?, ?)")
                .bind(sql_id(language.id))
                .bind(language.name)
                .execute(&mut *tx)
                .await
                .map_err(fixture_error(Language::TABLE, "language"))?;
        }
        for book in fixture.books {
            sqlx::query(
                "INSERT INTO book (id, title, author_id, summary, isbn) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(sql_id(book.id))
            .bind(&book.title)
            .bind(book.author.map(sql_id))
            .bind(&book.summary)
            .bind(&book.isbn)
            .execute(&mut *tx)
            .await
            .map_err(fixture_error(Book::TABLE, "author"))?;
            link_book(&mut tx, sql_id(book.id), &book.genres, &book.languages)
                .await
                .map_err(fixture_error(Book::TABLE, "genre or language"))?;
        }
        for instance in fixture.instances {
            sqlx::query(
                "INSERT INTO bookinstance (id, book_id, imprint, status, borrower, due_back)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(instance.id.0)
            .bind(sql_id(instance.book))
            .bind(&instance.imprint)
            .bind(instance.status().code())
            .bind(instance.borrower())
            .bind(instance.due_back())
            .execute(&mut *tx)
            .await
            .map_err(fixture_error(BookInstance::TABLE, "book"))?;
        }
        tx.commit().await?;
        Ok(Some(summary))
    }
}

impl BookDraft {
    fn into_book(self, id: u64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            summary: self.summary,
            isbn: self.isbn,
            genres: self.genres,
            languages: self.languages,
        }
    }
}

async fn link_book(
    conn: &mut SqliteConnection,
    book: i64,
    genres: &[u64],
    languages: &[u64],
) -> Result<(), sqlx::Error> {
    for (position, genre) in (0_i64..).zip(genres) {
        sqlx::query(
            "INSERT OR IGNORE INTO book_genre (book_id, genre_id, position) VALUES (?, ?, ?)",
        )
        .bind(book)
        .bind(sql_id(*genre))
        .bind(position)
        .execute(&mut *conn)
        .await?;
    }
    for (position, language) in (0_i64..).zip(languages) {
        sqlx::query(
            "INSERT OR IGNORE INTO book_language (book_id, language_id, position) VALUES (?, ?, ?)",
        )
        .bind(book)
        .bind(sql_id(*language))
        .bind(position)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn fixture_error(
    table: &'static str,
    references: &'static str,
) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| match violation(&err) {
        Some(Violation::ForeignKey) => StoreError::MissingReference { table, references },
        Some(Violation::Unique) => StoreError::Duplicate {
            table,
            key: err.to_string(),
        },
        _ => StoreError::Database(err),
    }
}

fn stored_ids(ids: Vec<i64>) -> Vec<u64> {
    ids.into_iter()
        .filter_map(|id| u64::try_from(id).ok())
        .collect()
}

fn to_count(count: i64) -> usize {
    usize::try_from(count).unwrap_or_default()
}

fn required_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid_fields(vec![FieldError::required("name")]));
    }
    if name.chars().count() > 200 {
        return Err(AppError::invalid_fields(vec![FieldError::new(
            "name",
            "Ensure this value has at most 200 characters.",
        )]));
    }
    Ok(name.to_string())
}
