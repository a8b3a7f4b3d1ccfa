//! Seed data read at startup from `database.fixtures`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::models::{Author, Book, BookInstance, Genre, Language};

/// Records to preload, as a JSON document with one array per table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub authors: Vec<Author>,
    pub genres: Vec<Genre>,
    pub languages: Vec<Language>,
    pub books: Vec<Book>,
    pub instances: Vec<BookInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixtureSummary {
    pub authors: usize,
    pub genres: usize,
    pub languages: usize,
    pub books: usize,
    pub instances: usize,
}

impl Fixture {
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open fixture {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    pub fn summary(&self) -> FixtureSummary {
        FixtureSummary {
            authors: self.authors.len(),
            genres: self.genres.len(),
            languages: self.languages.len(),
            books: self.books.len(),
            instances: self.instances.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::models::LoanStatus;
    use serde_json::json;

    #[test]
    fn parses_a_fixture_with_flat_instances() {
        let fixture: Fixture = serde_json::from_value(json!({
            "authors": [{"id": 1, "first_name": "Ursula", "last_name": "Le Guin"}],
            "books": [{
                "id": 1,
                "title": "A Wizard of Earthsea",
                "author": 1,
                "summary": "A young wizard on Gont.",
                "isbn": "9780547773742"
            }],
            "instances": [
                {"book": 1, "imprint": "Parnassus, 1968", "status": "a"},
                {
                    "book": 1,
                    "imprint": "Puffin, 1971",
                    "status": "o",
                    "borrower": "tara1",
                    "due_back": "2024-03-20"
                }
            ]
        }))
        .unwrap();

        assert_eq!(fixture.summary().instances, 2);
        assert_eq!(fixture.instances[1].status(), LoanStatus::OnLoan);
        assert!(fixture.genres.is_empty());
    }

    #[test]
    fn rejects_loan_details_on_an_available_copy() {
        let result = serde_json::from_value::<Fixture>(json!({
            "instances": [
                {"book": 1, "imprint": "x", "status": "a", "borrower": "tara1"}
            ]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Fixture::read("config/fixtures/does-not-exist.json").is_err());
    }

    #[tokio::test]
    async fn bundled_fixture_loads() {
        use crate::modules::catalog::service::Catalog;
        use stacks_kernel::{settings::CatalogSettings, SystemClock};
        use std::sync::Arc;

        let fixture = Fixture::read("config/fixtures/catalog.json").unwrap();
        let catalog = Catalog::new(
            crate::testing::database().await,
            &CatalogSettings::default(),
            Arc::new(SystemClock),
        );
        let summary = catalog.load_fixture(fixture.clone()).await.unwrap().unwrap();
        assert_eq!(summary.books, 4);
        assert_eq!(summary.instances, 5);
        assert_eq!(
            catalog.dashboard(None).await.unwrap().num_instances_status_available,
            1
        );

        assert_eq!(catalog.load_fixture(fixture).await.unwrap(), None);
    }

    #[tokio::test]
    async fn copy_of_an_unknown_book_fails_the_whole_load() {
        use crate::modules::catalog::service::Catalog;
        use stacks_kernel::{settings::CatalogSettings, SystemClock};
        use std::sync::Arc;

        let fixture: Fixture = serde_json::from_value(json!({
            "genres": [{"id": 1, "name": "Fantasy"}],
            "instances": [{"book": 9, "imprint": "x", "status": "a"}]
        }))
        .unwrap();
        let catalog = Catalog::new(
            crate::testing::database().await,
            &CatalogSettings::default(),
            Arc::new(SystemClock),
        );
        let err = catalog.load_fixture(fixture).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert!(catalog.genres().await.unwrap().is_empty());
    }
}
