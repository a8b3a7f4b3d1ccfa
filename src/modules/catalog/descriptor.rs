//! Record-type descriptors shared by the create/update/delete handlers.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use stacks_authz::Principal;
use stacks_http::AppError;

use super::forms::{AuthorForm, BookForm};
use super::service::Catalog;
use super::MOUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Change,
    Delete,
}

/// Routing and permission facts about one editable record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordType {
    pub model: &'static str,
    /// Path segment of detail and edit routes, e.g. `author`
    pub path: &'static str,
    /// Path segment of the list route, e.g. `authors`
    pub list_path: &'static str,
    pub add: &'static str,
    pub change: &'static str,
    pub delete: &'static str,
}

impl RecordType {
    pub fn capability(&self, action: Action) -> &'static str {
        match action {
            Action::Add => self.add,
            Action::Change => self.change,
            Action::Delete => self.delete,
        }
    }

    pub fn authorize(&self, principal: &Principal, action: Action) -> Result<(), AppError> {
        principal.require(self.capability(action))
    }

    pub fn detail_url(&self, id: u64) -> String {
        format!("{MOUNT}/{}/{id}", self.path)
    }

    pub fn list_url(&self) -> String {
        format!("{MOUNT}/{}", self.list_path)
    }
}

pub const AUTHOR: RecordType = RecordType {
    model: "author",
    path: "author",
    list_path: "authors",
    add: "catalog.add_author",
    change: "catalog.change_author",
    delete: "catalog.delete_author",
};

pub const BOOK: RecordType = RecordType {
    model: "book",
    path: "book",
    list_path: "books",
    add: "catalog.add_book",
    change: "catalog.change_book",
    delete: "catalog.delete_book",
};

/// A record type the generic CRUD handlers can drive.
#[async_trait]
pub trait Editable: Send + Sync + 'static {
    type Form: DeserializeOwned + Send + 'static;

    const TYPE: RecordType;

    async fn create(catalog: &Catalog, form: Self::Form) -> Result<u64, AppError>;

    async fn update(catalog: &Catalog, id: u64, form: Self::Form) -> Result<(), AppError>;

    async fn delete(catalog: &Catalog, id: u64) -> Result<(), AppError>;
}

pub struct AuthorRecord;

#[async_trait]
impl Editable for AuthorRecord {
    type Form = AuthorForm;

    const TYPE: RecordType = AUTHOR;

    async fn create(catalog: &Catalog, form: AuthorForm) -> Result<u64, AppError> {
        let author = catalog.create_author(form.clean()?).await?;
        Ok(author.id)
    }

    async fn update(catalog: &Catalog, id: u64, form: AuthorForm) -> Result<(), AppError> {
        catalog.author(id).await?;
        catalog.update_author(id, form.clean()?).await?;
        Ok(())
    }

    async fn delete(catalog: &Catalog, id: u64) -> Result<(), AppError> {
        catalog.delete_author(id).await?;
        Ok(())
    }
}

pub struct BookRecord;

#[async_trait]
impl Editable for BookRecord {
    type Form = BookForm;

    const TYPE: RecordType = BOOK;

    async fn create(catalog: &Catalog, form: BookForm) -> Result<u64, AppError> {
        let book = catalog.create_book(form.clean()?).await?;
        Ok(book.id)
    }

    async fn update(catalog: &Catalog, id: u64, form: BookForm) -> Result<(), AppError> {
        catalog.book(id).await?;
        catalog.update_book(id, form.clean()?).await?;
        Ok(())
    }

    async fn delete(catalog: &Catalog, id: u64) -> Result<(), AppError> {
        catalog.delete_book(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_the_mount_point() {
        assert_eq!(AUTHOR.detail_url(4), "/api/catalog/author/4");
        assert_eq!(BOOK.list_url(), "/api/catalog/books");
    }

    #[test]
    fn each_action_has_its_own_capability() {
        let principal = Principal::new("editor").with_capability("catalog.change_book");
        assert!(BOOK.authorize(&principal, Action::Change).is_ok());
        assert!(BOOK.authorize(&principal, Action::Delete).is_err());
        assert!(AUTHOR.authorize(&principal, Action::Change).is_err());
    }
}
