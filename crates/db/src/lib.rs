//! Record store for Stacks.
//!
//! A [`Database`] wraps a sqlx SQLite pool. Schemas come from sqlx migrations
//! owned by the application; referential rules (restrict, set-null, cascade)
//! live in the schema as foreign-key actions. List queries are paginated with
//! LIMIT/OFFSET through [`Paginator`].

pub mod database;
pub mod error;
pub mod paginate;

pub use database::{sql_id, Database};
pub use error::{violation, StoreError, Violation};
pub use paginate::{Page, PageRequest, PageWindow, Paginator};
