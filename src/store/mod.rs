//! Storage backends.
//!
//! The catalog persists three collections: users, active books and archived
//! books. `Store` is the interface the workflow layer talks to; the libsql
//! backend is the durable production path and the in-memory backend is an
//! explicit configuration choice for local or demo runs, never a fallback
//! taken on connection failure.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Book, BookFields, NewUser, SearchField, User};

mod libsql;
mod memory;

pub use libsql::LibsqlStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> Result<i32>;
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Inserts into the active catalog, returning the generated id.
    async fn insert_book(&self, fields: BookFields, image: Option<String>) -> Result<i32>;
    async fn get_book(&self, id: i32) -> Result<Option<Book>>;
    async fn list_books(&self) -> Result<Vec<Book>>;
    /// Overwrites the five text fields; replaces the image reference only
    /// when one is supplied. Returns false when the id is not in the catalog.
    async fn update_book(&self, id: i32, fields: BookFields, image: Option<String>)
    -> Result<bool>;
    /// Delete by id, a no-op for absent ids.
    async fn delete_book(&self, id: i32) -> Result<()>;
    /// Case-insensitive substring match against the selected field, or any
    /// of the five fields for `SearchField::All`.
    async fn search_books(&self, field: SearchField, query: &str) -> Result<Vec<Book>>;

    async fn list_archived(&self) -> Result<Vec<Book>>;
    /// Moves a book from the catalog to the archive, preserving its id and
    /// fields. The move is atomic: the book is never observable in both
    /// collections. Returns false when the id is not in the catalog.
    async fn archive_book(&self, id: i32) -> Result<bool>;
    /// Inverse of `archive_book`.
    async fn unarchive_book(&self, id: i32) -> Result<bool>;
}
