use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::Store;
use crate::model::{Book, BookFields, NewUser, SearchField, User};

#[derive(Default)]
struct Inner {
    users: HashMap<i32, User>,
    books: HashMap<i32, Book>,
    archived: HashMap<i32, Book>,
    next_user_id: i32,
    // Shared across books and archived so an id is never reissued while the
    // book that owns it sits in the archive.
    next_book_id: i32,
}

/// Non-durable backend for local and demo runs. Everything lives in one
/// mutex, so the archive/unarchive move is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(book: &Book, field: SearchField, needle: &str) -> bool {
    let contains = |hay: &str| hay.to_lowercase().contains(needle);
    match field {
        SearchField::Title => contains(&book.title),
        SearchField::Author => contains(&book.author),
        SearchField::Year => contains(&book.year),
        SearchField::Category => contains(&book.category),
        SearchField::Subcategory => contains(&book.subcategory),
        SearchField::All => {
            contains(&book.title)
                || contains(&book.author)
                || contains(&book.year)
                || contains(&book.category)
                || contains(&book.subcategory)
        }
    }
}

fn sorted(books: impl Iterator<Item = Book>) -> Vec<Book> {
    let mut out: Vec<Book> = books.collect();
    out.sort_by_key(|b| b.id);
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<i32> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users.insert(
            id,
            User {
                id,
                username: user.username,
                email: user.email,
                role: user.role,
                password_hash: user.password_hash,
            },
        );
        Ok(id)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert_book(&self, fields: BookFields, image: Option<String>) -> Result<i32> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.next_book_id += 1;
        let id = inner.next_book_id;
        inner.books.insert(
            id,
            Book {
                id,
                title: fields.title,
                author: fields.author,
                year: fields.year,
                category: fields.category,
                subcategory: fields.subcategory,
                image,
            },
        );
        Ok(id)
    }

    async fn get_book(&self, id: i32) -> Result<Option<Book>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.books.get(&id).cloned())
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(sorted(inner.books.values().cloned()))
    }

    async fn update_book(
        &self,
        id: i32,
        fields: BookFields,
        image: Option<String>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Some(book) = inner.books.get_mut(&id) else {
            return Ok(false);
        };
        book.title = fields.title;
        book.author = fields.author;
        book.year = fields.year;
        book.category = fields.category;
        book.subcategory = fields.subcategory;
        if image.is_some() {
            book.image = image;
        }
        Ok(true)
    }

    async fn delete_book(&self, id: i32) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.books.remove(&id);
        Ok(())
    }

    async fn search_books(&self, field: SearchField, query: &str) -> Result<Vec<Book>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        if query.is_empty() {
            return Ok(sorted(inner.books.values().cloned()));
        }
        let needle = query.to_lowercase();
        Ok(sorted(
            inner
                .books
                .values()
                .filter(|b| matches(b, field, &needle))
                .cloned(),
        ))
    }

    async fn list_archived(&self) -> Result<Vec<Book>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(sorted(inner.archived.values().cloned()))
    }

    async fn archive_book(&self, id: i32) -> Result<bool> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Some(book) = inner.books.remove(&id) else {
            return Ok(false);
        };
        inner.archived.insert(id, book);
        Ok(true)
    }

    async fn unarchive_book(&self, id: i32) -> Result<bool> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Some(book) = inner.archived.remove(&id) else {
            return Ok(false);
        };
        inner.books.insert(id, book);
        Ok(true)
    }
}
