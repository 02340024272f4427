use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use tokio::sync::Mutex;

use super::Store;
use crate::model::{Book, BookFields, NewUser, Role, SearchField, User};

const SYSTEM_MIGRATIONS: &[(&str, &str)] = &[(
    "system/000_migrations_table.sql",
    include_str!("../migrations/system/000_migrations_table.sql"),
)];

const MIGRATIONS: &[(&str, &str)] =
    &[("001_schema.sql", include_str!("../migrations/001_schema.sql"))];

/// Durable backend over a local libsql database. Multi-statement moves run
/// under `tx_lock` because the connection is shared and libsql transactions
/// are connection-scoped.
pub struct LibsqlStore {
    _db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
}

impl LibsqlStore {
    pub async fn new(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }
        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(LibsqlStore {
            _db: db,
            conn,
            tx_lock: Mutex::new(()),
        })
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        let record = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(record, libsql::params![name]).await?;
        Ok(())
    }

    fn row_to_user(row: &libsql::Row) -> Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role: Role::from_str_or_default(&row.get::<String>(3)?),
            password_hash: row.get(4)?,
        })
    }

    fn row_to_book(row: &libsql::Row) -> Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            category: row.get(4)?,
            subcategory: row.get(5)?,
            image: row.get::<Option<String>>(6)?,
        })
    }

    async fn collect_books(&self, query: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Book>> {
        let mut rows = self.conn.query(query, params).await?;
        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(Self::row_to_book(&row)?);
        }
        Ok(books)
    }

    /// Moves one row between the two book tables inside a transaction, so a
    /// crash or a concurrent move never leaves the book in both or neither.
    async fn move_book(&self, from: &str, to: &str, id: i32) -> Result<bool> {
        let _guard = self.tx_lock.lock().await;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            let copy = format!(
                "INSERT INTO {to} (id, title, author, year, category, subcategory, image)
                 SELECT id, title, author, year, category, subcategory, image FROM {from} WHERE id = ?"
            );
            let copied = self.conn.execute(&copy, libsql::params![id]).await?;
            if copied == 0 {
                return Ok::<bool, anyhow::Error>(false);
            }
            self.conn
                .execute(&format!("DELETE FROM {from} WHERE id = ?"), libsql::params![id])
                .await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(moved) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(moved)
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }
}

const BOOK_COLUMNS: &str = "id, title, author, year, category, subcategory, image";

#[async_trait]
impl Store for LibsqlStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = "SELECT id, username, email, role, password_hash FROM users WHERE username = ?";
        let mut rows = self.conn.query(query, libsql::params![username]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_user(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn insert_user(&self, user: NewUser) -> Result<i32> {
        let query = r#"
            INSERT INTO users (username, email, role, password_hash)
            VALUES (?, ?, ?, ?)
            RETURNING id
        "#;
        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![user.username, user.email, user.role.as_str(), user.password_hash],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            anyhow::bail!("failed to insert user")
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let query = "SELECT id, username, email, role, password_hash FROM users ORDER BY id";
        let mut rows = self.conn.query(query, ()).await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::row_to_user(&row)?);
        }
        Ok(users)
    }

    async fn insert_book(&self, fields: BookFields, image: Option<String>) -> Result<i32> {
        let query = r#"
            INSERT INTO books (title, author, year, category, subcategory, image)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#;
        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![
                    fields.title,
                    fields.author,
                    fields.year,
                    fields.category,
                    fields.subcategory,
                    image
                ],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            anyhow::bail!("failed to insert book")
        }
    }

    async fn get_book(&self, id: i32) -> Result<Option<Book>> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_book(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        self.collect_books(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"), ())
            .await
    }

    async fn update_book(
        &self,
        id: i32,
        fields: BookFields,
        image: Option<String>,
    ) -> Result<bool> {
        let affected = if let Some(image) = image {
            let query = r#"
                UPDATE books
                SET title = ?, author = ?, year = ?, category = ?, subcategory = ?, image = ?
                WHERE id = ?
            "#;
            self.conn
                .execute(
                    query,
                    libsql::params![
                        fields.title,
                        fields.author,
                        fields.year,
                        fields.category,
                        fields.subcategory,
                        image,
                        id
                    ],
                )
                .await?
        } else {
            let query = r#"
                UPDATE books
                SET title = ?, author = ?, year = ?, category = ?, subcategory = ?
                WHERE id = ?
            "#;
            self.conn
                .execute(
                    query,
                    libsql::params![
                        fields.title,
                        fields.author,
                        fields.year,
                        fields.category,
                        fields.subcategory,
                        id
                    ],
                )
                .await?
        };
        Ok(affected > 0)
    }

    async fn delete_book(&self, id: i32) -> Result<()> {
        self.conn
            .execute("DELETE FROM books WHERE id = ?", libsql::params![id])
            .await?;
        Ok(())
    }

    async fn search_books(&self, field: SearchField, query: &str) -> Result<Vec<Book>> {
        if query.is_empty() {
            return self.list_books().await;
        }

        // LIKE is case-insensitive for ASCII, matching the in-memory backend.
        let pattern = format!("%{}%", query);
        let column = match field {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Year => "year",
            SearchField::Category => "category",
            SearchField::Subcategory => "subcategory",
            SearchField::All => {
                let sql = format!(
                    "SELECT {BOOK_COLUMNS} FROM books
                     WHERE title LIKE ? OR author LIKE ? OR year LIKE ?
                        OR category LIKE ? OR subcategory LIKE ?
                     ORDER BY id"
                );
                return self
                    .collect_books(
                        &sql,
                        (
                            pattern.clone(),
                            pattern.clone(),
                            pattern.clone(),
                            pattern.clone(),
                            pattern,
                        ),
                    )
                    .await;
            }
        };

        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE {column} LIKE ? ORDER BY id");
        self.collect_books(&sql, libsql::params![pattern]).await
    }

    async fn list_archived(&self) -> Result<Vec<Book>> {
        self.collect_books(
            &format!("SELECT {BOOK_COLUMNS} FROM archived_books ORDER BY id"),
            (),
        )
        .await
    }

    async fn archive_book(&self, id: i32) -> Result<bool> {
        self.move_book("books", "archived_books", id).await
    }

    async fn unarchive_book(&self, id: i32) -> Result<bool> {
        self.move_book("archived_books", "books", id).await
    }
}
