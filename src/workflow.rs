//! The catalog workflow: every business operation behind its role gate.
//!
//! Each operation resolves to `authorize(actor, ALLOWED) -> store call(s)`.
//! The actor session is passed in by parameter; nothing here reads ambient
//! request state or mutates the session.

use std::sync::Arc;

use crate::auth::{self, authorize};
use crate::error::WorkflowError;
use crate::model::{Book, BookFields, NewUser, Role, SearchField, Session, UserView};
use crate::store::Store;

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const BOOK_EDITORS: &[Role] = &[Role::Admin, Role::Editor];
pub const ARCHIVERS: &[Role] = &[Role::Admin, Role::Archiver];
pub const CATALOG_READERS: &[Role] = &[Role::Admin, Role::Editor, Role::Archiver];
pub const SEARCHERS: &[Role] = &[Role::Admin, Role::Editor, Role::Archiver, Role::Viewer];

pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Catalog { store }
    }

    /// Credential check for the login route. Absent users and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, WorkflowError> {
        let username = username.trim();
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(WorkflowError::InvalidCredentials)?;

        if !auth::verify_password(&user.password_hash, password) {
            return Err(WorkflowError::InvalidCredentials);
        }

        Ok(Session {
            username: user.username,
            role: user.role,
        })
    }

    pub async fn create_user(
        &self,
        actor: Option<&Session>,
        username: &str,
        email: &str,
        role: &str,
        password: &str,
    ) -> Result<i32, WorkflowError> {
        authorize(actor, ADMIN_ONLY)?;

        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || role.is_empty() || password.is_empty() {
            return Err(WorkflowError::validation("all fields are required"));
        }
        let role = Role::from_str(role)
            .ok_or_else(|| WorkflowError::validation("unknown role"))?;

        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(WorkflowError::DuplicateUsername(username.to_string()));
        }

        let password_hash = auth::hash_password(password)?;
        let id = self
            .store
            .insert_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                role,
                password_hash,
            })
            .await?;

        tracing::info!(username, role = role.as_str(), "user created");
        Ok(id)
    }

    pub async fn list_users(&self, actor: Option<&Session>) -> Result<Vec<UserView>, WorkflowError> {
        authorize(actor, ADMIN_ONLY)?;
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// Creates a book in the active catalog. `image` is the stored blob
    /// name, already filtered by the image store; None means the book is
    /// recorded without a cover.
    pub async fn create_book(
        &self,
        actor: Option<&Session>,
        fields: BookFields,
        image: Option<String>,
    ) -> Result<i32, WorkflowError> {
        authorize(actor, BOOK_EDITORS)?;

        if fields.any_empty() {
            return Err(WorkflowError::validation("all fields are required"));
        }

        let id = self.store.insert_book(fields, image).await?;
        tracing::info!(book_id = id, "book created");
        Ok(id)
    }

    pub async fn list_books(&self, actor: Option<&Session>) -> Result<Vec<Book>, WorkflowError> {
        authorize(actor, CATALOG_READERS)?;
        Ok(self.store.list_books().await?)
    }

    pub async fn get_book(&self, actor: Option<&Session>, id: i32) -> Result<Book, WorkflowError> {
        authorize(actor, BOOK_EDITORS)?;
        self.store
            .get_book(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// Overwrites the five text fields unconditionally, empty values
    /// included; only creation validates non-emptiness. The image reference
    /// is replaced only when a new one was stored.
    pub async fn update_book(
        &self,
        actor: Option<&Session>,
        id: i32,
        fields: BookFields,
        image: Option<String>,
    ) -> Result<(), WorkflowError> {
        authorize(actor, BOOK_EDITORS)?;

        if !self.store.update_book(id, fields, image).await? {
            return Err(WorkflowError::NotFound(id));
        }
        tracing::info!(book_id = id, "book updated");
        Ok(())
    }

    /// Removes a book from the active catalog. Succeeds for absent ids;
    /// delete-by-id is idempotent.
    pub async fn delete_book(&self, actor: Option<&Session>, id: i32) -> Result<(), WorkflowError> {
        authorize(actor, BOOK_EDITORS)?;
        self.store.delete_book(id).await?;
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

    pub async fn archive_book(&self, actor: Option<&Session>, id: i32) -> Result<(), WorkflowError> {
        authorize(actor, ARCHIVERS)?;
        if !self.store.archive_book(id).await? {
            return Err(WorkflowError::NotFound(id));
        }
        tracing::info!(book_id = id, "book archived");
        Ok(())
    }

    pub async fn list_archived(&self, actor: Option<&Session>) -> Result<Vec<Book>, WorkflowError> {
        authorize(actor, ARCHIVERS)?;
        Ok(self.store.list_archived().await?)
    }

    pub async fn unarchive_book(
        &self,
        actor: Option<&Session>,
        id: i32,
    ) -> Result<(), WorkflowError> {
        authorize(actor, ARCHIVERS)?;
        if !self.store.unarchive_book(id).await? {
            return Err(WorkflowError::NotFound(id));
        }
        tracing::info!(book_id = id, "book restored to catalog");
        Ok(())
    }

    /// Case-insensitive substring search over the active catalog. An empty
    /// query returns the full listing regardless of the filter.
    pub async fn search_books(
        &self,
        actor: Option<&Session>,
        query: &str,
        filter_by: &str,
    ) -> Result<Vec<Book>, WorkflowError> {
        authorize(actor, SEARCHERS)?;
        let query = query.trim();
        let field = SearchField::from_query(filter_by);
        Ok(self.store.search_books(field, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    fn session(role: Role) -> Session {
        Session {
            username: format!("{}-user", role.as_str()),
            role,
        }
    }

    fn fields(title: &str) -> BookFields {
        BookFields {
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            year: "1965".to_string(),
            category: "fiction".to_string(),
            subcategory: "scifi".to_string(),
        }
    }

    async fn seed_book(catalog: &Catalog, title: &str) -> i32 {
        catalog
            .create_book(Some(&session(Role::Editor)), fields(title), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn every_operation_rejects_missing_sessions() {
        let c = catalog();
        assert!(matches!(
            c.create_user(None, "a", "a@x", "viewer", "pw").await,
            Err(WorkflowError::Unauthenticated)
        ));
        assert!(matches!(c.list_users(None).await, Err(WorkflowError::Unauthenticated)));
        assert!(matches!(
            c.create_book(None, fields("Dune"), None).await,
            Err(WorkflowError::Unauthenticated)
        ));
        assert!(matches!(c.list_books(None).await, Err(WorkflowError::Unauthenticated)));
        assert!(matches!(c.archive_book(None, 1).await, Err(WorkflowError::Unauthenticated)));
        assert!(matches!(
            c.search_books(None, "dune", "title").await,
            Err(WorkflowError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn role_gates_match_the_operation_matrix() {
        let c = catalog();
        let viewer = session(Role::Viewer);
        let archiver = session(Role::Archiver);
        let editor = session(Role::Editor);

        assert!(matches!(
            c.create_book(Some(&viewer), fields("Dune"), None).await,
            Err(WorkflowError::Forbidden { .. })
        ));
        assert!(matches!(
            c.list_users(Some(&editor)).await,
            Err(WorkflowError::Forbidden { .. })
        ));
        assert!(matches!(
            c.archive_book(Some(&editor), 1).await,
            Err(WorkflowError::Forbidden { .. })
        ));
        assert!(matches!(
            c.list_books(Some(&viewer)).await,
            Err(WorkflowError::Forbidden { .. })
        ));

        // Viewers may still search, archivers may still browse.
        assert!(c.search_books(Some(&viewer), "", "all").await.is_ok());
        assert!(c.list_books(Some(&archiver)).await.is_ok());
    }

    #[tokio::test]
    async fn create_user_then_login_round_trips() {
        let c = catalog();
        let admin = session(Role::Admin);
        c.create_user(Some(&admin), "kofi", "kofi@example.com", "editor", "hunter2")
            .await
            .unwrap();

        let s = c.login("kofi", "hunter2").await.unwrap();
        assert_eq!(s.username, "kofi");
        assert_eq!(s.role, Role::Editor);

        assert!(matches!(
            c.login("kofi", "wrong").await,
            Err(WorkflowError::InvalidCredentials)
        ));
        assert!(matches!(
            c.login("nobody", "hunter2").await,
            Err(WorkflowError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_and_store_unchanged() {
        let c = catalog();
        let admin = session(Role::Admin);
        c.create_user(Some(&admin), "kofi", "kofi@example.com", "editor", "pw")
            .await
            .unwrap();

        let err = c
            .create_user(Some(&admin), "kofi", "other@example.com", "viewer", "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateUsername(_)));

        let users = c.list_users(Some(&admin)).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "kofi@example.com");
        assert_eq!(users[0].role, Role::Editor);
    }

    #[tokio::test]
    async fn create_user_requires_all_fields() {
        let c = catalog();
        let admin = session(Role::Admin);
        for (u, e, r, p) in [
            ("", "a@x", "viewer", "pw"),
            ("a", "", "viewer", "pw"),
            ("a", "a@x", "", "pw"),
            ("a", "a@x", "viewer", ""),
        ] {
            assert!(matches!(
                c.create_user(Some(&admin), u, e, r, p).await,
                Err(WorkflowError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn user_listing_never_carries_password_material() {
        let c = catalog();
        let admin = session(Role::Admin);
        c.create_user(Some(&admin), "kofi", "kofi@example.com", "editor", "pw")
            .await
            .unwrap();

        let users = c.list_users(Some(&admin)).await.unwrap();
        let json = serde_json::to_string(&users).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[tokio::test]
    async fn create_book_validates_but_update_does_not() {
        let c = catalog();
        let editor = session(Role::Editor);

        let mut empty_title = fields("Dune");
        empty_title.title.clear();
        assert!(matches!(
            c.create_book(Some(&editor), empty_title, None).await,
            Err(WorkflowError::Validation(_))
        ));

        let id = seed_book(&c, "Dune").await;
        c.update_book(Some(&editor), id, BookFields::default(), None)
            .await
            .unwrap();
        let book = c.get_book(Some(&editor), id).await.unwrap();
        assert_eq!(book.title, "");
        assert_eq!(book.author, "");
    }

    #[tokio::test]
    async fn update_of_unknown_book_is_not_found() {
        let c = catalog();
        assert!(matches!(
            c.update_book(Some(&session(Role::Editor)), 99, fields("x"), None).await,
            Err(WorkflowError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn archive_round_trip_preserves_id_and_fields() {
        let c = catalog();
        let editor = session(Role::Editor);
        let archiver = session(Role::Archiver);

        let id = c
            .create_book(Some(&editor), fields("Dune"), Some("cover.png".to_string()))
            .await
            .unwrap();
        let before = c.get_book(Some(&editor), id).await.unwrap();

        c.archive_book(Some(&archiver), id).await.unwrap();

        // Never in both collections at once.
        assert!(c.list_books(Some(&editor)).await.unwrap().is_empty());
        let archived = c.list_archived(Some(&archiver)).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0], before);

        c.unarchive_book(Some(&archiver), id).await.unwrap();
        assert!(c.list_archived(Some(&archiver)).await.unwrap().is_empty());
        let restored = c.get_book(Some(&editor), id).await.unwrap();
        assert_eq!(restored, before);
    }

    #[tokio::test]
    async fn archive_of_unknown_id_leaves_both_stores_unchanged() {
        let c = catalog();
        let archiver = session(Role::Archiver);
        let id = seed_book(&c, "Dune").await;

        assert!(matches!(
            c.archive_book(Some(&archiver), id + 100).await,
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            c.unarchive_book(Some(&archiver), id).await,
            Err(WorkflowError::NotFound(_))
        ));

        assert_eq!(c.list_books(Some(&archiver)).await.unwrap().len(), 1);
        assert!(c.list_archived(Some(&archiver)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_book_is_idempotent() {
        let c = catalog();
        let editor = session(Role::Editor);
        let id = seed_book(&c, "Dune").await;

        c.delete_book(Some(&editor), id).await.unwrap();
        c.delete_book(Some(&editor), id).await.unwrap();
        assert!(c.list_books(Some(&editor)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_query_returns_the_full_catalog() {
        let c = catalog();
        seed_book(&c, "Dune").await;
        seed_book(&c, "Hyperion").await;

        let viewer = session(Role::Viewer);
        for filter in ["all", "title", "author", "no-such-filter"] {
            let hits = c.search_books(Some(&viewer), "", filter).await.unwrap();
            assert_eq!(hits.len(), 2);
        }
        // Whitespace-only queries behave like empty ones.
        let hits = c.search_books(Some(&viewer), "   ", "title").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn title_search_matches_case_insensitively() {
        let c = catalog();
        seed_book(&c, "Dune Messiah").await;
        seed_book(&c, "Hyperion").await;

        let viewer = session(Role::Viewer);
        let hits = c.search_books(Some(&viewer), "dune", "title").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Dune Messiah");

        // Archived books are not part of catalog search.
        let archiver = session(Role::Archiver);
        c.archive_book(Some(&archiver), hits[0].id).await.unwrap();
        let hits = c.search_books(Some(&viewer), "dune", "title").await.unwrap();
        assert!(hits.is_empty());
    }
}
