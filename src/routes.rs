use axum::{
    Router,
    routing::{get, post},
};

use crate::handler::{self, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::home))
        .route("/health", get(handler::healthcheck))
        .route("/login", get(handler::login_form))
        .route("/login", post(handler::login_submit))
        .route("/logout", get(handler::logout))
        .route("/dashboard", get(handler::dashboard))
        .route("/add", get(handler::add_user_form))
        .route("/add", post(handler::add_user_submit))
        .route("/show", get(handler::show_users))
        .route("/add_book", get(handler::add_book_form))
        .route("/add_book", post(handler::add_book_submit))
        .route("/show_books", get(handler::show_books))
        .route("/edit_book/:book_id", get(handler::edit_book_form))
        .route("/edit_book/:book_id", post(handler::edit_book_submit))
        .route("/delete_book/:book_id", get(handler::delete_book))
        .route("/archive_book/:book_id", get(handler::archive_book))
        .route("/archived_books", get(handler::archived_books))
        .route("/unarchive_book/:book_id", get(handler::unarchive_book))
        .route("/search_books", get(handler::search_books))
}
