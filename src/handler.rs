use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::auth::authorize;
use crate::error::WorkflowError;
use crate::model::BookFields;
use crate::pages;
use crate::session::SessionManager;
use crate::uploads::ImageStore;
use crate::workflow::{self, Catalog};

pub const SESSION_COOKIE: &str = "arkiv_session";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionManager>,
    pub images: Arc<ImageStore>,
}

#[derive(Debug, Deserialize)]
pub struct NoticeParams {
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub filter_by: Option<String>,
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AddUserForm {
    pub username: String,
    pub email: String,
    pub role: String,
    pub password: String,
}

/// Resolves the request's session cookie, once, into an immutable session
/// value. Handlers pass the result down by parameter.
fn current_session(state: &AppState, headers: &HeaderMap) -> Option<crate::model::Session> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let value = cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })?;
    state.sessions.resolve(value)
}

fn cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn redirect_with_notice(path: &str, notice: &str) -> Response {
    Redirect::to(&format!("{}?notice={}", path, urlencoding::encode(notice))).into_response()
}

/// Boundary recovery: every workflow failure becomes a notice plus a
/// redirect to a safe view. `back` is where recoverable input errors land.
fn recover(err: WorkflowError, back: &str) -> Response {
    match &err {
        WorkflowError::Unauthenticated => redirect_with_notice("/login", &err.to_string()),
        WorkflowError::Forbidden { actor } => {
            tracing::info!(role = actor.as_str(), "request denied by role gate");
            redirect_with_notice("/dashboard", &err.to_string())
        }
        WorkflowError::Validation(_)
        | WorkflowError::DuplicateUsername(_)
        | WorkflowError::NotFound(_)
        | WorkflowError::InvalidCredentials => redirect_with_notice(back, &err.to_string()),
        WorkflowError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn home() -> Redirect {
    Redirect::to("/login")
}

pub async fn login_form(Query(params): Query<NoticeParams>) -> impl IntoResponse {
    pages::login(params.notice.as_deref())
}

pub async fn login_submit(
    State(state): State<AppState>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    match state.catalog.login(&form.username, &form.password).await {
        Ok(session) => {
            tracing::info!(username = %session.username, role = session.role.as_str(), "login");
            let cookie = state.sessions.issue(session);
            (
                [(
                    header::SET_COOKIE,
                    format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, cookie),
                )],
                Redirect::to("/dashboard"),
            )
                .into_response()
        }
        Err(e) => recover(e, "/login"),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(value) = cookie_value(&headers) {
        state.sessions.destroy(&value);
    }
    (
        [(
            header::SET_COOKIE,
            format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE),
        )],
        Redirect::to("/login"),
    )
        .into_response()
}

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NoticeParams>,
) -> Response {
    match current_session(&state, &headers) {
        Some(session) => pages::dashboard(&session, params.notice.as_deref()).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

pub async fn add_user_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NoticeParams>,
) -> Response {
    let session = current_session(&state, &headers);
    match authorize(session.as_ref(), workflow::ADMIN_ONLY) {
        Ok(()) => pages::add_user(params.notice.as_deref()).into_response(),
        Err(e) => recover(e, "/dashboard"),
    }
}

pub async fn add_user_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Form(form): axum::Form<AddUserForm>,
) -> Response {
    let session = current_session(&state, &headers);
    match state
        .catalog
        .create_user(session.as_ref(), &form.username, &form.email, &form.role, &form.password)
        .await
    {
        Ok(_) => redirect_with_notice("/dashboard", "User added successfully"),
        Err(e) => recover(e, "/add"),
    }
}

pub async fn show_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.list_users(session.as_ref()).await {
        Ok(users) => Json(serde_json::json!({ "users": users })).into_response(),
        Err(e) => recover(e, "/dashboard"),
    }
}

/// Pulls the five text fields and the optional image out of a multipart
/// form. Disallowed image extensions come back as None from the image store
/// and the book is saved without a cover.
async fn read_book_form(
    images: &ImageStore,
    mut multipart: Multipart,
) -> (BookFields, Option<String>) {
    let mut fields = BookFields::default();
    let mut image = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => fields.title = field.text().await.unwrap_or_default(),
            "author" => fields.author = field.text().await.unwrap_or_default(),
            "year" => fields.year = field.text().await.unwrap_or_default(),
            "category" => fields.category = field.text().await.unwrap_or_default(),
            "subcategory" => fields.subcategory = field.text().await.unwrap_or_default(),
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    continue;
                }
                let data = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read image upload");
                        continue;
                    }
                };
                match images.save(&filename, &data).await {
                    Ok(stored) => image = stored,
                    Err(e) => tracing::error!(error = %e, "failed to store image upload"),
                }
            }
            _ => {}
        }
    }

    (fields, image)
}

/// A cover stored for a workflow call that then failed would otherwise sit
/// orphaned in the public uploads directory.
async fn discard_upload(images: &ImageStore, stored: Option<String>) {
    if let Some(name) = stored {
        if let Err(e) = images.remove(&name).await {
            tracing::error!(error = %e, "failed to remove orphaned upload");
        }
    }
}

pub async fn add_book_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NoticeParams>,
) -> Response {
    let session = current_session(&state, &headers);
    match authorize(session.as_ref(), workflow::BOOK_EDITORS) {
        Ok(()) => pages::add_book(params.notice.as_deref()).into_response(),
        Err(e) => recover(e, "/dashboard"),
    }
}

pub async fn add_book_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let session = current_session(&state, &headers);
    // Gate before consuming the upload.
    if let Err(e) = authorize(session.as_ref(), workflow::BOOK_EDITORS) {
        return recover(e, "/dashboard");
    }

    let (fields, image) = read_book_form(&state.images, multipart).await;
    let stored = image.clone();
    match state.catalog.create_book(session.as_ref(), fields, image).await {
        Ok(_) => redirect_with_notice("/show_books", "Book added successfully"),
        Err(e) => {
            discard_upload(&state.images, stored).await;
            recover(e, "/add_book")
        }
    }
}

pub async fn show_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NoticeParams>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.list_books(session.as_ref()).await {
        Ok(books) => {
            let role = session.map(|s| s.role).unwrap_or(crate::model::Role::Viewer);
            pages::books(&books, role, params.notice.as_deref()).into_response()
        }
        Err(e) => recover(e, "/dashboard"),
    }
}

pub async fn edit_book_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i32>,
    Query(params): Query<NoticeParams>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.get_book(session.as_ref(), book_id).await {
        Ok(book) => pages::edit_book(&book, params.notice.as_deref()).into_response(),
        Err(e) => recover(e, "/show_books"),
    }
}

pub async fn edit_book_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i32>,
    multipart: Multipart,
) -> Response {
    let session = current_session(&state, &headers);
    if let Err(e) = authorize(session.as_ref(), workflow::BOOK_EDITORS) {
        return recover(e, "/dashboard");
    }

    let (fields, image) = read_book_form(&state.images, multipart).await;
    let stored = image.clone();
    match state
        .catalog
        .update_book(session.as_ref(), book_id, fields, image)
        .await
    {
        Ok(()) => redirect_with_notice("/show_books", "Book updated successfully"),
        Err(e) => {
            discard_upload(&state.images, stored).await;
            recover(e, "/show_books")
        }
    }
}

pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i32>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.delete_book(session.as_ref(), book_id).await {
        Ok(()) => redirect_with_notice("/show_books", "Book deleted successfully"),
        Err(e) => recover(e, "/show_books"),
    }
}

pub async fn archive_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i32>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.archive_book(session.as_ref(), book_id).await {
        Ok(()) => redirect_with_notice("/archived_books", "Book archived successfully"),
        Err(e) => recover(e, "/show_books"),
    }
}

pub async fn archived_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NoticeParams>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.list_archived(session.as_ref()).await {
        Ok(books) => {
            let role = session.map(|s| s.role).unwrap_or(crate::model::Role::Viewer);
            pages::archived_books(&books, role, params.notice.as_deref()).into_response()
        }
        Err(e) => recover(e, "/dashboard"),
    }
}

pub async fn unarchive_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i32>,
) -> Response {
    let session = current_session(&state, &headers);
    match state.catalog.unarchive_book(session.as_ref(), book_id).await {
        Ok(()) => redirect_with_notice("/show_books", "Book unarchived successfully"),
        Err(e) => recover(e, "/archived_books"),
    }
}

pub async fn search_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let session = current_session(&state, &headers);
    let query = params.query.unwrap_or_default();
    let filter_by = params.filter_by.unwrap_or_else(|| "all".to_string());

    match state
        .catalog
        .search_books(session.as_ref(), &query, &filter_by)
        .await
    {
        Ok(books) => {
            let role = session.map(|s| s.role).unwrap_or(crate::model::Role::Viewer);
            pages::books(&books, role, params.notice.as_deref()).into_response()
        }
        Err(e) => recover(e, "/dashboard"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, Session};
    use crate::routes;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "xYzZY";

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState {
            catalog: Arc::new(Catalog::new(Arc::new(MemoryStore::new()))),
            sessions: Arc::new(SessionManager::new("test-secret")),
            images: Arc::new(ImageStore::new(dir).unwrap()),
        }
    }

    fn editor_cookie(state: &AppState) -> String {
        let cookie = state.sessions.issue(Session {
            username: "ed".to_string(),
            role: Role::Editor,
        });
        format!("{}={}", SESSION_COOKIE, cookie)
    }

    fn text_part(name: &str, value: &str) -> String {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
    }

    fn book_form_body(title: &str) -> Vec<u8> {
        let mut body = String::new();
        body.push_str(&text_part("title", title));
        body.push_str(&text_part("author", "Frank Herbert"));
        body.push_str(&text_part("year", "1965"));
        body.push_str(&text_part("category", "fiction"));
        body.push_str(&text_part("subcategory", "scifi"));
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n"
        ));
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body.into_bytes()
    }

    async fn post_book_form(state: AppState, uri: &str, title: &str) -> Response {
        let cookie = editor_cookie(&state);
        let app = routes::routes().with_state(state);
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(book_form_body(title)))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn rejected_create_leaves_no_orphaned_upload() {
        let dir = tempfile::tempdir().unwrap();
        let response = post_book_form(test_state(dir.path()), "/add_book", "").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/add_book"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn successful_create_keeps_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let response = post_book_form(test_state(dir.path()), "/add_book", "Dune").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_book_discards_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let response = post_book_form(test_state(dir.path()), "/edit_book/99", "Dune").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
