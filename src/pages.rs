//! Minimal server-rendered pages. These stay deliberately plain; the admin
//! tool needs forms and tables, not a frontend stack.

use axum::response::Html;

use crate::model::{Book, Role, Session};

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn notice_banner(notice: Option<&str>) -> String {
    match notice {
        Some(msg) if !msg.is_empty() => format!("<p class=\"notice\">{}</p>", escape(msg)),
        _ => String::new(),
    }
}

fn page(title: &str, notice: Option<&str>, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html>
    <head><title>{} - arkiv</title></head>
    <body>
        <h1>{}</h1>
        {}
        {}
    </body>
</html>"#,
        escape(title),
        escape(title),
        notice_banner(notice),
        body,
    ))
}

pub fn login(notice: Option<&str>) -> Html<String> {
    page(
        "Log in",
        notice,
        r#"<form action="/login" method="post">
            <label>Username <input type="text" name="username"></label>
            <label>Password <input type="password" name="password"></label>
            <input type="submit" value="Log in">
        </form>"#,
    )
}

pub fn dashboard(session: &Session, notice: Option<&str>) -> Html<String> {
    let body = format!(
        r#"<p>Signed in as <strong>{}</strong> ({})</p>
        <ul>
            <li><a href="/show_books">Books</a></li>
            <li><a href="/add_book">Add book</a></li>
            <li><a href="/archived_books">Archive</a></li>
            <li><a href="/add">Add user</a></li>
            <li><a href="/logout">Log out</a></li>
        </ul>"#,
        escape(&session.username),
        session.role.as_str(),
    );
    page("Dashboard", notice, &body)
}

pub fn add_user(notice: Option<&str>) -> Html<String> {
    page(
        "Add user",
        notice,
        r#"<form action="/add" method="post">
            <label>Username <input type="text" name="username"></label>
            <label>Email <input type="text" name="email"></label>
            <label>Role
                <select name="role">
                    <option value="admin">admin</option>
                    <option value="editor">editor</option>
                    <option value="archiver">archiver</option>
                    <option value="viewer">viewer</option>
                </select>
            </label>
            <label>Password <input type="password" name="password"></label>
            <input type="submit" value="Add user">
        </form>"#,
    )
}

fn book_form(action: &str, book: Option<&Book>) -> String {
    let field = |name: &str, value: &str| {
        format!(
            r#"<label>{} <input type="text" name="{}" value="{}"></label>"#,
            name, name, escape(value)
        )
    };
    let empty = String::new();
    let (title, author, year, category, subcategory) = match book {
        Some(b) => (&b.title, &b.author, &b.year, &b.category, &b.subcategory),
        None => (&empty, &empty, &empty, &empty, &empty),
    };
    format!(
        r#"<form action="{}" method="post" enctype="multipart/form-data">
            {}
            {}
            {}
            {}
            {}
            <label>Cover image <input type="file" name="image"></label>
            <input type="submit" value="Save">
        </form>"#,
        action,
        field("title", title),
        field("author", author),
        field("year", year),
        field("category", category),
        field("subcategory", subcategory),
    )
}

pub fn add_book(notice: Option<&str>) -> Html<String> {
    page("Add book", notice, &book_form("/add_book", None))
}

pub fn edit_book(book: &Book, notice: Option<&str>) -> Html<String> {
    page(
        "Edit book",
        notice,
        &book_form(&format!("/edit_book/{}", book.id), Some(book)),
    )
}

fn book_rows(books: &[Book], role: Role, archived: bool) -> String {
    let mut rows = String::new();
    for book in books {
        let cover = match &book.image {
            Some(name) => format!(r#"<img src="/static/uploads/{}" width="48">"#, escape(name)),
            None => String::new(),
        };
        let mut actions = String::new();
        if archived {
            if matches!(role, Role::Admin | Role::Archiver) {
                actions.push_str(&format!(r#"<a href="/unarchive_book/{}">unarchive</a>"#, book.id));
            }
        } else {
            if matches!(role, Role::Admin | Role::Editor) {
                actions.push_str(&format!(
                    r#"<a href="/edit_book/{id}">edit</a> <a href="/delete_book/{id}">delete</a> "#,
                    id = book.id
                ));
            }
            if matches!(role, Role::Admin | Role::Archiver) {
                actions.push_str(&format!(r#"<a href="/archive_book/{}">archive</a>"#, book.id));
            }
        }
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            cover,
            escape(&book.title),
            escape(&book.author),
            escape(&book.year),
            escape(&book.category),
            escape(&book.subcategory),
            actions,
        ));
    }
    rows
}

fn book_table(books: &[Book], role: Role, archived: bool) -> String {
    format!(
        r#"<table>
            <tr><th></th><th>Title</th><th>Author</th><th>Year</th><th>Category</th><th>Subcategory</th><th></th></tr>
            {}
        </table>
        <p><a href="/dashboard">Back to dashboard</a></p>"#,
        book_rows(books, role, archived),
    )
}

const SEARCH_FORM: &str = r#"<form action="/search_books" method="get">
    <input type="text" name="query">
    <select name="filter_by">
        <option value="all">all</option>
        <option value="title">title</option>
        <option value="author">author</option>
        <option value="year">year</option>
        <option value="category">category</option>
        <option value="subcategory">subcategory</option>
    </select>
    <input type="submit" value="Search">
</form>"#;

pub fn books(books: &[Book], role: Role, notice: Option<&str>) -> Html<String> {
    let body = format!("{}\n{}", SEARCH_FORM, book_table(books, role, false));
    page("Books", notice, &body)
}

pub fn archived_books(books: &[Book], role: Role, notice: Option<&str>) -> Html<String> {
    page("Archived books", notice, &book_table(books, role, true))
}
