use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Archiver,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Archiver => "archiver",
            Role::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "archiver" => Some(Role::Archiver),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Stored roles that fail to parse fall back to archiver at login,
    /// the same default applied when the role column is empty.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Role::Archiver)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

/// The shape exposed by the user listing endpoint. The password hash never
/// leaves the store layer through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        UserView {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub year: String,
    pub category: String,
    pub subcategory: String,
    pub image: Option<String>,
}

/// The five text fields of a book, as submitted by the add/edit forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub year: String,
    pub category: String,
    pub subcategory: String,
}

impl BookFields {
    pub fn any_empty(&self) -> bool {
        self.title.is_empty()
            || self.author.is_empty()
            || self.year.is_empty()
            || self.category.is_empty()
            || self.subcategory.is_empty()
    }
}

/// Identity and role for one authenticated request sequence. Resolved once
/// per request and passed by parameter into the workflow layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    All,
    Title,
    Author,
    Year,
    Category,
    Subcategory,
}

impl SearchField {
    /// Unrecognized filter values search across all fields.
    pub fn from_query(s: &str) -> Self {
        match s {
            "title" => SearchField::Title,
            "author" => SearchField::Author,
            "year" => SearchField::Year,
            "category" => SearchField::Category,
            "subcategory" => SearchField::Subcategory,
            _ => SearchField::All,
        }
    }
}
