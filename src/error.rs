use crate::model::Role;

/// Failures surfaced by the catalog workflow. Every variant is recovered at
/// the HTTP boundary into a user-visible notice plus a redirect to a safe
/// view; none of them crash the request.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("you must log in first")]
    Unauthenticated,
    #[error("access denied: insufficient permissions")]
    Forbidden { actor: Role },
    #[error("{0}")]
    Validation(String),
    #[error("username already exists")]
    DuplicateUsername(String),
    #[error("book not found")]
    NotFound(i32),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("storage error")]
    Store(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn validation(msg: &str) -> Self {
        WorkflowError::Validation(msg.to_string())
    }
}
