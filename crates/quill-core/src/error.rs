//! Error types for Quill

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuillError>;

#[derive(Error, Debug)]
pub enum QuillError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl QuillError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        QuillError::NotFound(format!("{} {}", entity, id))
    }
}
