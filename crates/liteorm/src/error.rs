//! Error types for liteorm

use thiserror::Error;

/// Result type alias for liteorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for schema, statement and backup operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Invalid schema declaration (unknown column type, duplicate primary key, bad identifier)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement execution error reported by SQLite
    #[error("Execution error: {0}")]
    Execution(#[from] rusqlite::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Misuse caught before any SQL is executed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backup or restore precondition failure
    #[error("Backup error: {0}")]
    Backup(String),

    /// Row or table not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File system error from the backup transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a backup error
    pub fn backup(message: impl Into<String>) -> Self {
        Self::Backup(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a decode error
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if SQLite rejected the statement because of a constraint
    /// (unique, primary key, check, not null, foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Execution(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}
