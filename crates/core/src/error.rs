use thiserror::Error;

use crate::backend::Table;

pub type RewardsResult<T> = Result<T, RewardsError>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum RewardsError {
    /// Rejected before any backend call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RewardsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RewardsError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RewardsError::Validation(_))
    }
}

/// Structured error returned by every data-access call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{table}: row {id} not found")]
    RowNotFound { table: Table, id: String },

    #[error("{table}: unique constraint violated on {column}")]
    UniqueViolation { table: Table, column: &'static str },

    #[error("{table}: write conflict: {reason}")]
    Conflict { table: Table, reason: String },

    #[error("{table}: backend unavailable: {reason}")]
    Unavailable { table: Table, reason: String },
}

impl BackendError {
    pub fn not_found(table: Table, id: impl ToString) -> Self {
        BackendError::RowNotFound {
            table,
            id: id.to_string(),
        }
    }

    pub fn table(&self) -> Table {
        match self {
            BackendError::RowNotFound { table, .. }
            | BackendError::UniqueViolation { table, .. }
            | BackendError::Conflict { table, .. }
            | BackendError::Unavailable { table, .. } => *table,
        }
    }
}
