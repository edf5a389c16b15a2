//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Loading the transaction page or category statistics failed
    #[error("Failed to load transactions: {0}")]
    Fetch(String),

    /// A category update or delete was rejected by the backend
    #[error("Failed to {action}: {message}")]
    Mutation {
        action: &'static str,
        message: String,
    },

    /// Replaying the inverse of an undoable action failed
    #[error("Failed to undo {action}: {message}")]
    Restore {
        action: &'static str,
        message: String,
    },

    #[error("An undo is already in progress")]
    UndoInProgress,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
