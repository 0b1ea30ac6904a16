//! Error types for the turn pipeline.

use augur_core::error::AugurError;

/// Errors from the session orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("turn processing is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("probe not found: {0}")]
    ProbeNotFound(String),
    #[error("probe already committed: {0}")]
    ProbeAlreadyCommitted(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("narrator error: {0}")]
    NarratorError(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<AugurError> for ChatError {
    fn from(err: AugurError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::ParseError(err.to_string())
    }
}
