//! Error types for the agenda reconciliation engine.

use thiserror::Error;

/// Errors that can occur while reconciling an agenda.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    /// A unique constraint rejected an insert.
    #[error("Conflicting row in '{0}'")]
    Conflict(String),

    #[error("Agenda source error: {0}")]
    Remote(String),

    #[error("Agenda source request timed out after {0}s")]
    RemoteTimeout(u64),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Invalid timestamp '{0}'. Expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),

    #[error("Integration instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict(_))
    }
}

/// Result type alias for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;
