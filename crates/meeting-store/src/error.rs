use thiserror::Error;

/// Errors produced by an [`crate::EntityStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("entity not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for meeting_core::MeetingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => {
                meeting_core::MeetingError::NotFound(format!("{kind} {id}"))
            }
            other => meeting_core::MeetingError::PersistenceFailed(other.to_string()),
        }
    }
}
