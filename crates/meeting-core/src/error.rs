use thiserror::Error;

/// The error taxonomy shared by every crate in the workspace, so a future
/// boundary layer can map one enum to HTTP/WS without reaching into each
/// crate's internals.
#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error ({status}): {detail}")]
    ProviderError { status: u16, detail: String },

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl MeetingError {
    /// Stable short code — a future HTTP/WS boundary maps these to status
    /// codes or error frames without this crate knowing about either.
    pub fn code(&self) -> &'static str {
        match self {
            MeetingError::Validation(_) => "VALIDATION",
            MeetingError::NotFound(_) => "NOT_FOUND",
            MeetingError::StateConflict(_) => "STATE_CONFLICT",
            MeetingError::AuthFailed(_) => "AUTH_FAILED",
            MeetingError::RateLimited { .. } => "RATE_LIMITED",
            MeetingError::Network(_) => "NETWORK",
            MeetingError::ProviderError { .. } => "PROVIDER_ERROR",
            MeetingError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            MeetingError::Cancelled => "CANCELLED",
            MeetingError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether retrying the operation that produced this error, unmodified,
    /// is expected to eventually succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MeetingError::Network(_) | MeetingError::RateLimited { .. } => true,
            MeetingError::ProviderError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeetingError>;
