use thiserror::Error;

/// Errors a [`crate::ModelAdapter`] can fail with.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimitError { retry_after_ms: u64 },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("provider error ({status}): {detail}")]
    ProviderError { status: u16, detail: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// `AuthError` and `ProviderError(4xx except 429)` are non-retryable;
    /// `NetworkError`, `RateLimitError`, and `ProviderError(5xx)` are
    /// retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::AuthError(_) | ProviderError::Cancelled => false,
            ProviderError::NetworkError(_) | ProviderError::RateLimitError { .. } => true,
            ProviderError::ProviderError { status, .. } => *status >= 500,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::NetworkError(e.to_string())
    }
}

impl From<ProviderError> for meeting_core::MeetingError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::AuthError(msg) => meeting_core::MeetingError::AuthFailed(msg),
            ProviderError::RateLimitError { retry_after_ms } => {
                meeting_core::MeetingError::RateLimited { retry_after_ms }
            }
            ProviderError::NetworkError(msg) => meeting_core::MeetingError::Network(msg),
            ProviderError::ProviderError { status, detail } => {
                meeting_core::MeetingError::ProviderError { status, detail }
            }
            ProviderError::Cancelled => meeting_core::MeetingError::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
