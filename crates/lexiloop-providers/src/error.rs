//! Provider error types.

use thiserror::Error;

/// Errors that can occur when calling a story generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The API answered but produced no story text.
    #[error("empty story returned by {0}")]
    EmptyStory(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Map an HTTP error status (>= 400) and body to a provider error.
pub(crate) fn classify_status(
    status: u16,
    retry_after_secs: Option<u64>,
    model: &str,
    body: String,
) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after_secs.unwrap_or(5).saturating_mul(1000),
        },
        401 | 403 => ProviderError::AuthenticationFailed(body),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status,
            message: body,
        },
    }
}
