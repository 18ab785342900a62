use thiserror::Error;

use crate::auth::error::AuthError;

/// Errors from the Ring REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Transport failures, rate limiting and server errors are worth another
    /// attempt; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ApiError::Http { .. } => true,
            ApiError::Auth(_) | ApiError::Decode { .. } => false,
        }
    }

    /// Authentication failures end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth(e) if e.is_fatal())
    }
}
