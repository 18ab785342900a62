use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while obtaining or refreshing account credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The account demands a one-time code before it will issue a token.
    #[error("Two-factor authentication required")]
    TwoFactorRequired,

    #[error("Two-factor authentication failed: {0}")]
    TwoFactorFailed(String),

    #[error("Failed login: {0}")]
    FailedLogin(String),

    #[error("Invalid authentication token: {0}")]
    InvalidToken(String),

    #[error("API error (HTTP {code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Failed to write token cache {path}: {source}")]
    TokenCache {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Whether this error must end the run. A second-factor challenge and a
    /// rejected token are handled inside the session manager.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AuthError::TwoFactorRequired | AuthError::InvalidToken(_))
    }
}
