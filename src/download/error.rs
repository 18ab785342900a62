use std::path::PathBuf;

use thiserror::Error;

use crate::ring::error::ApiError;

/// Why a single recording could not be saved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Disk error writing {path}: {source}")]
    Disk {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not set capture time on {path}: {source}")]
    Timestamp {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn disk(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Disk {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Only a failed login ends the run; anything else stays local to the
    /// event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Api(e) if e.is_fatal())
    }
}
