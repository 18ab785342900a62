//! Recording fetcher: turns one history event into a file on disk.
//!
//! Only events whose recording is `ready` are transferred. Every other
//! status is a deterministic skip. Transfer failures are returned as
//! [`FetchOutcome::Failed`] and never escape as errors, so one bad event
//! cannot end the batch.

pub mod error;
pub mod file;
pub mod paths;

use std::path::Path;

pub use error::FetchError;

use crate::ring::{RecordingEvent, RecordingStatus, RingApi};

/// Result of a single fetch attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The recording is on disk with its mtime set to the capture time.
    Downloaded { bytes: u64 },
    /// The recording is not available yet; nothing was written.
    NotReady(RecordingStatus),
    Failed(FetchError),
}

pub struct RecordingFetcher<'a> {
    api: &'a dyn RingApi,
}

impl<'a> RecordingFetcher<'a> {
    pub fn new(api: &'a dyn RingApi) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, event: &RecordingEvent, destination: &Path) -> FetchOutcome {
        let status = event.status();
        if status != RecordingStatus::Ready {
            return FetchOutcome::NotReady(status);
        }

        match self.transfer(event, destination).await {
            Ok(bytes) => FetchOutcome::Downloaded { bytes },
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    async fn transfer(&self, event: &RecordingEvent, destination: &Path) -> Result<u64, FetchError> {
        let body = self.api.recording(&event.id).await?;
        let bytes = file::save_stream(body, destination).await?;

        let mtime_path = destination.to_path_buf();
        let captured = event.created_at;
        tokio::task::spawn_blocking(move || file::set_file_mtime(&mtime_path, &captured))
            .await
            .map_err(|e| FetchError::Timestamp {
                path: destination.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?
            .map_err(|source| FetchError::Timestamp {
                path: destination.to_path_buf(),
                source,
            })?;

        tracing::debug!("Saved {} bytes to {}", bytes, destination.display());
        Ok(bytes)
    }
}
