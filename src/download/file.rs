use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::FetchError;
use crate::ring::client::RecordingStream;

/// Sibling path the body is streamed into before it is renamed over the
/// destination.
fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream a recording body to `destination` using a `.part` file.
///
/// The destination only ever holds a complete body: an existing file is
/// replaced by the rename, and a failed transfer removes the `.part` file and
/// leaves the destination as it was. Returns the number of bytes written.
pub async fn save_stream(
    mut body: RecordingStream,
    destination: &Path,
) -> Result<u64, FetchError> {
    let part = part_path(destination);
    match write_part(&mut body, &part).await {
        Ok(bytes) => {
            if let Err(e) = fs::rename(&part, destination).await {
                let _ = fs::remove_file(&part).await;
                return Err(FetchError::disk(destination, e));
            }
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&part).await;
            Err(e)
        }
    }
}

async fn write_part(body: &mut RecordingStream, part: &Path) -> Result<u64, FetchError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part)
        .await
        .map_err(|e| FetchError::disk(part, e))?;

    let mut bytes_written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!(
                "Recording body failed after {} bytes for {}: {}",
                bytes_written,
                part.display(),
                e
            );
            FetchError::Api(e)
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::disk(part, e))?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| FetchError::disk(part, e))?;
    file.sync_all().await.map_err(|e| FetchError::disk(part, e))?;
    Ok(bytes_written)
}

/// Set the modification and access times of a file to the given capture
/// time. Times before the Unix epoch are supported.
pub fn set_file_mtime(path: &Path, captured: &DateTime<Utc>) -> std::io::Result<()> {
    let timestamp = captured.timestamp();
    let time = if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(timestamp.unsigned_abs()))
            .unwrap_or(SystemTime::UNIX_EPOCH)
    };
    let times = FileTimes::new().set_modified(time).set_accessed(time);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(times)?;
    Ok(())
}
