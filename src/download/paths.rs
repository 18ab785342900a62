use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::types::EventId;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const EXTENSION: &str = "mp4";

/// Build the file name for a recording:
/// `<device>-<YYYYmmdd_HHMMSS>-<event id>.mp4`, with spaces turned into
/// underscores so the name is a single shell token.
pub fn recording_filename(device_name: &str, captured: &NaiveDateTime, id: &EventId) -> String {
    let name = format!(
        "{}-{}-{}.{}",
        device_name,
        captured.format(TIMESTAMP_FORMAT),
        id,
        EXTENSION
    );
    clean_filename(&name.replace(' ', "_"))
}

pub fn recording_path(
    directory: &Path,
    device_name: &str,
    captured: &NaiveDateTime,
    id: &EventId,
) -> PathBuf {
    directory.join(recording_filename(device_name, captured, id))
}

/// Drop characters that are invalid on common filesystems:
/// `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|`.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect()
}
