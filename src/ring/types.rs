use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::EventId;

/// A doorbell on the account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    pub id: u64,
    #[serde(rename = "description")]
    pub name: String,
    /// IANA zone name as reported by the device, unvalidated.
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Response of `GET /ring_devices`. Other device families (chimes,
/// stick-up cams) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub doorbots: Vec<Device>,
    #[serde(default)]
    pub authorized_doorbots: Vec<Device>,
}

impl DeviceList {
    /// Owned doorbells first, then shared ones.
    pub fn into_doorbells(self) -> Vec<Device> {
        let mut all = self.doorbots;
        all.extend(self.authorized_doorbots);
        all
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordingInfo {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventOwner {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of a device's history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordingEvent {
    pub id: EventId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub recording: Option<RecordingInfo>,
    #[serde(default)]
    pub doorbot: Option<EventOwner>,
}

impl RecordingEvent {
    pub fn status(&self) -> RecordingStatus {
        match self.recording.as_ref().and_then(|r| r.status.as_deref()) {
            Some("ready") => RecordingStatus::Ready,
            Some(other) => RecordingStatus::Other(other.to_string()),
            None => RecordingStatus::Missing,
        }
    }
}

/// Whether an event's video can be downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingStatus {
    Ready,
    /// Still processing, failed upstream, or any state other than ready.
    Other(String),
    /// The event carries no recording information at all.
    Missing,
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingStatus::Ready => f.write_str("ready"),
            RecordingStatus::Other(s) => f.write_str(s),
            RecordingStatus::Missing => f.write_str("without a recording"),
        }
    }
}

/// Response of `GET /dings/{id}/recording?disable_redirect=true`.
#[derive(Debug, Deserialize)]
pub struct RecordingUrl {
    pub url: String,
}
