//! In-memory Ring account used by tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};

use super::client::{RecordingStream, RingApi};
use super::error::ApiError;
use super::types::{Device, RecordingEvent, RecordingInfo};
use crate::auth::error::AuthError;
use crate::types::EventId;

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
}

/// Event `id`, captured `id` seconds after [`base_time`].
pub(crate) fn event(id: u64, status: &str) -> RecordingEvent {
    event_at(id, status, base_time() + Duration::seconds(id as i64))
}

pub(crate) fn event_at(id: u64, status: &str, created_at: DateTime<Utc>) -> RecordingEvent {
    RecordingEvent {
        id: EventId::from(id),
        created_at,
        kind: Some("motion".into()),
        recording: Some(RecordingInfo {
            status: Some(status.into()),
        }),
        doorbot: None,
    }
}

pub(crate) fn recording_body(id: &EventId) -> Vec<u8> {
    format!("mp4 bytes for {}", id).into_bytes()
}

#[derive(Default)]
struct Inner {
    devices: Vec<Device>,
    devices_error: Option<u16>,
    events: HashMap<u64, Vec<RecordingEvent>>,
    history_failures: HashMap<u64, (u16, u32)>,
    history_limits: Vec<u32>,
    failing_recordings: HashSet<EventId>,
    broken_streams: HashSet<EventId>,
    revoked: bool,
    recording_calls: Vec<EventId>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeRing {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRing {
    pub(crate) fn add_device(&self, id: u64, name: &str, time_zone: Option<&str>) -> Device {
        let device = Device {
            id,
            name: name.to_string(),
            time_zone: time_zone.map(str::to_string),
        };
        self.inner.lock().unwrap().devices.push(device.clone());
        device
    }

    pub(crate) fn device(&self, id: u64) -> Device {
        self.inner
            .lock()
            .unwrap()
            .devices
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap()
    }

    /// Append to the device's history. Add newest first.
    pub(crate) fn add_event(&self, device: &Device, event: RecordingEvent) {
        self.inner
            .lock()
            .unwrap()
            .events
            .entry(device.id)
            .or_default()
            .push(event);
    }

    pub(crate) fn set_status(&self, id: u64, status: &str) {
        let id = EventId::from(id);
        let mut inner = self.inner.lock().unwrap();
        for event in inner.events.values_mut().flatten() {
            if event.id == id {
                event.recording = Some(RecordingInfo {
                    status: Some(status.into()),
                });
            }
        }
    }

    pub(crate) fn fail_devices(&self, status: u16) {
        self.inner.lock().unwrap().devices_error = Some(status);
    }

    /// The next `times` history requests for the device fail with `status`.
    pub(crate) fn fail_history(&self, device_id: u64, status: u16, times: u32) {
        self.inner
            .lock()
            .unwrap()
            .history_failures
            .insert(device_id, (status, times));
    }

    pub(crate) fn fail_recording(&self, id: u64) {
        self.inner
            .lock()
            .unwrap()
            .failing_recordings
            .insert(EventId::from(id));
    }

    pub(crate) fn break_stream(&self, id: u64) {
        self.inner
            .lock()
            .unwrap()
            .broken_streams
            .insert(EventId::from(id));
    }

    pub(crate) fn revoke_credentials(&self) {
        self.inner.lock().unwrap().revoked = true;
    }

    pub(crate) fn history_limits(&self) -> Vec<u32> {
        self.inner.lock().unwrap().history_limits.clone()
    }

    pub(crate) fn recording_calls(&self) -> Vec<EventId> {
        self.inner.lock().unwrap().recording_calls.clone()
    }
}

#[async_trait]
impl RingApi for FakeRing {
    async fn devices(&self) -> Result<Vec<Device>, ApiError> {
        let inner = self.inner.lock().unwrap();
        if let Some(status) = inner.devices_error {
            return Err(ApiError::HttpStatus {
                status,
                url: "fake://ring_devices".into(),
            });
        }
        Ok(inner.devices.clone())
    }

    async fn history(
        &self,
        device: &Device,
        limit: u32,
        older_than: Option<&EventId>,
    ) -> Result<Vec<RecordingEvent>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.history_limits.push(limit);

        if let Some((status, remaining)) = inner.history_failures.get_mut(&device.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::HttpStatus {
                    status: *status,
                    url: format!("fake://doorbots/{}/history", device.id),
                });
            }
        }

        let all = inner.events.get(&device.id).cloned().unwrap_or_default();
        let start = match older_than {
            Some(id) => all
                .iter()
                .position(|e| &e.id == id)
                .map(|p| p + 1)
                .unwrap_or(all.len()),
            None => 0,
        };
        Ok(all.into_iter().skip(start).take(limit as usize).collect())
    }

    async fn recording(&self, event_id: &EventId) -> Result<RecordingStream, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.recording_calls.push(event_id.clone());

        if inner.revoked {
            return Err(AuthError::FailedLogin("account locked".into()).into());
        }
        if inner.failing_recordings.contains(event_id) {
            return Err(ApiError::HttpStatus {
                status: 500,
                url: format!("fake://dings/{}/recording", event_id),
            });
        }

        let body = Bytes::from(recording_body(event_id));
        if inner.broken_streams.contains(event_id) {
            let chunks = vec![
                Ok(body.slice(..4)),
                Err(ApiError::Decode {
                    url: format!("fake://recordings/{}", event_id),
                    message: "connection reset".into(),
                }),
            ];
            return Ok(stream::iter(chunks).boxed());
        }
        Ok(stream::iter(vec![Ok(body)]).boxed())
    }
}
