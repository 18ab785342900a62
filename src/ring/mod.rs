//! Ring account API: devices, event history, and recordings.

pub mod client;
pub mod error;
pub mod events;
pub mod types;

pub use client::{RingApi, RingClient};
pub use error::ApiError;
pub use events::EventSource;
pub use types::{Device, RecordingEvent, RecordingStatus};

#[cfg(test)]
pub(crate) mod fake;
