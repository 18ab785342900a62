//! Device time-zone resolution.
//!
//! Ring reports each device's zone as an IANA name. Lookups go through
//! [`TimeZoneDb`] so tests can supply a tiny catalog; unknown names fall back
//! to the configured default zone.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Zone used to render an event's capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceZone {
    Named(Tz),
    /// The host's local zone.
    System,
}

impl DeviceZone {
    /// Convert a UTC instant into wall-clock time in this zone.
    pub fn local_time(&self, instant: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            DeviceZone::Named(tz) => instant.with_timezone(tz).naive_local(),
            DeviceZone::System => instant.with_timezone(&chrono::Local).naive_local(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            DeviceZone::Named(tz) => tz.name().to_string(),
            DeviceZone::System => "system local".to_string(),
        }
    }
}

pub trait TimeZoneDb: Send + Sync {
    fn lookup(&self, name: &str) -> Option<DeviceZone>;
}

/// Catalog backed by the compiled-in IANA database.
#[derive(Debug, Default, Clone, Copy)]
pub struct IanaTimeZones;

impl TimeZoneDb for IanaTimeZones {
    fn lookup(&self, name: &str) -> Option<DeviceZone> {
        name.parse::<Tz>().ok().map(DeviceZone::Named)
    }
}

/// Resolve a reported zone, substituting `fallback` when the catalog does
/// not know it.
pub fn resolve_zone(
    db: &dyn TimeZoneDb,
    device_name: &str,
    reported: Option<&str>,
    fallback: DeviceZone,
) -> DeviceZone {
    match reported.and_then(|name| db.lookup(name)) {
        Some(zone) => zone,
        None => {
            tracing::warn!(
                "Could not find time zone {:?} for {}. Using default time zone ({}).",
                reported.unwrap_or(""),
                device_name,
                fallback.name()
            );
            fallback
        }
    }
}
