//! One sync pass over every device on the account.
//!
//! Devices are processed in the order Ring lists them and events in the
//! order the history returns them, one at a time. Per-event and per-device
//! failures are counted and logged; only a failed login ends the pass early.
//! The ledger is mutated in memory here and persisted by the caller, so it is
//! written even when the pass stops early.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::download::paths::recording_path;
use crate::download::{FetchOutcome, RecordingFetcher};
use crate::retry::RetryConfig;
use crate::ring::{ApiError, Device, EventSource, RingApi};
use crate::state::Ledger;
use crate::timezone::{resolve_zone, DeviceZone, TimeZoneDb};
use crate::types::EventId;

/// Knobs for a sync pass, taken from the loaded config.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub video_directory: PathBuf,
    pub event_limit: u32,
    pub listing_retries: u32,
    /// Delays between listing retries. The count comes from `listing_retries`.
    pub listing_backoff: RetryConfig,
    pub default_zone: DeviceZone,
}

/// Counters for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    pub device: String,
    /// Events seen, whatever happened to them.
    pub total: usize,
    pub downloaded: usize,
    /// Already in the ledger, or repeated within this pass.
    pub skipped: usize,
    pub not_ready: usize,
    pub failed: usize,
    /// Set when the history listing gave up; events before the failure are
    /// still counted.
    pub listing_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub devices: Vec<DeviceReport>,
    /// The pass stopped early because shutdown was requested.
    pub interrupted: bool,
}

impl SyncReport {
    pub fn events_seen(&self) -> usize {
        self.devices.iter().map(|d| d.total).sum()
    }

    pub fn downloaded(&self) -> usize {
        self.devices.iter().map(|d| d.downloaded).sum()
    }

    pub fn failed(&self) -> usize {
        self.devices.iter().map(|d| d.failed).sum()
    }
}

pub struct SyncEngine<'a> {
    api: &'a dyn RingApi,
    ledger: &'a mut Ledger,
    zones: &'a dyn TimeZoneDb,
    options: SyncOptions,
    shutdown: CancellationToken,
    seen: HashSet<EventId>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        api: &'a dyn RingApi,
        ledger: &'a mut Ledger,
        zones: &'a dyn TimeZoneDb,
        options: SyncOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            api,
            ledger,
            zones,
            options,
            shutdown,
            seen: HashSet::new(),
        }
    }

    /// Run one pass. Returns an error only for a failed login; the report
    /// of a pass that stopped that way is lost, but every id recorded before
    /// the failure stays in the ledger.
    pub async fn run(&mut self) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        let source = EventSource::new(self.api).with_backoff(self.options.listing_backoff);
        let devices = match source.list_devices().await {
            Ok(devices) => devices,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::error!("Could not list devices: {}", e);
                Vec::new()
            }
        };
        tracing::info!("Found {} doorbell(s)", devices.len());

        for device in &devices {
            if self.shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let device_report = self.sync_device(&source, device).await?;
            println!(
                "{} videos downloaded: {}/{}",
                device.name, device_report.downloaded, device_report.total
            );
            report.devices.push(device_report);
        }
        if self.shutdown.is_cancelled() {
            report.interrupted = true;
        }

        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} downloaded, {} failed, {} events seen",
            report.downloaded(),
            report.failed(),
            report.events_seen()
        );
        tracing::info!("  elapsed: {}", format_duration(started.elapsed()));
        if report.interrupted {
            tracing::info!("  Interrupted before all events were processed");
        }
        Ok(report)
    }

    async fn sync_device(&mut self, source: &EventSource<'_>, device: &Device) -> Result<DeviceReport> {
        let mut report = DeviceReport {
            device: device.name.clone(),
            ..DeviceReport::default()
        };
        let zone = resolve_zone(
            self.zones,
            &device.name,
            device.time_zone.as_deref(),
            self.options.default_zone,
        );
        let fetcher = RecordingFetcher::new(self.api);

        let events = source.list_events(
            device,
            self.options.event_limit,
            self.options.listing_retries,
        );
        futures_util::pin_mut!(events);

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    log_listing_failure(device, &e);
                    report.listing_error = Some(e.to_string());
                    break;
                }
            };
            report.total += 1;

            if self.ledger.contains(&event.id) || !self.seen.insert(event.id.clone()) {
                tracing::debug!("Event {} already downloaded, skipping", event.id);
                report.skipped += 1;
                continue;
            }

            let captured = zone.local_time(&event.created_at);
            let destination = recording_path(
                &self.options.video_directory,
                &device.name,
                &captured,
                &event.id,
            );
            println!("{}", destination.display());

            match fetcher.fetch(&event, &destination).await {
                FetchOutcome::Downloaded { bytes } => {
                    tracing::debug!("Event {}: saved {} bytes", event.id, bytes);
                    self.ledger.record(event.id.clone());
                    report.downloaded += 1;
                }
                FetchOutcome::NotReady(status) => {
                    tracing::info!("Event: {} is {}", event.id, status);
                    report.not_ready += 1;
                }
                FetchOutcome::Failed(e) if e.is_fatal() => return Err(e.into()),
                FetchOutcome::Failed(e) => {
                    tracing::warn!("Failed to download event {}: {}", event.id, e);
                    report.failed += 1;
                }
            }

            if self.shutdown.is_cancelled() {
                tracing::info!("Shutdown requested, stopping after event {}", event.id);
                break;
            }
        }
        Ok(report)
    }
}

fn log_listing_failure(device: &Device, e: &ApiError) {
    tracing::error!(
        "Could not list events for {} (id {}): {}",
        device.name,
        device.id,
        e
    );
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
