use std::collections::VecDeque;

use futures_util::stream::{self, Stream};

use super::client::RingApi;
use super::error::ApiError;
use super::types::{Device, RecordingEvent};
use crate::retry::{retry_with_backoff, RetryAction, RetryConfig};
use crate::types::EventId;

/// Ring serves at most this many history entries per request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Device and history listing on top of [`RingApi`].
pub struct EventSource<'a> {
    api: &'a dyn RingApi,
    backoff: RetryConfig,
}

struct Cursor {
    remaining: u32,
    older_than: Option<EventId>,
    page: VecDeque<RecordingEvent>,
    exhausted: bool,
}

impl<'a> EventSource<'a> {
    pub fn new(api: &'a dyn RingApi) -> Self {
        Self {
            api,
            backoff: RetryConfig::default(),
        }
    }

    /// Override delays between listing retries; the retry count still comes
    /// from each [`list_events`](Self::list_events) call.
    pub fn with_backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, ApiError> {
        self.api.devices().await
    }

    /// Lazily yield up to `limit` of the device's most recent events, newest
    /// first. Each page request is retried up to `retry_count` times on
    /// transient failures; if a page still fails the error is yielded once
    /// and the stream ends.
    pub fn list_events<'s>(
        &self,
        device: &'s Device,
        limit: u32,
        retry_count: u32,
    ) -> impl Stream<Item = Result<RecordingEvent, ApiError>> + 's
    where
        'a: 's,
    {
        let api: &'s dyn RingApi = self.api;
        let retry = RetryConfig {
            max_retries: retry_count,
            ..self.backoff
        };
        let cursor = Cursor {
            remaining: limit,
            older_than: None,
            page: VecDeque::new(),
            exhausted: limit == 0,
        };

        stream::unfold(cursor, move |mut cursor| async move {
            loop {
                if cursor.remaining == 0 {
                    return None;
                }
                if let Some(event) = cursor.page.pop_front() {
                    cursor.remaining -= 1;
                    return Some((Ok(event), cursor));
                }
                if cursor.exhausted {
                    return None;
                }

                let want = cursor.remaining.min(MAX_PAGE_SIZE);
                let older_than = cursor.older_than.clone();
                let page = retry_with_backoff(
                    &retry,
                    |e: &ApiError| {
                        if e.is_retryable() {
                            RetryAction::Retry
                        } else {
                            RetryAction::Abort
                        }
                    },
                    || api.history(device, want, older_than.as_ref()),
                )
                .await;

                match page {
                    Ok(events) => {
                        tracing::debug!(
                            "Fetched {} events for {} (older than {:?})",
                            events.len(),
                            device.name,
                            older_than
                        );
                        if (events.len() as u32) < want {
                            cursor.exhausted = true;
                        }
                        match events.last() {
                            Some(last) => cursor.older_than = Some(last.id.clone()),
                            None => cursor.exhausted = true,
                        }
                        cursor.page.extend(events);
                    }
                    Err(e) => {
                        cursor.exhausted = true;
                        return Some((Err(e), cursor));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::fake::{event, FakeRing};
    use futures_util::StreamExt;
    use std::time::Duration;

    fn instant() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    async fn collect(
        source: &EventSource<'_>,
        device: &Device,
        limit: u32,
        retries: u32,
    ) -> Vec<Result<RecordingEvent, ApiError>> {
        source.list_events(device, limit, retries).collect().await
    }

    fn ring_with(count: u64) -> FakeRing {
        let ring = FakeRing::default();
        let device = ring.add_device(1, "Front Door", Some("UTC"));
        for n in (1..=count).rev() {
            ring.add_event(&device, event(n, "ready"));
        }
        ring
    }

    #[tokio::test]
    async fn test_pages_until_limit() {
        let ring = ring_with(300);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        let events = collect(&source, &device, 250, 0).await;
        assert_eq!(events.len(), 250);
        let first = events.first().unwrap().as_ref().unwrap();
        let last = events.last().unwrap().as_ref().unwrap();
        assert_eq!(first.id, EventId::from(300));
        assert_eq!(last.id, EventId::from(51));
        assert_eq!(ring.history_limits(), vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_short_history_stops_early() {
        let ring = ring_with(12);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        let events = collect(&source, &device, 30, 0).await;
        assert_eq!(events.len(), 12);
        assert_eq!(ring.history_limits(), vec![30]);
    }

    #[tokio::test]
    async fn test_zero_limit_makes_no_request() {
        let ring = ring_with(5);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        assert!(collect(&source, &device, 0, 0).await.is_empty());
        assert!(ring.history_limits().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let ring = ring_with(3);
        ring.fail_history(1, 503, 2);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        let events = collect(&source, &device, 30, 10).await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_yields_single_error() {
        let ring = ring_with(3);
        ring.fail_history(1, 503, 5);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        let events = collect(&source, &device, 30, 2).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ApiError::HttpStatus { status: 503, .. })
        ));
        assert_eq!(ring.history_limits().len(), 3);
    }

    #[tokio::test]
    async fn test_terminal_failure_not_retried() {
        let ring = ring_with(3);
        ring.fail_history(1, 404, 1);
        let source = EventSource::new(&ring).with_backoff(instant());
        let device = ring.device(1);

        let events = collect(&source, &device, 30, 10).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
        assert_eq!(ring.history_limits().len(), 1);
    }
}
