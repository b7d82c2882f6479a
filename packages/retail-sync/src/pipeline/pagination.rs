//! Pagination strategies.
//!
//! [`OffsetCursor`] walks one query page by page until the server runs dry.
//! [`TimePartitioned`] splits an unbounded search into month windows, each
//! walked by its own cursor, to stay under the server's result cap.

use chrono::{DateTime, FixedOffset, Utc};
use proxy_client::{ApiPath, ApiRequest, Envelope, Gateway, Outcome, SoftFailure};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::config::ExtractionConfig;
use crate::types::window::{month_windows, TimeWindow};

/// Longest backoff exponent; keeps the delay bounded.
const MAX_BACKOFF_SHIFT: u32 = 10;

/// Retry of soft failures on the same page.
///
/// `max_retries = 0` ends the window at the first soft failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }
}

/// The query a cursor walks.
#[derive(Debug, Clone, Copy)]
pub enum PageSource<'a> {
    /// `GET /data/{tenant}/{path}?offset=..&limit=..`
    Data { tenant: &'a str, path: &'a str },
    /// `POST /search/{path}/{tenant}/{offset}/{limit}`, optionally filtered to a window
    Search {
        tenant: &'a str,
        path: &'a str,
        window: Option<&'a TimeWindow>,
    },
}

impl PageSource<'_> {
    fn request(&self, offset: u64, limit: u64) -> ApiRequest {
        match self {
            PageSource::Data { tenant, path } => {
                ApiRequest::get(ApiPath::data_page(tenant, path, offset, limit))
            }
            PageSource::Search {
                tenant,
                path,
                window,
            } => ApiRequest::post(
                ApiPath::search(path, tenant, offset, limit),
                Some(
                    window
                        .map(TimeWindow::filter_body)
                        .unwrap_or_else(|| Value::Object(Default::default())),
                ),
            ),
        }
    }
}

/// Why a cursor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back empty
    Empty,
    /// A page came back shorter than the limit
    ShortPage,
    /// Records so far reached the total reported on the first page
    ReachedTotal,
    /// A call soft-failed (after retries); the data may be incomplete
    Failed(SoftFailure),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }
}

/// Everything one cursor walk produced.
#[derive(Debug, Clone)]
pub struct CursorRun {
    /// Raw payload items in arrival order
    pub items: Vec<Value>,
    pub pages: u32,
    pub calls: u32,
    /// Total from the first successful page, if positive
    pub reported_total: Option<u64>,
    pub stop: StopReason,
}

/// Offset-cursor pagination over a fixed page size.
#[derive(Debug, Clone)]
pub struct OffsetCursor {
    limit: u64,
    page_delay: Duration,
    retry: RetryPolicy,
}

impl OffsetCursor {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            page_delay: Duration::ZERO,
            retry: RetryPolicy {
                max_retries: 0,
                base_delay: Duration::ZERO,
            },
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.page_size)
            .with_page_delay(config.page_delay)
            .with_retry(config.retry)
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Walk `source` from offset 0 until it is exhausted or a call fails.
    pub async fn run<G: Gateway + ?Sized>(&self, gateway: &G, source: PageSource<'_>) -> CursorRun {
        let mut items = Vec::new();
        let mut pages = 0u32;
        let mut calls = 0u32;
        let mut reported_total = None;
        let mut offset = 0u64;

        let stop = loop {
            let request = source.request(offset, self.limit);
            let envelope = match call_with_retry(gateway, &request, &self.retry, &mut calls).await {
                Ok(envelope) => envelope,
                Err(failure) => break StopReason::Failed(failure),
            };

            pages += 1;
            if pages == 1 {
                reported_total = envelope.total.filter(|total| *total > 0);
            }

            let batch = envelope.into_items();
            let fetched = batch.len() as u64;
            debug!(path = %request.path, fetched, "Fetched page");

            if batch.is_empty() {
                break StopReason::Empty;
            }
            items.extend(batch);
            if fetched < self.limit {
                break StopReason::ShortPage;
            }
            if reported_total.is_some_and(|total| items.len() as u64 >= total) {
                break StopReason::ReachedTotal;
            }

            offset += self.limit;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        };

        CursorRun {
            items,
            pages,
            calls,
            reported_total,
            stop,
        }
    }
}

/// Issue `request`, retrying soft failures per `retry`. Counts every attempt in `calls`.
pub(crate) async fn call_with_retry<G: Gateway + ?Sized>(
    gateway: &G,
    request: &ApiRequest,
    retry: &RetryPolicy,
    calls: &mut u32,
) -> Result<Envelope, SoftFailure> {
    let mut attempt = 0;
    loop {
        *calls += 1;
        match gateway.call(request).await {
            Outcome::Success(envelope) => return Ok(envelope),
            Outcome::SoftFail(failure) if attempt < retry.max_retries => {
                let delay = retry.delay_for(attempt);
                attempt += 1;
                warn!(
                    path = %request.path,
                    reason = %failure,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying call"
                );
                tokio::time::sleep(delay).await;
            }
            Outcome::SoftFail(failure) => return Err(failure),
        }
    }
}

/// Month-windowed search, one cursor per window, oldest first.
#[derive(Debug, Clone)]
pub struct TimePartitioned {
    start: DateTime<FixedOffset>,
    window_delay: Duration,
    cursor: OffsetCursor,
}

impl TimePartitioned {
    pub fn new(start: DateTime<FixedOffset>, cursor: OffsetCursor) -> Self {
        Self {
            start,
            window_delay: Duration::ZERO,
            cursor,
        }
    }

    pub fn with_window_delay(mut self, delay: Duration) -> Self {
        self.window_delay = delay;
        self
    }

    pub fn windows(&self, now: DateTime<Utc>) -> Vec<TimeWindow> {
        month_windows(self.start, now)
    }

    /// Walk every window through `now`, handing each window's run to
    /// `on_window` in chronological order. Returns the number of windows.
    ///
    /// A failed window does not stop later windows.
    pub async fn run<G, F>(
        &self,
        gateway: &G,
        tenant: &str,
        path: &str,
        now: DateTime<Utc>,
        mut on_window: F,
    ) -> u32
    where
        G: Gateway + ?Sized,
        F: FnMut(&TimeWindow, CursorRun),
    {
        let windows = self.windows(now);
        let mut processed = 0;

        for (i, window) in windows.iter().enumerate() {
            if i > 0 && !self.window_delay.is_zero() {
                tokio::time::sleep(self.window_delay).await;
            }
            let source = PageSource::Search {
                tenant,
                path,
                window: Some(window),
            };
            let run = self.cursor.run(gateway, source).await;
            processed += 1;
            on_window(window, run);
        }

        processed
    }
}
