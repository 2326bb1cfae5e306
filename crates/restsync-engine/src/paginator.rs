//! Page-number traversal of one resource's list endpoint.
//!
//! The paginator is a pull-based state machine: each
//! [`Paginator::next_page`] call fetches at most one page, retrying
//! transient failures with backoff. Termination is decided only by the
//! server-reported total count, never by a short or empty page.

use std::sync::Arc;

use restsync_types::cursor::CursorTracker;
use restsync_types::error::ExtractError;
use restsync_types::page::PageResponse;
use restsync_types::resource::ResourceDescriptor;
use tokio_util::sync::CancellationToken;

use crate::config::types::DriftPolicy;
use crate::error::{compute_backoff, PipelineError, RetryPolicy};
use crate::extractor::Extractor;

/// Traversal state for one resource run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginatorState {
    /// Nothing fetched yet.
    Start,
    /// The next call fetches `page`.
    Fetching { page: u32 },
    /// The server reported more rows after the last page.
    HasMore { next_page: u32 },
    /// The last page has been yielded.
    Exhausted,
    Done,
    Failed,
}

/// Counters accumulated while paginating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginatorStats {
    /// Pages yielded to the caller.
    pub pages_fetched: u64,
    pub records_read: u64,
    pub retries: u64,
    /// Pages whose total differed from the first page's.
    pub drift_events: u64,
}

/// Drives one resource to exhaustion, one page per call.
pub struct Paginator {
    extractor: Arc<Extractor>,
    descriptor: ResourceDescriptor,
    /// Lower bound for the incremental filter, fixed for the whole run.
    watermark: Option<String>,
    retry: RetryPolicy,
    drift: DriftPolicy,
    cancel: CancellationToken,
    state: PaginatorState,
    tracker: Option<CursorTracker>,
    first_total: Option<u64>,
    stats: PaginatorStats,
}

impl Paginator {
    /// Create a paginator for `descriptor`.
    ///
    /// `watermark` is the value read from the watermark store at run start;
    /// it becomes the `cursor >= watermark` filter on every page.
    pub fn new(
        extractor: Arc<Extractor>,
        descriptor: ResourceDescriptor,
        watermark: Option<String>,
        retry: RetryPolicy,
        drift: DriftPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let tracker = descriptor.cursor_path().map(CursorTracker::new);
        Self {
            extractor,
            descriptor,
            watermark,
            retry,
            drift,
            cancel,
            state: PaginatorState::Start,
            tracker,
            first_total: None,
            stats: PaginatorStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PaginatorState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> PaginatorStats {
        self.stats
    }

    /// Highest cursor value across every record yielded so far.
    #[must_use]
    pub fn max_cursor(&self) -> Option<&str> {
        self.tracker.as_ref().and_then(CursorTracker::max)
    }

    /// Fetch the next page, or `Ok(None)` once the resource is exhausted.
    ///
    /// Cancellation is honored before each fetch and during backoff sleeps,
    /// never between a page being yielded and the caller applying it.
    ///
    /// # Errors
    ///
    /// Returns the non-retryable or retry-exhausted [`PipelineError`];
    /// the paginator is then `Failed` and yields nothing further.
    pub async fn next_page(&mut self) -> Result<Option<PageResponse>, PipelineError> {
        loop {
            match self.state {
                PaginatorState::Start => {
                    self.state = PaginatorState::Fetching { page: 1 };
                }
                PaginatorState::HasMore { next_page } => {
                    self.state = PaginatorState::Fetching { page: next_page };
                }
                PaginatorState::Fetching { page } => {
                    if self.cancel.is_cancelled() {
                        self.state = PaginatorState::Failed;
                        return Err(PipelineError::Cancelled);
                    }
                    return match self.fetch_with_retry(page).await {
                        Ok(response) => self.accept(page, response),
                        Err(err) => {
                            self.state = PaginatorState::Failed;
                            Err(err)
                        }
                    };
                }
                PaginatorState::Exhausted => {
                    self.state = PaginatorState::Done;
                    return Ok(None);
                }
                PaginatorState::Done | PaginatorState::Failed => return Ok(None),
            }
        }
    }

    /// Update state from a fetched page and decide whether to yield it.
    fn accept(
        &mut self,
        page: u32,
        response: PageResponse,
    ) -> Result<Option<PageResponse>, PipelineError> {
        let resource = self.descriptor.name.as_str();
        match self.first_total {
            None => self.first_total = Some(response.total_count),
            Some(first) if first != response.total_count => {
                self.stats.drift_events += 1;
                if self.drift == DriftPolicy::Fail {
                    self.state = PaginatorState::Failed;
                    return Err(PipelineError::Extract(ExtractError::drift(format!(
                        "total count moved from {first} to {} at page {page}",
                        response.total_count
                    ))));
                }
                tracing::warn!(
                    resource,
                    page,
                    first_total = first,
                    total = response.total_count,
                    "Total count drifted between pages"
                );
            }
            Some(_) => {}
        }

        if page == 1 && response.total_count == 0 {
            tracing::info!(resource, "No records match the current watermark");
            self.state = PaginatorState::Done;
            return Ok(None);
        }

        if let Some(tracker) = self.tracker.as_mut() {
            for record in &response.items {
                tracker.observe_record(record);
            }
        }
        self.stats.pages_fetched += 1;
        self.stats.records_read += response.items.len() as u64;

        self.state = if response.has_more(self.descriptor.page_size) {
            PaginatorState::HasMore {
                next_page: page + 1,
            }
        } else {
            PaginatorState::Exhausted
        };
        tracing::debug!(
            resource,
            page,
            items = response.items.len(),
            total = response.total_count,
            "Page fetched"
        );
        Ok(Some(response))
    }

    async fn fetch_with_retry(&mut self, page: u32) -> Result<PageResponse, PipelineError> {
        let request = self.descriptor.page_request(page, self.watermark.as_deref());
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.extractor.fetch(&self.descriptor, &request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.retryable && attempt <= self.retry.max_retries => {
                    let delay = compute_backoff(&self.retry, &err, attempt);
                    self.stats.retries += 1;
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(
                        resource = self.descriptor.name.as_str(),
                        page,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms,
                        category = %err.category,
                        code = %err.code,
                        "Retryable error, will retry"
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    if err.retryable {
                        tracing::error!(
                            resource = self.descriptor.name.as_str(),
                            page,
                            attempt,
                            category = %err.category,
                            code = %err.code,
                            "Max retries exhausted, failing resource"
                        );
                    } else {
                        tracing::error!(
                            resource = self.descriptor.name.as_str(),
                            page,
                            category = %err.category,
                            code = %err.code,
                            "Non-retryable error, failing resource"
                        );
                    }
                    return Err(PipelineError::Extract(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use restsync_types::error::ErrorCategory;
    use restsync_types::resource::{IncrementalFilterSpec, WriteDisposition};
    use restsync_types::state::ResourceName;
    use serde_json::json;

    use super::*;
    use crate::config::types::QueryStyle;
    use crate::http::fake::ScriptedClient;

    fn orders(page_size: u32) -> ResourceDescriptor {
        ResourceDescriptor {
            name: ResourceName::new("orders"),
            path: "orders".into(),
            primary_key: "entity_id".into(),
            write_disposition: WriteDisposition::Merge,
            page_size,
            incremental: Some(IncrementalFilterSpec {
                cursor_path: "updated_at".into(),
                initial_value: "2020-01-01".into(),
            }),
            sort_field: "updated_at".into(),
            data_selector: "items".into(),
            total_path: "total_count".into(),
            params: BTreeMap::new(),
        }
    }

    fn body(ids: std::ops::Range<u64>, total: u64) -> serde_json::Value {
        let items: Vec<_> = ids
            .map(|id| json!({"entity_id": id, "updated_at": format!("2024-01-01 00:00:{:02}", id % 60)}))
            .collect();
        json!({"items": items, "total_count": total})
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn paginator(
        client: Arc<ScriptedClient>,
        page_size: u32,
        retry: RetryPolicy,
        drift: DriftPolicy,
        cancel: CancellationToken,
    ) -> Paginator {
        let extractor = Arc::new(Extractor::new(client, QueryStyle::Plain));
        Paginator::new(
            extractor,
            orders(page_size),
            Some("2020-01-01".into()),
            retry,
            drift,
            cancel,
        )
    }

    async fn drain(p: &mut Paginator) -> Result<Vec<PageResponse>, PipelineError> {
        let mut pages = Vec::new();
        while let Some(page) = p.next_page().await? {
            pages.push(page);
        }
        Ok(pages)
    }

    #[tokio::test]
    async fn walks_pages_by_total_count() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(200, body(0..2, 5))
                .respond(200, body(2..4, 5))
                .respond(200, body(4..5, 5)),
        );
        let mut p = paginator(
            client.clone(),
            2,
            fast_retry(0),
            DriftPolicy::Tolerate,
            CancellationToken::new(),
        );
        assert_eq!(p.state(), PaginatorState::Start);
        let pages = drain(&mut p).await.unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(p.state(), PaginatorState::Done);
        assert_eq!(p.stats().pages_fetched, 3);
        assert_eq!(p.stats().records_read, 5);
        assert_eq!(p.max_cursor(), Some("2024-01-01 00:00:04"));

        let requests = client.requests.lock().unwrap();
        let pages_requested: Vec<_> = requests.iter().map(|r| r.param("page").unwrap()).collect();
        assert_eq!(pages_requested, vec!["1", "2", "3"]);
        assert!(requests
            .iter()
            .all(|r| r.param("updated_at[gte]") == Some("2020-01-01")));
    }

    #[tokio::test]
    async fn short_page_mid_range_does_not_terminate() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(200, body(0..1, 4))
                .respond(200, body(1..3, 4)),
        );
        let mut p = paginator(client, 2, fast_retry(0), DriftPolicy::Tolerate, CancellationToken::new());
        let pages = drain(&mut p).await.unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn empty_result_set_yields_nothing() {
        let client = Arc::new(ScriptedClient::new().respond(200, body(0..0, 0)));
        let mut p = paginator(client.clone(), 100, fast_retry(0), DriftPolicy::Tolerate, CancellationToken::new());
        assert!(p.next_page().await.unwrap().is_none());
        assert_eq!(p.state(), PaginatorState::Done);
        assert_eq!(p.stats().pages_fetched, 0);
        assert_eq!(p.max_cursor(), None);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(500, json!({}))
                .timeout()
                .respond(502, json!({}))
                .respond(200, body(0..1, 1)),
        );
        let mut p = paginator(client, 10, fast_retry(5), DriftPolicy::Tolerate, CancellationToken::new());
        let pages = drain(&mut p).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(p.stats().retries, 3);
    }

    #[tokio::test]
    async fn retries_exhausted_fails() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(503, json!({}))
                .respond(503, json!({}))
                .respond(503, json!({})),
        );
        let mut p = paginator(client.clone(), 10, fast_retry(2), DriftPolicy::Tolerate, CancellationToken::new());
        let err = p.next_page().await.unwrap_err();
        assert_eq!(
            err.as_extract_error().unwrap().category,
            ErrorCategory::TransientHttp
        );
        assert_eq!(p.state(), PaginatorState::Failed);
        assert_eq!(p.stats().retries, 2);
        assert_eq!(client.request_count(), 3);
        assert!(p.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let client = Arc::new(ScriptedClient::new().respond(401, json!({"message": "nope"})));
        let mut p = paginator(client.clone(), 10, fast_retry(5), DriftPolicy::Tolerate, CancellationToken::new());
        let err = p.next_page().await.unwrap_err();
        assert_eq!(err.as_extract_error().unwrap().category, ErrorCategory::Auth);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn drift_tolerated_by_default() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(200, body(0..2, 4))
                .respond(200, body(2..4, 5))
                .respond(200, body(4..5, 5)),
        );
        let mut p = paginator(client, 2, fast_retry(0), DriftPolicy::Tolerate, CancellationToken::new());
        let pages = drain(&mut p).await.unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(p.stats().drift_events, 2);
    }

    #[tokio::test]
    async fn drift_fails_under_snapshot_policy() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(200, body(0..2, 4))
                .respond(200, body(2..4, 6)),
        );
        let mut p = paginator(client, 2, fast_retry(0), DriftPolicy::Fail, CancellationToken::new());
        assert!(p.next_page().await.unwrap().is_some());
        let err = p.next_page().await.unwrap_err();
        assert_eq!(err.as_extract_error().unwrap().category, ErrorCategory::Drift);
        assert_eq!(p.stats().pages_fetched, 1);
    }

    #[tokio::test]
    async fn cancellation_honored_at_page_boundary() {
        let client = Arc::new(
            ScriptedClient::new()
                .respond(200, body(0..2, 4))
                .respond(200, body(2..4, 4)),
        );
        let cancel = CancellationToken::new();
        let mut p = paginator(client.clone(), 2, fast_retry(0), DriftPolicy::Tolerate, cancel.clone());
        assert!(p.next_page().await.unwrap().is_some());
        cancel.cancel();
        assert!(matches!(p.next_page().await, Err(PipelineError::Cancelled)));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let client = Arc::new(ScriptedClient::new().respond(503, json!({})));
        let cancel = CancellationToken::new();
        let slow = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let mut p = paginator(client, 2, slow, DriftPolicy::Tolerate, cancel.clone());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(Duration::from_secs(5), p.next_page()).await;
        assert!(matches!(result, Ok(Err(PipelineError::Cancelled))));
    }
}
