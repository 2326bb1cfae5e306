//! In-process Magento-style list API for end-to-end engine tests.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use restsync_engine::config::parser::parse_pipeline_str;
use restsync_engine::config::types::PipelineConfig;
use restsync_engine::destination::Destination;
use restsync_engine::http::{HttpClient, HttpRequest, HttpResponse, TransportError};
use restsync_engine::Orchestrator;
use restsync_state::StateBackend;
use restsync_types::cursor::{compare_cursor_values, cursor_text};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// `2024-01-01 00:00:00` plus `minutes`.
pub fn ts(minutes: i64) -> String {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (base + Duration::minutes(minutes))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Orders `1..=count`, order `i` last updated at `ts(i)`.
pub fn orders(count: u64) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "entity_id": i,
                "increment_id": format!("{:09}", 100_000 + i),
                "status": "pending",
                "grand_total": 10.5 + i as f64,
                "updated_at": ts(i as i64),
            })
        })
        .collect()
}

pub fn products(count: u64) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({"id": i, "sku": format!("SKU-{i}"), "price": i * 3}))
        .collect()
}

struct Fault {
    page: u32,
    remaining: u32,
    status: u16,
    body: Option<Value>,
}

struct CancelHook {
    path: String,
    page: u32,
    token: CancellationToken,
}

/// Serves `searchCriteria` list requests from in-memory collections.
///
/// Applies the `gteq` filter, the ascending sort, and page slicing the way
/// the real API does, and reports `total_count` over the filtered set.
#[derive(Default)]
pub struct FakeApi {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    faults: Mutex<HashMap<String, Vec<Fault>>>,
    cancel_hook: Mutex<Option<CancelHook>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, rows: Vec<Value>) {
        self.collections
            .lock()
            .unwrap()
            .insert(path.to_string(), rows);
    }

    /// Replace the row whose `key` matches, or append it.
    pub fn upsert(&self, path: &str, key: &str, row: Value) {
        let mut collections = self.collections.lock().unwrap();
        let rows = collections.entry(path.to_string()).or_default();
        match rows.iter_mut().find(|r| r[key] == row[key]) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    /// Answer the next `times` requests for `page` of `path` with `status`.
    pub fn fail_page(&self, path: &str, page: u32, status: u16, times: u32) {
        self.push_fault(path, page, status, times, None);
    }

    /// Answer the next request for `page` of `path` with a 200 and `body`.
    pub fn malformed_page(&self, path: &str, page: u32, body: Value) {
        self.push_fault(path, page, 200, 1, Some(body));
    }

    /// Cancel `token` right after `page` of `path` has been served.
    pub fn cancel_after(&self, path: &str, page: u32, token: CancellationToken) {
        *self.cancel_hook.lock().unwrap() = Some(CancelHook {
            path: path.to_string(),
            page,
            token,
        });
    }

    fn push_fault(&self, path: &str, page: u32, status: u16, times: u32, body: Option<Value>) {
        self.faults
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(Fault {
                page,
                remaining: times,
                status,
                body,
            });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn take_fault(&self, path: &str, page: u32) -> Option<(u16, Option<Value>)> {
        let mut faults = self.faults.lock().unwrap();
        let fault = faults
            .get_mut(path)?
            .iter_mut()
            .find(|f| f.page == page && f.remaining > 0)?;
        fault.remaining -= 1;
        Some((fault.status, fault.body.clone()))
    }

    fn page_body(&self, request: &HttpRequest, page: u32, page_size: usize) -> Value {
        let rows = self
            .collections
            .lock()
            .unwrap()
            .get(&request.path)
            .cloned()
            .unwrap_or_default();

        let prefix = "searchCriteria[filter_groups][0][filters][0]";
        let filter_field = request.param(&format!("{prefix}[field]"));
        let filter_value = request.param(&format!("{prefix}[value]"));
        let mut matching: Vec<Value> = rows
            .into_iter()
            .filter(|row| match (filter_field, filter_value) {
                (Some(field), Some(floor)) => cursor_text(&row[field])
                    .is_some_and(|v| compare_cursor_values(&v, floor) != Ordering::Less),
                _ => true,
            })
            .collect();

        let sorts: Vec<&str> = (0..)
            .map_while(|i| request.param(&format!("searchCriteria[sortOrders][{i}][field]")))
            .collect();
        matching.sort_by(|a, b| {
            sorts.iter().fold(Ordering::Equal, |order, field| {
                order.then_with(|| {
                    let a = cursor_text(&a[*field]).unwrap_or_default();
                    let b = cursor_text(&b[*field]).unwrap_or_default();
                    compare_cursor_values(&a, &b)
                })
            })
        });

        let total = matching.len();
        let start = (page as usize - 1) * page_size;
        let items: Vec<Value> = matching.into_iter().skip(start).take(page_size).collect();
        json!({
            "items": items,
            "search_criteria": {"current_page": page, "page_size": page_size},
            "total_count": total,
        })
    }
}

#[async_trait]
impl HttpClient for FakeApi {
    async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let page: u32 = request
            .param("searchCriteria[currentPage]")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        let page_size: usize = request
            .param("searchCriteria[pageSize]")
            .and_then(|p| p.parse().ok())
            .unwrap_or(20);

        let response = match self.take_fault(&request.path, page) {
            Some((status, Some(body))) => HttpResponse::new(status, body.to_string()),
            Some((status, None)) => {
                HttpResponse::new(status, json!({"message": "injected fault"}).to_string())
            }
            None => HttpResponse::new(200, self.page_body(request, page, page_size).to_string()),
        };

        if let Some(hook) = self.cancel_hook.lock().unwrap().as_ref() {
            if hook.path == request.path && hook.page == page {
                hook.token.cancel();
            }
        }
        Ok(response)
    }
}

/// Pipeline YAML with fast retries, the given resources, and extra
/// `execution` lines.
pub fn pipeline_config(resources: &str, execution: &str) -> PipelineConfig {
    let yaml = format!(
        r#"
version: "1.0"
pipeline: rest_api_magento
client:
  base_url: https://magento.test/rest/V1/
  auth:
    type: bearer
    token: test-token
resource_defaults:
  primary_key: entity_id
  write_disposition: merge
  page_size: 100
resources:
{resources}
destination:
  backend: memory
execution:
  retry_base_delay_ms: 1
  retry_max_delay_ms: 5
{execution}
"#
    );
    parse_pipeline_str(&yaml).expect("test pipeline must parse")
}

pub const ORDERS: &str = r#"  - name: orders
    path: orders
    incremental:
      cursor_path: updated_at
      initial_value: "2020-01-01 00:00:00""#;

pub fn orchestrator(
    config: &PipelineConfig,
    api: &Arc<FakeApi>,
    state: Arc<dyn StateBackend>,
    destination: Arc<dyn Destination>,
) -> Orchestrator {
    Orchestrator::from_config(config, api.clone(), state, destination)
        .expect("test pipeline must validate")
}
