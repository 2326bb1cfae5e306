//! Single-page fetch and decode.
//!
//! One [`Extractor::fetch`] call is one network round trip. Status codes are
//! classified into [`ExtractError`] categories; bodies are decoded by the
//! resource's item selector and total-count paths.

use std::sync::Arc;

use restsync_types::cursor::cursor_text;
use restsync_types::error::ExtractError;
use restsync_types::page::{select_path, FilterOp, PageRequest, PageResponse, Record};
use restsync_types::resource::ResourceDescriptor;
use serde_json::Value;

use crate::config::types::QueryStyle;
use crate::http::{HttpClient, HttpRequest, TransportError};

/// Longest body excerpt carried in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Render paging, filter, and sort parameters for `request`.
#[must_use]
pub fn query_params(style: QueryStyle, request: &PageRequest) -> Vec<(String, String)> {
    let mut params = Vec::new();
    match style {
        QueryStyle::SearchCriteria => {
            params.push((
                "searchCriteria[pageSize]".to_string(),
                request.page_size.to_string(),
            ));
            params.push((
                "searchCriteria[currentPage]".to_string(),
                request.page_number.to_string(),
            ));
            for (group, filter) in request.filters.iter().enumerate() {
                let prefix = format!("searchCriteria[filter_groups][{group}][filters][0]");
                let condition = match filter.op {
                    FilterOp::Gte => "gteq",
                };
                params.push((format!("{prefix}[field]"), filter.field.clone()));
                params.push((format!("{prefix}[value]"), filter.value.clone()));
                params.push((format!("{prefix}[condition_type]"), condition.to_string()));
            }
            let sorts = std::iter::once(&request.sort_field).chain(request.tie_break.as_ref());
            for (index, field) in sorts.enumerate() {
                params.push((
                    format!("searchCriteria[sortOrders][{index}][field]"),
                    field.clone(),
                ));
                params.push((
                    format!("searchCriteria[sortOrders][{index}][direction]"),
                    "ASC".to_string(),
                ));
            }
        }
        QueryStyle::Plain => {
            params.push(("page".to_string(), request.page_number.to_string()));
            params.push(("page_size".to_string(), request.page_size.to_string()));
            for filter in &request.filters {
                let op = match filter.op {
                    FilterOp::Gte => "gte",
                };
                params.push((format!("{}[{op}]", filter.field), filter.value.clone()));
            }
            let sort = match &request.tie_break {
                Some(tie_break) => format!("{},{tie_break}", request.sort_field),
                None => request.sort_field.clone(),
            };
            params.push(("sort".to_string(), sort));
        }
    }
    params
}

/// Decode one page body against `descriptor`.
///
/// Every item must be an object carrying the primary key and, for
/// incremental resources, the cursor field.
///
/// # Errors
///
/// Returns a decode-category [`ExtractError`] when the body is not JSON,
/// a selector path is absent, or an item is malformed.
pub fn decode_page(
    descriptor: &ResourceDescriptor,
    page_number: u32,
    body: &str,
) -> Result<PageResponse, ExtractError> {
    let doc: Value = serde_json::from_str(body).map_err(|e| {
        ExtractError::decode("INVALID_JSON", format!("response body is not JSON: {e}"))
    })?;

    let items = match select_path(&doc, &descriptor.data_selector) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ExtractError::decode(
                "SELECTOR_NOT_ARRAY",
                format!("'{}' is not a list", descriptor.data_selector),
            ))
        }
        None => {
            return Err(ExtractError::decode(
                "MISSING_SELECTOR",
                format!("item selector '{}' absent from body", descriptor.data_selector),
            ))
        }
    };

    let total_count = match select_path(&doc, &descriptor.total_path) {
        Some(value) => parse_count(value).ok_or_else(|| {
            ExtractError::decode(
                "INVALID_TOTAL",
                format!("'{}' is not a non-negative integer", descriptor.total_path),
            )
        })?,
        None => {
            return Err(ExtractError::decode(
                "MISSING_TOTAL",
                format!("total count '{}' absent from body", descriptor.total_path),
            ))
        }
    };

    let cursor_path = descriptor.cursor_path();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record = Record::from_value(item.clone()).ok_or_else(|| {
            ExtractError::decode("NON_OBJECT_ITEM", format!("item {index} is not an object"))
        })?;
        if record.key(&descriptor.primary_key).is_none() {
            return Err(ExtractError::decode(
                "MISSING_PRIMARY_KEY",
                format!("item {index} has no '{}'", descriptor.primary_key),
            ));
        }
        if let Some(cursor) = cursor_path {
            if record.get(cursor).and_then(cursor_text).is_none() {
                return Err(ExtractError::decode(
                    "MISSING_CURSOR",
                    format!("item {index} has no '{cursor}'"),
                ));
            }
        }
        records.push(record);
    }

    Ok(PageResponse {
        items: records,
        total_count,
        current_page: page_number,
    })
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// Issues page requests through an injected [`HttpClient`].
pub struct Extractor {
    client: Arc<dyn HttpClient>,
    style: QueryStyle,
}

impl Extractor {
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>, style: QueryStyle) -> Self {
        Self { client, style }
    }

    /// Build the HTTP request for one page.
    #[must_use]
    pub fn build_request(&self, descriptor: &ResourceDescriptor, request: &PageRequest) -> HttpRequest {
        let mut params: Vec<(String, String)> = descriptor
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.extend(query_params(self.style, request));
        HttpRequest::get(descriptor.path.clone(), params)
    }

    /// Fetch and decode one page.
    ///
    /// # Errors
    ///
    /// Transport failures and 5xx/429 statuses are retryable; auth, other
    /// 4xx, and decode failures are not.
    pub async fn fetch(
        &self,
        descriptor: &ResourceDescriptor,
        request: &PageRequest,
    ) -> Result<PageResponse, ExtractError> {
        let http_request = self.build_request(descriptor, request);
        tracing::debug!(
            resource = %descriptor.name,
            page = request.page_number,
            path = %http_request.path,
            "Fetching page"
        );

        let response = self
            .client
            .request(&http_request)
            .await
            .map_err(|e| match e {
                TransportError::Timeout(msg) => ExtractError::transient_network("TIMEOUT", msg),
                TransportError::Connect(msg) => ExtractError::transient_network("CONNECT", msg),
                TransportError::Other(msg) => ExtractError::transient_network("TRANSPORT", msg),
            })?;

        if let Some(err) =
            ExtractError::from_status(response.status, response.retry_after_ms, &excerpt(&response.body))
        {
            return Err(err);
        }

        decode_page(descriptor, request.page_number, &response.body)
    }
}
