//! Static definition of one extractable resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::page::{Filter, FilterOp, PageRequest};
use crate::state::ResourceName;

/// How loaded records are written to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Upsert keyed by primary key; incoming rows fully replace existing ones.
    #[default]
    Merge,
    /// Insert without key-based deduplication.
    Append,
    /// Replace the whole destination dataset for the resource.
    Replace,
}

impl WriteDisposition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Append => "append",
            Self::Replace => "replace",
        }
    }
}

impl std::fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental cursor declaration.
///
/// The cursor field and its initial value always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalFilterSpec {
    /// Record field used as the watermark (e.g. `"updated_at"`).
    pub cursor_path: String,
    /// Lower bound used when no watermark has been committed yet.
    pub initial_value: String,
}

/// Sort order accepted by list endpoints. Only ascending is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
}

/// Explicit sort declaration for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Immutable definition of one resource for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: ResourceName,
    /// Endpoint path relative to the client base URL.
    pub path: String,
    pub primary_key: String,
    pub write_disposition: WriteDisposition,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<IncrementalFilterSpec>,
    /// Field the list endpoint is sorted on, always ascending.
    pub sort_field: String,
    /// Dotted path of the item list in the response body.
    pub data_selector: String,
    /// Dotted path of the total count in the response body.
    pub total_path: String,
    /// Extra static query parameters sent with every page.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Cursor field, for incremental resources.
    #[must_use]
    pub fn cursor_path(&self) -> Option<&str> {
        self.incremental.as_ref().map(|spec| spec.cursor_path.as_str())
    }

    /// Watermark used when none has been committed.
    #[must_use]
    pub fn initial_watermark(&self) -> Option<&str> {
        self.incremental
            .as_ref()
            .map(|spec| spec.initial_value.as_str())
    }

    /// Whether the watermark may be committed after every applied page.
    ///
    /// Holds only when pages are sorted ascending on the cursor field, so the
    /// running maximum never exceeds a value some unseen record still carries.
    #[must_use]
    pub fn checkpoints_per_page(&self) -> bool {
        self.cursor_path() == Some(self.sort_field.as_str())
    }

    /// Build the request for `page_number` under `watermark`.
    #[must_use]
    pub fn page_request(&self, page_number: u32, watermark: Option<&str>) -> PageRequest {
        let filters = match (self.cursor_path(), watermark) {
            (Some(field), Some(value)) => vec![Filter {
                field: field.to_string(),
                op: FilterOp::Gte,
                value: value.to_string(),
            }],
            _ => Vec::new(),
        };
        PageRequest {
            resource: self.name.clone(),
            page_number,
            page_size: self.page_size,
            filters,
            sort_field: self.sort_field.clone(),
            tie_break: (self.primary_key != self.sort_field).then(|| self.primary_key.clone()),
        }
    }
}
