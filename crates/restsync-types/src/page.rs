//! Records and the request/response shapes of one page of a list endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cursor::cursor_text;
use crate::state::ResourceName;

/// Resolve a dotted path (`"data.items"`) inside a JSON document.
///
/// An empty path selects the document itself.
#[must_use]
pub fn select_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Opaque keyed document extracted from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap a JSON object. Returns `None` for any other JSON type.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Look up a (possibly dotted) field.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            None => self.0.get(path),
            Some((head, rest)) => self.0.get(head).and_then(|v| select_path(v, rest)),
        }
    }

    /// Primary key value rendered as a string, if present and scalar.
    #[must_use]
    pub fn key(&self, primary_key: &str) -> Option<String> {
        self.get(primary_key).and_then(cursor_text)
    }

    /// Borrow the underlying field map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Comparison applied by a server-side filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// `field >= value`
    Gte,
}

/// Server-side predicate attached to a page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

/// One page of a resource's list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource: ResourceName,
    /// 1-indexed page number.
    pub page_number: u32,
    pub page_size: u32,
    pub filters: Vec<Filter>,
    /// Primary ascending sort field.
    pub sort_field: String,
    /// Secondary ascending sort that orders rows sharing a `sort_field`
    /// value, so page boundaries stay put between requests.
    pub tie_break: Option<String>,
}

/// Decoded response for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub items: Vec<Record>,
    pub total_count: u64,
    pub current_page: u32,
}

impl PageResponse {
    /// Whether the server-reported total implies another page after this one.
    ///
    /// Only the count arithmetic decides: a short page mid-range is not
    /// treated as end-of-data.
    #[must_use]
    pub fn has_more(&self, page_size: u32) -> bool {
        u64::from(self.current_page) * u64::from(page_size) < self.total_count
    }
}

/// Number of pages a run should fetch for `total_count` rows.
#[must_use]
pub fn expected_pages(total_count: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(u64::from(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(current_page: u32, total_count: u64) -> PageResponse {
        PageResponse {
            items: Vec::new(),
            total_count,
            current_page,
        }
    }

    #[test]
    fn select_path_walks_objects_and_arrays() {
        let doc = json!({"data": {"items": [{"id": 1}, {"id": 2}]}, "total_count": 2});
        assert_eq!(select_path(&doc, "total_count"), Some(&json!(2)));
        assert_eq!(select_path(&doc, "data.items.1.id"), Some(&json!(2)));
        assert_eq!(select_path(&doc, ""), Some(&doc));
        assert!(select_path(&doc, "data.missing").is_none());
        assert!(select_path(&doc, "total_count.deeper").is_none());
    }

    #[test]
    fn record_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("x")).is_none());
        assert!(Record::from_value(json!({})).is_some());
    }

    #[test]
    fn record_key_renders_scalars() {
        let rec = Record::from_value(json!({"entity_id": 17, "sku": "A-1"})).unwrap();
        assert_eq!(rec.key("entity_id"), Some("17".into()));
        assert_eq!(rec.key("sku"), Some("A-1".into()));
        assert_eq!(rec.key("missing"), None);
    }

    #[test]
    fn record_get_supports_dotted_paths() {
        let rec = Record::from_value(json!({"meta": {"updated_at": "2024-01-01"}})).unwrap();
        assert_eq!(rec.get("meta.updated_at"), Some(&json!("2024-01-01")));
    }

    #[test]
    fn has_more_uses_count_arithmetic() {
        assert!(page(1, 250).has_more(100));
        assert!(page(2, 250).has_more(100));
        assert!(!page(3, 250).has_more(100));
        assert!(!page(2, 200).has_more(100));
        assert!(!page(1, 0).has_more(100));
    }

    #[test]
    fn expected_pages_rounds_up() {
        assert_eq!(expected_pages(250, 100), 3);
        assert_eq!(expected_pages(200, 100), 2);
        assert_eq!(expected_pages(0, 100), 0);
        assert_eq!(expected_pages(1, 100), 1);
    }
}
