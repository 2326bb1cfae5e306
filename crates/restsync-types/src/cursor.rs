//! Cursor value ordering and max-value tracking for incremental reads.
//!
//! Watermarks are persisted as strings. Two values compare numerically when
//! both parse as numbers and lexicographically otherwise, which orders
//! ISO-8601 and `YYYY-MM-DD HH:MM:SS` timestamps correctly.

use std::cmp::Ordering;

use serde_json::Value;

use crate::page::Record;

/// Order two watermark values.
///
/// Integers compare exactly, other finite decimals as `f64`, everything else
/// as strings. Timestamps are not parsed: values carrying different UTC
/// offsets (`+02:00` vs `Z`) are not normalized and may misorder, so the
/// source must report cursors in one offset.
#[must_use]
pub fn compare_cursor_values(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return x.cmp(&y);
    }
    match (parse_decimal(a), parse_decimal(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

fn parse_decimal(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a JSON scalar as a watermark string.
///
/// Returns `None` for null, booleans, arrays, and objects, none of which
/// can serve as an incremental cursor.
#[must_use]
pub fn cursor_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tracks the maximum cursor value observed during a run.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    cursor_field: String,
    max: Option<String>,
}

impl CursorTracker {
    /// Create a tracker for `cursor_field`.
    #[must_use]
    pub fn new(cursor_field: impl Into<String>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            max: None,
        }
    }

    /// Field this tracker reads from each record.
    #[must_use]
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    /// Record a cursor observation. Updates max if larger.
    pub fn observe(&mut self, value: &str) {
        match &self.max {
            Some(current) if compare_cursor_values(value, current) != Ordering::Greater => {}
            _ => self.max = Some(value.to_string()),
        }
    }

    /// Observe the cursor field of `record`.
    ///
    /// Returns `false` when the record has no usable cursor value.
    pub fn observe_record(&mut self, record: &Record) -> bool {
        match record.get(&self.cursor_field).and_then(cursor_text) {
            Some(value) => {
                self.observe(&value);
                true
            }
            None => false,
        }
    }

    /// Highest value observed so far.
    #[must_use]
    pub fn max(&self) -> Option<&str> {
        self.max.as_deref()
    }
}
