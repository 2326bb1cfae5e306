//! Run report types.

use chrono::{DateTime, Utc};
use restsync_types::state::{ResourceName, RunStatus};
use serde::Serialize;

/// Outcome of one resource within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Paginated to exhaustion and committed its watermark.
    Succeeded,
    /// Failed after at least one page was applied. The watermark reflects
    /// only fully-applied pages.
    PartiallySucceeded,
    /// Failed before any page was applied.
    Failed,
    /// Never started: lease held elsewhere or state unavailable.
    FailedBeforeStart,
    Cancelled,
}

impl ResourceStatus {
    /// Status recorded in the state backend's run history.
    #[must_use]
    pub fn run_status(self) -> RunStatus {
        match self {
            Self::Succeeded => RunStatus::Completed,
            Self::PartiallySucceeded => RunStatus::Partial,
            Self::Failed | Self::FailedBeforeStart => RunStatus::Failed,
            Self::Cancelled => RunStatus::Cancelled,
        }
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::PartiallySucceeded | Self::Failed | Self::FailedBeforeStart
        )
    }
}

/// Per-resource counters and watermarks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReport {
    pub resource: ResourceName,
    pub status: ResourceStatus,
    pub pages_fetched: u64,
    pub records_read: u64,
    /// Records handed to the destination.
    pub records_loaded: u64,
    /// Rows the destination actually inserted or modified.
    pub records_changed: u64,
    pub retries: u64,
    pub drift_events: u64,
    pub starting_watermark: Option<String>,
    /// Committed watermark after the run.
    pub final_watermark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceReport {
    pub(crate) fn new(resource: ResourceName) -> Self {
        Self {
            resource,
            status: ResourceStatus::Failed,
            pages_fetched: 0,
            records_read: 0,
            records_loaded: 0,
            records_changed: 0,
            retries: 0,
            drift_events: 0,
            starting_watermark: None,
            final_watermark: None,
            error: None,
        }
    }

    pub(crate) fn failed_before_start(resource: ResourceName, error: impl Into<String>) -> Self {
        Self {
            status: ResourceStatus::FailedBeforeStart,
            error: Some(error.into()),
            ..Self::new(resource)
        }
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    /// At least one resource failed; others may have succeeded.
    Failed,
    Cancelled,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub status: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// In registry order.
    pub resources: Vec<ResourceReport>,
}

impl RunReport {
    pub(crate) fn new(
        pipeline: String,
        started_at: DateTime<Utc>,
        duration_secs: f64,
        resources: Vec<ResourceReport>,
    ) -> Self {
        let status = if resources.iter().any(|r| r.status.is_failure()) {
            RunOutcome::Failed
        } else if resources
            .iter()
            .any(|r| r.status == ResourceStatus::Cancelled)
        {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Succeeded
        };
        Self {
            pipeline,
            status,
            started_at,
            duration_secs,
            resources,
        }
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.resource.as_str() == name)
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RunOutcome::Succeeded
    }

    #[must_use]
    pub fn total_records_loaded(&self) -> u64 {
        self.resources.iter().map(|r| r.records_loaded).sum()
    }

    #[must_use]
    pub fn total_retries(&self) -> u64 {
        self.resources.iter().map(|r| r.retries).sum()
    }
}

/// Result of a pipeline check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub pipeline: String,
    pub resources: Vec<ResourceName>,
    pub state_ok: bool,
    pub destination_ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

impl CheckResult {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.state_ok && self.destination_ok && self.problems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, status: ResourceStatus) -> ResourceReport {
        ResourceReport {
            status,
            ..ResourceReport::new(ResourceName::new(name))
        }
    }

    #[test]
    fn any_failure_fails_run() {
        let run = RunReport::new(
            "p".into(),
            Utc::now(),
            0.0,
            vec![
                report("orders", ResourceStatus::Succeeded),
                report("products", ResourceStatus::PartiallySucceeded),
            ],
        );
        assert_eq!(run.status, RunOutcome::Failed);
        assert!(!run.succeeded());
    }

    #[test]
    fn cancellation_without_failure() {
        let run = RunReport::new(
            "p".into(),
            Utc::now(),
            0.0,
            vec![
                report("orders", ResourceStatus::Succeeded),
                report("products", ResourceStatus::Cancelled),
            ],
        );
        assert_eq!(run.status, RunOutcome::Cancelled);
    }

    #[test]
    fn run_status_mapping() {
        assert_eq!(ResourceStatus::Succeeded.run_status(), RunStatus::Completed);
        assert_eq!(
            ResourceStatus::PartiallySucceeded.run_status(),
            RunStatus::Partial
        );
        assert_eq!(
            ResourceStatus::FailedBeforeStart.run_status(),
            RunStatus::Failed
        );
    }

    #[test]
    fn serializes_snake_case() {
        let mut r = report("orders", ResourceStatus::PartiallySucceeded);
        r.final_watermark = Some("2024-01-01".into());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "partially_succeeded");
        assert_eq!(json["resource"], "orders");
        assert_eq!(json["final_watermark"], "2024-01-01");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn totals_and_lookup() {
        let mut a = report("orders", ResourceStatus::Succeeded);
        a.records_loaded = 250;
        a.retries = 3;
        let mut b = report("products", ResourceStatus::Succeeded);
        b.records_loaded = 10;
        let run = RunReport::new("p".into(), Utc::now(), 1.5, vec![a, b]);
        assert_eq!(run.total_records_loaded(), 260);
        assert_eq!(run.total_retries(), 3);
        assert_eq!(run.resource("products").unwrap().records_loaded, 10);
        assert!(run.resource("customers").is_none());
    }
}
