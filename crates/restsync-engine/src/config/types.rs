//! Pipeline YAML configuration model.

use std::collections::BTreeMap;
use std::time::Duration;

use restsync_types::resource::{
    IncrementalFilterSpec, ResourceDescriptor, SortSpec, WriteDisposition,
};
use restsync_types::state::ResourceName;
use serde::{Deserialize, Serialize};

use crate::error::RetryPolicy;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_DATA_SELECTOR: &str = "items";
pub const DEFAULT_TOTAL_PATH: &str = "total_count";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: String,
    pub pipeline: String,
    pub client: ClientConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub resource_defaults: ResourceDefaults,
    pub resources: Vec<ResourceConfig>,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl PipelineConfig {
    /// Resolve every resource against `resource_defaults`, in declaration order.
    #[must_use]
    pub fn resource_descriptors(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .iter()
            .map(|r| r.resolve(&self.resource_defaults))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_verify_tls() -> bool {
    true
}

impl ClientConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Credential attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        token: String,
    },
}

/// How page number, page size, filters, and sort are rendered as query params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStyle {
    /// `searchCriteria[pageSize]`, `searchCriteria[currentPage]`,
    /// `searchCriteria[filter_groups][..]`, `searchCriteria[sortOrders][..]`.
    #[default]
    SearchCriteria,
    /// `page`, `page_size`, `<field>[gte]`, `sort`.
    Plain,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub style: QueryStyle,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Fields inherited by every resource that leaves them unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDefaults {
    pub primary_key: Option<String>,
    pub write_disposition: Option<WriteDisposition>,
    pub page_size: Option<u32>,
    pub data_selector: Option<String>,
    pub total_path: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub path: String,
    pub primary_key: Option<String>,
    pub write_disposition: Option<WriteDisposition>,
    pub page_size: Option<u32>,
    pub data_selector: Option<String>,
    pub total_path: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub incremental: Option<IncrementalFilterSpec>,
    pub sort: Option<SortSpec>,
}

impl ResourceConfig {
    /// Merge this resource over `defaults` into a run-time descriptor.
    ///
    /// The sort field defaults to the cursor field for incremental resources
    /// and to the primary key otherwise.
    #[must_use]
    pub fn resolve(&self, defaults: &ResourceDefaults) -> ResourceDescriptor {
        let primary_key = self
            .primary_key
            .clone()
            .or_else(|| defaults.primary_key.clone())
            .unwrap_or_default();
        let sort_field = match (&self.sort, &self.incremental) {
            (Some(sort), _) => sort.field.clone(),
            (None, Some(inc)) => inc.cursor_path.clone(),
            (None, None) => primary_key.clone(),
        };
        let mut params = defaults.params.clone();
        params.extend(self.params.clone());

        ResourceDescriptor {
            name: ResourceName::new(self.name.clone()),
            path: self.path.clone(),
            primary_key,
            write_disposition: self
                .write_disposition
                .or(defaults.write_disposition)
                .unwrap_or_default(),
            page_size: self
                .page_size
                .or(defaults.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            incremental: self.incremental.clone(),
            sort_field,
            data_selector: self
                .data_selector
                .clone()
                .or_else(|| defaults.data_selector.clone())
                .unwrap_or_else(|| DEFAULT_DATA_SELECTOR.to_string()),
            total_path: self
                .total_path
                .clone()
                .or_else(|| defaults.total_path.clone())
                .unwrap_or_else(|| DEFAULT_TOTAL_PATH.to_string()),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Destination and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationBackendKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(default)]
    pub backend: DestinationBackendKind,
    pub connection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path of the `SQLite` state database. Defaults to `~/.restsync/state.db`.
    pub connection: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution policy
// ---------------------------------------------------------------------------

/// Reaction to a server-reported total that changes between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Warn, count the event, and keep paginating on the latest total.
    #[default]
    Tolerate,
    /// Stop the resource with a drift error at the last good page.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    #[serde(default)]
    pub on_total_drift: DriftPolicy,
    /// Lifetime of the per-resource run lease.
    #[serde(default = "default_lease_ttl_seconds")]
    pub lease_ttl_seconds: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    60_000
}
fn default_parallelism() -> u32 {
    1
}
fn default_lease_ttl_seconds() -> u64 {
    3_600
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            parallelism: default_parallelism(),
            on_total_drift: DriftPolicy::default(),
            lease_ttl_seconds: default_lease_ttl_seconds(),
        }
    }
}

impl ExecutionConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    #[must_use]
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }
}
