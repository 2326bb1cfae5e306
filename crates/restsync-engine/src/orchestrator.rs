//! Pipeline orchestrator: drives every registered resource to exhaustion,
//! applies pages, commits watermarks, and assembles the run report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use restsync_state::StateBackend;
use restsync_types::resource::ResourceDescriptor;
use restsync_types::state::{PipelineId, ResourceName, RunStats};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::types::{DriftPolicy, ExecutionConfig, PipelineConfig};
use crate::config::validator::{build_registry, validate_pipeline};
use crate::config::ConfigurationError;
use crate::destination::Destination;
use crate::error::{PipelineError, RetryPolicy};
use crate::extractor::Extractor;
use crate::http::HttpClient;
use crate::loader::MergeLoader;
use crate::paginator::Paginator;
use crate::registry::ResourceRegistry;
use crate::report::{CheckResult, ResourceReport, ResourceStatus, RunReport};
use crate::resolve::{
    check_destination, check_state_backend, create_destination, create_http_client,
    create_state_backend,
};
use crate::watermark::WatermarkStore;

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

/// Execution knobs shared by every resource in a run.
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub retry: RetryPolicy,
    pub drift: DriftPolicy,
    /// Resources processed concurrently. Pages within a resource are
    /// always sequential.
    pub parallelism: usize,
    pub lease_ttl: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for RunSettings {
    fn from(exec: &ExecutionConfig) -> Self {
        Self {
            retry: exec.retry_policy(),
            drift: exec.on_total_drift,
            parallelism: usize::try_from(exec.parallelism.max(1)).unwrap_or(1),
            lease_ttl: exec.lease_ttl(),
        }
    }
}

struct RunContext {
    pipeline: PipelineId,
    registry: ResourceRegistry,
    extractor: Arc<Extractor>,
    state: Arc<dyn StateBackend>,
    watermarks: Arc<WatermarkStore>,
    loader: Arc<MergeLoader>,
    settings: RunSettings,
    /// Lease holder identity, unique per orchestrator instance.
    holder: String,
}

/// Runs the resources of one pipeline.
///
/// Resource failures are recorded in the [`RunReport`] and never abort the
/// remaining resources.
pub struct Orchestrator {
    ctx: Arc<RunContext>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        pipeline: PipelineId,
        registry: ResourceRegistry,
        extractor: Extractor,
        state: Arc<dyn StateBackend>,
        destination: Arc<dyn Destination>,
        settings: RunSettings,
    ) -> Self {
        let holder = format!(
            "{}-{}",
            std::process::id(),
            NEXT_HOLDER.fetch_add(1, Ordering::Relaxed)
        );
        let watermarks = Arc::new(WatermarkStore::new(state.clone(), pipeline.clone()));
        Self {
            ctx: Arc::new(RunContext {
                pipeline,
                registry,
                extractor: Arc::new(extractor),
                state,
                watermarks,
                loader: Arc::new(MergeLoader::new(destination)),
                settings,
                holder,
            }),
        }
    }

    /// Validate `config` and wire an orchestrator around the given
    /// capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] listing every validation problem.
    pub fn from_config(
        config: &PipelineConfig,
        http: Arc<dyn HttpClient>,
        state: Arc<dyn StateBackend>,
        destination: Arc<dyn Destination>,
    ) -> Result<Self, ConfigurationError> {
        let registry = build_registry(config)?;
        Ok(Self::new(
            PipelineId::new(config.pipeline.clone()),
            registry,
            Extractor::new(http, config.query.style),
            state,
            destination,
            RunSettings::from(&config.execution),
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.ctx.registry
    }

    #[must_use]
    pub fn watermarks(&self) -> &Arc<WatermarkStore> {
        &self.ctx.watermarks
    }

    /// Run every resource once, in registry order.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let ctx = &self.ctx;
        tracing::info!(
            pipeline = ctx.pipeline.as_str(),
            resources = ctx.registry.len(),
            parallelism = ctx.settings.parallelism,
            "Starting pipeline run"
        );

        let resources = if ctx.settings.parallelism <= 1 {
            let mut reports = Vec::with_capacity(ctx.registry.len());
            for descriptor in &ctx.registry {
                reports.push(ctx.run_resource(descriptor, cancel).await);
            }
            reports
        } else {
            self.run_parallel(cancel).await
        };

        let report = RunReport::new(
            ctx.pipeline.to_string(),
            started_at,
            start.elapsed().as_secs_f64(),
            resources,
        );
        tracing::info!(
            pipeline = ctx.pipeline.as_str(),
            status = ?report.status,
            records_loaded = report.total_records_loaded(),
            retries = report.total_retries(),
            duration_secs = report.duration_secs,
            "Pipeline run finished"
        );
        report
    }

    async fn run_parallel(&self, cancel: &CancellationToken) -> Vec<ResourceReport> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.ctx.settings.parallelism));
        let mut join_set: JoinSet<(usize, ResourceReport)> = JoinSet::new();

        for (index, descriptor) in self.ctx.registry.iter().enumerate() {
            let ctx = self.ctx.clone();
            let descriptor = descriptor.clone();
            let cancel = cancel.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let report = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let report = ctx.run_resource(&descriptor, &cancel).await;
                        drop(permit);
                        report
                    }
                    Err(e) => ResourceReport::failed_before_start(
                        descriptor.name.clone(),
                        format!("Semaphore closed: {e}"),
                    ),
                };
                (index, report)
            });
        }

        let mut slots: Vec<Option<ResourceReport>> = vec![None; self.ctx.registry.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => tracing::error!("Resource task panicked: {e}"),
            }
        }

        slots
            .into_iter()
            .zip(self.ctx.registry.iter())
            .map(|(slot, descriptor)| {
                slot.unwrap_or_else(|| ResourceReport {
                    error: Some("resource task panicked".into()),
                    ..ResourceReport::new(descriptor.name.clone())
                })
            })
            .collect()
    }
}

impl RunContext {
    async fn run_resource(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> ResourceReport {
        let name = descriptor.name.clone();
        if cancel.is_cancelled() {
            return ResourceReport {
                status: ResourceStatus::Cancelled,
                error: Some(PipelineError::Cancelled.to_string()),
                ..ResourceReport::new(name)
            };
        }

        match self.acquire_lease(&name).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    pipeline = self.pipeline.as_str(),
                    resource = name.as_str(),
                    "Another run holds this resource, skipping"
                );
                return ResourceReport::failed_before_start(
                    name,
                    "another run of this resource is in progress",
                );
            }
            Err(e) => return ResourceReport::failed_before_start(name, e.to_string()),
        }

        let report = self.run_leased(descriptor, cancel).await;

        let state = self.state.clone();
        let pipeline = self.pipeline.clone();
        let holder = self.holder.clone();
        let lease_name = name.clone();
        if let Err(e) = blocking("release_lease", move || {
            state.release_lease(&pipeline, &lease_name, &holder)
        })
        .await
        {
            tracing::warn!(resource = name.as_str(), "Failed to release run lease: {e}");
        }
        report
    }

    async fn acquire_lease(&self, name: &ResourceName) -> Result<bool, PipelineError> {
        let state = self.state.clone();
        let pipeline = self.pipeline.clone();
        let holder = self.holder.clone();
        let name = name.clone();
        let ttl = self.settings.lease_ttl;
        blocking("acquire_lease", move || {
            state.acquire_lease(&pipeline, &name, &holder, ttl)
        })
        .await
    }

    /// Extend the lease as the current holder. Fails once another run has
    /// claimed it after expiry.
    async fn renew_lease(&self, name: &ResourceName) -> Result<(), PipelineError> {
        if self.acquire_lease(name).await? {
            return Ok(());
        }
        tracing::error!(
            pipeline = self.pipeline.as_str(),
            resource = name.as_str(),
            holder = self.holder.as_str(),
            "Run lease taken over by another run"
        );
        Err(PipelineError::Infrastructure(anyhow::anyhow!(
            "run lease for '{name}' expired and was taken by another run"
        )))
    }

    async fn run_leased(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> ResourceReport {
        let name = descriptor.name.clone();

        let state = self.state.clone();
        let pipeline = self.pipeline.clone();
        let run_name = name.clone();
        let run_id = match blocking("start_run", move || state.start_run(&pipeline, &run_name)).await
        {
            Ok(id) => id,
            Err(e) => return ResourceReport::failed_before_start(name, e.to_string()),
        };

        let store = self.watermarks.clone();
        let desc = descriptor.clone();
        let starting = match blocking("watermark read", move || store.get(&desc)).await {
            Ok(w) => w,
            Err(e) => {
                let report = ResourceReport::failed_before_start(name, e.to_string());
                self.complete_run(run_id, &report).await;
                return report;
            }
        };

        tracing::info!(
            pipeline = self.pipeline.as_str(),
            resource = name.as_str(),
            disposition = %descriptor.write_disposition,
            watermark = starting.as_deref(),
            "Resource run started"
        );

        let mut report = ResourceReport::new(name.clone());
        report.starting_watermark.clone_from(&starting);
        report.final_watermark.clone_from(&starting);

        let mut paginator = Paginator::new(
            self.extractor.clone(),
            descriptor.clone(),
            starting,
            self.settings.retry,
            self.settings.drift,
            cancel.clone(),
        );
        let mut pages_applied = 0u64;
        let outcome = self
            .drive(descriptor, &mut paginator, &mut report, &mut pages_applied)
            .await;

        let stats = paginator.stats();
        report.pages_fetched = stats.pages_fetched;
        report.records_read = stats.records_read;
        report.retries = stats.retries;
        report.drift_events = stats.drift_events;

        match outcome {
            Ok(()) => report.status = ResourceStatus::Succeeded,
            Err(err) => {
                let loader = self.loader.clone();
                let desc = descriptor.clone();
                if let Err(e) = blocking("loader abort", move || loader.abort(&desc)).await {
                    tracing::warn!(resource = name.as_str(), "Failed to discard staged rows: {e}");
                }
                self.watermarks.abandon(&name);

                report.status = match err {
                    PipelineError::Cancelled => ResourceStatus::Cancelled,
                    _ if pages_applied > 0 => ResourceStatus::PartiallySucceeded,
                    _ => ResourceStatus::Failed,
                };
                tracing::error!(
                    pipeline = self.pipeline.as_str(),
                    resource = name.as_str(),
                    pages_applied,
                    watermark = report.final_watermark.as_deref(),
                    "Resource run failed: {err}"
                );
                report.error = Some(err.to_string());
            }
        }

        tracing::info!(
            pipeline = self.pipeline.as_str(),
            resource = name.as_str(),
            status = ?report.status,
            pages = report.pages_fetched,
            records_loaded = report.records_loaded,
            records_changed = report.records_changed,
            retries = report.retries,
            watermark = report.final_watermark.as_deref(),
            "Resource run finished"
        );
        self.complete_run(run_id, &report).await;
        report
    }

    /// Page loop. Each applied page is checkpointed when the resource's sort
    /// order makes the running maximum safe to persist. The lease is renewed
    /// before every destination write.
    async fn drive(
        &self,
        descriptor: &ResourceDescriptor,
        paginator: &mut Paginator,
        report: &mut ResourceReport,
        pages_applied: &mut u64,
    ) -> Result<(), PipelineError> {
        let per_page = descriptor.checkpoints_per_page();

        // Staging left behind by a killed replace run must not be promoted.
        let loader = self.loader.clone();
        let desc = descriptor.clone();
        blocking("loader begin", move || loader.begin(&desc)).await?;

        while let Some(page) = paginator.next_page().await? {
            self.renew_lease(&descriptor.name).await?;
            let loader = self.loader.clone();
            let desc = descriptor.clone();
            let summary = blocking("page apply", move || loader.apply(&desc, &page.items)).await?;
            report.records_loaded += summary.applied;
            report.records_changed += summary.changed;
            *pages_applied += 1;

            if per_page {
                if let Some(committed) = self.checkpoint(&descriptor.name, paginator.max_cursor()).await? {
                    report.final_watermark = Some(committed);
                }
            }
        }

        self.renew_lease(&descriptor.name).await?;
        let loader = self.loader.clone();
        let desc = descriptor.clone();
        let promoted = blocking("loader finish", move || loader.finish(&desc)).await?;
        report.records_changed += promoted.changed;

        if let Some(committed) = self.checkpoint(&descriptor.name, paginator.max_cursor()).await? {
            report.final_watermark = Some(committed);
        }
        Ok(())
    }

    async fn checkpoint(
        &self,
        name: &ResourceName,
        max_cursor: Option<&str>,
    ) -> Result<Option<String>, PipelineError> {
        let Some(value) = max_cursor.map(str::to_string) else {
            return Ok(None);
        };
        let store = self.watermarks.clone();
        let name = name.clone();
        blocking("watermark commit", move || {
            store.propose(&name, &value)?;
            store.commit(&name)
        })
        .await
    }

    async fn complete_run(&self, run_id: i64, report: &ResourceReport) {
        let state = self.state.clone();
        let status = report.status.run_status();
        let stats = RunStats {
            pages_fetched: report.pages_fetched,
            records_read: report.records_read,
            records_loaded: report.records_loaded,
            retries: report.retries,
            final_watermark: report.final_watermark.clone(),
            error_message: report.error.clone(),
        };
        if let Err(e) = blocking("complete_run", move || state.complete_run(run_id, status, &stats)).await {
            tracing::warn!(
                resource = report.resource.as_str(),
                run_id,
                "Failed to record run history: {e}"
            );
        }
    }
}

/// Run a synchronous state or destination call off the async runtime.
async fn blocking<T, E, F>(what: &'static str, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!("{what} task panicked: {e}")))?
        .map_err(Into::into)
}

/// Validate `config`, open its state, destination, and HTTP client, and run
/// every resource once.
///
/// # Errors
///
/// Returns `PipelineError::Config` before any extraction when validation
/// fails, or `PipelineError::Infrastructure` when a backend cannot be
/// opened. Resource-level failures are reported in the [`RunReport`].
pub async fn run_pipeline(
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RunReport, PipelineError> {
    let registry = build_registry(config)?;
    let state = create_state_backend(config)?;
    let destination = create_destination(config)?;
    let http = create_http_client(config)?;

    let orchestrator = Orchestrator::new(
        PipelineId::new(config.pipeline.clone()),
        registry,
        Extractor::new(http, config.query.style),
        state,
        destination,
        RunSettings::from(&config.execution),
    );
    Ok(orchestrator.run(cancel).await)
}

/// Check a pipeline: validate configuration and open its backends without
/// fetching anything.
///
/// # Errors
///
/// Returns an error if a backend check task panics.
pub async fn check_pipeline(config: &PipelineConfig) -> Result<CheckResult> {
    tracing::info!(
        pipeline = config.pipeline,
        "Checking pipeline configuration"
    );

    let problems = match validate_pipeline(config) {
        Ok(()) => Vec::new(),
        Err(e) => e.problems,
    };
    let resources = config
        .resource_descriptors()
        .into_iter()
        .map(|d| d.name)
        .collect();

    let config_for_state = config.clone();
    let state_ok = tokio::task::spawn_blocking(move || check_state_backend(&config_for_state))
        .await
        .map_err(|e| anyhow::anyhow!("State check task panicked: {e}"))?;
    let config_for_dest = config.clone();
    let destination_ok = tokio::task::spawn_blocking(move || check_destination(&config_for_dest))
        .await
        .map_err(|e| anyhow::anyhow!("Destination check task panicked: {e}"))?;

    Ok(CheckResult {
        pipeline: config.pipeline.clone(),
        resources,
        state_ok,
        destination_ok,
        problems,
    })
}
