//! State backend trait definition.
//!
//! [`StateBackend`] defines the storage contract for resource watermarks,
//! run leases, and run history. Model types live in
//! [`restsync_types::state`].

use std::time::Duration;

use restsync_types::state::{
    PipelineId, ResourceName, RunRecord, RunStats, RunStatus, WatermarkState,
};

use crate::error;

/// Storage contract for pipeline state.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateBackend>`.
/// Every write is atomic per (pipeline, resource) key.
pub trait StateBackend: Send + Sync {
    /// Read the committed watermark for a (pipeline, resource) pair.
    ///
    /// Returns `Ok(None)` when no watermark has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
    ) -> error::Result<Option<WatermarkState>>;

    /// Unconditionally upsert the watermark (operator override).
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn set_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        state: &WatermarkState,
    ) -> error::Result<()>;

    /// Compare-and-set: atomically replace the watermark only if the stored
    /// value still equals `expected`.
    ///
    /// When `expected` is `None`, succeeds only if no watermark exists
    /// (insert-if-absent). Returns `false` when the current value didn't match.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn compare_and_set(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        expected: Option<&str>,
        new_state: &WatermarkState,
    ) -> error::Result<bool>;

    /// Delete the watermark so the next run starts from the initial value.
    ///
    /// Returns `true` if a watermark existed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn clear_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
    ) -> error::Result<bool>;

    /// Try to take the single-run lease for a resource.
    ///
    /// Succeeds if the lease is free, expired, or already held by `holder`
    /// (in which case it is extended). Returns `false` if another holder owns
    /// a live lease.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn acquire_lease(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        holder: &str,
        ttl: Duration,
    ) -> error::Result<bool>;

    /// Release a lease held by `holder`. Releasing a lease held by someone
    /// else is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn release_lease(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        holder: &str,
    ) -> error::Result<()>;

    /// Begin a new resource run, returning its unique ID.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn start_run(&self, pipeline: &PipelineId, resource: &ResourceName) -> error::Result<i64>;

    /// Finalize a resource run with status and aggregate stats.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn complete_run(&self, run_id: i64, status: RunStatus, stats: &RunStats) -> error::Result<()>;

    /// Most recent runs for a pipeline, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn recent_runs(&self, pipeline: &PipelineId, limit: usize) -> error::Result<Vec<RunRecord>>;
}
