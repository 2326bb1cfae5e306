//! Watermark staging and durable commit.
//!
//! The store reads the committed watermark at the start of a resource run,
//! stages proposals in memory, and persists only on [`WatermarkStore::commit`]
//! via compare-and-set against the value read at start. A crash before
//! commit leaves the prior watermark untouched.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use restsync_state::{StateBackend, StateError};
use restsync_types::cursor::compare_cursor_values;
use restsync_types::resource::ResourceDescriptor;
use restsync_types::state::{PipelineId, ResourceName, WatermarkState};

/// In-flight watermark for one resource.
#[derive(Debug, Clone)]
struct Staged {
    cursor_field: Option<String>,
    /// Persisted value at the last read or successful commit.
    committed: Option<String>,
    proposed: Option<String>,
}

/// Per-pipeline watermark access over a [`StateBackend`].
pub struct WatermarkStore {
    backend: Arc<dyn StateBackend>,
    pipeline: PipelineId,
    staged: Mutex<HashMap<ResourceName, Staged>>,
}

impl WatermarkStore {
    pub fn new(backend: Arc<dyn StateBackend>, pipeline: PipelineId) -> Self {
        Self {
            backend,
            pipeline,
            staged: Mutex::new(HashMap::new()),
        }
    }

    fn lock_staged(&self) -> Result<MutexGuard<'_, HashMap<ResourceName, Staged>>, StateError> {
        self.staged.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Effective watermark for `descriptor`: the committed value, else the
    /// descriptor's initial value. `None` for non-incremental resources.
    ///
    /// Also records the committed value as the baseline for the next commit.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the backend read fails.
    pub fn get(&self, descriptor: &ResourceDescriptor) -> Result<Option<String>, StateError> {
        let committed = self
            .backend
            .get_watermark(&self.pipeline, &descriptor.name)?
            .map(|w| w.value);

        self.lock_staged()?.insert(
            descriptor.name.clone(),
            Staged {
                cursor_field: descriptor.cursor_path().map(str::to_string),
                committed: committed.clone(),
                proposed: None,
            },
        );

        Ok(committed.or_else(|| descriptor.initial_watermark().map(str::to_string)))
    }

    /// Stage `value` for `resource`. No durable effect until [`commit`].
    ///
    /// Proposals at or below the committed or already-staged value are
    /// ignored, so the watermark never regresses. Returns whether the
    /// proposal was staged.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Conflict`] if [`get`] was never called for
    /// `resource` in this run.
    ///
    /// [`commit`]: WatermarkStore::commit
    /// [`get`]: WatermarkStore::get
    pub fn propose(&self, resource: &ResourceName, value: &str) -> Result<bool, StateError> {
        let mut staged = self.lock_staged()?;
        let entry = staged
            .get_mut(resource)
            .ok_or_else(|| StateError::conflict(resource.as_str(), "watermark proposed before read"))?;

        let floor = match (&entry.proposed, &entry.committed) {
            (Some(p), _) => Some(p.as_str()),
            (None, Some(c)) => Some(c.as_str()),
            (None, None) => None,
        };
        if floor.is_some_and(|f| compare_cursor_values(value, f) != Ordering::Greater) {
            return Ok(false);
        }
        entry.proposed = Some(value.to_string());
        Ok(true)
    }

    /// Staged-but-uncommitted value, if any.
    #[must_use]
    pub fn staged(&self, resource: &ResourceName) -> Option<String> {
        self.lock_staged()
            .ok()
            .and_then(|s| s.get(resource).and_then(|e| e.proposed.clone()))
    }

    /// Durably persist the staged value for `resource`.
    ///
    /// Returns the newly committed value, or `None` when nothing was staged.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Conflict`] when the stored watermark changed
    /// since it was read (another writer), or a backend error.
    pub fn commit(&self, resource: &ResourceName) -> Result<Option<String>, StateError> {
        let mut staged = self.lock_staged()?;
        let Some(entry) = staged.get_mut(resource) else {
            return Ok(None);
        };
        let Some(value) = entry.proposed.clone() else {
            return Ok(None);
        };

        let new_state = WatermarkState {
            cursor_field: entry.cursor_field.clone(),
            value: value.clone(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        let swapped = self.backend.compare_and_set(
            &self.pipeline,
            resource,
            entry.committed.as_deref(),
            &new_state,
        )?;
        if !swapped {
            tracing::error!(
                pipeline = self.pipeline.as_str(),
                resource = resource.as_str(),
                expected = entry.committed.as_deref(),
                "Watermark changed by another writer, refusing to overwrite"
            );
            return Err(StateError::conflict(
                resource.as_str(),
                "watermark changed by another writer",
            ));
        }

        tracing::info!(
            pipeline = self.pipeline.as_str(),
            resource = resource.as_str(),
            cursor_field = entry.cursor_field.as_deref(),
            watermark = value.as_str(),
            "Watermark committed"
        );
        entry.committed = Some(value.clone());
        entry.proposed = None;
        Ok(Some(value))
    }

    /// Drop any staged value without persisting it.
    pub fn abandon(&self, resource: &ResourceName) {
        if let Ok(mut staged) = self.lock_staged() {
            if let Some(entry) = staged.get_mut(resource) {
                entry.proposed = None;
            }
        }
    }

    /// Operator override: store `value` unconditionally, even if lower.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on backend failure.
    pub fn set(&self, descriptor: &ResourceDescriptor, value: &str) -> Result<(), StateError> {
        let state = WatermarkState {
            cursor_field: descriptor.cursor_path().map(str::to_string),
            value: value.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        self.backend
            .set_watermark(&self.pipeline, &descriptor.name, &state)?;
        tracing::warn!(
            pipeline = self.pipeline.as_str(),
            resource = descriptor.name.as_str(),
            watermark = value,
            "Watermark overridden by operator"
        );
        Ok(())
    }

    /// Operator override: forget the watermark so the next run starts from
    /// the initial value. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on backend failure.
    pub fn reset(&self, resource: &ResourceName) -> Result<bool, StateError> {
        let existed = self.backend.clear_watermark(&self.pipeline, resource)?;
        tracing::warn!(
            pipeline = self.pipeline.as_str(),
            resource = resource.as_str(),
            existed,
            "Watermark reset by operator"
        );
        Ok(existed)
    }

    /// Committed watermark row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on backend failure.
    pub fn committed(&self, resource: &ResourceName) -> Result<Option<WatermarkState>, StateError> {
        self.backend.get_watermark(&self.pipeline, resource)
    }
}
