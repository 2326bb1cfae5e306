//! Destination store capability.
//!
//! Each resource owns one table namespace, keyed by resource name. Every
//! write call is atomic: a page is either fully applied or not at all.

pub mod memory;
pub mod sqlite;

use restsync_types::page::Record;
use restsync_types::state::ResourceName;

pub use memory::MemoryDestination;
pub use sqlite::SqliteDestination;

/// Errors produced by [`Destination`] operations.
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("{context}: {source}")]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("record in '{table}' has no primary key '{primary_key}'")]
    MissingKey { table: String, primary_key: String },

    #[error("destination lock poisoned")]
    LockPoisoned,
}

impl DestinationError {
    pub(crate) fn sqlite(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Sqlite { context, source }
    }

    pub(crate) fn missing_key(table: &ResourceName, primary_key: &str) -> Self {
        Self::MissingKey {
            table: table.to_string(),
            primary_key: primary_key.to_string(),
        }
    }
}

/// Outcome of one write call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Records handed to the destination.
    pub applied: u64,
    /// Rows actually inserted or modified. Re-applying identical records
    /// under merge changes nothing.
    pub changed: u64,
}

impl LoadSummary {
    pub fn add(&mut self, other: LoadSummary) {
        self.applied += other.applied;
        self.changed += other.changed;
    }
}

/// Writes records for one resource table at a time.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn Destination>`.
pub trait Destination: Send + Sync {
    /// Insert-or-replace each record keyed by `primary_key`. Later records in
    /// the batch win over earlier ones with the same key.
    ///
    /// # Errors
    ///
    /// Fails without applying anything if any record lacks the key.
    fn upsert(
        &self,
        table: &ResourceName,
        primary_key: &str,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError>;

    /// Insert every record without key-based deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn append(&self, table: &ResourceName, records: &[Record])
        -> Result<LoadSummary, DestinationError>;

    /// Add records to the staging area for a pending full replacement.
    /// Staged rows are invisible to [`Destination::fetch_all`].
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn stage(&self, table: &ResourceName, records: &[Record])
        -> Result<LoadSummary, DestinationError>;

    /// Atomically swap the staged rows in as the table's entire contents.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn promote_staged(&self, table: &ResourceName) -> Result<LoadSummary, DestinationError>;

    /// Drop staged rows, leaving the live table untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn discard_staged(&self, table: &ResourceName) -> Result<(), DestinationError>;

    /// Replace the table's contents with `records` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn replace_all(
        &self,
        table: &ResourceName,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        self.discard_staged(table)?;
        let staged = self.stage(table, records)?;
        let promoted = self.promote_staged(table)?;
        Ok(LoadSummary {
            applied: staged.applied,
            changed: promoted.changed,
        })
    }

    /// Number of live rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn row_count(&self, table: &ResourceName) -> Result<u64, DestinationError>;

    /// Every live row in `table`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    fn fetch_all(&self, table: &ResourceName) -> Result<Vec<Record>, DestinationError>;
}

/// Render each record's key, failing on the first one that lacks it.
pub(crate) fn keyed<'a>(
    table: &ResourceName,
    primary_key: &str,
    records: &'a [Record],
) -> Result<Vec<(String, &'a Record)>, DestinationError> {
    records
        .iter()
        .map(|r| {
            r.key(primary_key)
                .map(|k| (k, r))
                .ok_or_else(|| DestinationError::missing_key(table, primary_key))
        })
        .collect()
}
