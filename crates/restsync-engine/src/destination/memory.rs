//! In-process [`Destination`], used for dry runs and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use restsync_types::page::Record;
use restsync_types::state::ResourceName;

use super::{keyed, Destination, DestinationError, LoadSummary};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Record>,
    /// Primary key to row position, for rows written by `upsert`.
    index: HashMap<String, usize>,
    staged: Vec<Record>,
}

/// Tables held in memory behind a single mutex.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: Mutex<HashMap<ResourceName, Table>>,
}

impl MemoryDestination {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ResourceName, Table>>, DestinationError> {
        self.tables.lock().map_err(|_| DestinationError::LockPoisoned)
    }
}

impl Destination for MemoryDestination {
    fn upsert(
        &self,
        table: &ResourceName,
        primary_key: &str,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        let keyed = keyed(table, primary_key, records)?;
        let mut tables = self.lock()?;
        let t = tables.entry(table.clone()).or_default();
        let mut changed = 0u64;
        for (key, record) in keyed {
            match t.index.get(&key) {
                Some(&pos) if t.rows[pos] == *record => {}
                Some(&pos) => {
                    t.rows[pos] = record.clone();
                    changed += 1;
                }
                None => {
                    t.index.insert(key, t.rows.len());
                    t.rows.push(record.clone());
                    changed += 1;
                }
            }
        }
        Ok(LoadSummary {
            applied: records.len() as u64,
            changed,
        })
    }

    fn append(
        &self,
        table: &ResourceName,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        let mut tables = self.lock()?;
        let t = tables.entry(table.clone()).or_default();
        t.rows.extend_from_slice(records);
        let n = records.len() as u64;
        Ok(LoadSummary {
            applied: n,
            changed: n,
        })
    }

    fn stage(
        &self,
        table: &ResourceName,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        let mut tables = self.lock()?;
        tables
            .entry(table.clone())
            .or_default()
            .staged
            .extend_from_slice(records);
        Ok(LoadSummary {
            applied: records.len() as u64,
            changed: 0,
        })
    }

    fn promote_staged(&self, table: &ResourceName) -> Result<LoadSummary, DestinationError> {
        let mut tables = self.lock()?;
        let t = tables.entry(table.clone()).or_default();
        t.rows = std::mem::take(&mut t.staged);
        t.index.clear();
        let n = t.rows.len() as u64;
        Ok(LoadSummary {
            applied: 0,
            changed: n,
        })
    }

    fn discard_staged(&self, table: &ResourceName) -> Result<(), DestinationError> {
        if let Some(t) = self.lock()?.get_mut(table) {
            t.staged.clear();
        }
        Ok(())
    }

    fn row_count(&self, table: &ResourceName) -> Result<u64, DestinationError> {
        Ok(self
            .lock()?
            .get(table)
            .map_or(0, |t| t.rows.len() as u64))
    }

    fn fetch_all(&self, table: &ResourceName) -> Result<Vec<Record>, DestinationError> {
        Ok(self
            .lock()?
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default())
    }
}
