//! Applies pages of records to the destination per write disposition.

use std::sync::Arc;

use restsync_types::page::Record;
use restsync_types::resource::{ResourceDescriptor, WriteDisposition};

use crate::destination::{Destination, DestinationError, LoadSummary};

/// Routes each page to the destination operation its disposition requires.
///
/// `replace` resources are staged page by page and swapped in by
/// [`MergeLoader::finish`] once the resource is exhausted, so a failed run
/// never leaves a half-replaced table.
pub struct MergeLoader {
    destination: Arc<dyn Destination>,
}

impl MergeLoader {
    pub fn new(destination: Arc<dyn Destination>) -> Self {
        Self { destination }
    }

    #[must_use]
    pub fn destination(&self) -> &Arc<dyn Destination> {
        &self.destination
    }

    /// Prepare for a fresh run of `descriptor`, clearing leftovers from an
    /// interrupted replacement.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    pub fn begin(&self, descriptor: &ResourceDescriptor) -> Result<(), DestinationError> {
        if descriptor.write_disposition == WriteDisposition::Replace {
            self.destination.discard_staged(&descriptor.name)?;
        }
        Ok(())
    }

    /// Apply one page atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the page could not be written; nothing
    /// from the page is applied in that case.
    pub fn apply(
        &self,
        descriptor: &ResourceDescriptor,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        if records.is_empty() {
            return Ok(LoadSummary::default());
        }
        let table = &descriptor.name;
        let summary = match descriptor.write_disposition {
            WriteDisposition::Merge => {
                self.destination
                    .upsert(table, &descriptor.primary_key, records)?
            }
            WriteDisposition::Append => self.destination.append(table, records)?,
            WriteDisposition::Replace => self.destination.stage(table, records)?,
        };
        tracing::debug!(
            resource = %table,
            disposition = %descriptor.write_disposition,
            applied = summary.applied,
            changed = summary.changed,
            "Page applied"
        );
        Ok(summary)
    }

    /// Complete the resource after its last page.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if promoting staged rows fails.
    pub fn finish(&self, descriptor: &ResourceDescriptor) -> Result<LoadSummary, DestinationError> {
        match descriptor.write_disposition {
            WriteDisposition::Replace => self.destination.promote_staged(&descriptor.name),
            WriteDisposition::Merge | WriteDisposition::Append => Ok(LoadSummary::default()),
        }
    }

    /// Abandon an unfinished run, dropping any staged replacement.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on storage failure.
    pub fn abort(&self, descriptor: &ResourceDescriptor) -> Result<(), DestinationError> {
        if descriptor.write_disposition == WriteDisposition::Replace {
            self.destination.discard_staged(&descriptor.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use restsync_types::state::ResourceName;
    use serde_json::json;

    use super::*;
    use crate::destination::MemoryDestination;

    fn descriptor(disposition: WriteDisposition) -> ResourceDescriptor {
        ResourceDescriptor {
            name: ResourceName::new("categories"),
            path: "categories".into(),
            primary_key: "id".into(),
            write_disposition: disposition,
            page_size: 2,
            incremental: None,
            sort_field: "id".into(),
            data_selector: "items".into(),
            total_path: "total_count".into(),
            params: BTreeMap::new(),
        }
    }

    fn rec(id: u64, name: &str) -> Record {
        Record::from_value(json!({"id": id, "name": name})).unwrap()
    }

    fn loader() -> (Arc<MemoryDestination>, MergeLoader) {
        let dest = Arc::new(MemoryDestination::new());
        (dest.clone(), MergeLoader::new(dest))
    }

    #[test]
    fn merge_upserts() {
        let (dest, loader) = loader();
        let desc = descriptor(WriteDisposition::Merge);
        loader.apply(&desc, &[rec(1, "a"), rec(2, "b")]).unwrap();
        loader.apply(&desc, &[rec(2, "b2")]).unwrap();
        assert_eq!(
            dest.fetch_all(&desc.name).unwrap(),
            vec![rec(1, "a"), rec(2, "b2")]
        );
    }

    #[test]
    fn append_inserts_everything() {
        let (dest, loader) = loader();
        let desc = descriptor(WriteDisposition::Append);
        loader.apply(&desc, &[rec(1, "a")]).unwrap();
        loader.apply(&desc, &[rec(1, "a")]).unwrap();
        assert_eq!(dest.row_count(&desc.name).unwrap(), 2);
    }

    #[test]
    fn replace_swaps_on_finish_only() {
        let (dest, loader) = loader();
        let desc = descriptor(WriteDisposition::Replace);
        dest.append(&desc.name, &[rec(9, "stale")]).unwrap();

        loader.begin(&desc).unwrap();
        loader.apply(&desc, &[rec(1, "a"), rec(2, "b")]).unwrap();
        loader.apply(&desc, &[rec(3, "c")]).unwrap();
        assert_eq!(dest.fetch_all(&desc.name).unwrap(), vec![rec(9, "stale")]);

        let summary = loader.finish(&desc).unwrap();
        assert_eq!(summary.changed, 3);
        assert_eq!(dest.row_count(&desc.name).unwrap(), 3);
    }

    #[test]
    fn aborted_replace_keeps_old_rows() {
        let (dest, loader) = loader();
        let desc = descriptor(WriteDisposition::Replace);
        dest.append(&desc.name, &[rec(9, "kept")]).unwrap();
        loader.apply(&desc, &[rec(1, "a")]).unwrap();
        loader.abort(&desc).unwrap();
        assert_eq!(dest.fetch_all(&desc.name).unwrap(), vec![rec(9, "kept")]);

        // A later successful run starts from an empty staging area.
        loader.begin(&desc).unwrap();
        loader.apply(&desc, &[rec(2, "b")]).unwrap();
        loader.finish(&desc).unwrap();
        assert_eq!(dest.fetch_all(&desc.name).unwrap(), vec![rec(2, "b")]);
    }

    #[test]
    fn empty_page_is_noop() {
        let (dest, loader) = loader();
        let desc = descriptor(WriteDisposition::Merge);
        assert_eq!(loader.apply(&desc, &[]).unwrap(), LoadSummary::default());
        assert_eq!(dest.row_count(&desc.name).unwrap(), 0);
    }
}
