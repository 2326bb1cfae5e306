//! `SQLite`-backed [`Destination`].
//!
//! All resources share one `records` table partitioned by resource name.
//! Documents are stored as JSON text; staged rows carry `staged = 1` until
//! promoted.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use restsync_types::page::Record;
use restsync_types::state::ResourceName;
use rusqlite::{Connection, OptionalExtension};

use super::{keyed, Destination, DestinationError, LoadSummary};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS records (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource TEXT NOT NULL,
    record_key TEXT,
    document TEXT NOT NULL,
    staged INTEGER NOT NULL DEFAULT 0,
    loaded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_key ON records (resource, staged, record_key);
";

/// Durable record store in a single `SQLite` file.
pub struct SqliteDestination {
    conn: Mutex<Connection>,
}

impl SqliteDestination {
    /// Open or create the destination database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the directory or database can't be
    /// created.
    pub fn open(path: &Path) -> Result<Self, DestinationError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| DestinationError::sqlite("open", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DestinationError::sqlite("open: busy_timeout", e))?;
        Self::init(conn)
    }

    /// In-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if initialization fails.
    pub fn in_memory() -> Result<Self, DestinationError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DestinationError::sqlite("open_in_memory", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DestinationError> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| DestinationError::sqlite("create tables", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, DestinationError> {
        self.conn.lock().map_err(|_| DestinationError::LockPoisoned)
    }

    fn insert_rows(
        &self,
        table: &ResourceName,
        records: &[Record],
        staged: bool,
        context: &'static str,
    ) -> Result<u64, DestinationError> {
        let documents = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DestinationError::sqlite(context, e))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO records (resource, document, staged) VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| DestinationError::sqlite(context, e))?;
            for doc in &documents {
                stmt.execute(rusqlite::params![table.as_str(), doc, i64::from(staged)])
                    .map_err(|e| DestinationError::sqlite(context, e))?;
            }
        }
        tx.commit().map_err(|e| DestinationError::sqlite(context, e))?;
        Ok(documents.len() as u64)
    }
}

impl Destination for SqliteDestination {
    fn upsert(
        &self,
        table: &ResourceName,
        primary_key: &str,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        let rows = keyed(table, primary_key, records)?
            .into_iter()
            .map(|(key, record)| serde_json::to_string(record).map(|doc| (key, doc)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DestinationError::sqlite("upsert: begin", e))?;
        let mut changed = 0u64;
        {
            let mut select = tx
                .prepare_cached(
                    "SELECT row_id, document FROM records \
                     WHERE resource = ?1 AND staged = 0 AND record_key = ?2",
                )
                .map_err(|e| DestinationError::sqlite("upsert: prepare", e))?;
            let mut update = tx
                .prepare_cached("UPDATE records SET document = ?1, loaded_at = datetime('now') WHERE row_id = ?2")
                .map_err(|e| DestinationError::sqlite("upsert: prepare", e))?;
            let mut insert = tx
                .prepare_cached(
                    "INSERT INTO records (resource, record_key, document) VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| DestinationError::sqlite("upsert: prepare", e))?;

            for (key, doc) in &rows {
                let existing: Option<(i64, String)> = select
                    .query_row(rusqlite::params![table.as_str(), key], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })
                    .optional()
                    .map_err(|e| DestinationError::sqlite("upsert: lookup", e))?;
                match existing {
                    Some((_, ref current)) if current == doc => {}
                    Some((row_id, _)) => {
                        update
                            .execute(rusqlite::params![doc, row_id])
                            .map_err(|e| DestinationError::sqlite("upsert: update", e))?;
                        changed += 1;
                    }
                    None => {
                        insert
                            .execute(rusqlite::params![table.as_str(), key, doc])
                            .map_err(|e| DestinationError::sqlite("upsert: insert", e))?;
                        changed += 1;
                    }
                }
            }
        }
        tx.commit()
            .map_err(|e| DestinationError::sqlite("upsert: commit", e))?;

        Ok(LoadSummary {
            applied: rows.len() as u64,
            changed,
        })
    }

    fn append(
        &self,
        table: &ResourceName,
        records: &[Record],
    ) -> Result<LoadSummary, DestinationError> {
        let n = self.insert_rows(table, records, false, "append")?;
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
        let n = self.insert_rows(table, records, true, "stage")?;
        Ok(LoadSummary {
            applied: n,
            changed: 0,
        })
    }

    fn promote_staged(&self, table: &ResourceName) -> Result<LoadSummary, DestinationError> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DestinationError::sqlite("promote_staged: begin", e))?;
        tx.execute(
            "DELETE FROM records WHERE resource = ?1 AND staged = 0",
            rusqlite::params![table.as_str()],
        )
        .map_err(|e| DestinationError::sqlite("promote_staged: clear live", e))?;
        let promoted = tx
            .execute(
                "UPDATE records SET staged = 0 WHERE resource = ?1 AND staged = 1",
                rusqlite::params![table.as_str()],
            )
            .map_err(|e| DestinationError::sqlite("promote_staged: swap", e))?;
        tx.commit()
            .map_err(|e| DestinationError::sqlite("promote_staged: commit", e))?;
        Ok(LoadSummary {
            applied: 0,
            changed: promoted as u64,
        })
    }

    fn discard_staged(&self, table: &ResourceName) -> Result<(), DestinationError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM records WHERE resource = ?1 AND staged = 1",
            rusqlite::params![table.as_str()],
        )
        .map_err(|e| DestinationError::sqlite("discard_staged", e))?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn row_count(&self, table: &ResourceName) -> Result<u64, DestinationError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE resource = ?1 AND staged = 0",
                rusqlite::params![table.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| DestinationError::sqlite("row_count", e))?;
        Ok(count as u64)
    }

    fn fetch_all(&self, table: &ResourceName) -> Result<Vec<Record>, DestinationError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT document FROM records WHERE resource = ?1 AND staged = 0 ORDER BY row_id",
            )
            .map_err(|e| DestinationError::sqlite("fetch_all: prepare", e))?;
        let docs = stmt
            .query_map(rusqlite::params![table.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| DestinationError::sqlite("fetch_all: query", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DestinationError::sqlite("fetch_all: decode", e))?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(DestinationError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rec(id: u64, status: &str) -> Record {
        Record::from_value(json!({"entity_id": id, "status": status})).unwrap()
    }

    fn orders() -> ResourceName {
        ResourceName::new("orders")
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let dest = SqliteDestination::in_memory().unwrap();
        dest.upsert(&orders(), "entity_id", &[rec(1, "pending"), rec(2, "pending")])
            .unwrap();
        let summary = dest
            .upsert(&orders(), "entity_id", &[rec(2, "shipped")])
            .unwrap();
        assert_eq!(summary, LoadSummary { applied: 1, changed: 1 });
        assert_eq!(
            dest.fetch_all(&orders()).unwrap(),
            vec![rec(1, "pending"), rec(2, "shipped")]
        );
    }

    #[test]
    fn upsert_identical_changes_nothing() {
        let dest = SqliteDestination::in_memory().unwrap();
        dest.upsert(&orders(), "entity_id", &[rec(1, "a"), rec(2, "b")])
            .unwrap();
        let again = dest
            .upsert(&orders(), "entity_id", &[rec(1, "a"), rec(2, "b")])
            .unwrap();
        assert_eq!(again, LoadSummary { applied: 2, changed: 0 });
        assert_eq!(dest.row_count(&orders()).unwrap(), 2);
    }

    #[test]
    fn upsert_missing_key_rolls_back_whole_batch() {
        let dest = SqliteDestination::in_memory().unwrap();
        let bad = Record::from_value(json!({"status": "x"})).unwrap();
        assert!(dest
            .upsert(&orders(), "entity_id", &[rec(1, "a"), bad])
            .is_err());
        assert_eq!(dest.row_count(&orders()).unwrap(), 0);
    }

    #[test]
    fn string_and_numeric_keys_match_by_text() {
        let dest = SqliteDestination::in_memory().unwrap();
        let numeric = Record::from_value(json!({"entity_id": 5, "v": 1})).unwrap();
        let text = Record::from_value(json!({"entity_id": "5", "v": 2})).unwrap();
        dest.upsert(&orders(), "entity_id", &[numeric]).unwrap();
        dest.upsert(&orders(), "entity_id", &[text.clone()]).unwrap();
        assert_eq!(dest.fetch_all(&orders()).unwrap(), vec![text]);
    }

    #[test]
    fn append_and_replace() {
        let dest = SqliteDestination::in_memory().unwrap();
        dest.append(&orders(), &[rec(1, "a"), rec(1, "a")]).unwrap();
        assert_eq!(dest.row_count(&orders()).unwrap(), 2);

        dest.stage(&orders(), &[rec(3, "c")]).unwrap();
        assert_eq!(dest.row_count(&orders()).unwrap(), 2);

        let promoted = dest.promote_staged(&orders()).unwrap();
        assert_eq!(promoted.changed, 1);
        assert_eq!(dest.fetch_all(&orders()).unwrap(), vec![rec(3, "c")]);

        dest.stage(&orders(), &[rec(4, "d")]).unwrap();
        dest.discard_staged(&orders()).unwrap();
        dest.promote_staged(&orders()).unwrap();
        assert_eq!(dest.row_count(&orders()).unwrap(), 0);
    }

    #[test]
    fn replace_all_swaps_contents() {
        let dest = SqliteDestination::in_memory().unwrap();
        dest.append(&orders(), &[rec(1, "a")]).unwrap();
        let summary = dest
            .replace_all(&orders(), &[rec(2, "b"), rec(3, "c")])
            .unwrap();
        assert_eq!(summary, LoadSummary { applied: 2, changed: 2 });
        assert_eq!(
            dest.fetch_all(&orders()).unwrap(),
            vec![rec(2, "b"), rec(3, "c")]
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("magento.db");
        {
            let dest = SqliteDestination::open(&path).unwrap();
            dest.upsert(&orders(), "entity_id", &[rec(1, "a")]).unwrap();
        }
        let reopened = SqliteDestination::open(&path).unwrap();
        assert_eq!(reopened.fetch_all(&orders()).unwrap(), vec![rec(1, "a")]);
    }
}
