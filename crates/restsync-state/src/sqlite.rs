//! `SQLite`-backed implementation of [`StateBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use restsync_types::state::{
    PipelineId, ResourceName, RunRecord, RunStats, RunStatus, WatermarkState,
};
use rusqlite::{Connection, OptionalExtension};

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a writer waits on a database locked by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS watermarks (
    pipeline TEXT NOT NULL,
    resource TEXT NOT NULL,
    cursor_field TEXT,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (pipeline, resource)
);

CREATE TABLE IF NOT EXISTS resource_leases (
    pipeline TEXT NOT NULL,
    resource TEXT NOT NULL,
    holder TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    PRIMARY KEY (pipeline, resource)
);

CREATE TABLE IF NOT EXISTS resource_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline TEXT NOT NULL,
    resource TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at TEXT,
    pages_fetched INTEGER DEFAULT 0,
    records_read INTEGER DEFAULT 0,
    records_loaded INTEGER DEFAULT 0,
    retries INTEGER DEFAULT 0,
    final_watermark TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_pipeline ON resource_runs (pipeline, id);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateBackend::open`] for file-backed persistence
/// or [`SqliteStateBackend::in_memory`] for tests.
pub struct SqliteStateBackend {
    conn: Mutex<Connection>,
}

impl SqliteStateBackend {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Backend`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn =
            Connection::open(path).map_err(|e| StateError::backend_context("open", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StateError::backend_context("open: busy_timeout", e))?;
        Self::init(conn)
    }

    /// Create an in-memory `SQLite` backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Backend`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StateError::backend_context("open_in_memory", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> error::Result<Self> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StateError::backend_context("create tables", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    /// Convert an ISO-8601 string to `SQLite` datetime format.
    fn iso8601_to_sqlite(iso: &str) -> String {
        chrono::DateTime::parse_from_rfc3339(iso).map_or_else(
            |_| iso.to_string(),
            |dt| dt.format(SQLITE_DATETIME_FMT).to_string(),
        )
    }

    #[cfg(test)]
    fn lease_holder(&self, pipeline: &PipelineId, resource: &ResourceName) -> Option<String> {
        let conn = self.lock_conn().ok()?;
        conn.query_row(
            "SELECT holder FROM resource_leases WHERE pipeline = ?1 AND resource = ?2",
            rusqlite::params![pipeline.as_str(), resource.as_str()],
            |row| row.get(0),
        )
        .ok()
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn row_to_run_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let status_raw: String = row.get(2)?;
    let started_at: String = row.get(3)?;
    let finished_at: Option<String> = row.get(4)?;
    let pages: i64 = row.get(5)?;
    let read: i64 = row.get(6)?;
    let loaded: i64 = row.get(7)?;
    let retries: i64 = row.get(8)?;
    Ok(RunRecord {
        run_id: row.get(0)?,
        resource: ResourceName::new(row.get::<_, String>(1)?),
        status: RunStatus::parse(&status_raw).unwrap_or(RunStatus::Failed),
        started_at: SqliteStateBackend::sqlite_to_iso8601(&started_at),
        finished_at: finished_at.map(|f| SqliteStateBackend::sqlite_to_iso8601(&f)),
        stats: RunStats {
            pages_fetched: pages as u64,
            records_read: read as u64,
            records_loaded: loaded as u64,
            retries: retries as u64,
            final_watermark: row.get(9)?,
            error_message: row.get(10)?,
        },
    })
}

impl StateBackend for SqliteStateBackend {
    fn get_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
    ) -> error::Result<Option<WatermarkState>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT cursor_field, value, updated_at \
                 FROM watermarks WHERE pipeline = ?1 AND resource = ?2",
                rusqlite::params![pipeline.as_str(), resource.as_str()],
                |row| {
                    let cursor_field: Option<String> = row.get(0)?;
                    let value: String = row.get(1)?;
                    let updated_at: String = row.get(2)?;
                    Ok((cursor_field, value, updated_at))
                },
            )
            .optional()
            .map_err(|e| StateError::backend_context("get_watermark", e))?;

        Ok(row.map(|(cursor_field, value, updated_at)| WatermarkState {
            cursor_field,
            value,
            updated_at: Self::sqlite_to_iso8601(&updated_at),
        }))
    }

    fn set_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        state: &WatermarkState,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let updated_at = Self::iso8601_to_sqlite(&state.updated_at);
        conn.execute(
            "INSERT INTO watermarks (pipeline, resource, cursor_field, value, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(pipeline, resource) \
             DO UPDATE SET cursor_field = ?3, value = ?4, updated_at = ?5",
            rusqlite::params![
                pipeline.as_str(),
                resource.as_str(),
                state.cursor_field,
                state.value,
                updated_at,
            ],
        )
        .map_err(|e| StateError::backend_context("set_watermark", e))?;
        Ok(())
    }

    fn compare_and_set(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        expected: Option<&str>,
        new_state: &WatermarkState,
    ) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let updated_at = Self::iso8601_to_sqlite(&new_state.updated_at);

        let rows_affected = match expected {
            Some(expected_val) => conn
                .execute(
                    "UPDATE watermarks SET cursor_field = ?1, value = ?2, updated_at = ?3 \
                     WHERE pipeline = ?4 AND resource = ?5 AND value = ?6",
                    rusqlite::params![
                        new_state.cursor_field,
                        new_state.value,
                        updated_at,
                        pipeline.as_str(),
                        resource.as_str(),
                        expected_val
                    ],
                )
                .map_err(|e| StateError::backend_context("compare_and_set: update", e))?,
            None => conn
                .execute(
                    "INSERT OR IGNORE INTO watermarks \
                     (pipeline, resource, cursor_field, value, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        pipeline.as_str(),
                        resource.as_str(),
                        new_state.cursor_field,
                        new_state.value,
                        updated_at
                    ],
                )
                .map_err(|e| StateError::backend_context("compare_and_set: insert", e))?,
        };

        Ok(rows_affected > 0)
    }

    fn clear_watermark(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
    ) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM watermarks WHERE pipeline = ?1 AND resource = ?2",
                rusqlite::params![pipeline.as_str(), resource.as_str()],
            )
            .map_err(|e| StateError::backend_context("clear_watermark", e))?;
        Ok(deleted > 0)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn acquire_lease(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        holder: &str,
        ttl: Duration,
    ) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().timestamp();
        let expires_at = now.saturating_add(ttl.as_secs() as i64);

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StateError::backend_context("acquire_lease: begin tx", e))?;
        tx.execute(
            "DELETE FROM resource_leases \
             WHERE pipeline = ?1 AND resource = ?2 AND expires_at <= ?3",
            rusqlite::params![pipeline.as_str(), resource.as_str(), now],
        )
        .map_err(|e| StateError::backend_context("acquire_lease: expire", e))?;
        tx.execute(
            "INSERT INTO resource_leases (pipeline, resource, holder, expires_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(pipeline, resource) \
             DO UPDATE SET expires_at = ?4 WHERE holder = ?3",
            rusqlite::params![pipeline.as_str(), resource.as_str(), holder, expires_at],
        )
        .map_err(|e| StateError::backend_context("acquire_lease: claim", e))?;
        let current: String = tx
            .query_row(
                "SELECT holder FROM resource_leases WHERE pipeline = ?1 AND resource = ?2",
                rusqlite::params![pipeline.as_str(), resource.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| StateError::backend_context("acquire_lease: read holder", e))?;
        tx.commit()
            .map_err(|e| StateError::backend_context("acquire_lease: commit", e))?;

        Ok(current == holder)
    }

    fn release_lease(
        &self,
        pipeline: &PipelineId,
        resource: &ResourceName,
        holder: &str,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM resource_leases WHERE pipeline = ?1 AND resource = ?2 AND holder = ?3",
            rusqlite::params![pipeline.as_str(), resource.as_str(), holder],
        )
        .map_err(|e| StateError::backend_context("release_lease", e))?;
        Ok(())
    }

    fn start_run(&self, pipeline: &PipelineId, resource: &ResourceName) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO resource_runs (pipeline, resource, status, started_at) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                pipeline.as_str(),
                resource.as_str(),
                RunStatus::Running.as_str(),
                Self::now_sqlite(),
            ],
        )
        .map_err(|e| StateError::backend_context("start_run", e))?;
        Ok(conn.last_insert_rowid())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn complete_run(&self, run_id: i64, status: RunStatus, stats: &RunStats) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE resource_runs SET status = ?1, finished_at = ?2, \
             pages_fetched = ?3, records_read = ?4, records_loaded = ?5, retries = ?6, \
             final_watermark = ?7, error_message = ?8 \
             WHERE id = ?9",
            rusqlite::params![
                status.as_str(),
                Self::now_sqlite(),
                stats.pages_fetched as i64,
                stats.records_read as i64,
                stats.records_loaded as i64,
                stats.retries as i64,
                stats.final_watermark,
                stats.error_message,
                run_id,
            ],
        )
        .map_err(|e| StateError::backend_context("complete_run", e))?;
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn recent_runs(&self, pipeline: &PipelineId, limit: usize) -> error::Result<Vec<RunRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, resource, status, started_at, finished_at, pages_fetched, \
                 records_read, records_loaded, retries, final_watermark, error_message \
                 FROM resource_runs WHERE pipeline = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| StateError::backend_context("recent_runs: prepare", e))?;
        let rows = stmt
            .query_map(
                rusqlite::params![pipeline.as_str(), limit as i64],
                row_to_run_record,
            )
            .map_err(|e| StateError::backend_context("recent_runs: query", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StateError::backend_context("recent_runs: decode", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(name: &str) -> PipelineId {
        PipelineId::new(name)
    }

    fn resource(name: &str) -> ResourceName {
        ResourceName::new(name)
    }

    fn watermark(value: &str) -> WatermarkState {
        WatermarkState {
            cursor_field: Some("updated_at".into()),
            value: value.into(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn watermark_roundtrip() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        assert!(backend
            .get_watermark(&pid("p"), &resource("orders"))
            .unwrap()
            .is_none());

        backend
            .set_watermark(&pid("p"), &resource("orders"), &watermark("2024-01-15 10:00:00"))
            .unwrap();

        let got = backend
            .get_watermark(&pid("p"), &resource("orders"))
            .unwrap()
            .unwrap();
        assert_eq!(got.cursor_field, Some("updated_at".into()));
        assert_eq!(got.value, "2024-01-15 10:00:00");
        assert!(got.updated_at.ends_with('Z'));
    }

    #[test]
    fn watermark_upsert_replaces() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend
            .set_watermark(&pid("p"), &resource("orders"), &watermark("100"))
            .unwrap();
        backend
            .set_watermark(&pid("p"), &resource("orders"), &watermark("200"))
            .unwrap();
        let got = backend
            .get_watermark(&pid("p"), &resource("orders"))
            .unwrap()
            .unwrap();
        assert_eq!(got.value, "200");
    }

    #[test]
    fn pipelines_and_resources_are_independent() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend
            .set_watermark(&pid("a"), &resource("orders"), &watermark("aaa"))
            .unwrap();
        backend
            .set_watermark(&pid("b"), &resource("orders"), &watermark("bbb"))
            .unwrap();
        backend
            .set_watermark(&pid("a"), &resource("products"), &watermark("ccc"))
            .unwrap();

        let value = |p: &str, r: &str| {
            backend
                .get_watermark(&pid(p), &resource(r))
                .unwrap()
                .unwrap()
                .value
        };
        assert_eq!(value("a", "orders"), "aaa");
        assert_eq!(value("b", "orders"), "bbb");
        assert_eq!(value("a", "products"), "ccc");
    }

    #[test]
    fn compare_and_set_success() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend
            .set_watermark(&pid("p"), &resource("s"), &watermark("100"))
            .unwrap();

        assert!(backend
            .compare_and_set(&pid("p"), &resource("s"), Some("100"), &watermark("200"))
            .unwrap());
        let got = backend.get_watermark(&pid("p"), &resource("s")).unwrap().unwrap();
        assert_eq!(got.value, "200");
    }

    #[test]
    fn compare_and_set_failure_mismatch() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend
            .set_watermark(&pid("p"), &resource("s"), &watermark("100"))
            .unwrap();

        assert!(!backend
            .compare_and_set(&pid("p"), &resource("s"), Some("999"), &watermark("200"))
            .unwrap());
        let got = backend.get_watermark(&pid("p"), &resource("s")).unwrap().unwrap();
        assert_eq!(got.value, "100");
    }

    #[test]
    fn compare_and_set_from_none() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        assert!(backend
            .compare_and_set(&pid("p"), &resource("s"), None, &watermark("50"))
            .unwrap());
        let got = backend.get_watermark(&pid("p"), &resource("s")).unwrap().unwrap();
        assert_eq!(got.value, "50");
    }

    #[test]
    fn compare_and_set_from_none_but_exists() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend
            .set_watermark(&pid("p"), &resource("s"), &watermark("100"))
            .unwrap();
        assert!(!backend
            .compare_and_set(&pid("p"), &resource("s"), None, &watermark("200"))
            .unwrap());
        let got = backend.get_watermark(&pid("p"), &resource("s")).unwrap().unwrap();
        assert_eq!(got.value, "100");
    }

    #[test]
    fn clear_watermark_reports_existence() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        assert!(!backend.clear_watermark(&pid("p"), &resource("s")).unwrap());
        backend
            .set_watermark(&pid("p"), &resource("s"), &watermark("1"))
            .unwrap();
        assert!(backend.clear_watermark(&pid("p"), &resource("s")).unwrap());
        assert!(backend.get_watermark(&pid("p"), &resource("s")).unwrap().is_none());
    }

    #[test]
    fn lease_is_exclusive_per_resource() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        let ttl = Duration::from_secs(600);
        assert!(backend.acquire_lease(&pid("p"), &resource("orders"), "run-a", ttl).unwrap());
        assert!(!backend.acquire_lease(&pid("p"), &resource("orders"), "run-b", ttl).unwrap());
        assert!(backend.acquire_lease(&pid("p"), &resource("products"), "run-b", ttl).unwrap());
        // Re-acquiring by the same holder extends the lease.
        assert!(backend.acquire_lease(&pid("p"), &resource("orders"), "run-a", ttl).unwrap());
        assert_eq!(
            backend.lease_holder(&pid("p"), &resource("orders")),
            Some("run-a".into())
        );
    }

    #[test]
    fn release_lease_frees_resource() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        let ttl = Duration::from_secs(600);
        assert!(backend.acquire_lease(&pid("p"), &resource("orders"), "run-a", ttl).unwrap());
        backend.release_lease(&pid("p"), &resource("orders"), "run-b").unwrap();
        assert!(!backend.acquire_lease(&pid("p"), &resource("orders"), "run-b", ttl).unwrap());
        backend.release_lease(&pid("p"), &resource("orders"), "run-a").unwrap();
        assert!(backend.acquire_lease(&pid("p"), &resource("orders"), "run-b", ttl).unwrap());
    }

    #[test]
    fn expired_lease_can_be_taken_over() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        assert!(backend
            .acquire_lease(&pid("p"), &resource("orders"), "crashed", Duration::ZERO)
            .unwrap());
        assert!(backend
            .acquire_lease(&pid("p"), &resource("orders"), "next", Duration::from_secs(60))
            .unwrap());
        assert_eq!(
            backend.lease_holder(&pid("p"), &resource("orders")),
            Some("next".into())
        );
    }

    #[test]
    fn run_lifecycle() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        let run_id = backend.start_run(&pid("p"), &resource("orders")).unwrap();
        assert!(run_id > 0);

        backend
            .complete_run(
                run_id,
                RunStatus::Completed,
                &RunStats {
                    pages_fetched: 3,
                    records_read: 250,
                    records_loaded: 250,
                    retries: 1,
                    final_watermark: Some("2024-03-01".into()),
                    error_message: None,
                },
            )
            .unwrap();

        let runs = backend.recent_runs(&pid("p"), 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run_id);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].stats.pages_fetched, 3);
        assert_eq!(runs[0].stats.final_watermark, Some("2024-03-01".into()));
        assert!(runs[0].finished_at.is_some());
    }

    #[test]
    fn run_failure_keeps_message() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        let run_id = backend.start_run(&pid("p"), &resource("orders")).unwrap();
        backend
            .complete_run(
                run_id,
                RunStatus::Partial,
                &RunStats {
                    pages_fetched: 1,
                    error_message: Some("[decode] MISSING_SELECTOR".into()),
                    ..RunStats::default()
                },
            )
            .unwrap();
        let runs = backend.recent_runs(&pid("p"), 1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Partial);
        assert_eq!(
            runs[0].stats.error_message,
            Some("[decode] MISSING_SELECTOR".into())
        );
    }

    #[test]
    fn recent_runs_newest_first_and_limited() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        let first = backend.start_run(&pid("p"), &resource("a")).unwrap();
        let second = backend.start_run(&pid("p"), &resource("b")).unwrap();
        let third = backend.start_run(&pid("p"), &resource("c")).unwrap();
        backend.start_run(&pid("other"), &resource("a")).unwrap();

        let runs = backend.recent_runs(&pid("p"), 2).unwrap();
        let ids: Vec<i64> = runs.iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec![third, second]);
        assert!(first < second);
        assert_eq!(runs[0].status, RunStatus::Running);
    }

    #[test]
    fn file_backed_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let backend = SqliteStateBackend::open(&path).unwrap();
            backend
                .set_watermark(&pid("p"), &resource("orders"), &watermark("2024-05-01"))
                .unwrap();
        }
        let reopened = SqliteStateBackend::open(&path).unwrap();
        let got = reopened
            .get_watermark(&pid("p"), &resource("orders"))
            .unwrap()
            .unwrap();
        assert_eq!(got.value, "2024-05-01");
    }

    #[test]
    fn sqlite_to_iso8601_conversion() {
        let iso = SqliteStateBackend::sqlite_to_iso8601("2024-01-15 10:00:00");
        assert_eq!(iso, "2024-01-15T10:00:00Z");
    }

    #[test]
    fn iso8601_to_sqlite_conversion() {
        let sqlite = SqliteStateBackend::iso8601_to_sqlite("2024-01-15T10:00:00Z");
        assert_eq!(sqlite, "2024-01-15 10:00:00");
    }
}
