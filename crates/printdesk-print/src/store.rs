// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent job store backed by SQLite.
//
// Holds every print job and its lifecycle state. Document bytes are not
// stored here; jobs carry file snapshots whose content lives in the
// document store. Status changes go through `transition`, which enforces
// the lifecycle table under the connection lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::{JobFile, JobId, JobStatus, PrintJob, PrintSettings, PrinterId};

/// SQLite schema for the jobs table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        printer_id TEXT NOT NULL,
        status TEXT NOT NULL,
        settings TEXT NOT NULL,
        files TEXT NOT NULL,
        total_pages INTEGER NOT NULL,
        pages_printed INTEGER NOT NULL DEFAULT 0,
        attempts INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        queued_at TEXT,
        started_at TEXT,
        completed_at TEXT,
        error_message TEXT,
        error_history TEXT NOT NULL DEFAULT '[]'
    );
    CREATE INDEX IF NOT EXISTS jobs_status ON jobs (status);
"#;

const SELECT_COLUMNS: &str = "id, printer_id, status, settings, files, total_pages, \
     pages_printed, attempts, created_at, queued_at, started_at, completed_at, \
     error_message, error_history";

/// Fixed-width UTC timestamps so lexical order is chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> PrintDeskError + '_ {
    move |e| PrintDeskError::Database(format!("{context}: {e}"))
}

/// Persistent job store.
///
/// The connection sits behind a `Mutex`; every method holds it for a few
/// synchronous statements only.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    /// Open (or create) the job database at the given path, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create table"))?;

        info!("job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests, ephemeral servers).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create table"))?;

        debug!("in-memory job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new job.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn insert(&self, job: &PrintJob) -> Result<()> {
        let settings_json = serde_json::to_string(&job.settings)?;
        let files_json = serde_json::to_string(&job.files)?;
        let history_json = serde_json::to_string(&job.error_history)?;

        self.conn()
            .execute(
                "INSERT INTO jobs (id, printer_id, status, settings, files, total_pages,
                 pages_printed, attempts, created_at, queued_at, started_at, completed_at,
                 error_message, error_history)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    job.id.to_string(),
                    job.printer_id.as_str(),
                    job.status.as_str(),
                    settings_json,
                    files_json,
                    job.total_pages as i64,
                    job.pages_printed as i64,
                    job.attempts,
                    timestamp(job.created_at),
                    job.queued_at.map(timestamp),
                    job.started_at.map(timestamp),
                    job.completed_at.map(timestamp),
                    job.error_message,
                    history_json,
                ],
            )
            .map_err(db_err("insert job"))?;

        info!(
            printer_id = %job.printer_id,
            total_pages = job.total_pages,
            "job stored"
        );
        Ok(())
    }

    fn get_locked(conn: &Connection, id: JobId) -> Result<Option<PrintJob>> {
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?1"),
            params![id.to_string()],
            row_to_print_job,
        )
        .optional()
        .map_err(db_err("get job"))
    }

    pub fn get(&self, id: JobId) -> Result<Option<PrintJob>> {
        Self::get_locked(&self.conn(), id)
    }

    /// Like [`get`](Self::get), but a missing job is `NotFound`.
    pub fn require(&self, id: JobId) -> Result<PrintJob> {
        self.get(id)?
            .ok_or_else(|| PrintDeskError::not_found("print job", id))
    }

    /// Move a job to `next`, stamping the matching timestamp.
    ///
    /// Fails with `InvalidState` when the lifecycle forbids the move; the
    /// row is then left untouched.
    #[instrument(skip(self, error_message), fields(job_id = %id, to = %next))]
    pub fn transition(
        &self,
        id: JobId,
        next: JobStatus,
        error_message: Option<&str>,
    ) -> Result<PrintJob> {
        let conn = self.conn();
        let mut job = Self::get_locked(&conn, id)?
            .ok_or_else(|| PrintDeskError::not_found("print job", id))?;
        job.status = job.status.transition(next)?;

        let now = Utc::now();
        match next {
            JobStatus::Queued => job.queued_at = Some(now),
            JobStatus::Printing => {
                job.started_at = Some(now);
                job.pages_printed = 0;
            }
            JobStatus::Completed => {
                job.completed_at = Some(now);
                job.pages_printed = job.total_pages;
            }
            JobStatus::Failed | JobStatus::Cancelled => job.completed_at = Some(now),
            JobStatus::Created => {}
        }
        if let Some(message) = error_message {
            job.error_message = Some(message.to_owned());
        }

        conn.execute(
            "UPDATE jobs SET status = ?1, queued_at = ?2, started_at = ?3, completed_at = ?4,
             pages_printed = ?5, error_message = ?6 WHERE id = ?7",
            params![
                job.status.as_str(),
                job.queued_at.map(timestamp),
                job.started_at.map(timestamp),
                job.completed_at.map(timestamp),
                job.pages_printed as i64,
                job.error_message,
                id.to_string(),
            ],
        )
        .map_err(db_err("update status"))?;

        debug!("job status updated");
        Ok(job)
    }

    /// Record page progress of a printing job.
    pub fn record_progress(&self, id: JobId, pages_printed: u64) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE jobs SET pages_printed = MIN(?1, total_pages)
                 WHERE id = ?2 AND status = 'printing'",
                params![pages_printed as i64, id.to_string()],
            )
            .map_err(db_err("record progress"))?;
        Ok(())
    }

    /// Count a new delivery attempt and reset page progress. Returns the
    /// attempt number.
    pub fn begin_attempt(&self, id: JobId) -> Result<u32> {
        let conn = self.conn();
        conn.execute(
            "UPDATE jobs SET attempts = attempts + 1, pages_printed = 0 WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(db_err("begin attempt"))?;
        conn.query_row(
            "SELECT attempts FROM jobs WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err("read attempts"))
    }

    /// Append the error of a failed attempt to the job's history.
    pub fn record_attempt_error(&self, id: JobId, message: &str) -> Result<()> {
        let conn = self.conn();
        let history_json: String = conn
            .query_row(
                "SELECT error_history FROM jobs WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err("read error history"))?;
        let mut history: Vec<String> = serde_json::from_str(&history_json).unwrap_or_default();
        history.push(message.to_owned());

        conn.execute(
            "UPDATE jobs SET error_history = ?1 WHERE id = ?2",
            params![serde_json::to_string(&history)?, id.to_string()],
        )
        .map_err(db_err("write error history"))?;
        Ok(())
    }

    /// Most recently created jobs first.
    pub fn list(&self, limit: usize) -> Result<Vec<PrintJob>> {
        self.query(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ),
            params![limit as i64],
        )
    }

    /// Terminal jobs, most recently finished first.
    pub fn history(&self, limit: usize) -> Result<Vec<PrintJob>> {
        self.query(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs
                 WHERE status IN ('completed', 'failed', 'cancelled')
                 ORDER BY completed_at DESC, rowid DESC LIMIT ?1"
            ),
            params![limit as i64],
        )
    }

    /// Jobs in `status`, oldest queue entry first.
    pub fn with_status(&self, status: JobStatus) -> Result<Vec<PrintJob>> {
        self.query(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = ?1
                 ORDER BY queued_at ASC, created_at ASC, rowid ASC"
            ),
            params![status.as_str()],
        )
    }

    /// Number of jobs in each status. Statuses without jobs are absent.
    pub fn count_by_status(&self) -> Result<HashMap<JobStatus, u64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .map_err(db_err("prepare count"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err("count jobs"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect counts"))?;

        let mut counts = HashMap::with_capacity(rows.len());
        for (status, count) in rows {
            counts.insert(status.parse::<JobStatus>()?, count as u64);
        }
        Ok(counts)
    }

    /// Σ total_pages over completed jobs.
    pub fn completed_pages(&self) -> Result<u64> {
        let pages: i64 = self
            .conn()
            .query_row(
                "SELECT COALESCE(SUM(total_pages), 0) FROM jobs WHERE status = 'completed'",
                [],
                |row| row.get(0),
            )
            .map_err(db_err("sum pages"))?;
        Ok(pages as u64)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PrintJob>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(db_err("prepare query"))?;
        let jobs = stmt
            .query_map(params, row_to_print_job)
            .map_err(db_err("query jobs"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect rows"))?;
        Ok(jobs)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn parse_optional_timestamp(
    column: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}

/// Map a SQLite row to a `PrintJob`.
///
/// Column indices must match `SELECT_COLUMNS`.
fn row_to_print_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrintJob> {
    let id_str: String = row.get(0)?;
    let printer_id: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let settings_json: String = row.get(3)?;
    let files_json: String = row.get(4)?;
    let total_pages: i64 = row.get(5)?;
    let pages_printed: i64 = row.get(6)?;
    let attempts: u32 = row.get(7)?;
    let created_at: String = row.get(8)?;
    let queued_at: Option<String> = row.get(9)?;
    let started_at: Option<String> = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;
    let error_message: Option<String> = row.get(12)?;
    let history_json: String = row.get(13)?;

    let id: JobId = id_str.parse().map_err(|e| conversion_error(0, e))?;
    let status: JobStatus = status_str.parse().map_err(|e| conversion_error(2, e))?;
    let settings: PrintSettings =
        serde_json::from_str(&settings_json).map_err(|e| conversion_error(3, e))?;
    let files: Vec<JobFile> =
        serde_json::from_str(&files_json).map_err(|e| conversion_error(4, e))?;
    let error_history: Vec<String> = serde_json::from_str(&history_json).unwrap_or_default();

    Ok(PrintJob {
        id,
        files,
        printer_id: PrinterId::new(printer_id),
        settings,
        total_pages: total_pages.max(0) as u64,
        pages_printed: pages_printed.max(0) as u64,
        status,
        attempts,
        created_at: parse_timestamp(8, &created_at)?,
        queued_at: parse_optional_timestamp(9, queued_at)?,
        started_at: parse_optional_timestamp(10, started_at)?,
        completed_at: parse_optional_timestamp(11, completed_at)?,
        error_message,
        error_history,
    })
}
