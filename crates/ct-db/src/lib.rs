//! Storage layer for the card time tracker.
//!
//! Provides persistence for timers, completed entries and estimates using
//! `rusqlite`.
//!
//! # Concurrency
//!
//! Several sessions (people, devices) write to the same database file. Each
//! [`Database`] owns one connection; every mutation runs in an `IMMEDIATE`
//! transaction so it takes the write lock before reading the state it acts
//! on. Combined with the unique key on `active_timers (work_item_id,
//! person_id)` this keeps two concurrent stops from both recording the same
//! interval. Contended writers wait up to the busy timeout and then surface
//! [`DbError::Sqlite`] with a busy code ([`DbError::is_transient`]).
//!
//! File databases run in WAL mode so readers never block the writer.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision and a `Z` suffix (e.g., `2025-01-15T10:30:00.000Z`), so
//! lexicographic ordering matches chronological ordering.
//!
//! ## Snapshots
//!
//! Completed entries copy the item name, list name and labels (JSON array of
//! `{name, color}`) at write time. Reports prefer live board metadata and use
//! these only for items the board no longer lists.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row, params};
use thiserror::Error;

use ct_core::model::Label;
use ct_core::{DateRange, GroupId, ReportRecords, ValidationError};

mod estimates;
mod timers;

pub use timers::{ResetStats, TimerTarget};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Input rejected before touching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Labels could not be encoded for storage.
    #[error("failed to encode labels: {0}")]
    Labels(#[from] serde_json::Error),
}

impl DbError {
    /// Whether retrying later may succeed (store busy, locked or unreachable).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for concurrency considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// How long a writer waits for a competing session before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), DbError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- One row per finished start/stop cycle or manual adjustment.
            -- Manual adjustments have started_at = ended_at and may be negative.
            CREATE TABLE IF NOT EXISTS completed_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                work_item_id TEXT NOT NULL,
                person_id TEXT NOT NULL,
                person_name TEXT NOT NULL,
                item_name TEXT NOT NULL,
                category_name TEXT,
                labels TEXT NOT NULL DEFAULT '[]',
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_group_started ON completed_entries(group_id, started_at);
            CREATE INDEX IF NOT EXISTS idx_entries_item_person ON completed_entries(work_item_id, person_id);

            CREATE TABLE IF NOT EXISTS active_timers (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                work_item_id TEXT NOT NULL,
                person_id TEXT NOT NULL,
                person_name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                UNIQUE (work_item_id, person_id)
            );

            CREATE INDEX IF NOT EXISTS idx_active_timers_group ON active_timers(group_id);

            CREATE TABLE IF NOT EXISTS estimates (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                work_item_id TEXT NOT NULL,
                person_id TEXT NOT NULL,
                person_name TEXT NOT NULL,
                estimated_ms INTEGER NOT NULL CHECK (estimated_ms > 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (work_item_id, person_id)
            );

            CREATE INDEX IF NOT EXISTS idx_estimates_group ON estimates(group_id);

            -- Append-only log of re-estimations outside the grace period.
            CREATE TABLE IF NOT EXISTS estimate_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                estimate_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                work_item_id TEXT NOT NULL,
                person_id TEXT NOT NULL,
                person_name TEXT NOT NULL,
                previous_ms INTEGER NOT NULL,
                new_ms INTEGER NOT NULL,
                reason TEXT,
                changed_at TEXT NOT NULL,
                FOREIGN KEY (estimate_id) REFERENCES estimates(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_estimate_history_estimate ON estimate_history(estimate_id, changed_at);
            ",
        )?;
        Ok(())
    }

    /// Reads everything a report over `group_id` needs in one transaction.
    ///
    /// Entries are limited to `range`; open timers and estimates are read
    /// unconditionally. Any failure aborts the whole read.
    pub fn report_records(
        &mut self,
        group_id: &GroupId,
        range: &DateRange,
    ) -> Result<ReportRecords, DbError> {
        let tx = self.conn.transaction()?;
        let records = ReportRecords {
            entries: timers::entries_in_range(&tx, group_id, range)?,
            active_timers: timers::active_timers_for_group(&tx, group_id)?,
            estimates: estimates::estimates_for_group(&tx, group_id)?,
        };
        tx.commit()?;
        tracing::debug!(
            group = %group_id,
            entries = records.entries.len(),
            active_timers = records.active_timers.len(),
            estimates = records.estimates.len(),
            "loaded report records"
        );
        Ok(records)
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Reads a validated ID column.
fn id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: TryFrom<String, Error = ValidationError>,
{
    let raw: String = row.get(idx)?;
    T::try_from(raw).map_err(|err| conversion_error(idx, err))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err))
}

fn labels_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<Label>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(idx, err))
}

/// Deletes every row that references `work_item_id` in `table`.
fn delete_for_item(conn: &Connection, table: &str, work_item_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE work_item_id = ?"),
        params![work_item_id],
    )
}
