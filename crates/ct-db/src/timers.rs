//! Timer State Store: open timers, completed entries and manual adjustments.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use ct_core::model::adjustment_instant;
use ct_core::{
    ActiveTimer, CompletedEntry, DateRange, GroupId, ItemSnapshot, MemberTimeView, Person,
    PersonId, TimerState, ValidationError, WorkItemId,
};

use crate::{
    Database, DbError, delete_for_item, format_timestamp, id_column, labels_column,
    timestamp_column,
};

const ENTRY_COLUMNS: &str = "id, group_id, work_item_id, person_id, person_name, item_name, \
     category_name, labels, started_at, ended_at, duration_ms";

const TIMER_COLUMNS: &str = "id, group_id, work_item_id, person_id, person_name, started_at";

/// Who is timing what. The snapshot is copied onto any entry written.
#[derive(Debug, Clone, Copy)]
pub struct TimerTarget<'a> {
    pub group_id: &'a GroupId,
    pub work_item_id: &'a WorkItemId,
    pub person: &'a Person,
    pub snapshot: &'a ItemSnapshot,
}

/// Rows removed by [`Database::reset_item_time`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetStats {
    pub entries_deleted: usize,
    pub timers_deleted: usize,
}

impl Database {
    /// Starts a timer for the target pair. Returns `false` if one is already running.
    pub fn start_timer_at(
        &mut self,
        target: &TimerTarget<'_>,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let started = insert_timer(&tx, target, now)?;
        tx.commit()?;
        Ok(started)
    }

    /// Stops the target pair's timer and records the interval.
    ///
    /// Returns `None` when no timer was running, including when another
    /// session stopped it first.
    pub fn stop_timer_at(
        &mut self,
        target: &TimerTarget<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<CompletedEntry>, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let entry = match find_timer(&tx, target.work_item_id, &target.person.id)? {
            Some(timer) => close_timer(&tx, &timer, target.snapshot, now)?,
            None => None,
        };
        tx.commit()?;
        Ok(entry)
    }

    /// Stops the pair's timer if one is running, otherwise starts one.
    pub fn toggle_timer_at(
        &mut self,
        target: &TimerTarget<'_>,
        now: DateTime<Utc>,
    ) -> Result<TimerState, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let state = match find_timer(&tx, target.work_item_id, &target.person.id)? {
            Some(timer) => {
                close_timer(&tx, &timer, target.snapshot, now)?;
                TimerState::Stopped
            }
            None => {
                insert_timer(&tx, target, now)?;
                TimerState::Running
            }
        };
        tx.commit()?;
        Ok(state)
    }

    /// Records a manual correction of `delta_ms` (negative to subtract).
    ///
    /// The entry is stamped at local noon of `date`, or now when absent.
    pub fn adjust_time_at(
        &mut self,
        target: &TimerTarget<'_>,
        delta_ms: i64,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<CompletedEntry, DbError> {
        if delta_ms == 0 {
            return Err(ValidationError::ZeroAdjustment.into());
        }
        let at = adjustment_instant(date, now);
        let tx = self.conn.transaction()?;
        let entry = insert_entry(
            &tx,
            &NewEntry {
                group_id: target.group_id,
                work_item_id: target.work_item_id,
                person_id: &target.person.id,
                person_name: &target.person.name,
                snapshot: target.snapshot,
                started_at: at,
                ended_at: at,
                duration_ms: delta_ms,
            },
        )?;
        tx.commit()?;
        tracing::debug!(
            item = %target.work_item_id,
            person = %target.person.id,
            delta_ms,
            "recorded manual adjustment"
        );
        Ok(entry)
    }

    /// Deletes all completed entries and open timers for a work item.
    pub fn reset_item_time(&mut self, work_item_id: &WorkItemId) -> Result<ResetStats, DbError> {
        let tx = self.conn.transaction()?;
        let stats = ResetStats {
            entries_deleted: delete_for_item(&tx, "completed_entries", work_item_id.as_str())?,
            timers_deleted: delete_for_item(&tx, "active_timers", work_item_id.as_str())?,
        };
        tx.commit()?;
        tracing::info!(
            item = %work_item_id,
            entries = stats.entries_deleted,
            timers = stats.timers_deleted,
            "reset work item time"
        );
        Ok(stats)
    }

    /// Stops the given open timers by id, whoever started them.
    ///
    /// Ids that are no longer open are skipped. `resolve` supplies the item
    /// snapshot for each entry written.
    pub fn stop_active_timers_at<F>(
        &mut self,
        timer_ids: &[String],
        resolve: F,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompletedEntry>, DbError>
    where
        F: Fn(&WorkItemId) -> ItemSnapshot,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut entries = Vec::new();
        for timer_id in timer_ids {
            let timer = tx
                .query_row(
                    &format!("SELECT {TIMER_COLUMNS} FROM active_timers WHERE id = ?"),
                    params![timer_id],
                    timer_from_row,
                )
                .optional()?;
            let Some(timer) = timer else {
                tracing::debug!(timer_id = %timer_id, "timer already stopped");
                continue;
            };
            let snapshot = resolve(&timer.work_item_id);
            if let Some(entry) = close_timer(&tx, &timer, &snapshot, now)? {
                entries.push(entry);
            }
        }
        tx.commit()?;
        Ok(entries)
    }

    /// All open timers in a group, oldest first.
    pub fn list_active_timers(&self, group_id: &GroupId) -> Result<Vec<ActiveTimer>, DbError> {
        active_timers_for_group(&self.conn, group_id)
    }

    /// The open timer for a pair, if any.
    pub fn active_timer(
        &self,
        work_item_id: &WorkItemId,
        person_id: &PersonId,
    ) -> Result<Option<ActiveTimer>, DbError> {
        find_timer(&self.conn, work_item_id, person_id)
    }

    /// Per-person totals and running state for a work item.
    ///
    /// A person appears if they have any entries or an open timer. The name
    /// is the most recently recorded one.
    pub fn member_time_view(
        &mut self,
        work_item_id: &WorkItemId,
    ) -> Result<BTreeMap<PersonId, MemberTimeView>, DbError> {
        let tx = self.conn.transaction()?;
        let mut views = BTreeMap::new();
        {
            let mut stmt = tx.prepare(
                "SELECT person_id, SUM(duration_ms),
                        (SELECT latest.person_name FROM completed_entries latest
                         WHERE latest.work_item_id = entries.work_item_id
                           AND latest.person_id = entries.person_id
                         ORDER BY latest.id DESC LIMIT 1)
                 FROM completed_entries entries
                 WHERE work_item_id = ?
                 GROUP BY person_id",
            )?;
            let rows = stmt.query_map(params![work_item_id.as_str()], |row| {
                Ok((
                    id_column::<PersonId>(row, 0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (person_id, total_ms, name) = row?;
                views.insert(
                    person_id,
                    MemberTimeView {
                        name,
                        total_ms,
                        active_start: None,
                    },
                );
            }

            let mut stmt = tx.prepare(&format!(
                "SELECT {TIMER_COLUMNS} FROM active_timers WHERE work_item_id = ?"
            ))?;
            let timers = stmt.query_map(params![work_item_id.as_str()], timer_from_row)?;
            for timer in timers {
                let timer = timer?;
                let view = views
                    .entry(timer.person_id)
                    .or_insert_with(|| MemberTimeView {
                        name: String::new(),
                        total_ms: 0,
                        active_start: None,
                    });
                view.name = timer.person_name;
                view.active_start = Some(timer.started_at);
            }
        }
        tx.commit()?;
        Ok(views)
    }

    /// Completed entries in a group whose start falls inside `range`.
    pub fn list_entries(
        &self,
        group_id: &GroupId,
        range: &DateRange,
    ) -> Result<Vec<CompletedEntry>, DbError> {
        entries_in_range(&self.conn, group_id, range)
    }
}

struct NewEntry<'a> {
    group_id: &'a GroupId,
    work_item_id: &'a WorkItemId,
    person_id: &'a PersonId,
    person_name: &'a str,
    snapshot: &'a ItemSnapshot,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    duration_ms: i64,
}

fn insert_timer(
    conn: &Connection,
    target: &TimerTarget<'_>,
    now: DateTime<Utc>,
) -> Result<bool, DbError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO active_timers (id, group_id, work_item_id, person_id, person_name, started_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            uuid::Uuid::new_v4().to_string(),
            target.group_id.as_str(),
            target.work_item_id.as_str(),
            target.person.id.as_str(),
            target.person.name,
            format_timestamp(now),
        ],
    )?;
    if inserted == 0 {
        tracing::debug!(
            item = %target.work_item_id,
            person = %target.person.id,
            "timer already running"
        );
    }
    Ok(inserted == 1)
}

fn find_timer(
    conn: &Connection,
    work_item_id: &WorkItemId,
    person_id: &PersonId,
) -> Result<Option<ActiveTimer>, DbError> {
    let timer = conn
        .query_row(
            &format!(
                "SELECT {TIMER_COLUMNS} FROM active_timers WHERE work_item_id = ? AND person_id = ?"
            ),
            params![work_item_id.as_str(), person_id.as_str()],
            timer_from_row,
        )
        .optional()?;
    Ok(timer)
}

/// Deletes `timer` and writes its entry. `None` if the row was already gone.
fn close_timer(
    conn: &Connection,
    timer: &ActiveTimer,
    snapshot: &ItemSnapshot,
    now: DateTime<Utc>,
) -> Result<Option<CompletedEntry>, DbError> {
    let deleted = conn.execute(
        "DELETE FROM active_timers WHERE id = ?",
        params![timer.id],
    )?;
    if deleted != 1 {
        return Ok(None);
    }
    // A start stamped by a clock ahead of ours yields an empty interval.
    let ended_at = now.max(timer.started_at);
    let entry = insert_entry(
        conn,
        &NewEntry {
            group_id: &timer.group_id,
            work_item_id: &timer.work_item_id,
            person_id: &timer.person_id,
            person_name: &timer.person_name,
            snapshot,
            started_at: timer.started_at,
            ended_at,
            duration_ms: (ended_at - timer.started_at).num_milliseconds(),
        },
    )?;
    Ok(Some(entry))
}

fn insert_entry(conn: &Connection, new: &NewEntry<'_>) -> Result<CompletedEntry, DbError> {
    let labels = serde_json::to_string(&new.snapshot.labels)?;
    conn.execute(
        "INSERT INTO completed_entries
            (group_id, work_item_id, person_id, person_name, item_name, category_name, labels,
             started_at, ended_at, duration_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            new.group_id.as_str(),
            new.work_item_id.as_str(),
            new.person_id.as_str(),
            new.person_name,
            new.snapshot.item_name,
            new.snapshot.category_name,
            labels,
            format_timestamp(new.started_at),
            format_timestamp(new.ended_at),
            new.duration_ms,
        ],
    )?;
    Ok(CompletedEntry {
        id: conn.last_insert_rowid(),
        group_id: new.group_id.clone(),
        work_item_id: new.work_item_id.clone(),
        person_id: new.person_id.clone(),
        person_name: new.person_name.to_string(),
        item_name: new.snapshot.item_name.clone(),
        category_name: new.snapshot.category_name.clone(),
        labels: new.snapshot.labels.clone(),
        started_at: new.started_at,
        ended_at: new.ended_at,
        duration_ms: new.duration_ms,
    })
}

pub(crate) fn entries_in_range(
    conn: &Connection,
    group_id: &GroupId,
    range: &DateRange,
) -> Result<Vec<CompletedEntry>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM completed_entries
         WHERE group_id = ?1
           AND (?2 IS NULL OR started_at >= ?2)
           AND (?3 IS NULL OR started_at <= ?3)
         ORDER BY started_at, id"
    ))?;
    let rows = stmt.query_map(
        params![
            group_id.as_str(),
            range.from.map(format_timestamp),
            range.to.map(format_timestamp),
        ],
        entry_from_row,
    )?;
    let entries = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn active_timers_for_group(
    conn: &Connection,
    group_id: &GroupId,
) -> Result<Vec<ActiveTimer>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TIMER_COLUMNS} FROM active_timers WHERE group_id = ? ORDER BY started_at, id"
    ))?;
    let rows = stmt.query_map(params![group_id.as_str()], timer_from_row)?;
    let timers = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(timers)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CompletedEntry> {
    Ok(CompletedEntry {
        id: row.get(0)?,
        group_id: id_column(row, 1)?,
        work_item_id: id_column(row, 2)?,
        person_id: id_column(row, 3)?,
        person_name: row.get(4)?,
        item_name: row.get(5)?,
        category_name: row.get(6)?,
        labels: labels_column(row, 7)?,
        started_at: timestamp_column(row, 8)?,
        ended_at: timestamp_column(row, 9)?,
        duration_ms: row.get(10)?,
    })
}

fn timer_from_row(row: &Row<'_>) -> rusqlite::Result<ActiveTimer> {
    Ok(ActiveTimer {
        id: row.get(0)?,
        group_id: id_column(row, 1)?,
        work_item_id: id_column(row, 2)?,
        person_id: id_column(row, 3)?,
        person_name: row.get(4)?,
        started_at: timestamp_column(row, 5)?,
    })
}
