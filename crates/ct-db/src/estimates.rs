//! Estimate Store: one estimate per (work item, person) with a revision log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use ct_core::estimate::{classify_change, validate_estimate};
use ct_core::{
    Estimate, EstimateChange, EstimateHistoryEntry, EstimateRecord, EstimateView, GroupId, Person,
    PersonId, WorkItemId,
};

use crate::{Database, DbError, delete_for_item, format_timestamp, id_column, timestamp_column};

const ESTIMATE_COLUMNS: &str =
    "id, group_id, work_item_id, person_id, person_name, estimated_ms, created_at, updated_at";

/// Earliest logged previous value of an estimate; the value before any revision.
const ORIGINAL_MS: &str = "(SELECT history.previous_ms FROM estimate_history history
      WHERE history.estimate_id = estimates.id
      ORDER BY history.changed_at, history.id LIMIT 1)";

impl Database {
    /// Sets `person`'s estimate on a work item.
    ///
    /// Changes within the grace period of the last update overwrite silently;
    /// later changes append a history row first. Setting the current value
    /// again writes nothing.
    pub fn set_estimate_at(
        &mut self,
        group_id: &GroupId,
        work_item_id: &WorkItemId,
        person: &Person,
        estimated_ms: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EstimateChange, DbError> {
        let estimated_ms = validate_estimate(estimated_ms)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = find_estimate(&tx, work_item_id, &person.id)?;
        let change = classify_change(existing.as_ref(), estimated_ms, now);
        let stamp = format_timestamp(now);

        match (change, existing) {
            (EstimateChange::Insert, _) => {
                tx.execute(
                    "INSERT INTO estimates (id, group_id, work_item_id, person_id, person_name, estimated_ms, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        group_id.as_str(),
                        work_item_id.as_str(),
                        person.id.as_str(),
                        person.name,
                        estimated_ms,
                        stamp,
                        stamp,
                    ],
                )?;
            }
            (EstimateChange::Unchanged, _) | (_, None) => {}
            (EstimateChange::Overwrite, Some(current)) => {
                update_value(&tx, &current.id, person, estimated_ms, &stamp)?;
            }
            (EstimateChange::Revise { previous_ms }, Some(current)) => {
                tx.execute(
                    "INSERT INTO estimate_history
                        (estimate_id, group_id, work_item_id, person_id, person_name, previous_ms, new_ms, reason, changed_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        current.id,
                        current.group_id.as_str(),
                        work_item_id.as_str(),
                        person.id.as_str(),
                        person.name,
                        previous_ms,
                        estimated_ms,
                        reason,
                        stamp,
                    ],
                )?;
                update_value(&tx, &current.id, person, estimated_ms, &stamp)?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            item = %work_item_id,
            person = %person.id,
            estimated_ms,
            ?change,
            "set estimate"
        );
        Ok(change)
    }

    /// Removes one person's estimate and its history. Returns whether one existed.
    pub fn remove_estimate(
        &mut self,
        work_item_id: &WorkItemId,
        person_id: &PersonId,
    ) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM estimates WHERE work_item_id = ? AND person_id = ?",
            params![work_item_id.as_str(), person_id.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Removes every estimate (and history) on a work item.
    pub fn clear_estimates(&mut self, work_item_id: &WorkItemId) -> Result<usize, DbError> {
        let deleted = delete_for_item(&self.conn, "estimates", work_item_id.as_str())?;
        tracing::info!(item = %work_item_id, deleted, "cleared estimates");
        Ok(deleted)
    }

    pub fn estimate(
        &self,
        work_item_id: &WorkItemId,
        person_id: &PersonId,
    ) -> Result<Option<Estimate>, DbError> {
        find_estimate(&self.conn, work_item_id, person_id)
    }

    /// The value an estimate had before its first logged revision.
    ///
    /// `None` when the estimate was never revised outside the grace period.
    pub fn original_estimate(&self, estimate_id: &str) -> Result<Option<i64>, DbError> {
        let original = self
            .conn
            .query_row(
                "SELECT previous_ms FROM estimate_history
                 WHERE estimate_id = ?
                 ORDER BY changed_at, id LIMIT 1",
                params![estimate_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(original)
    }

    /// Current estimates on a work item keyed by person.
    pub fn estimates_for_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<BTreeMap<PersonId, EstimateView>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ESTIMATE_COLUMNS}, {ORIGINAL_MS} FROM estimates WHERE work_item_id = ?"
        ))?;
        let rows = stmt.query_map(params![work_item_id.as_str()], record_from_row)?;
        let mut views = BTreeMap::new();
        for record in rows {
            let record = record?;
            views.insert(record.estimate.person_id.clone(), EstimateView::from(&record));
        }
        Ok(views)
    }

    /// Logged revisions on a work item, oldest first.
    pub fn estimate_history(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Vec<EstimateHistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, estimate_id, group_id, work_item_id, person_id, person_name,
                    previous_ms, new_ms, reason, changed_at
             FROM estimate_history
             WHERE work_item_id = ?
             ORDER BY changed_at, id",
        )?;
        let rows = stmt.query_map(params![work_item_id.as_str()], |row| {
            Ok(EstimateHistoryEntry {
                id: row.get(0)?,
                estimate_id: row.get(1)?,
                group_id: id_column(row, 2)?,
                work_item_id: id_column(row, 3)?,
                person_id: id_column(row, 4)?,
                person_name: row.get(5)?,
                previous_ms: row.get(6)?,
                new_ms: row.get(7)?,
                reason: row.get(8)?,
                changed_at: timestamp_column(row, 9)?,
            })
        })?;
        let history = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }
}

fn update_value(
    conn: &Connection,
    estimate_id: &str,
    person: &Person,
    estimated_ms: i64,
    stamp: &str,
) -> Result<(), DbError> {
    conn.execute(
        "UPDATE estimates SET estimated_ms = ?, person_name = ?, updated_at = ? WHERE id = ?",
        params![estimated_ms, person.name, stamp, estimate_id],
    )?;
    Ok(())
}

fn find_estimate(
    conn: &Connection,
    work_item_id: &WorkItemId,
    person_id: &PersonId,
) -> Result<Option<Estimate>, DbError> {
    let estimate = conn
        .query_row(
            &format!(
                "SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE work_item_id = ? AND person_id = ?"
            ),
            params![work_item_id.as_str(), person_id.as_str()],
            estimate_from_row,
        )
        .optional()?;
    Ok(estimate)
}

pub(crate) fn estimates_for_group(
    conn: &Connection,
    group_id: &GroupId,
) -> Result<Vec<EstimateRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ESTIMATE_COLUMNS}, {ORIGINAL_MS} FROM estimates
         WHERE group_id = ?
         ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![group_id.as_str()], record_from_row)?;
    let records = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn estimate_from_row(row: &Row<'_>) -> rusqlite::Result<Estimate> {
    Ok(Estimate {
        id: row.get(0)?,
        group_id: id_column(row, 1)?,
        work_item_id: id_column(row, 2)?,
        person_id: id_column(row, 3)?,
        person_name: row.get(4)?,
        estimated_ms: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        updated_at: timestamp_column(row, 7)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EstimateRecord> {
    Ok(EstimateRecord {
        estimate: estimate_from_row(row)?,
        original_ms: row.get(8)?,
    })
}
