//! The tracker facade: store operations resolved against the board host.
//!
//! Commands name work items and people by id; the tracker fills in defaults
//! from the host (current item, acting person), snapshots item metadata onto
//! written entries, and pings [`BoardHost::touch`] after every mutation that
//! changed something.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};

use ct_core::report::{aggregate_items, time_rows};
use ct_core::{
    ActiveTimer, BoardHost, BoardMetadata, CompletedEntry, DateRange, EstimateChange,
    EstimateHistoryEntry, EstimateView, ItemSnapshot, MemberTimeView, Person, PersonId, Report,
    ReportOptions, TimeRow, TimerState, WorkItemId, build_report,
};
use ct_db::{Database, ResetStats, TimerTarget};

pub struct Tracker<H> {
    db: Database,
    host: H,
}

impl<H: BoardHost> Tracker<H> {
    pub const fn new(db: Database, host: H) -> Self {
        Self { db, host }
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    /// The given item, or the one open on the board.
    pub fn resolve_item(&self, item: Option<&WorkItemId>) -> Result<WorkItemId> {
        if let Some(id) = item {
            return Ok(id.clone());
        }
        self.host
            .current_work_item()?
            .map(|item| item.id)
            .context("no work item selected; pass --item")
    }

    /// The given board member, or the acting person.
    pub fn resolve_person(&self, person: Option<&PersonId>) -> Result<Person> {
        let Some(id) = person else {
            return Ok(self.host.current_person()?);
        };
        let Some(member) = self
            .host
            .group_members()?
            .into_iter()
            .find(|member| &member.id == id)
        else {
            bail!("{id} is not a member of this board");
        };
        Ok(member)
    }

    pub fn metadata(&self) -> Result<BoardMetadata> {
        BoardMetadata::load(&self.host).context("failed to read board metadata")
    }

    pub fn start_timer_at(
        &mut self,
        item: &WorkItemId,
        person: Option<&PersonId>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let group = self.host.current_group()?;
        let person = self.resolve_person(person)?;
        let snapshot = ItemSnapshot::default();
        let target = TimerTarget {
            group_id: &group,
            work_item_id: item,
            person: &person,
            snapshot: &snapshot,
        };
        let started = self
            .db
            .start_timer_at(&target, now)
            .context("failed to start timer")?;
        if started {
            self.host.touch(item);
        }
        Ok(started)
    }

    pub fn stop_timer_at(
        &mut self,
        item: &WorkItemId,
        person: Option<&PersonId>,
        now: DateTime<Utc>,
    ) -> Result<Option<CompletedEntry>> {
        let group = self.host.current_group()?;
        let person = self.resolve_person(person)?;
        let snapshot = self.metadata()?.snapshot(item);
        let target = TimerTarget {
            group_id: &group,
            work_item_id: item,
            person: &person,
            snapshot: &snapshot,
        };
        let entry = self
            .db
            .stop_timer_at(&target, now)
            .context("failed to stop timer")?;
        if entry.is_some() {
            self.host.touch(item);
        }
        Ok(entry)
    }

    pub fn toggle_timer_at(
        &mut self,
        item: &WorkItemId,
        person: Option<&PersonId>,
        now: DateTime<Utc>,
    ) -> Result<TimerState> {
        let group = self.host.current_group()?;
        let person = self.resolve_person(person)?;
        let snapshot = self.metadata()?.snapshot(item);
        let target = TimerTarget {
            group_id: &group,
            work_item_id: item,
            person: &person,
            snapshot: &snapshot,
        };
        let state = self
            .db
            .toggle_timer_at(&target, now)
            .context("failed to toggle timer")?;
        self.host.touch(item);
        Ok(state)
    }

    pub fn adjust_time_at(
        &mut self,
        item: &WorkItemId,
        person: Option<&PersonId>,
        delta_ms: i64,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<CompletedEntry> {
        let group = self.host.current_group()?;
        let person = self.resolve_person(person)?;
        let snapshot = self.metadata()?.snapshot(item);
        let target = TimerTarget {
            group_id: &group,
            work_item_id: item,
            person: &person,
            snapshot: &snapshot,
        };
        let entry = self
            .db
            .adjust_time_at(&target, delta_ms, date, now)
            .context("failed to adjust time")?;
        self.host.touch(item);
        Ok(entry)
    }

    /// Removes all recorded and running time on an item, for everyone.
    pub fn reset_item_time(&mut self, item: &WorkItemId) -> Result<ResetStats> {
        let stats = self
            .db
            .reset_item_time(item)
            .context("failed to reset time")?;
        self.host.touch(item);
        Ok(stats)
    }

    pub fn active_timers(&self) -> Result<Vec<ActiveTimer>> {
        let group = self.host.current_group()?;
        self.db
            .list_active_timers(&group)
            .context("failed to list running timers")
    }

    /// Stops the given timers by id, whoever owns them.
    pub fn stop_active_timers_at(
        &mut self,
        timer_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<CompletedEntry>> {
        let metadata = self.metadata()?;
        let entries = self
            .db
            .stop_active_timers_at(timer_ids, |item| metadata.snapshot(item), now)
            .context("failed to stop timers")?;
        let touched: BTreeSet<&WorkItemId> = entries.iter().map(|e| &e.work_item_id).collect();
        for item in touched {
            self.host.touch(item);
        }
        Ok(entries)
    }

    /// Per-person time on an item. Read failures degrade to an empty view.
    pub fn member_time_view(&mut self, item: &WorkItemId) -> BTreeMap<PersonId, MemberTimeView> {
        self.db.member_time_view(item).unwrap_or_else(|err| {
            tracing::warn!(item = %item, error = %err, "failed to read member time view");
            BTreeMap::new()
        })
    }

    pub fn set_estimate_at(
        &mut self,
        item: &WorkItemId,
        person: Option<&PersonId>,
        estimated_ms: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EstimateChange> {
        let group = self.host.current_group()?;
        let person = self.resolve_person(person)?;
        let change = self
            .db
            .set_estimate_at(&group, item, &person, estimated_ms, reason, now)
            .context("failed to save estimate")?;
        if change != EstimateChange::Unchanged {
            self.host.touch(item);
        }
        Ok(change)
    }

    pub fn remove_estimate(&mut self, item: &WorkItemId, person: Option<&PersonId>) -> Result<bool> {
        let person = self.resolve_person(person)?;
        let removed = self
            .db
            .remove_estimate(item, &person.id)
            .context("failed to remove estimate")?;
        if removed {
            self.host.touch(item);
        }
        Ok(removed)
    }

    pub fn clear_estimates(&mut self, item: &WorkItemId) -> Result<usize> {
        let cleared = self
            .db
            .clear_estimates(item)
            .context("failed to clear estimates")?;
        if cleared > 0 {
            self.host.touch(item);
        }
        Ok(cleared)
    }

    /// Current estimates on an item. Read failures degrade to an empty map.
    pub fn estimates(&self, item: &WorkItemId) -> BTreeMap<PersonId, EstimateView> {
        self.db.estimates_for_item(item).unwrap_or_else(|err| {
            tracing::warn!(item = %item, error = %err, "failed to read estimates");
            BTreeMap::new()
        })
    }

    pub fn estimate_history(&self, item: &WorkItemId) -> Result<Vec<EstimateHistoryEntry>> {
        self.db
            .estimate_history(item)
            .context("failed to read estimate history")
    }

    /// Builds a report over the current board. Load failures are errors.
    pub fn report_at(&mut self, options: &ReportOptions, now: DateTime<Utc>) -> Result<Report> {
        let group = self.host.current_group()?;
        let records = self
            .db
            .report_records(&group, &options.range)
            .context("failed to load report data")?;
        let metadata = self.metadata()?;
        Ok(build_report(&records, &metadata, options, now))
    }

    /// One row per (item, person) with time on record in `range`.
    pub fn time_rows_at(&mut self, range: &DateRange, now: DateTime<Utc>) -> Result<Vec<TimeRow>> {
        let group = self.host.current_group()?;
        let records = self
            .db
            .report_records(&group, range)
            .context("failed to load report data")?;
        let metadata = self.metadata()?;
        let items = aggregate_items(&records, &metadata, range);
        Ok(time_rows(&items, now))
    }
}
