//! Report aggregation.
//!
//! Merges completed entries, open timers and estimates for a whole board into
//! one aggregate per work item, then groups, derives and sorts report rows.
//!
//! # Algorithm Summary
//!
//! 1. Accumulate per (item, person): completed total, open interval start,
//!    estimate and original estimate
//! 2. Overlay live board metadata (names, lists, labels); fall back to the
//!    write-time snapshot for items no longer on the board
//! 3. Keep items that qualify for the report kind
//! 4. Group by item, person or label (labels fan out: an item counts in full
//!    toward every one of its labels)
//! 5. Derive deviation and accuracy per row, sort stably, summarize

use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duration::live_total;
use crate::host::BoardMetadata;
use crate::model::{ActiveTimer, CompletedEntry, DateRange, EstimateRecord, Label};
use crate::types::{PersonId, ValidationError, WorkItemId};

/// Grouping key of the synthetic bucket for items without labels.
pub const UNLABELED_KEY: &str = "__unlabeled__";
const UNLABELED_NAME: &str = "Unlabeled";

/// Generates a lowercase string enum with `as_str`, `Display` and `FromStr`.
macro_rules! define_option_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ValidationError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

define_option_enum!(
    /// Which items a report includes.
    ReportKind, "report kind" {
        Time => "time",
        Estimate => "estimate",
    }
);

define_option_enum!(
    /// What one report row represents.
    GroupBy, "grouping" {
        Item => "item",
        Person => "person",
        Label => "label",
    }
);

define_option_enum!(
    /// Row ordering. Ties keep insertion order.
    SortBy, "sort order" {
        Deviation => "deviation",
        Estimated => "estimated",
        Accuracy => "accuracy",
        Label => "label",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub kind: ReportKind,
    pub group_by: GroupBy,
    pub sort_by: SortBy,
    pub range: DateRange,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            kind: ReportKind::Time,
            group_by: GroupBy::Item,
            sort_by: SortBy::Deviation,
            range: DateRange::unbounded(),
        }
    }
}

/// Raw rows for one board, read from the store in a single consistent pass.
#[derive(Debug, Clone, Default)]
pub struct ReportRecords {
    pub entries: Vec<CompletedEntry>,
    pub active_timers: Vec<ActiveTimer>,
    pub estimates: Vec<EstimateRecord>,
}

/// One person's contribution to one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAggregate {
    pub person_id: PersonId,
    pub name: String,
    pub estimated_ms: i64,
    pub original_ms: Option<i64>,
    pub total_ms: i64,
    pub active_start: Option<DateTime<Utc>>,
}

impl MemberAggregate {
    fn new(person_id: PersonId, name: &str) -> Self {
        Self {
            person_id,
            name: name.to_string(),
            estimated_ms: 0,
            original_ms: None,
            total_ms: 0,
            active_start: None,
        }
    }

    pub fn actual_ms(&self, now: DateTime<Utc>) -> i64 {
        live_total(self.total_ms, self.active_start, now)
    }

    fn qualifies(&self, kind: ReportKind, now: DateTime<Utc>) -> bool {
        match kind {
            ReportKind::Time => self.actual_ms(now) != 0,
            ReportKind::Estimate => self.estimated_ms > 0,
        }
    }
}

/// Everything known about one work item for the report period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAggregate {
    pub id: WorkItemId,
    pub name: String,
    pub category_name: Option<String>,
    pub labels: Vec<Label>,
    pub members: Vec<MemberAggregate>,
}

impl ItemAggregate {
    fn member_mut(&mut self, person_id: &PersonId, name: &str) -> &mut MemberAggregate {
        let index = match self.members.iter().position(|m| &m.person_id == person_id) {
            Some(index) => index,
            None => {
                self.members
                    .push(MemberAggregate::new(person_id.clone(), name));
                self.members.len() - 1
            }
        };
        &mut self.members[index]
    }

    pub fn actual_ms(&self, now: DateTime<Utc>) -> i64 {
        self.members.iter().map(|m| m.actual_ms(now)).sum()
    }

    /// Time reports keep items whose live total is nonzero; estimate reports
    /// keep items where some member has an estimate.
    pub fn qualifies(&self, kind: ReportKind, now: DateTime<Utc>) -> bool {
        match kind {
            ReportKind::Time => self.actual_ms(now) != 0,
            ReportKind::Estimate => self.members.iter().any(|m| m.estimated_ms > 0),
        }
    }
}

/// Builds one aggregate per work item that has any entry, timer or estimate.
///
/// Entries outside `range` are skipped. Open timers always count because they
/// describe the present. Items are ordered as on the board, then by first
/// appearance for items the board no longer lists.
pub fn aggregate_items(
    records: &ReportRecords,
    metadata: &BoardMetadata,
    range: &DateRange,
) -> Vec<ItemAggregate> {
    let mut items: Vec<ItemAggregate> = Vec::new();
    let mut index: HashMap<WorkItemId, usize> = HashMap::new();

    let mut slots: Vec<(usize, &PersonId, &str, Contribution)> = Vec::new();
    {
        let mut item_mut = |id: &WorkItemId, fallback: &dyn Fn() -> ItemAggregate| -> usize {
            *index.entry(id.clone()).or_insert_with(|| {
                items.push(fallback());
                items.len() - 1
            })
        };

        for entry in records.entries.iter().filter(|e| range.contains(e.started_at)) {
            let slot = item_mut(&entry.work_item_id, &|| ItemAggregate {
                id: entry.work_item_id.clone(),
                name: entry.item_name.clone(),
                category_name: entry.category_name.clone(),
                labels: entry.labels.clone(),
                members: Vec::new(),
            });
            slots.push((
                slot,
                &entry.person_id,
                entry.person_name.as_str(),
                Contribution::Completed(entry.duration_ms),
            ));
        }
        for timer in &records.active_timers {
            let slot = item_mut(&timer.work_item_id, &|| bare_item(&timer.work_item_id));
            slots.push((
                slot,
                &timer.person_id,
                timer.person_name.as_str(),
                Contribution::Running(timer.started_at),
            ));
        }
        for record in &records.estimates {
            let estimate = &record.estimate;
            let slot = item_mut(&estimate.work_item_id, &|| bare_item(&estimate.work_item_id));
            slots.push((
                slot,
                &estimate.person_id,
                estimate.person_name.as_str(),
                Contribution::Estimated {
                    estimated_ms: estimate.estimated_ms,
                    original_ms: record.original_ms,
                },
            ));
        }
    }

    for (slot, person_id, name, contribution) in slots {
        let member = items[slot].member_mut(person_id, name);
        match contribution {
            Contribution::Completed(duration_ms) => member.total_ms += duration_ms,
            Contribution::Running(started_at) => member.active_start = Some(started_at),
            Contribution::Estimated {
                estimated_ms,
                original_ms,
            } => {
                member.estimated_ms += estimated_ms;
                member.original_ms = original_ms;
            }
        }
    }

    apply_live_metadata(&mut items, metadata);

    let board_position: HashMap<&WorkItemId, usize> = metadata
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| (&item.id, position))
        .collect();
    let mut ordered: Vec<(usize, ItemAggregate)> = items
        .into_iter()
        .map(|item| {
            let position = board_position.get(&item.id).copied().unwrap_or(usize::MAX);
            (position, item)
        })
        .collect();
    ordered.sort_by_key(|(position, _)| *position);
    ordered.into_iter().map(|(_, item)| item).collect()
}

#[derive(Debug, Clone, Copy)]
enum Contribution {
    Completed(i64),
    Running(DateTime<Utc>),
    Estimated {
        estimated_ms: i64,
        original_ms: Option<i64>,
    },
}

fn bare_item(id: &WorkItemId) -> ItemAggregate {
    ItemAggregate {
        id: id.clone(),
        name: id.to_string(),
        category_name: None,
        labels: Vec::new(),
        members: Vec::new(),
    }
}

fn apply_live_metadata(items: &mut [ItemAggregate], metadata: &BoardMetadata) {
    let member_names = metadata.member_names();
    for item in items.iter_mut() {
        if let Some(live) = metadata.item(&item.id) {
            item.name.clone_from(&live.name);
            item.category_name = live
                .category_id
                .as_deref()
                .and_then(|id| metadata.category_name(id))
                .map(str::to_string);
            item.labels.clone_from(&live.labels);
        }
        for member in &mut item.members {
            if let Some(name) = member_names.get(&member.person_id) {
                member.name = (*name).to_string();
            }
        }
    }
}

/// A grouped, derived report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub item_count: usize,
    pub running: bool,
    pub estimated_ms: i64,
    pub original_ms: Option<i64>,
    pub actual_ms: i64,
    pub remaining_ms: i64,
    pub deviation_ms: i64,
    pub deviation_pct: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Percentage by which `actual_ms` exceeds (positive) or undershoots `estimated_ms`.
#[allow(clippy::cast_precision_loss)]
pub fn deviation_pct(estimated_ms: i64, actual_ms: i64) -> Option<f64> {
    if estimated_ms == 0 {
        return None;
    }
    Some((actual_ms - estimated_ms) as f64 / estimated_ms as f64 * 100.0)
}

/// `100 - |actual/estimated - 1| * 100`, clamped at 0. `None` without an estimate.
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(estimated_ms: i64, actual_ms: i64) -> Option<f64> {
    if estimated_ms == 0 {
        return None;
    }
    let ratio = actual_ms as f64 / estimated_ms as f64;
    Some((100.0 - (ratio - 1.0).abs() * 100.0).max(0.0))
}

#[derive(Debug)]
struct RowAccumulator {
    key: String,
    label: String,
    category: Option<String>,
    color: Option<String>,
    items: HashSet<WorkItemId>,
    running: bool,
    estimated_ms: i64,
    original_ms: Option<i64>,
    actual_ms: i64,
}

impl RowAccumulator {
    fn new(key: String, label: String) -> Self {
        Self {
            key,
            label,
            category: None,
            color: None,
            items: HashSet::new(),
            running: false,
            estimated_ms: 0,
            original_ms: None,
            actual_ms: 0,
        }
    }

    fn add(&mut self, item: &WorkItemId, member: &MemberAggregate, now: DateTime<Utc>) {
        self.items.insert(item.clone());
        self.running |= member.active_start.is_some();
        self.estimated_ms += member.estimated_ms;
        self.actual_ms += member.actual_ms(now);
        if let Some(original_ms) = member.original_ms {
            *self.original_ms.get_or_insert(0) += original_ms;
        }
    }

    fn finish(self) -> ReportRow {
        ReportRow {
            key: self.key,
            label: self.label,
            category: self.category,
            color: self.color,
            item_count: self.items.len(),
            running: self.running,
            estimated_ms: self.estimated_ms,
            original_ms: self.original_ms,
            actual_ms: self.actual_ms,
            remaining_ms: (self.estimated_ms - self.actual_ms).max(0),
            deviation_ms: self.actual_ms - self.estimated_ms,
            deviation_pct: deviation_pct(self.estimated_ms, self.actual_ms),
            accuracy: accuracy(self.estimated_ms, self.actual_ms),
        }
    }
}

/// Ordered accumulation keyed by row key.
#[derive(Debug, Default)]
struct Rows {
    rows: Vec<RowAccumulator>,
    index: HashMap<String, usize>,
}

impl Rows {
    fn row(&mut self, key: &str, label: impl FnOnce() -> String) -> &mut RowAccumulator {
        let slot = match self.index.get(key).copied() {
            Some(slot) => slot,
            None => {
                self.rows
                    .push(RowAccumulator::new(key.to_string(), label()));
                self.index.insert(key.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        &mut self.rows[slot]
    }

    fn finish(self) -> Vec<ReportRow> {
        self.rows.into_iter().map(RowAccumulator::finish).collect()
    }
}

/// Groups qualifying items into rows.
///
/// Item and label rows take items that qualify as a whole. Person rows take
/// each member's contribution on its own terms, so a person without time does
/// not appear in a time report.
pub fn group_rows(
    items: &[ItemAggregate],
    group_by: GroupBy,
    kind: ReportKind,
    now: DateTime<Utc>,
) -> Vec<ReportRow> {
    let mut rows = Rows::default();
    for item in items {
        if group_by != GroupBy::Person && !item.qualifies(kind, now) {
            continue;
        }
        match group_by {
            GroupBy::Item => {
                let row = rows.row(item.id.as_str(), || item.name.clone());
                row.category.clone_from(&item.category_name);
                for member in &item.members {
                    row.add(&item.id, member, now);
                }
            }
            GroupBy::Person => {
                for member in item.members.iter().filter(|m| m.qualifies(kind, now)) {
                    rows.row(member.person_id.as_str(), || member.name.clone())
                        .add(&item.id, member, now);
                }
            }
            GroupBy::Label => {
                let mut seen: HashSet<&str> = HashSet::new();
                let buckets: Vec<(&str, &str, Option<&str>)> = if item.labels.is_empty() {
                    vec![(UNLABELED_KEY, UNLABELED_NAME, None)]
                } else {
                    item.labels
                        .iter()
                        .filter(|label| seen.insert(label.key()))
                        .map(|label| (label.key(), label.key(), Some(label.color.as_str())))
                        .collect()
                };
                for (key, name, color) in buckets {
                    let row = rows.row(key, || name.to_string());
                    if row.color.is_none() {
                        row.color = color.filter(|c| !c.is_empty()).map(str::to_string);
                    }
                    for member in &item.members {
                        row.add(&item.id, member, now);
                    }
                }
            }
        }
    }
    rows.finish()
}

/// Case-insensitive ordering with a case-sensitive tiebreak.
fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Sorts rows in place. The sort is stable.
pub fn sort_rows(rows: &mut [ReportRow], sort_by: SortBy) {
    match sort_by {
        SortBy::Deviation => rows.sort_by_key(|row| Reverse(row.deviation_ms.unsigned_abs())),
        SortBy::Estimated => rows.sort_by_key(|row| Reverse(row.estimated_ms)),
        // Worst first; rows without an estimate go last.
        SortBy::Accuracy => rows.sort_by(|a, b| match (a.accuracy, b.accuracy) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortBy::Label => rows.sort_by(|a, b| compare_labels(&a.label, &b.label)),
    }
}

/// A row singled out in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowHighlight {
    pub key: String,
    pub label: String,
    pub deviation_pct: f64,
}

/// Grand totals over all rows.
///
/// With label grouping an item counts once per label, so these totals can
/// exceed the board's actual total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub row_count: usize,
    pub estimated_ms: i64,
    pub original_ms: Option<i64>,
    pub actual_ms: i64,
    pub remaining_ms: i64,
    pub deviation_ms: i64,
    pub average_accuracy: Option<f64>,
    /// Row with the lowest signed deviation percentage.
    pub most_overestimated: Option<RowHighlight>,
    /// Row with the highest signed deviation percentage.
    pub most_underestimated: Option<RowHighlight>,
}

#[allow(clippy::cast_precision_loss)]
pub fn summarize(rows: &[ReportRow]) -> ReportTotals {
    let mut totals = ReportTotals {
        row_count: rows.len(),
        ..ReportTotals::default()
    };
    let mut accuracy_sum = 0.0;
    let mut accuracy_rows = 0_usize;

    for row in rows {
        totals.estimated_ms += row.estimated_ms;
        totals.actual_ms += row.actual_ms;
        totals.remaining_ms += row.remaining_ms;
        if let Some(original_ms) = row.original_ms {
            *totals.original_ms.get_or_insert(0) += original_ms;
        }
        if let Some(accuracy) = row.accuracy {
            accuracy_sum += accuracy;
            accuracy_rows += 1;
        }
        let Some(pct) = row.deviation_pct else {
            continue;
        };
        let highlight = || RowHighlight {
            key: row.key.clone(),
            label: row.label.clone(),
            deviation_pct: pct,
        };
        // Strict comparisons keep the first row on ties.
        if totals
            .most_overestimated
            .as_ref()
            .is_none_or(|current| pct < current.deviation_pct)
        {
            totals.most_overestimated = Some(highlight());
        }
        if totals
            .most_underestimated
            .as_ref()
            .is_none_or(|current| pct > current.deviation_pct)
        {
            totals.most_underestimated = Some(highlight());
        }
    }

    totals.deviation_ms = totals.actual_ms - totals.estimated_ms;
    if accuracy_rows > 0 {
        totals.average_accuracy = Some(accuracy_sum / accuracy_rows as f64);
    }
    totals
}

/// A finished report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub kind: ReportKind,
    pub group_by: GroupBy,
    pub sort_by: SortBy,
    pub range: DateRange,
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
}

/// Runs the full aggregation pipeline at `now`.
pub fn build_report(
    records: &ReportRecords,
    metadata: &BoardMetadata,
    options: &ReportOptions,
    now: DateTime<Utc>,
) -> Report {
    let items = aggregate_items(records, metadata, &options.range);
    let mut rows = group_rows(&items, options.group_by, options.kind, now);
    sort_rows(&mut rows, options.sort_by);
    let totals = summarize(&rows);
    tracing::debug!(
        items = items.len(),
        rows = rows.len(),
        kind = %options.kind,
        group_by = %options.group_by,
        "report built"
    );
    Report {
        generated_at: now,
        kind: options.kind,
        group_by: options.group_by,
        sort_by: options.sort_by,
        range: options.range,
        rows,
        totals,
    }
}

/// Raw completed time for one (item, person) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRow {
    pub item_id: WorkItemId,
    pub item_name: String,
    pub category: Option<String>,
    pub person_id: PersonId,
    pub person_name: String,
    pub total_ms: i64,
    pub running: bool,
}

/// Flattens aggregates into one row per (item, person) with time on record.
pub fn time_rows(items: &[ItemAggregate], now: DateTime<Utc>) -> Vec<TimeRow> {
    items
        .iter()
        .flat_map(|item| {
            item.members
                .iter()
                .filter(move |member| member.qualifies(ReportKind::Time, now))
                .map(move |member| TimeRow {
                    item_id: item.id.clone(),
                    item_name: item.name.clone(),
                    category: item.category_name.clone(),
                    person_id: member.person_id.clone(),
                    person_name: member.name.clone(),
                    total_ms: member.actual_ms(now),
                    running: member.active_start.is_some(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Estimate, Person, WorkItem};
    use crate::types::GroupId;
    use chrono::{Duration, TimeZone};

    const MINUTE: i64 = 60_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn label(name: &str, color: &str) -> Label {
        Label {
            name: name.to_string(),
            color: color.to_string(),
        }
    }

    fn work_item(id: &str, name: &str, labels: Vec<Label>) -> WorkItem {
        WorkItem {
            id: WorkItemId::new(id).unwrap(),
            name: name.to_string(),
            category_id: Some("doing".to_string()),
            labels,
        }
    }

    fn metadata(items: Vec<WorkItem>) -> BoardMetadata {
        BoardMetadata {
            items,
            categories: vec![Category {
                id: "doing".to_string(),
                name: "Doing".to_string(),
            }],
            members: vec![
                Person {
                    id: PersonId::new("ada").unwrap(),
                    name: "Ada".to_string(),
                },
                Person {
                    id: PersonId::new("bob").unwrap(),
                    name: "Bob".to_string(),
                },
            ],
        }
    }

    fn entry(item: &str, person: &str, started_at: DateTime<Utc>, minutes: i64) -> CompletedEntry {
        CompletedEntry {
            id: 0,
            group_id: GroupId::new("board").unwrap(),
            work_item_id: WorkItemId::new(item).unwrap(),
            person_id: PersonId::new(person).unwrap(),
            person_name: format!("{person} (snapshot)"),
            item_name: format!("{item} (snapshot)"),
            category_name: None,
            labels: Vec::new(),
            started_at,
            ended_at: started_at + Duration::minutes(minutes),
            duration_ms: minutes * MINUTE,
        }
    }

    fn timer(item: &str, person: &str, started_at: DateTime<Utc>) -> ActiveTimer {
        ActiveTimer {
            id: format!("timer-{item}-{person}"),
            group_id: GroupId::new("board").unwrap(),
            work_item_id: WorkItemId::new(item).unwrap(),
            person_id: PersonId::new(person).unwrap(),
            person_name: person.to_string(),
            started_at,
        }
    }

    fn estimate(item: &str, person: &str, minutes: i64, original: Option<i64>) -> EstimateRecord {
        EstimateRecord {
            estimate: Estimate {
                id: format!("est-{item}-{person}"),
                group_id: GroupId::new("board").unwrap(),
                work_item_id: WorkItemId::new(item).unwrap(),
                person_id: PersonId::new(person).unwrap(),
                person_name: person.to_string(),
                estimated_ms: minutes * MINUTE,
                created_at: now() - Duration::days(3),
                updated_at: now() - Duration::days(1),
            },
            original_ms: original.map(|m| m * MINUTE),
        }
    }

    fn options(kind: ReportKind, group_by: GroupBy, sort_by: SortBy) -> ReportOptions {
        ReportOptions {
            kind,
            group_by,
            sort_by,
            range: DateRange::unbounded(),
        }
    }

    #[test]
    fn estimate_vs_actual_with_running_timer() {
        let records = ReportRecords {
            entries: vec![entry("x", "ada", now() - Duration::days(1), 150)],
            active_timers: vec![timer("x", "ada", now() - Duration::minutes(10))],
            estimates: vec![estimate("x", "ada", 120, None)],
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![])]);
        let report = build_report(
            &records,
            &metadata,
            &options(ReportKind::Estimate, GroupBy::Item, SortBy::Deviation),
            now(),
        );

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.label, "Card X");
        assert_eq!(row.category.as_deref(), Some("Doing"));
        assert!(row.running);
        assert_eq!(row.estimated_ms, 7_200_000);
        assert_eq!(row.actual_ms, 9_600_000);
        assert_eq!(row.remaining_ms, 0);
        assert_eq!(row.deviation_ms, 2_400_000);
        assert!((row.deviation_pct.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert!((row.accuracy.unwrap() - 200.0 / 3.0).abs() < 1e-9);
        assert!(row.original_ms.is_none());
    }

    #[test]
    fn running_timer_advances_between_reads() {
        let records = ReportRecords {
            active_timers: vec![timer("x", "ada", now())],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![])]);
        let opts = options(ReportKind::Time, GroupBy::Item, SortBy::Deviation);

        let first = build_report(&records, &metadata, &opts, now() + Duration::seconds(5));
        let second = build_report(&records, &metadata, &opts, now() + Duration::seconds(10));
        assert_eq!(first.rows[0].actual_ms, 5_000);
        assert_eq!(second.rows[0].actual_ms, 10_000);
    }

    #[test]
    fn label_grouping_fans_out_full_duration() {
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::hours(3), 60),
                entry("y", "bob", now() - Duration::hours(2), 30),
            ],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![
            work_item(
                "x",
                "Card X",
                vec![label("Backend", "green"), label("Urgent", "red")],
            ),
            work_item("y", "Card Y", vec![]),
        ]);
        let by_label = build_report(
            &records,
            &metadata,
            &options(ReportKind::Time, GroupBy::Label, SortBy::Label),
            now(),
        );
        let by_item = build_report(
            &records,
            &metadata,
            &options(ReportKind::Time, GroupBy::Item, SortBy::Label),
            now(),
        );

        let keys: Vec<&str> = by_label.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Backend", UNLABELED_KEY, "Urgent"]);
        assert_eq!(by_label.rows[0].actual_ms, 60 * MINUTE);
        assert_eq!(by_label.rows[0].color.as_deref(), Some("green"));
        assert_eq!(by_label.rows[2].actual_ms, 60 * MINUTE);
        assert_eq!(by_label.rows[1].actual_ms, 30 * MINUTE);
        assert_eq!(by_label.totals.actual_ms, 150 * MINUTE);
        assert_eq!(by_item.totals.actual_ms, 90 * MINUTE);
        assert!(by_label.totals.actual_ms > by_item.totals.actual_ms);
    }

    #[test]
    fn unnamed_labels_group_by_color() {
        let records = ReportRecords {
            entries: vec![entry("x", "ada", now() - Duration::hours(3), 15)],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![label("", "purple")])]);
        let report = build_report(
            &records,
            &metadata,
            &options(ReportKind::Time, GroupBy::Label, SortBy::Label),
            now(),
        );
        assert_eq!(report.rows[0].key, "purple");
        assert_eq!(report.rows[0].label, "purple");
    }

    #[test]
    fn person_grouping_sums_across_items() {
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::hours(4), 30),
                entry("y", "ada", now() - Duration::hours(3), 45),
                entry("y", "bob", now() - Duration::hours(2), 10),
            ],
            estimates: vec![estimate("y", "carol", 20, None)],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![
            work_item("x", "Card X", vec![]),
            work_item("y", "Card Y", vec![]),
        ]);
        let report = build_report(
            &records,
            &metadata,
            &options(ReportKind::Time, GroupBy::Person, SortBy::Label),
            now(),
        );

        let rows: Vec<(&str, i64, usize)> = report
            .rows
            .iter()
            .map(|r| (r.label.as_str(), r.actual_ms, r.item_count))
            .collect();
        assert_eq!(rows, vec![("Ada", 75 * MINUTE, 2), ("Bob", 10 * MINUTE, 1)]);
    }

    #[test]
    fn estimate_report_requires_a_positive_estimate() {
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::hours(4), 30),
                entry("y", "ada", now() - Duration::hours(3), 45),
            ],
            estimates: vec![estimate("y", "ada", 60, None)],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![
            work_item("x", "Card X", vec![]),
            work_item("y", "Card Y", vec![]),
        ]);
        let estimates = build_report(
            &records,
            &metadata,
            &options(ReportKind::Estimate, GroupBy::Item, SortBy::Deviation),
            now(),
        );
        let time = build_report(
            &records,
            &metadata,
            &options(ReportKind::Time, GroupBy::Item, SortBy::Deviation),
            now(),
        );
        assert_eq!(estimates.rows.len(), 1);
        assert_eq!(estimates.rows[0].key, "y");
        assert_eq!(time.rows.len(), 2);
    }

    #[test]
    fn estimate_only_item_is_absent_from_time_report() {
        let records = ReportRecords {
            estimates: vec![estimate("x", "ada", 60, None)],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![])]);
        let time = build_report(&records, &metadata, &ReportOptions::default(), now());
        assert!(time.rows.is_empty());
        assert_eq!(time.totals, ReportTotals::default());

        let estimates = build_report(
            &records,
            &metadata,
            &options(ReportKind::Estimate, GroupBy::Item, SortBy::Deviation),
            now(),
        );
        assert_eq!(estimates.rows.len(), 1);
        assert_eq!(estimates.rows[0].actual_ms, 0);
        assert_eq!(estimates.rows[0].remaining_ms, 60 * MINUTE);
    }

    #[test]
    fn original_estimates_sum_only_where_present() {
        let records = ReportRecords {
            estimates: vec![
                estimate("x", "ada", 60, Some(40)),
                estimate("x", "bob", 30, None),
                estimate("y", "bob", 30, None),
            ],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![
            work_item("x", "Card X", vec![]),
            work_item("y", "Card Y", vec![]),
        ]);
        let report = build_report(
            &records,
            &metadata,
            &options(ReportKind::Estimate, GroupBy::Item, SortBy::Label),
            now(),
        );
        assert_eq!(report.rows[0].original_ms, Some(40 * MINUTE));
        assert_eq!(report.rows[1].original_ms, None);
        assert_eq!(report.totals.original_ms, Some(40 * MINUTE));
    }

    #[test]
    fn date_range_excludes_entries_but_keeps_running_timers() {
        let from = now() - Duration::days(1);
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::days(5), 30),
                entry("x", "ada", now() - Duration::hours(1), 20),
            ],
            active_timers: vec![timer("y", "bob", now() - Duration::days(9))],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![
            work_item("x", "Card X", vec![]),
            work_item("y", "Card Y", vec![]),
        ]);
        let mut opts = options(ReportKind::Time, GroupBy::Item, SortBy::Label);
        opts.range = DateRange {
            from: Some(from),
            to: None,
        };
        let report = build_report(&records, &metadata, &opts, now());
        assert_eq!(report.rows[0].actual_ms, 20 * MINUTE);
        assert_eq!(report.rows[1].actual_ms, 9 * 24 * 60 * MINUTE);
    }

    #[test]
    fn removed_items_fall_back_to_snapshot_and_live_names_win() {
        let records = ReportRecords {
            entries: vec![
                entry("archived", "ada", now() - Duration::hours(2), 10),
                entry("x", "zed", now() - Duration::hours(1), 5),
            ],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![work_item("x", "Renamed X", vec![])]);
        let items = aggregate_items(&records, &metadata, &DateRange::unbounded());

        assert_eq!(items[0].name, "Renamed X");
        assert_eq!(items[0].members[0].name, "zed (snapshot)");
        assert_eq!(items[1].name, "archived (snapshot)");
        assert_eq!(items[1].members[0].name, "Ada");
    }

    #[test]
    fn negative_adjustments_reduce_actual_time() {
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::hours(2), 30),
                entry("x", "ada", now() - Duration::hours(1), -45),
            ],
            ..ReportRecords::default()
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![])]);
        let report = build_report(&records, &metadata, &ReportOptions::default(), now());
        assert_eq!(report.rows[0].actual_ms, -15 * MINUTE);
    }

    #[test]
    fn accuracy_is_bounded_and_exact_only_on_target() {
        let estimated = 60 * MINUTE;
        for actual in [0, 1, 30 * MINUTE, estimated - 1, estimated + 1, 500 * MINUTE] {
            let value = accuracy(estimated, actual).unwrap();
            assert!((0.0..=100.0).contains(&value), "accuracy {value} for {actual}");
            assert!(value < 100.0);
        }
        assert_eq!(accuracy(estimated, estimated), Some(100.0));
        assert_eq!(accuracy(0, estimated), None);
        assert_eq!(deviation_pct(0, estimated), None);
    }

    fn row(key: &str, estimated_ms: i64, actual_ms: i64) -> ReportRow {
        let mut acc = RowAccumulator::new(key.to_string(), key.to_string());
        acc.estimated_ms = estimated_ms;
        acc.actual_ms = actual_ms;
        acc.finish()
    }

    #[test]
    fn sort_by_deviation_uses_absolute_value_and_is_stable() {
        let mut rows = vec![
            row("a", 100, 110),
            row("b", 100, 50),
            row("c", 100, 90),
            row("d", 100, 150),
        ];
        sort_rows(&mut rows, SortBy::Deviation);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn sort_by_accuracy_puts_worst_first_and_unestimated_last() {
        let mut rows = vec![
            row("none", 0, 10),
            row("good", 100, 95),
            row("bad", 100, 300),
            row("ok", 100, 80),
        ];
        sort_rows(&mut rows, SortBy::Accuracy);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["bad", "ok", "good", "none"]);
    }

    #[test]
    fn sort_by_estimated_and_label() {
        let mut rows = vec![row("beta", 10, 0), row("Alpha", 30, 0), row("gamma", 30, 0)];
        sort_rows(&mut rows, SortBy::Estimated);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "gamma", "beta"]);

        sort_rows(&mut rows, SortBy::Label);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn summary_averages_accuracy_and_picks_extremes() {
        let rows = vec![
            row("under-a", 100, 150),
            row("over", 100, 60),
            row("under-b", 100, 150),
            row("unestimated", 0, 40),
        ];
        let totals = summarize(&rows);
        assert_eq!(totals.row_count, 4);
        assert_eq!(totals.estimated_ms, 300);
        assert_eq!(totals.actual_ms, 400);
        assert_eq!(totals.deviation_ms, 100);
        assert_eq!(totals.remaining_ms, 40);
        let average = totals.average_accuracy.unwrap();
        assert!((average - 160.0 / 3.0).abs() < 1e-9);
        assert_eq!(totals.most_underestimated.unwrap().key, "under-a");
        assert_eq!(totals.most_overestimated.unwrap().key, "over");
    }

    #[test]
    fn summary_extremes_when_every_row_runs_over() {
        let rows = vec![row("slight", 100, 110), row("worst", 100, 200), row("mid", 100, 150)];
        let totals = summarize(&rows);
        assert_eq!(totals.most_underestimated.unwrap().key, "worst");
        let closest = totals.most_overestimated.unwrap();
        assert_eq!(closest.key, "slight");
        assert!((closest.deviation_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn time_report_skips_items_whose_time_cancels_out() {
        let records = ReportRecords {
            entries: vec![
                entry("x", "ada", now() - Duration::hours(2), 30),
                entry("x", "bob", now() - Duration::hours(1), -30),
            ],
            active_timers: Vec::new(),
            estimates: Vec::new(),
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![label("UI", "blue")])]);

        for group_by in [GroupBy::Item, GroupBy::Label] {
            let options = ReportOptions {
                group_by,
                ..ReportOptions::default()
            };
            let report = build_report(&records, &metadata, &options, now());
            assert!(report.rows.is_empty(), "{group_by} rows: {:?}", report.rows);
        }

        let by_person = ReportOptions {
            group_by: GroupBy::Person,
            ..ReportOptions::default()
        };
        let report = build_report(&records, &metadata, &by_person, now());
        let people: Vec<(&str, i64)> = report
            .rows
            .iter()
            .map(|row| (row.key.as_str(), row.actual_ms))
            .collect();
        assert_eq!(people, vec![("ada", 30 * MINUTE), ("bob", -30 * MINUTE)]);

        let items = aggregate_items(&records, &metadata, &DateRange::unbounded());
        assert_eq!(time_rows(&items, now()).len(), 2);
    }

    #[test]
    fn time_rows_list_each_member_with_time() {
        let records = ReportRecords {
            entries: vec![entry("x", "ada", now() - Duration::hours(1), 30)],
            active_timers: vec![timer("x", "bob", now() - Duration::minutes(5))],
            estimates: vec![estimate("x", "carol", 10, None)],
        };
        let metadata = metadata(vec![work_item("x", "Card X", vec![])]);
        let items = aggregate_items(&records, &metadata, &DateRange::unbounded());
        let rows = time_rows(&items, now());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].person_name, "Ada");
        assert!(!rows[0].running);
        assert_eq!(rows[1].total_ms, 5 * MINUTE);
        assert!(rows[1].running);
    }

    #[test]
    fn option_enums_parse_case_insensitively() {
        assert_eq!("Label".parse::<GroupBy>().unwrap(), GroupBy::Label);
        assert_eq!("estimate".parse::<ReportKind>().unwrap(), ReportKind::Estimate);
        assert_eq!(" accuracy ".parse::<SortBy>().unwrap(), SortBy::Accuracy);
        let err = "weekly".parse::<GroupBy>().unwrap_err();
        assert_eq!(err.to_string(), "invalid grouping: weekly");
    }
}
