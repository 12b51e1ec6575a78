//! Persisted records and the read-side views derived from them.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::live_total;
use crate::types::{GroupId, PersonId, WorkItemId};

/// A board member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

/// A colored label attached to a work item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl Label {
    /// Grouping key: the name, or the color for unnamed labels.
    pub fn key(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.color
        } else {
            &self.name
        }
    }
}

/// A list (column) on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Live metadata for a work item as the host currently reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Item metadata copied onto each completed entry at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub item_name: String,
    pub category_name: Option<String>,
    pub labels: Vec<Label>,
}

impl ItemSnapshot {
    /// Resolves the snapshot of `item` against the board's categories.
    pub fn of(item: &WorkItem, categories: &[Category]) -> Self {
        let category_name = item.category_id.as_deref().and_then(|id| {
            categories
                .iter()
                .find(|category| category.id == id)
                .map(|category| category.name.clone())
        });
        Self {
            item_name: item.name.clone(),
            category_name,
            labels: item.labels.clone(),
        }
    }
}

/// One finished start/stop cycle or manual adjustment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedEntry {
    pub id: i64,
    pub group_id: GroupId,
    pub work_item_id: WorkItemId,
    pub person_id: PersonId,
    pub person_name: String,
    pub item_name: String,
    pub category_name: Option<String>,
    pub labels: Vec<Label>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// An open interval. At most one exists per (work item, person).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTimer {
    pub id: String,
    pub group_id: GroupId,
    pub work_item_id: WorkItemId,
    pub person_id: PersonId,
    pub person_name: String,
    pub started_at: DateTime<Utc>,
}

/// Whether a person is currently timing a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Stopped,
    Running,
}

impl TimerState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// A person's expected effort on a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Estimate {
    pub id: String,
    pub group_id: GroupId,
    pub work_item_id: WorkItemId,
    pub person_id: PersonId,
    pub person_name: String,
    pub estimated_ms: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An estimate together with the value it had before its first logged revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimateRecord {
    #[serde(flatten)]
    pub estimate: Estimate,
    pub original_ms: Option<i64>,
}

/// One logged re-estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimateHistoryEntry {
    pub id: i64,
    pub estimate_id: String,
    pub group_id: GroupId,
    pub work_item_id: WorkItemId,
    pub person_id: PersonId,
    pub person_name: String,
    pub previous_ms: i64,
    pub new_ms: i64,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Per-person time on one work item. Never cached across reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTimeView {
    pub name: String,
    pub total_ms: i64,
    pub active_start: Option<DateTime<Utc>>,
}

impl MemberTimeView {
    pub fn live_total(&self, now: DateTime<Utc>) -> i64 {
        live_total(self.total_ms, self.active_start, now)
    }

    pub const fn state(&self) -> TimerState {
        if self.active_start.is_some() {
            TimerState::Running
        } else {
            TimerState::Stopped
        }
    }
}

/// Per-person estimate on one work item, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimateView {
    pub person_name: String,
    pub estimated_ms: i64,
    pub original_ms: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl From<&EstimateRecord> for EstimateView {
    fn from(record: &EstimateRecord) -> Self {
        Self {
            person_name: record.estimate.person_name.clone(),
            estimated_ms: record.estimate.estimated_ms,
            original_ms: record.original_ms,
            updated_at: record.estimate.updated_at,
        }
    }
}

/// Inclusive bounds on `started_at`; `None` leaves a side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub const fn unbounded() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
    }
}

/// Timestamp recorded on a manual adjustment: local noon of `date`, or `now`.
pub fn adjustment_instant(date: Option<NaiveDate>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(date) = date else {
        return now;
    };
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&noon), |dt| dt.with_timezone(&Utc))
}
