//! Core domain logic for the card time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Duration arithmetic: formatting, parsing and live totals
//! - Estimates: the grace-period rule for re-estimation
//! - Reports: aggregating time and estimates across a board
//! - Export: delimited and JSON renderings of report rows
//!
//! It performs no I/O. Persistence lives in `ct-db`; board metadata comes
//! from a [`BoardHost`] implementation.

pub mod duration;
pub mod estimate;
pub mod export;
mod host;
pub mod model;
pub mod report;
mod types;

pub use duration::{format_duration, format_timer, live_total, parse_duration, try_parse_duration};
pub use estimate::{EstimateChange, GRACE_PERIOD};
pub use export::{ExportRecord, export_delimited, export_structured};
pub use host::{BoardHost, BoardMetadata, HostError};
pub use model::{
    ActiveTimer, Category, CompletedEntry, DateRange, Estimate, EstimateHistoryEntry,
    EstimateRecord, EstimateView, ItemSnapshot, Label, MemberTimeView, Person, TimerState,
    WorkItem,
};
pub use report::{
    GroupBy, Report, ReportKind, ReportOptions, ReportRecords, ReportRow, ReportTotals, SortBy,
    TimeRow, build_report,
};
pub use types::{GroupId, PersonId, ValidationError, WorkItemId};
