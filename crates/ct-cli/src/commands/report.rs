//! Report command for estimate-versus-actual reports.
//!
//! This module implements `ct report` with grouping, sorting and period
//! options and two output formats (human-readable, JSON).

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Args;

use ct_core::{
    BoardHost, GroupBy, Report, ReportKind, ReportOptions, ReportRow, SortBy, format_duration,
};

use crate::Tracker;
use crate::commands::period::{Period, PeriodArgs};

/// Selection shared by `ct report` and `ct export`.
#[derive(Debug, Clone, Args)]
pub struct ReportOptionsArgs {
    /// Which items to include: time (tracked time) or estimate (estimated items).
    #[arg(long, default_value = "time")]
    pub kind: ReportKind,

    /// One row per item, person or label.
    #[arg(long, default_value = "item")]
    pub group_by: GroupBy,

    /// Row order: deviation, estimated, accuracy or label.
    #[arg(long = "sort", default_value = "deviation")]
    pub sort_by: SortBy,

    #[command(flatten)]
    pub period: PeriodArgs,
}

impl Default for ReportOptionsArgs {
    fn default() -> Self {
        Self {
            kind: ReportKind::Time,
            group_by: GroupBy::Item,
            sort_by: SortBy::Deviation,
            period: PeriodArgs::default(),
        }
    }
}

impl ReportOptionsArgs {
    pub fn options(&self, today: NaiveDate) -> ReportOptions {
        ReportOptions {
            kind: self.kind,
            group_by: self.group_by,
            sort_by: self.sort_by,
            range: self.period.period().range(today),
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub options: ReportOptionsArgs,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

// ========== Human Output ==========

const LABEL_WIDTH: usize = 28;

fn format_signed(ms: i64) -> String {
    if ms < 0 {
        format!("-{}", format_duration(-ms, true))
    } else {
        format!("+{}", format_duration(ms, true))
    }
}

fn format_pct(value: Option<f64>, signed: bool) -> String {
    match value {
        Some(value) if signed => format!("{value:+.1}%"),
        Some(value) => format!("{value:.1}%"),
        None => "-".to_string(),
    }
}

fn truncate(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let mut short: String = label.chars().take(width - 1).collect();
    short.push('…');
    short
}

fn row_label(row: &ReportRow) -> String {
    let marker = if row.running { "* " } else { "" };
    let label = match &row.category {
        Some(category) => format!("{marker}{} [{category}]", row.label),
        None => format!("{marker}{}", row.label),
    };
    truncate(&label, LABEL_WIDTH)
}

/// Formats the human-readable report output.
pub fn format_report(report: &Report, period: &str) -> String {
    let mut output = String::new();
    let title = match report.kind {
        ReportKind::Time => "TIME REPORT",
        ReportKind::Estimate => "ESTIMATE REPORT",
    };
    writeln!(output, "{title}: {period} (by {})", report.group_by).unwrap();

    if report.rows.is_empty() {
        writeln!(output).unwrap();
        match report.kind {
            ReportKind::Time => writeln!(output, "No time recorded in this period.").unwrap(),
            ReportKind::Estimate => writeln!(output, "No estimates on this board.").unwrap(),
        }
        return output;
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "{:<LABEL_WIDTH$} {:>9} {:>9} {:>10} {:>8} {:>8}",
        "", "Estimate", "Actual", "Deviation", "Dev %", "Accuracy"
    )
    .unwrap();
    for row in &report.rows {
        writeln!(
            output,
            "{:<LABEL_WIDTH$} {:>9} {:>9} {:>10} {:>8} {:>8}",
            row_label(row),
            format_duration(row.estimated_ms, true),
            format_duration(row.actual_ms, true),
            format_signed(row.deviation_ms),
            format_pct(row.deviation_pct, true),
            format_pct(row.accuracy, false),
        )
        .unwrap();
    }

    let totals = &report.totals;
    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(output, "Rows:              {}", totals.row_count).unwrap();
    writeln!(output, "Estimated:         {}", format_duration(totals.estimated_ms, true)).unwrap();
    if let Some(original_ms) = totals.original_ms {
        writeln!(output, "Originally:        {}", format_duration(original_ms, true)).unwrap();
    }
    writeln!(output, "Actual:            {}", format_duration(totals.actual_ms, true)).unwrap();
    writeln!(output, "Remaining:         {}", format_duration(totals.remaining_ms, true)).unwrap();
    writeln!(output, "Deviation:         {}", format_signed(totals.deviation_ms)).unwrap();
    writeln!(
        output,
        "Average accuracy:  {}",
        format_pct(totals.average_accuracy, false)
    )
    .unwrap();
    if let Some(row) = &totals.most_underestimated {
        writeln!(
            output,
            "Most under:        {} ({})",
            row.label,
            format_pct(Some(row.deviation_pct), true)
        )
        .unwrap();
    }
    if let Some(row) = &totals.most_overestimated {
        writeln!(
            output,
            "Most over:         {} ({})",
            row.label,
            format_pct(Some(row.deviation_pct), true)
        )
        .unwrap();
    }
    if report.group_by == GroupBy::Label {
        writeln!(output).unwrap();
        writeln!(output, "Items with several labels count once per label.").unwrap();
    }

    output
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &ReportArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let today = now.with_timezone(&Local).date_naive();
    let options = args.options.options(today);
    let report = tracker.report_at(&options, now)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        let period: Period = args.options.period.period();
        write!(writer, "{}", format_report(&report, &period.describe(today)))?;
    }
    Ok(())
}
