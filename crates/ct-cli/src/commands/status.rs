//! `ct status`: who is timing what, and the time and estimates on one item.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use ct_core::{BoardHost, WorkItemId, format_duration, format_timer, live_total};

use crate::Tracker;
use crate::commands::util::{ItemNames, member_lines};

#[derive(Debug, Clone, Default, Args)]
pub struct StatusArgs {
    /// Work item to show (defaults to the board's current item).
    #[arg(long)]
    pub item: Option<WorkItemId>,
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &StatusArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let metadata = tracker.metadata()?;
    let names = ItemNames::new(&metadata);
    let group = tracker.host().current_group()?;
    writeln!(writer, "Board {group}")?;

    let item = match &args.item {
        Some(id) => Some(id.clone()),
        None => tracker.resolve_item(None).ok(),
    };
    if let Some(item) = item {
        writeln!(writer)?;
        writeln!(writer, "{}", names.get(&item))?;
        let view = tracker.member_time_view(&item);
        write!(writer, "{}", member_lines(&view, now))?;

        let estimates = tracker.estimates(&item);
        if !estimates.is_empty() {
            writeln!(writer, "Estimates")?;
        }
        for estimate in estimates.values() {
            let original = estimate
                .original_ms
                .map(|ms| format!(" (originally {})", format_duration(ms, true)))
                .unwrap_or_default();
            writeln!(
                writer,
                "  {:<16} {}{original}",
                estimate.person_name,
                format_duration(estimate.estimated_ms, true)
            )?;
        }
    }

    let timers = tracker.active_timers()?;
    writeln!(writer)?;
    if timers.is_empty() {
        writeln!(writer, "No running timers")?;
        return Ok(());
    }
    writeln!(writer, "Running timers")?;
    for timer in &timers {
        writeln!(
            writer,
            "  {}  {} on {}  {}",
            timer.id,
            timer.person_name,
            names.get(&timer.work_item_id),
            format_timer(live_total(0, Some(timer.started_at), now))
        )?;
    }
    Ok(())
}
